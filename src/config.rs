//! Run configuration file
//!
//! A run can be described in a TOML file instead of (or in addition to)
//! command-line flags. Flags given on the command line win over the file.
//!
//! ```toml
//! backend = "linux_spi:dev=/dev/spidev1.0,gpiochip=0,cs=13,pulse=28,io2=16,io3=17"
//! mode = "read-write"
//! read-command = "fast-read"
//! reset = "once"
//! bulk-len = "32 KiB"
//! address = 0x000000
//! interval-ms = 2000
//! max-mismatch-lines = 16
//! ```

use crate::cli::{parse_size, ModeArg, ReadCommandArg, ResetArg, RunArgs};
use psramtest_core::sequencer::{SequencerConfig, DEFAULT_BULK_LEN};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or resolving a run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("No backend given. Use --backend or set `backend` in the configuration file")]
    MissingBackend,
}

/// Run settings as read from a file or the command line; unset fields fall
/// through to the next source
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RunConfig {
    pub backend: Option<String>,
    pub mode: Option<ModeArg>,
    pub read_command: Option<ReadCommandArg>,
    pub reset: Option<ResetArg>,
    #[serde(default, deserialize_with = "deserialize_size")]
    pub bulk_len: Option<usize>,
    #[serde(default, deserialize_with = "deserialize_hex_u32")]
    pub address: Option<u32>,
    pub interval_ms: Option<u32>,
    pub iterations: Option<u64>,
    pub settle_us: Option<u32>,
    pub power_up_delay_us: Option<u32>,
    pub max_mismatch_lines: Option<usize>,
}

/// Integer or string form of a number in the file
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(u64),
    Str(String),
}

fn deserialize_size<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Int(n)) => usize::try_from(n)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(NumberOrString::Str(s)) => parse_size(&s).map(Some).map_err(serde::de::Error::custom),
    }
}

fn deserialize_hex_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Int(n)) => u32::try_from(n)
            .map(Some)
            .map_err(serde::de::Error::custom),
        Some(NumberOrString::Str(s)) => crate::cli::parse_hex_u32(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Fully resolved run settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Backend string for the board registry
    pub backend: String,
    /// Sequencer settings
    pub sequencer: SequencerConfig,
    /// Length of each transfer buffer
    pub bulk_len: usize,
    /// Iteration bound (`None` runs forever)
    pub iterations: Option<u64>,
}

impl RunConfig {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fill every unset field from `fallback`
    pub fn or(self, fallback: RunConfig) -> RunConfig {
        RunConfig {
            backend: self.backend.or(fallback.backend),
            mode: self.mode.or(fallback.mode),
            read_command: self.read_command.or(fallback.read_command),
            reset: self.reset.or(fallback.reset),
            bulk_len: self.bulk_len.or(fallback.bulk_len),
            address: self.address.or(fallback.address),
            interval_ms: self.interval_ms.or(fallback.interval_ms),
            iterations: self.iterations.or(fallback.iterations),
            settle_us: self.settle_us.or(fallback.settle_us),
            power_up_delay_us: self.power_up_delay_us.or(fallback.power_up_delay_us),
            max_mismatch_lines: self.max_mismatch_lines.or(fallback.max_mismatch_lines),
        }
    }

    /// Apply built-in defaults to every unset field
    pub fn resolve(self) -> Result<RunSettings, ConfigError> {
        let backend = self.backend.ok_or(ConfigError::MissingBackend)?;

        let mut sequencer = SequencerConfig::new();
        if let Some(mode) = self.mode {
            sequencer = sequencer.with_mode(mode.into());
        }
        if let Some(cmd) = self.read_command {
            sequencer = sequencer.with_read_command(cmd.into());
        }
        if let Some(reset) = self.reset {
            sequencer = sequencer.with_reset_policy(reset.into());
        }
        if let Some(address) = self.address {
            sequencer = sequencer.with_address(address);
        }
        if let Some(ms) = self.interval_ms {
            sequencer = sequencer.with_interval_ms(ms);
        }
        if let Some(us) = self.settle_us {
            sequencer = sequencer.with_settle_us(us);
        }
        if let Some(us) = self.power_up_delay_us {
            sequencer = sequencer.with_power_up_delay_us(us);
        }
        sequencer = sequencer.with_max_mismatch_lines(self.max_mismatch_lines);

        Ok(RunSettings {
            backend,
            sequencer,
            bulk_len: self.bulk_len.unwrap_or(DEFAULT_BULK_LEN),
            iterations: self.iterations,
        })
    }
}

impl From<&RunArgs> for RunConfig {
    fn from(args: &RunArgs) -> Self {
        RunConfig {
            backend: args.backend.clone(),
            mode: args.mode,
            read_command: args.read_command,
            reset: args.reset,
            bulk_len: args.bulk_len,
            address: args.address,
            interval_ms: args.interval_ms,
            iterations: args.iterations,
            settle_us: args.settle_us,
            power_up_delay_us: args.power_up_delay_us,
            max_mismatch_lines: args.max_mismatch_lines,
        }
    }
}

/// Combine the command line with the configuration file it names, if any
pub fn load(args: &RunArgs) -> Result<RunSettings, ConfigError> {
    let cli = RunConfig::from(args);
    let merged = match &args.config {
        Some(path) => {
            let file = RunConfig::from_toml_file(path)?;
            log::debug!("Loaded run configuration from {}", path.display());
            cli.or(file)
        }
        None => cli,
    };
    merged.resolve()
}

#[cfg(test)]
mod tests {
    use super::*;
    use psramtest_core::sequencer::{Mode, ResetPolicy};
    use psramtest_core::spi::ReadCommand;

    #[test]
    fn parses_full_file() {
        let config: RunConfig = toml::from_str(
            r#"
            backend = "dummy:wait=1"
            mode = "identify"
            read-command = "read"
            reset = "every-iteration"
            bulk-len = "4 KiB"
            address = "0x001000"
            interval-ms = 500
            iterations = 3
            settle-us = 10
            power-up-delay-us = 150
            max-mismatch-lines = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.backend.as_deref(), Some("dummy:wait=1"));
        assert_eq!(config.mode, Some(ModeArg::Identify));
        assert_eq!(config.read_command, Some(ReadCommandArg::Read));
        assert_eq!(config.reset, Some(ResetArg::EveryIteration));
        assert_eq!(config.bulk_len, Some(4096));
        assert_eq!(config.address, Some(0x1000));
        assert_eq!(config.interval_ms, Some(500));
        assert_eq!(config.iterations, Some(3));
        assert_eq!(config.max_mismatch_lines, Some(8));

        let settings = config.resolve().unwrap();
        assert_eq!(settings.sequencer.mode, Mode::Identify);
        assert_eq!(settings.sequencer.read_command, ReadCommand::Read);
        assert_eq!(settings.sequencer.reset_policy, ResetPolicy::EveryIteration);
        assert_eq!(settings.sequencer.power_up_delay_us, 150);
        assert_eq!(settings.sequencer.settle_us, 10);
    }

    #[test]
    fn numbers_may_be_plain_integers() {
        let config: RunConfig = toml::from_str("bulk-len = 1024\naddress = 16").unwrap();
        assert_eq!(config.bulk_len, Some(1024));
        assert_eq!(config.address, Some(16));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<RunConfig>("speed = 1").is_err());
        assert!(toml::from_str::<RunConfig>("mode = \"quad\"").is_err());
    }

    #[test]
    fn command_line_wins_over_file() {
        let cli = RunConfig {
            mode: Some(ModeArg::Identify),
            ..Default::default()
        };
        let file = RunConfig {
            backend: Some("dummy".to_string()),
            mode: Some(ModeArg::ReadWrite),
            interval_ms: Some(10),
            ..Default::default()
        };

        let merged = cli.or(file);
        assert_eq!(merged.backend.as_deref(), Some("dummy"));
        assert_eq!(merged.mode, Some(ModeArg::Identify));
        assert_eq!(merged.interval_ms, Some(10));
    }

    #[test]
    fn defaults_match_the_bring_up_loop() {
        let settings = RunConfig {
            backend: Some("dummy".to_string()),
            ..Default::default()
        }
        .resolve()
        .unwrap();

        assert_eq!(settings.sequencer, SequencerConfig::default());
        assert_eq!(settings.bulk_len, DEFAULT_BULK_LEN);
        assert_eq!(settings.iterations, None);
    }

    #[test]
    fn backend_is_required() {
        assert!(matches!(
            RunConfig::default().resolve(),
            Err(ConfigError::MissingBackend)
        ));
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let err = RunConfig::from_toml_file("/nonexistent/psramtest.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/psramtest.toml"));
    }
}
