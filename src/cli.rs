//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use psramtest_core::sequencer::{Mode, ResetPolicy};
use psramtest_core::spi::ReadCommand;
use serde::Deserialize;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a size like "32768", "0x8000", "32 KiB" or "1MiB"
pub fn parse_size(s: &str) -> Result<usize, String> {
    let lower = s.trim().to_lowercase();
    let (num, multiplier) = if let Some(n) = lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else {
        (lower.as_str(), 1)
    };
    let value = parse_hex_u32(num).map_err(|_| format!("Invalid size: {}", s))? as usize;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Size too large: {}", s))
}

/// Generate dynamic help text for the backend argument
fn backend_help() -> String {
    format!(
        "Backend to use, e.g. dummy or linux_spi:dev=/dev/spidev1.0,gpiochip=0,cs=13 \
         [available: {}]",
        psramtest_board::backend_names_short()
    )
}

#[derive(Parser)]
#[command(name = "psramtest")]
#[command(author, version, about = "Serial PSRAM bring-up and diagnostics", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the diagnostic loop
    Run(RunArgs),

    /// List available backends
    ListBackends,
}

/// Options of the run command
///
/// Every option left unset falls back to the configuration file, then to
/// the built-in default.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Backend to use
    #[arg(short, long, help = backend_help())]
    pub backend: Option<String>,

    /// Run configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Routine run in every iteration [default: read-write]
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Command used to read data back [default: fast-read]
    #[arg(long, value_enum)]
    pub read_command: Option<ReadCommandArg>,

    /// When to send RESET_ENABLE + RESET [default: once]
    #[arg(long, value_enum)]
    pub reset: Option<ResetArg>,

    /// Bulk transfer length, 0 skips the bulk round trip [default: 32 KiB]
    #[arg(long, value_parser = parse_size)]
    pub bulk_len: Option<usize>,

    /// Device address every transfer starts at (hex or decimal) [default: 0]
    #[arg(long, value_parser = parse_hex_u32)]
    pub address: Option<u32>,

    /// Pause between iterations in milliseconds [default: 2000]
    #[arg(long)]
    pub interval_ms: Option<u32>,

    /// Stop after this many iterations (runs forever if not given)
    #[arg(short = 'n', long)]
    pub iterations: Option<u64>,

    /// Pause between bulk write and bulk read in microseconds [default: 100]
    #[arg(long)]
    pub settle_us: Option<u32>,

    /// Delay before the first reset in microseconds [default: 200]
    #[arg(long)]
    pub power_up_delay_us: Option<u32>,

    /// Print at most this many mismatch lines per iteration
    #[arg(long)]
    pub max_mismatch_lines: Option<usize>,
}

/// Routine run in every iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModeArg {
    /// Identification query
    Identify,
    /// Small and bulk write/read-back
    ReadWrite,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Identify => Mode::Identify,
            ModeArg::ReadWrite => Mode::ReadWrite,
        }
    }
}

/// Read command used for read-back
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadCommandArg {
    /// READ (0x03), no wait state
    Read,
    /// FAST_READ (0x0B), one wait-state byte
    FastRead,
}

impl From<ReadCommandArg> for ReadCommand {
    fn from(cmd: ReadCommandArg) -> Self {
        match cmd {
            ReadCommandArg::Read => ReadCommand::Read,
            ReadCommandArg::FastRead => ReadCommand::FastRead,
        }
    }
}

/// Reset repetition
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetArg {
    /// Never reset
    Never,
    /// Reset once at startup
    Once,
    /// Reset before every iteration
    EveryIteration,
}

impl From<ResetArg> for ResetPolicy {
    fn from(reset: ResetArg) -> Self {
        match reset {
            ResetArg::Never => ResetPolicy::Never,
            ResetArg::Once => ResetPolicy::Once,
            ResetArg::EveryIteration => ResetPolicy::EveryIteration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("32768"), Ok(32768));
        assert_eq!(parse_size("32 KiB"), Ok(32 * 1024));
        assert_eq!(parse_size("1MiB"), Ok(1024 * 1024));
        assert_eq!(parse_size("0x100"), Ok(256));
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn run_arguments() {
        let cli = Cli::try_parse_from([
            "psramtest",
            "-v",
            "run",
            "-b",
            "dummy",
            "--mode",
            "identify",
            "--read-command",
            "read",
            "--reset",
            "every-iteration",
            "--address",
            "0x1000",
            "-n",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.backend.as_deref(), Some("dummy"));
        assert_eq!(args.mode, Some(ModeArg::Identify));
        assert_eq!(args.read_command, Some(ReadCommandArg::Read));
        assert_eq!(args.reset, Some(ResetArg::EveryIteration));
        assert_eq!(args.address, Some(0x1000));
        assert_eq!(args.iterations, Some(3));
        assert_eq!(args.bulk_len, None);
    }
}
