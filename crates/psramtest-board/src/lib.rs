//! Backend registry and board handles
//!
//! This crate turns a backend string such as
//! `linux_spi:dev=/dev/spidev1.0,gpiochip=0,cs=13,pulse=28` into a
//! [`BoardHandle`]: the chip-select-gated bus to the PSRAM, the timing pulse
//! line, and any lines that only need to be driven once and held (status LED,
//! quad-mode hold lines).
//!
//! # Board options
//!
//! These keys are accepted by every backend in addition to its own options:
//!
//! - `gpiochip=N` or `gpiodev=/dev/gpiochipN` - chip the board lines live on
//! - `pulse=N` - timing pulse line (oscilloscope trigger)
//! - `led=N` - status LED, switched on when the board is opened
//! - `io2=N`, `io3=N` - quad-mode lines, held high with the pull-up enabled
//!
//! The `dummy` backend emulates every line in memory and ignores offsets.
//!
//! # Example
//!
//! ```ignore
//! use psramtest_board::open_board;
//!
//! let handle = open_board("dummy:wait=1")?;
//! let (board, _held) = handle.into_board();
//! ```

mod error;

pub use error::{BoardError, Result};

use psramtest_core::bus::{OutputLine, SpiBus, StdClock};
use psramtest_core::sequencer::Board;
use std::collections::HashMap;

/// Boxed bus as produced by the registry
pub type BoxedBus = Box<dyn SpiBus + Send>;

/// Boxed output line as produced by the registry
pub type BoxedLine = Box<dyn OutputLine + Send>;

/// Keys consumed by the board rather than the bus backend
const BOARD_KEYS: &[&str] = &["gpiochip", "gpiodev", "pulse", "led", "io2", "io3"];

/// Parsed backend parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendParams {
    /// Backend name as given
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl BackendParams {
    /// Look up a parameter
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Options meant for the bus backend, with board keys removed
    ///
    /// Keys listed in `shared` are passed through even if the board also
    /// reads them.
    fn bus_options(&self, shared: &[&str]) -> Vec<(&str, &str)> {
        self.params
            .iter()
            .filter(|(k, _)| !BOARD_KEYS.contains(&k.as_str()) || shared.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    /// Parse a numeric parameter, hex with `0x` prefix or decimal
    fn number(&self, key: &str) -> Result<Option<u32>> {
        self.get(key).map(|value| parse_number(key, value)).transpose()
    }
}

/// Parse a backend string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
///
/// # Example
/// ```
/// let params = psramtest_board::parse_backend_params("linux_spi:dev=/dev/spidev1.0").unwrap();
/// assert_eq!(params.name, "linux_spi");
/// assert_eq!(params.get("dev"), Some("/dev/spidev1.0"));
/// ```
pub fn parse_backend_params(s: &str) -> Result<BackendParams> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    if name.is_empty() {
        return Err(BoardError::InvalidParameter(
            "empty backend name".to_string(),
        ));
    }

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.trim().to_string(), value.trim().to_string());
            } else {
                return Err(BoardError::InvalidParameter(format!(
                    "'{}' (expected key=value)",
                    opt
                )));
            }
        }
    }

    Ok(BackendParams {
        name: name.to_string(),
        params,
    })
}

fn parse_number(key: &str, value: &str) -> Result<u32> {
    let parsed = if let Some(hex) = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        value.parse()
    };
    parsed.map_err(|_| BoardError::InvalidParameter(format!("{}={}", key, value)))
}

/// Lines that are driven once when the board is opened and must stay
/// requested for as long as the test runs
#[derive(Default)]
pub struct HeldLines {
    lines: Vec<(&'static str, BoxedLine)>,
}

impl HeldLines {
    fn push(&mut self, role: &'static str, line: BoxedLine) {
        self.lines.push((role, line));
    }

    /// Roles of the held lines, in the order they were opened
    pub fn roles(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.lines.iter().map(|(role, _)| *role)
    }

    /// Number of held lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether no lines are held
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// An opened board
pub struct BoardHandle {
    /// Canonical backend name
    pub backend: &'static str,
    /// Chip-select-gated bus to the PSRAM
    pub bus: BoxedBus,
    /// Timing pulse line; a no-op line when no `pulse` was given
    pub timing: BoxedLine,
    /// LED and hold lines
    pub held: HeldLines,
}

impl BoardHandle {
    /// Split into a sequencer board using the host clock, and the held lines
    ///
    /// The held lines must outlive the sequencer.
    pub fn into_board(self) -> (Board<BoxedBus, BoxedLine, StdClock>, HeldLines) {
        (
            Board::new(self.bus, self.timing, StdClock::new()),
            self.held,
        )
    }
}

/// Open a backend and its board lines
///
/// # Arguments
/// * `backend` - Backend specification (e.g., "dummy" or "linux_spi:dev=/dev/spidev1.0")
pub fn open_board(backend: &str) -> Result<BoardHandle> {
    let params = parse_backend_params(backend)?;

    match params.name.as_str() {
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),

        #[cfg(feature = "linux-spi")]
        "linux_spi" | "linux-spi" | "spidev" => open_linux_spi(&params),

        #[cfg(feature = "linux-gpio")]
        "linux_gpio" | "linux-gpio" | "linux_gpio_spi" => open_linux_gpio(&params),

        _ => Err(BoardError::UnknownBackend {
            name: params.name.clone(),
            available: backend_names_short(),
        }),
    }
}

#[cfg(feature = "dummy")]
fn dummy_config(params: &BackendParams) -> Result<psramtest_dummy::DummyConfig> {
    // Long CLI runs must neither grow a trace nor spin through the interval
    let mut config = psramtest_dummy::DummyConfig {
        record_trace: false,
        realtime: true,
        ..Default::default()
    };

    fn byte(key: &str, value: u32) -> Result<u8> {
        u8::try_from(value)
            .map_err(|_| BoardError::InvalidParameter(format!("{}={} exceeds 0xFF", key, value)))
    }

    if let Some(wait) = params.number("wait")? {
        config.fast_read_wait_bytes = wait as usize;
    }
    if let Some(mfid) = params.number("mfid")? {
        config.manufacturer_id = byte("mfid", mfid)?;
    }
    if let Some(kgd) = params.number("kgd")? {
        config.kgd = byte("kgd", kgd)?;
    }
    if let Some(fill) = params.number("fill")? {
        config.fill = byte("fill", fill)?;
    }

    for key in params.params.keys() {
        if !["wait", "mfid", "kgd", "fill"].contains(&key.as_str())
            && !BOARD_KEYS.contains(&key.as_str())
        {
            log::warn!("dummy: Unknown option: {}", key);
        }
    }

    Ok(config)
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &BackendParams) -> Result<BoardHandle> {
    use psramtest_dummy::{DummyLine, DummyPsram};

    let config = dummy_config(params)?;
    log::info!(
        "dummy: Emulating {} KiB PSRAM (MFID 0x{:02X}, KGD 0x{:02X}, {} wait byte(s))",
        config.size / 1024,
        config.manufacturer_id,
        config.kgd,
        config.fast_read_wait_bytes
    );

    let mut held = HeldLines::default();
    let mut led = DummyLine::new();
    led.set_high().map_err(|e| BoardError::Open {
        backend: "dummy",
        message: e.to_string(),
    })?;
    held.push("led", Box::new(led));

    Ok(BoardHandle {
        backend: "dummy",
        bus: Box::new(DummyPsram::new(config)),
        timing: Box::new(DummyLine::new()),
        held,
    })
}

#[cfg(any(feature = "linux-spi", feature = "linux-gpio"))]
mod lines {
    use super::*;
    use psramtest_core::bus::NoPin;
    use psramtest_linux_gpio::{chip_path, GpioLine};

    /// GPIO chip the board lines are requested on
    pub(super) fn chip(params: &BackendParams, fallback: Option<&str>) -> Result<Option<String>> {
        if let Some(dev) = params.get("gpiodev") {
            return Ok(Some(dev.to_string()));
        }
        if let Some(n) = params.number("gpiochip")? {
            return Ok(Some(chip_path(n)));
        }
        Ok(fallback.map(str::to_string))
    }

    fn request(
        chip: Option<&str>,
        role: &'static str,
        offset: u32,
        initial_high: bool,
        pull_up: bool,
    ) -> Result<GpioLine> {
        let chip = chip.ok_or_else(|| {
            BoardError::InvalidParameter(format!(
                "{}={} needs gpiochip=N or gpiodev=/dev/gpiochipN",
                role, offset
            ))
        })?;
        let line = if pull_up {
            GpioLine::open_pulled_up(chip, offset)
        } else {
            GpioLine::open(chip, offset, initial_high)
        };
        line.map_err(|source| BoardError::Line {
            role,
            offset,
            source,
        })
    }

    /// Request an output line if `key` was given
    pub(super) fn optional(
        params: &BackendParams,
        chip: Option<&str>,
        key: &'static str,
        initial_high: bool,
    ) -> Result<Option<GpioLine>> {
        params
            .number(key)?
            .map(|offset| request(chip, key, offset, initial_high, false))
            .transpose()
    }

    /// Timing pulse, LED and hold lines
    pub(super) fn board_lines(
        params: &BackendParams,
        chip: Option<&str>,
    ) -> Result<(BoxedLine, HeldLines)> {
        let timing: BoxedLine = match optional(params, chip, "pulse", false)? {
            Some(line) => Box::new(line),
            None => Box::new(NoPin),
        };

        let mut held = HeldLines::default();
        if let Some(led) = optional(params, chip, "led", true)? {
            log::info!("board: Status LED on line {}", led.offset());
            held.push("led", Box::new(led));
        }
        for key in ["io2", "io3"] {
            if let Some(offset) = params.number(key)? {
                let line = request(chip, key, offset, true, true)?;
                log::debug!("board: Holding {} (line {}) high", key, offset);
                held.push(key, Box::new(line));
            }
        }

        Ok((timing, held))
    }
}

#[cfg(feature = "linux-spi")]
fn open_linux_spi(params: &BackendParams) -> Result<BoardHandle> {
    use psramtest_linux_spi::{parse_options, LinuxSpi};

    log::info!("Opening Linux SPI backend...");

    // cs belongs to the board here: spidev only knows its own chip-select
    let options: Vec<(&str, &str)> = params
        .bus_options(&[])
        .into_iter()
        .filter(|(k, _)| *k != "cs")
        .collect();
    let config = parse_options(&options).map_err(|message| BoardError::Open {
        backend: "linux_spi",
        message,
    })?;

    let chip = lines::chip(params, None)?;
    let (timing, held) = lines::board_lines(params, chip.as_deref())?;
    let cs = lines::optional(params, chip.as_deref(), "cs", true)?;

    let open_failed = |e: psramtest_linux_spi::LinuxSpiError| BoardError::Open {
        backend: "linux_spi",
        message: format!(
            "Failed to open Linux SPI device: {}\n\
             Make sure the device exists and you have read/write permissions.\n\
             You may need to: sudo usermod -aG spi $USER",
            e
        ),
    };
    let spi = match cs {
        Some(line) => LinuxSpi::open_with_cs_line(&config, Box::new(line)),
        None => LinuxSpi::open(&config),
    }
    .map_err(open_failed)?;

    Ok(BoardHandle {
        backend: "linux_spi",
        bus: Box::new(spi),
        timing,
        held,
    })
}

#[cfg(feature = "linux-gpio")]
fn open_linux_gpio(params: &BackendParams) -> Result<BoardHandle> {
    use psramtest_core::bus::BitbangSpiBus;
    use psramtest_linux_gpio::{parse_options, LinuxGpioSpi};

    log::info!("Opening Linux GPIO bitbang backend...");

    let options = params.bus_options(&["gpiochip"]);
    let config = parse_options(&options).map_err(|message| BoardError::Open {
        backend: "linux_gpio",
        message,
    })?;

    // The bus lines are requested first so a clash with a board line is
    // reported by the kernel against the board line
    let spi = LinuxGpioSpi::open(&config).map_err(|e| BoardError::Open {
        backend: "linux_gpio",
        message: e.to_string(),
    })?;

    let chip = lines::chip(params, Some(&config.device))?;
    let (timing, held) = lines::board_lines(params, chip.as_deref())?;

    Ok(BoardHandle {
        backend: "linux_gpio",
        bus: Box::new(BitbangSpiBus::new(spi)),
        timing,
        held,
    })
}

/// Information about a backend
pub struct BackendInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available backends (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<BackendInfo> {
    let mut backends = Vec::new();

    #[cfg(feature = "dummy")]
    backends.push(BackendInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory PSRAM emulator (wait=<n>,mfid=<id>,kgd=<id>,fill=<byte>)",
    });

    #[cfg(feature = "linux-spi")]
    backends.push(BackendInfo {
        name: "linux_spi",
        aliases: &["linux-spi", "spidev"],
        description: "Linux spidev (dev=/dev/spidevX.Y,spispeed=<kHz>, optional GPIO cs=<n>)",
    });

    #[cfg(feature = "linux-gpio")]
    backends.push(BackendInfo {
        name: "linux_gpio",
        aliases: &["linux-gpio", "linux_gpio_spi"],
        description: "Bit-banged SPI over gpiocdev (gpiochip=<n>,cs=,sck=,mosi=,miso=)",
    });

    backends
}

/// Generate a short list of backend names for CLI help
pub fn backend_names_short() -> String {
    let backends = available_backends();
    if backends.is_empty() {
        return "none (recompile with features)".to_string();
    }
    let names: Vec<&str> = backends.iter().map(|b| b.name).collect();
    names.join(", ")
}
