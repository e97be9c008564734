//! Linux GPIO SPI bitbanging device implementation
//!
//! This module provides the `LinuxGpioSpi` struct that implements the
//! `BitbangBus` trait using Linux's GPIO character device interface
//! (gpiocdev). Wrapped in `BitbangSpiBus` it becomes a PSRAM bus.
//!
//! Only single-wire mode 0 is driven; the clock is far below the PSRAM's
//! limit, so the device never needs more than its one FAST_READ wait state.

use crate::error::{LinuxGpioError, Result};
use crate::line::{chip_path, level, CONSUMER};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use psramtest_core::bus::BitbangBus;

/// GPIO line indices
#[derive(Debug, Clone, Copy)]
enum Line {
    Cs = 0,
    Sck = 1,
    Mosi = 2,
    Miso = 3,
}

/// Number of GPIO lines we use
const NUM_LINES: usize = 4;

/// Default half-period delay in nanoseconds (for ~100 kHz SPI clock)
const DEFAULT_HALF_PERIOD_NS: u64 = 5000;

/// Configuration for opening a Linux GPIO SPI device
#[derive(Debug, Clone)]
pub struct LinuxGpioSpiConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// CS (Chip Select) GPIO line offset
    pub cs: Offset,
    /// SCK (Clock) GPIO line offset
    pub sck: Offset,
    /// MOSI GPIO line offset
    pub mosi: Offset,
    /// MISO GPIO line offset
    pub miso: Offset,
    /// Half-period delay in nanoseconds
    pub half_period_ns: u64,
}

impl Default for LinuxGpioSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            cs: 0,
            sck: 0,
            mosi: 0,
            miso: 0,
            half_period_ns: DEFAULT_HALF_PERIOD_NS,
        }
    }
}

impl LinuxGpioSpiConfig {
    /// Create a new configuration with the given device path and pins
    pub fn new(
        device: impl Into<String>,
        cs: Offset,
        sck: Offset,
        mosi: Offset,
        miso: Offset,
    ) -> Self {
        Self {
            device: device.into(),
            cs,
            sck,
            mosi,
            miso,
            ..Default::default()
        }
    }

    /// Set the half-period delay in nanoseconds
    pub fn with_half_period_ns(mut self, ns: u64) -> Self {
        self.half_period_ns = ns;
        self
    }

    /// Set SPI speed in Hz (approximate, via half-period calculation)
    pub fn with_speed_hz(mut self, hz: u32) -> Self {
        // half_period = 1_000_000_000 / (2 * frequency) in nanoseconds
        if hz > 0 {
            self.half_period_ns = 500_000_000 / hz as u64;
        }
        self
    }

    /// Check that every signal has its own line
    pub fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }
        let lines = [
            ("cs", self.cs),
            ("sck", self.sck),
            ("mosi", self.mosi),
            ("miso", self.miso),
        ];
        for (i, &(first, line)) in lines.iter().enumerate() {
            let duplicate = lines[i + 1..].iter().find(|(_, other)| *other == line);
            if let Some(&(second, _)) = duplicate {
                return Err(LinuxGpioError::DuplicateLine {
                    line,
                    first,
                    second,
                });
            }
        }
        Ok(())
    }
}

/// Linux GPIO SPI bus using bitbanging
pub struct LinuxGpioSpi {
    /// GPIO line request handle
    request: Request,
    /// GPIO line offsets indexed by Line enum
    offsets: [Offset; NUM_LINES],
    /// Half-period delay in nanoseconds
    half_period_ns: u64,
}

impl LinuxGpioSpi {
    /// Open a Linux GPIO SPI device with the given configuration
    pub fn open(config: &LinuxGpioSpiConfig) -> Result<Self> {
        config.validate()?;

        log::debug!("linux_gpio_spi: Opening device {}", config.device);

        let mut offsets = [0u32; NUM_LINES];
        offsets[Line::Cs as usize] = config.cs;
        offsets[Line::Sck as usize] = config.sck;
        offsets[Line::Mosi as usize] = config.mosi;
        offsets[Line::Miso as usize] = config.miso;

        // Initial state: CS=1 (inactive), SCK=0, MOSI=0, MISO=input
        let mut req_config = Config::default();
        req_config.with_line(config.cs).as_output(Value::Active);
        req_config.with_line(config.sck).as_output(Value::Inactive);
        req_config.with_line(config.mosi).as_output(Value::Inactive);
        req_config.with_line(config.miso).as_input();

        let request = Request::from_config(req_config)
            .on_chip(&config.device)
            .with_consumer(CONSUMER)
            .request()
            .map_err(LinuxGpioError::LineRequestFailed)?;

        log::info!(
            "linux_gpio_spi: Opened {} (cs={}, sck={}, mosi={}, miso={}, half period {} ns)",
            config.device,
            config.cs,
            config.sck,
            config.mosi,
            config.miso,
            config.half_period_ns
        );

        Ok(Self {
            request,
            offsets,
            half_period_ns: config.half_period_ns,
        })
    }

    fn set_line(&self, line: Line, high: bool) {
        if let Err(e) = self
            .request
            .set_value(self.offsets[line as usize], level(high))
        {
            log::error!("linux_gpio_spi: Failed to set {:?}: {}", line, e);
        }
    }
}

impl BitbangBus for LinuxGpioSpi {
    fn set_cs(&mut self, active: bool) {
        // CS is active low
        self.set_line(Line::Cs, !active);
    }

    fn set_sck(&mut self, high: bool) {
        self.set_line(Line::Sck, high);
    }

    fn set_mosi(&mut self, high: bool) {
        self.set_line(Line::Mosi, high);
    }

    fn get_miso(&self) -> bool {
        match self.request.value(self.offsets[Line::Miso as usize]) {
            Ok(Value::Active) => true,
            Ok(Value::Inactive) => false,
            Err(e) => {
                log::error!("linux_gpio_spi: Failed to get MISO: {}", e);
                false
            }
        }
    }

    fn half_period_delay(&self) {
        if self.half_period_ns > 0 {
            std::thread::sleep(std::time::Duration::from_nanos(self.half_period_ns));
        }
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }
}

/// Parse bus options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path (or use gpiochip)
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `cs=N` - CS (chip select) GPIO line offset (required)
/// - `sck=N` - SCK (clock) GPIO line offset (required)
/// - `mosi=N` - MOSI GPIO line offset (required)
/// - `miso=N` - MISO GPIO line offset (required)
/// - `spispeed=N` - SPI speed in kHz (optional, default ~100 kHz)
pub fn parse_options(
    options: &[(&str, &str)],
) -> std::result::Result<LinuxGpioSpiConfig, String> {
    let mut config = LinuxGpioSpiConfig::default();
    let mut cs = None;
    let mut sck = None;
    let mut mosi = None;
    let mut miso = None;
    let mut gpiochip: Option<u32> = None;

    fn line(key: &str, value: &str) -> std::result::Result<Offset, String> {
        value
            .parse()
            .map_err(|_| format!("Invalid {} value: {}", key, value))
    }

    for (key, value) in options {
        match *key {
            "dev" => config.device = value.to_string(),
            "gpiochip" => gpiochip = Some(line(key, value)?),
            "cs" => cs = Some(line(key, value)?),
            "sck" => sck = Some(line(key, value)?),
            "mosi" => mosi = Some(line(key, value)?),
            "miso" => miso = Some(line(key, value)?),
            "spispeed" => {
                let speed_khz: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid spispeed value: {}", value))?;
                let speed_hz = speed_khz
                    .checked_mul(1000)
                    .ok_or_else(|| format!("spispeed too large: {}", value))?;
                config = config.with_speed_hz(speed_hz);
            }
            _ => {
                log::warn!("linux_gpio_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    match (config.device.is_empty(), gpiochip) {
        (true, Some(n)) => config.device = chip_path(n),
        (true, None) => {
            return Err("Either 'dev' or 'gpiochip' must be specified.\n\
                 e.g. linux_gpio:gpiochip=0,cs=13,sck=14,mosi=15,miso=12"
                .to_string())
        }
        (false, Some(_)) => {
            return Err("Only one of 'dev' or 'gpiochip' can be specified".to_string())
        }
        (false, None) => {}
    }

    config.cs = cs.ok_or("Missing required parameter: cs")?;
    config.sck = sck.ok_or("Missing required parameter: sck")?;
    config.mosi = mosi.ok_or("Missing required parameter: mosi")?;
    config.miso = miso.ok_or("Missing required parameter: miso")?;

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}
