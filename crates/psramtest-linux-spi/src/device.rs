//! Linux SPI device implementation
//!
//! This module provides the `LinuxSpi` struct that implements the `SpiBus`
//! trait using Linux's spidev interface.
//!
//! spidev frames every `SPI_IOC_MESSAGE` with the controller's chip-select,
//! while a PSRAM session spans several transfers (header, wait state, data).
//! Two chip-select strategies are supported:
//!
//! - **GPIO**: the controller's chip-select is disabled with `SPI_NO_CS` and
//!   a separate output line is driven by `select`/`deselect`. This is how
//!   the reference wiring works.
//! - **Kernel**: every message ends with `cs_change` set so the controller
//!   keeps chip-select asserted between messages; `deselect` sends an empty
//!   message to release it. Not every controller driver honours this.

use crate::error::{LinuxSpiError, Result};

use psramtest_core::bus::{OutputLine, SpiBus};
use psramtest_core::error::{Error as CoreError, Result as CoreResult};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Default SPI clock speed in Hz (33 MHz)
pub const DEFAULT_SPEED_HZ: u32 = 33_000_000;

/// SPI mode constants
pub mod mode {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: u8 = 0;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: u8 = 3;
    /// Controller does not drive chip-select
    pub const NO_CS: u8 = 0x40;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

    // SPI ioctl type numbers
    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// Calculate ioctl number for SPI_IOC_MESSAGE(n)
    ///
    /// `_IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(struct spi_ioc_transfer)])`
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// SPI transfer structure for ioctl
/// This must match the kernel's struct spi_ioc_transfer layout
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,          // __u64 tx_buf
    rx_buf: u64,          // __u64 rx_buf
    len: u32,             // __u32 len
    speed_hz: u32,        // __u32 speed_hz
    delay_usecs: u16,     // __u16 delay_usecs
    bits_per_word: u8,    // __u8 bits_per_word
    cs_change: u8,        // __u8 cs_change
    tx_nbits: u8,         // __u8 tx_nbits
    rx_nbits: u8,         // __u8 rx_nbits
    word_delay_usecs: u8, // __u8 word_delay_usecs
    _pad: u8,             // padding
}

/// Configuration for opening a Linux SPI device
#[derive(Debug, Clone)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev1.0")
    pub device: String,
    /// SPI clock speed in Hz (default: 33 MHz)
    pub speed_hz: u32,
    /// SPI mode (0 or 3, default: 0)
    pub mode: u8,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            speed_hz: DEFAULT_SPEED_HZ,
            mode: mode::MODE_0,
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode (0 or 3)
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

/// Linux SPI bus using the spidev interface
pub struct LinuxSpi {
    /// File handle for spidev device
    file: File,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
    /// Current speed in Hz
    speed_hz: u32,
    /// GPIO chip-select line, `None` when the controller drives chip-select
    cs_line: Option<Box<dyn OutputLine + Send>>,
    /// Whether a session is open
    selected: bool,
}

impl LinuxSpi {
    /// Open a Linux SPI device using the controller's own chip-select
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        Self::open_inner(config, None)
    }

    /// Open a Linux SPI device with chip-select on a separate output line
    ///
    /// The line is driven high (deselected) before the device is used.
    pub fn open_with_cs_line(
        config: &LinuxSpiConfig,
        mut cs_line: Box<dyn OutputLine + Send>,
    ) -> Result<Self> {
        cs_line
            .set_high()
            .map_err(LinuxSpiError::ChipSelectFailed)?;
        Self::open_inner(config, Some(cs_line))
    }

    fn open_inner(
        config: &LinuxSpiConfig,
        cs_line: Option<Box<dyn OutputLine + Send>>,
    ) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        let fd = file.as_raw_fd();

        // Set SPI mode, handing chip-select to the GPIO line if there is one
        let mode = if cs_line.is_some() {
            config.mode | mode::NO_CS
        } else {
            config.mode
        };
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode).map_err(|e| LinuxSpiError::SetModeFailed {
                mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        // Set bits per word (always 8)
        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxSpiError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        // Set clock speed
        let speed = config.speed_hz;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(|e| {
                LinuxSpiError::SetSpeedFailed {
                    speed,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        log::info!(
            "linux_spi: Opened {} (mode={}, speed={} kHz, cs={})",
            config.device,
            config.mode,
            speed / 1000,
            if cs_line.is_some() { "gpio" } else { "kernel" }
        );

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            file,
            max_kernel_buf_size,
            speed_hz: speed,
            cs_line,
            selected: false,
        })
    }

    /// Open a device with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxSpiConfig::new(device))
    }

    /// Get current speed setting
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    /// Whether chip-select is driven by a GPIO line
    pub fn has_cs_line(&self) -> bool {
        self.cs_line.is_some()
    }

    /// Send one message consisting of a single half-duplex transfer
    ///
    /// Exactly one of `tx` and `rx` is non-null; a null `tx` clocks out zeros.
    fn message(&self, tx: Option<&[u8]>, rx: Option<&mut [u8]>, keep_cs: bool) -> Result<()> {
        let len = tx
            .map(|b| b.len())
            .or(rx.as_ref().map(|b| b.len()))
            .unwrap_or(0);
        let transfer = SpiIocTransfer {
            tx_buf: tx.map_or(0, |b| b.as_ptr() as u64),
            rx_buf: rx.map_or(0, |b| b.as_mut_ptr() as u64),
            len: len as u32,
            speed_hz: self.speed_hz,
            bits_per_word: 8,
            cs_change: keep_cs as u8,
            ..Default::default()
        };

        let ioctl_num = ioctl::spi_ioc_message(1);
        let ret = unsafe {
            libc::ioctl(
                self.file.as_raw_fd(),
                ioctl_num,
                &transfer as *const SpiIocTransfer,
            )
        };
        if ret < 0 {
            return Err(LinuxSpiError::TransferFailed(
                std::io::Error::last_os_error(),
            ));
        }
        Ok(())
    }

    /// Whether messages inside a session must ask the kernel to hold chip-select
    fn keep_cs(&self) -> bool {
        self.cs_line.is_none()
    }

    fn transfer_failed(e: LinuxSpiError) -> CoreError {
        log::error!("linux_spi: {}", e);
        CoreError::SpiTransferFailed
    }
}

impl SpiBus for LinuxSpi {
    fn select(&mut self) -> CoreResult<()> {
        if self.selected {
            return Err(CoreError::AlreadySelected);
        }
        if let Some(cs) = self.cs_line.as_mut() {
            cs.set_low().map_err(|_| CoreError::ChipSelectFailed)?;
        }
        // Kernel chip-select is asserted by the first message of the session
        self.selected = true;
        Ok(())
    }

    fn deselect(&mut self) -> CoreResult<()> {
        if !self.selected {
            return Err(CoreError::NotSelected);
        }
        self.selected = false;
        match self.cs_line.as_mut() {
            Some(cs) => cs.set_high().map_err(|_| CoreError::ChipSelectFailed),
            None => self
                .message(None, None, false)
                .map_err(|_| CoreError::ChipSelectFailed),
        }
    }

    fn write(&mut self, data: &[u8]) -> CoreResult<usize> {
        if !self.selected {
            return Err(CoreError::NotSelected);
        }
        let keep_cs = self.keep_cs();
        for chunk in data.chunks(self.max_kernel_buf_size) {
            self.message(Some(chunk), None, keep_cs)
                .map_err(Self::transfer_failed)?;
        }
        Ok(data.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> CoreResult<usize> {
        if !self.selected {
            return Err(CoreError::NotSelected);
        }
        let keep_cs = self.keep_cs();
        let len = buf.len();
        for chunk in buf.chunks_mut(self.max_kernel_buf_size) {
            self.message(None, Some(chunk), keep_cs)
                .map_err(Self::transfer_failed)?;
        }
        Ok(len)
    }

    fn delay_us(&mut self, us: u32) {
        std::thread::sleep(std::time::Duration::from_micros(us as u64));
    }

    fn max_transfer_len(&self) -> usize {
        self.max_kernel_buf_size
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                log::debug!("linux_spi: Using buffer size {} from sysfs", size);
                return size;
            }
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    // Fall back to page size
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("linux_spi: Using page size {} as buffer size", page_size);
    page_size
}

/// Parse bus options from a list of key-value pairs
///
/// # Supported Options
///
/// - `dev=/dev/spidevX.Y` - spidev device path (required)
/// - `spispeed=N` - SPI speed in kHz (default 33000)
/// - `mode=0|3` - SPI mode (default 0)
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxSpiConfig, String> {
    let mut config = LinuxSpiConfig::default();

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "spispeed" => {
                let speed_khz: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid spispeed value: {}", value))?;
                if speed_khz == 0 {
                    return Err("spispeed must be greater than 0".to_string());
                }
                config.speed_hz = speed_khz
                .checked_mul(1000)
                .ok_or_else(|| format!("spispeed too large: {}", value))?;
            }
            "mode" => {
                let mode: u8 = value
                    .parse()
                    .map_err(|_| format!("Invalid mode value: {}", value))?;
                if mode != mode::MODE_0 && mode != mode::MODE_3 {
                    return Err(format!(
                        "Invalid SPI mode: {} (PSRAM supports 0 or 3)",
                        mode
                    ));
                }
                config.mode = mode;
            }
            _ => {
                log::warn!("linux_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err("No device specified. Use dev=/dev/spidevX.Y".to_string());
    }

    Ok(config)
}
