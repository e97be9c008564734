//! Serial PSRAM opcodes
//!
//! Single-wire (SPI mode) command set of ESP-PSRAM64/APS6404-class serial
//! pseudo-static RAM. Quad-mode commands are not used by the diagnostic.

// ============================================================================
// Data access
// ============================================================================

/// Write - opcode, 3 address bytes, data
pub const WRITE: u8 = 0x02;
/// Read (up to ~33 MHz, no wait-state)
pub const READ: u8 = 0x03;
/// Fast Read (one wait-state byte before valid data)
pub const FAST_READ: u8 = 0x0B;

// ============================================================================
// Reset
// ============================================================================

/// Reset Enable - arms the following RESET
pub const RESET_ENABLE: u8 = 0x66;
/// Reset - returns the device to its power-up state
pub const RESET: u8 = 0x99;

// ============================================================================
// Identification
// ============================================================================

/// Read ID - followed by 3 don't-care bytes, returns MFID, KGD, then EID
pub const READ_ID: u8 = 0x9F;

// ============================================================================
// Identification values
// ============================================================================

/// Manufacturer ID reported by the device
pub const MFID_ESP_PSRAM: u8 = 0x0D;
/// Known-good-die marker for a device that passed factory test
pub const KGD_PASS: u8 = 0x5D;
/// Known-good-die marker for a device that failed factory test
pub const KGD_FAIL: u8 = 0x55;

// ============================================================================
// Timing
// ============================================================================

/// Minimum delay between power-up and the first reset command (datasheet: 150 us)
pub const POWER_UP_DELAY_US: u32 = 150;

/// Device density: 64 Mbit
pub const DEVICE_SIZE: usize = 8 * 1024 * 1024;
