//! Error types for opening boards

use thiserror::Error;

/// Errors raised while parsing a backend string or opening its hardware
#[derive(Debug, Error)]
pub enum BoardError {
    /// Malformed `key=value` list or an unusable value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// No backend with that name was compiled in
    #[error("Unknown backend: {name} (available: {available})")]
    UnknownBackend { name: String, available: String },

    /// The backend's own configuration or device could not be opened
    #[error("{backend}: {message}")]
    Open {
        backend: &'static str,
        message: String,
    },

    /// A board line could not be requested
    #[cfg(any(feature = "linux-spi", feature = "linux-gpio"))]
    #[error("Failed to request {role} line {offset}: {source}")]
    Line {
        role: &'static str,
        offset: u32,
        #[source]
        source: psramtest_linux_gpio::LinuxGpioError,
    },
}

/// Result type for board operations
pub type Result<T> = std::result::Result<T, BoardError>;
