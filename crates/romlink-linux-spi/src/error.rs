//! Error types for the Linux SPI link

use thiserror::Error;

use romlink_core::error::Error as CoreError;

/// Linux SPI link specific errors
#[derive(Debug, Error)]
pub enum LinuxSpiError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set SPI mode
    #[error("Failed to set SPI mode to 0x{mode:02X}: {source}")]
    SetModeFailed {
        mode: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set bits per word
    #[error("Failed to set bits per word to {bits}: {source}")]
    SetBitsPerWordFailed {
        bits: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set clock speed
    #[error("Failed to set clock speed to {speed} Hz: {source}")]
    SetSpeedFailed {
        speed: u32,
        #[source]
        source: std::io::Error,
    },

    /// SPI transfer failed
    #[error("SPI transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    /// A transfer ran past its time bound
    #[error("SPI transfer of {len} bytes took {elapsed_ms} ms (limit {limit_ms} ms)")]
    Timeout {
        len: usize,
        elapsed_ms: u128,
        limit_ms: u64,
    },

    /// Failed to request the chip-select line
    #[error("Failed to request chip-select line {line} on '{chip}': {source}")]
    CsRequestFailed {
        chip: String,
        line: u32,
        #[source]
        source: gpiocdev::Error,
    },

    /// Failed to drive the chip-select line
    #[error("Failed to set chip-select line: {0}")]
    SetCsFailed(#[source] gpiocdev::Error),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device not specified
    #[error("No device specified. Use dev=/dev/spidevX.Y")]
    NoDevice,

    /// Chip-select GPIO not specified
    #[error("No chip-select line specified. Use gpiochip=/dev/gpiochipN,cs=<line>")]
    NoChipSelect,
}

impl LinuxSpiError {
    /// Core error kind reported through the `Link` trait
    pub fn kind(&self) -> CoreError {
        match self {
            Self::Timeout { .. } => CoreError::Timeout,
            Self::TransferFailed(e) if e.raw_os_error() == Some(libc::ETIMEDOUT) => {
                CoreError::Timeout
            }
            Self::InvalidParameter(_) | Self::NoDevice | Self::NoChipSelect => {
                CoreError::ConfigError
            }
            _ => CoreError::TransferFailed,
        }
    }
}

impl From<LinuxSpiError> for CoreError {
    fn from(e: LinuxSpiError) -> Self {
        log::error!("linux_spi: {}", e);
        e.kind()
    }
}

/// Result type for Linux SPI operations
pub type Result<T> = std::result::Result<T, LinuxSpiError>;
