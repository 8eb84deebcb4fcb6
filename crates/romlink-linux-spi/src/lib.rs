//! romlink-linux-spi - Linux spidev link with a GPIO chip select
//!
//! This crate drives the device over a `/dev/spidevX.Y` controller with the
//! controller's chip select disabled, and drives the device's select line
//! through a GPIO character device. The select is active high by default,
//! matching the FPGA core's select input.
//!
//! # Example
//!
//! ```no_run
//! use romlink_linux_spi::{LinuxSpiConfig, LinuxSpiLink};
//! use romlink_core::reset;
//!
//! let config = LinuxSpiConfig::new("/dev/spidev1.0", "/dev/gpiochip0", 25)
//!     .with_speed(1_000_000);
//! let mut link = LinuxSpiLink::open(&config)?;
//! reset::reset_cycle(&mut link)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Usage with the romlink CLI
//!
//! ```bash
//! # Load a cartridge image and restart the console
//! romlink load -l linux_spi:dev=/dev/spidev1.0,gpiochip=0,cs=25 parsec_c.bin
//!
//! # Hold the console in reset at 4 MHz
//! romlink reset -l linux_spi:dev=/dev/spidev1.0,gpiochip=0,cs=25,spispeed=4000 on
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` and `/dev/gpiochipN`

pub mod device;
pub mod error;

// Re-exports
pub use device::{mode, parse_options, LinuxSpiConfig, LinuxSpiLink};
pub use error::{LinuxSpiError, Result};

use romlink_core::link::{Link, LinkInfo};

/// Registry entry for the Linux SPI link
pub const LINK_INFO: LinkInfo = LinkInfo {
    name: "linux_spi",
    aliases: &["spidev"],
    description: "Linux spidev with GPIO select \
        [dev=, gpiochip=, cs=, spispeed=<kHz>, mode=<0-3>, cs_active_low=1, timeout_ms=]",
};

/// Open a Linux SPI link and return it boxed
///
/// This is a convenience function for use in the CLI link dispatch.
///
/// # Example Options
///
/// - `dev=/dev/spidev1.0` - Required: spidev path
/// - `gpiochip=0` - Required: GPIO chip number or path
/// - `cs=25` - Required: select line offset
/// - `spispeed=1000` - Optional: speed in kHz (default: 1000)
/// - `mode=0` - Optional: SPI mode 0-3 (default: 0)
/// - `cs_active_low=1` - Optional: select drives the line low
/// - `timeout_ms=1000` - Optional: per-transfer bound
pub fn open_linux_spi(
    options: &[(&str, &str)],
) -> std::result::Result<Box<dyn Link + Send>, Box<dyn std::error::Error>> {
    let config = parse_options(options)?;
    let link = LinuxSpiLink::open(&config)?;
    Ok(Box::new(link))
}
