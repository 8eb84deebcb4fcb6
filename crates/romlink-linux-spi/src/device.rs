//! Linux SPI link implementation
//!
//! The data lines go through spidev with the controller's own chip select
//! disabled (`SPI_NO_CS`); the device's select line is a plain GPIO driven
//! through gpiocdev. This keeps the select asserted across any number of
//! ioctls, which a session needs since it may span megabytes.

use crate::error::{LinuxSpiError, Result};

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use romlink_core::error::Result as CoreResult;
use romlink_core::link::{Link, SelectState};

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::time::{Duration, Instant};

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Default SPI clock speed in Hz (1 MHz)
const DEFAULT_SPEED_HZ: u32 = 1_000_000;

/// Default bound on a single transfer
const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// SPI mode constants
pub mod mode {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: u8 = 0;
    /// SPI mode 1: CPOL=0, CPHA=1
    pub const MODE_1: u8 = 1;
    /// SPI mode 2: CPOL=1, CPHA=0
    pub const MODE_2: u8 = 2;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: u8 = 3;
    /// Controller does not drive any chip select
    pub const NO_CS: u8 = 0x40;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    // SPI ioctl magic number
    const SPI_IOC_MAGIC: u8 = b'k';

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

    /// SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * 32])
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

/// Configuration for opening a Linux SPI link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinuxSpiConfig {
    /// spidev path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// GPIO chip carrying the select line (e.g., "/dev/gpiochip0")
    pub gpiochip: String,
    /// Select line offset on `gpiochip`
    pub cs: Option<Offset>,
    /// Select is asserted by driving the line low
    pub cs_active_low: bool,
    /// SPI clock speed in Hz (default: 1 MHz)
    pub speed_hz: u32,
    /// SPI mode (0-3, default: 0)
    pub mode: u8,
    /// Upper bound for one transfer
    ///
    /// Checked after the ioctl returns. spidev transfers are synchronous in
    /// the kernel, so a stalled controller still blocks the caller; a
    /// transfer that completes late is reported as a timeout.
    pub timeout: Duration,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            gpiochip: String::new(),
            cs: None,
            cs_active_low: false,
            speed_hz: DEFAULT_SPEED_HZ,
            mode: mode::MODE_0,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given spidev path and select line
    pub fn new(device: impl Into<String>, gpiochip: impl Into<String>, cs: Offset) -> Self {
        Self {
            device: device.into(),
            gpiochip: gpiochip.into(),
            cs: Some(cs),
            ..Default::default()
        }
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode (0-3)
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }

    /// Set the per-transfer time bound
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Link over spidev with a GPIO select line
pub struct LinuxSpiLink {
    /// File handle for spidev device
    file: File,
    /// Select line request handle
    cs_request: Request,
    /// Select line offset
    cs: Offset,
    /// Current select state
    state: SelectState,
    /// Maximum kernel buffer size
    max_kernel_buf_size: usize,
    /// Current speed in Hz
    speed_hz: u32,
    /// Per-transfer time bound
    timeout: Duration,
}

impl LinuxSpiLink {
    /// Open a Linux SPI link with the given configuration
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }
        let cs = match config.cs {
            Some(cs) if !config.gpiochip.is_empty() => cs,
            _ => return Err(LinuxSpiError::NoChipSelect),
        };

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

        // The controller must leave its own select alone
        let spi_mode = config.mode | mode::NO_CS;
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &spi_mode).map_err(|e| LinuxSpiError::SetModeFailed {
                mode: spi_mode,
                source: std::io::Error::from_raw_os_error(e as i32),
            })?;
        }

        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits).map_err(|e| {
                LinuxSpiError::SetBitsPerWordFailed {
                    bits,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        let speed = config.speed_hz;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed).map_err(|e| {
                LinuxSpiError::SetSpeedFailed {
                    speed,
                    source: std::io::Error::from_raw_os_error(e as i32),
                }
            })?;
        }

        // Idle level is "inactive" regardless of polarity
        let mut req_config = Config::default();
        req_config.with_line(cs).as_output(Value::Inactive);
        if config.cs_active_low {
            req_config.as_active_low();
        }
        let cs_request = Request::from_config(req_config)
            .on_chip(&config.gpiochip)
            .with_consumer("romlink")
            .request()
            .map_err(|e| LinuxSpiError::CsRequestFailed {
                chip: config.gpiochip.clone(),
                line: cs,
                source: e,
            })?;

        log::info!(
            "linux_spi: Opened {} (mode={}, speed={} kHz, cs={}:{}{})",
            config.device,
            config.mode,
            speed / 1000,
            config.gpiochip,
            cs,
            if config.cs_active_low { " active-low" } else { "" }
        );

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::debug!(
            "linux_spi: Max kernel buffer size: {} bytes",
            max_kernel_buf_size
        );

        Ok(Self {
            file,
            cs_request,
            cs,
            state: SelectState::Deselected,
            max_kernel_buf_size,
            speed_hz: speed,
            timeout: config.timeout,
        })
    }

    /// Get current speed setting
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    fn set_cs(&mut self, state: SelectState) -> Result<()> {
        let value = match state {
            SelectState::Selected => Value::Active,
            SelectState::Deselected => Value::Inactive,
        };
        self.cs_request
            .set_value(self.cs, value)
            .map_err(LinuxSpiError::SetCsFailed)?;
        self.state = state;
        Ok(())
    }

    /// Run one half-duplex SPI_IOC_MESSAGE(1)
    fn spi_transfer(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>) -> Result<()> {
        let fd = self.file.as_raw_fd();
        let mut transfer = SpiIocTransfer {
            speed_hz: self.speed_hz,
            bits_per_word: 8,
            ..Default::default()
        };
        if let Some(tx) = tx {
            transfer.tx_buf = tx.as_ptr() as u64;
            transfer.len = tx.len() as u32;
        }
        if let Some(rx) = rx {
            transfer.rx_buf = rx.as_mut_ptr() as u64;
            transfer.len = rx.len() as u32;
        }
        let len = transfer.len as usize;

        let start = Instant::now();
        let ret = unsafe { libc::ioctl(fd, ioctl::spi_ioc_message(1), &transfer) };
        let elapsed = start.elapsed();

        if ret < 0 {
            return Err(LinuxSpiError::TransferFailed(
                std::io::Error::last_os_error(),
            ));
        }
        check_elapsed(len, elapsed, self.timeout)
    }
}

/// Reject a completed transfer that took longer than `limit`
fn check_elapsed(len: usize, elapsed: Duration, limit: Duration) -> Result<()> {
    if elapsed > limit {
        return Err(LinuxSpiError::Timeout {
            len,
            elapsed_ms: elapsed.as_millis(),
            limit_ms: limit.as_millis() as u64,
        });
    }
    Ok(())
}

impl Link for LinuxSpiLink {
    fn select(&mut self) -> CoreResult<()> {
        if self.state == SelectState::Selected {
            return Err(romlink_core::Error::SessionActive);
        }
        self.set_cs(SelectState::Selected)?;
        Ok(())
    }

    fn deselect(&mut self) -> CoreResult<()> {
        self.set_cs(SelectState::Deselected)?;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> CoreResult<()> {
        let chunk = self.max_kernel_buf_size.max(1);
        for part in data.chunks(chunk) {
            self.spi_transfer(Some(part), None)?;
        }
        log::trace!("linux_spi: wrote {} bytes", data.len());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> CoreResult<()> {
        let chunk = self.max_kernel_buf_size.max(1);
        for part in buf.chunks_mut(chunk) {
            self.spi_transfer(None, Some(part))?;
        }
        log::trace!("linux_spi: read {} bytes", buf.len());
        Ok(())
    }
}

impl Drop for LinuxSpiLink {
    fn drop(&mut self) {
        if self.state == SelectState::Selected {
            if let Err(e) = self.set_cs(SelectState::Deselected) {
                log::warn!("linux_spi: failed to release select on close: {}", e);
            }
        }
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

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    log::debug!("linux_spi: Using page size {} as buffer size", page_size);
    page_size
}

fn parse_flag(key: &str, value: &str) -> std::result::Result<bool, String> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(format!("Invalid {} value: {}", key, value)),
    }
}

/// Parse link options from a list of key-value pairs
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<LinuxSpiConfig, String> {
    let mut config = LinuxSpiConfig::default();

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "gpiochip" => {
                // Accept either a path or a bare chip number
                config.gpiochip = if value.chars().all(|c| c.is_ascii_digit()) {
                    format!("/dev/gpiochip{}", value)
                } else {
                    value.to_string()
                };
            }
            "cs" => {
                let line: Offset = value
                    .parse()
                    .map_err(|_| format!("Invalid cs line: {}", value))?;
                config.cs = Some(line);
            }
            "cs_active_low" => {
                config.cs_active_low = parse_flag(key, value)?;
            }
            "spispeed" => {
                // Parse speed in kHz
                let speed_khz: u32 = value
                    .parse()
                    .map_err(|_| format!("Invalid spispeed value: {}", value))?;
                if speed_khz == 0 {
                    return Err("spispeed must be greater than zero".to_string());
                }
                config.speed_hz = speed_khz
                    .checked_mul(1000)
                    .ok_or_else(|| format!("spispeed too large: {} kHz", value))?;
            }
            "mode" => {
                let mode: u8 = value
                    .parse()
                    .map_err(|_| format!("Invalid mode value: {}", value))?;
                if mode > 3 {
                    return Err(format!("Invalid SPI mode: {} (must be 0-3)", mode));
                }
                config.mode = mode;
            }
            "timeout_ms" => {
                let ms: u64 = value
                    .parse()
                    .map_err(|_| format!("Invalid timeout_ms value: {}", value))?;
                config.timeout = Duration::from_millis(ms);
            }
            _ => {
                log::warn!("linux_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err("No device specified. Use dev=/dev/spidevX.Y".to_string());
    }
    if config.gpiochip.is_empty() || config.cs.is_none() {
        return Err("No chip-select line specified. Use gpiochip=/dev/gpiochipN,cs=<line>".to_string());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_options() {
        let config = parse_options(&[
            ("dev", "/dev/spidev1.0"),
            ("gpiochip", "0"),
            ("cs", "25"),
            ("spispeed", "2000"),
            ("mode", "3"),
            ("cs_active_low", "1"),
            ("timeout_ms", "50"),
        ])
        .unwrap();

        assert_eq!(config.device, "/dev/spidev1.0");
        assert_eq!(config.gpiochip, "/dev/gpiochip0");
        assert_eq!(config.cs, Some(25));
        assert_eq!(config.speed_hz, 2_000_000);
        assert_eq!(config.mode, 3);
        assert!(config.cs_active_low);
        assert_eq!(config.timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_parse_rejects_overflowing_speed() {
        let base = [
            ("dev", "/dev/spidev0.0"),
            ("gpiochip", "0"),
            ("cs", "1"),
        ];
        let mut options = base.to_vec();
        options.push(("spispeed", "4294967"));
        assert_eq!(parse_options(&options).unwrap().speed_hz, 4_294_967_000);

        let mut options = base.to_vec();
        options.push(("spispeed", "4294968"));
        let err = parse_options(&options).unwrap_err();
        assert!(err.contains("too large"));
    }

    #[test]
    fn test_check_elapsed() {
        let limit = Duration::from_millis(10);
        assert!(check_elapsed(64, Duration::from_millis(10), limit).is_ok());
        assert!(matches!(
            check_elapsed(64, Duration::from_millis(11), limit),
            Err(LinuxSpiError::Timeout { len: 64, elapsed_ms: 11, limit_ms: 10 })
        ));
    }

    #[test]
    fn test_parse_defaults() {
        let config = parse_options(&[
            ("dev", "/dev/spidev0.0"),
            ("gpiochip", "/dev/gpiochip4"),
            ("cs", "8"),
        ])
        .unwrap();
        assert_eq!(config.speed_hz, 1_000_000);
        assert_eq!(config.mode, mode::MODE_0);
        assert!(!config.cs_active_low);
        assert_eq!(config.gpiochip, "/dev/gpiochip4");
    }

    #[test]
    fn test_parse_rejects_bad_options() {
        assert!(parse_options(&[("gpiochip", "0"), ("cs", "1")]).is_err());
        assert!(parse_options(&[("dev", "/dev/spidev0.0")]).is_err());
        assert!(parse_options(&[
            ("dev", "/dev/spidev0.0"),
            ("gpiochip", "0"),
            ("cs", "1"),
            ("mode", "4"),
        ])
        .is_err());
        assert!(parse_options(&[
            ("dev", "/dev/spidev0.0"),
            ("gpiochip", "0"),
            ("cs", "x"),
        ])
        .is_err());
        assert!(parse_options(&[
            ("dev", "/dev/spidev0.0"),
            ("gpiochip", "0"),
            ("cs", "1"),
            ("cs_active_low", "maybe"),
        ])
        .is_err());
    }

    #[test]
    fn test_ioc_message_number() {
        // _IOW('k', 0, char[32])
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6B00);
    }
}
