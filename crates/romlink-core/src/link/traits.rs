//! Link trait definitions

use crate::error::Result;

/// Select state of the link's chip-select line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectState {
    /// Device is selected and accepts a frame
    Selected,
    /// Device ignores the channel
    Deselected,
}

/// Duplex byte channel plus a single select control line
///
/// Implementations block until each call completes. The protocol layer
/// never calls `select` twice without an intervening `deselect`; use
/// [`with_session`](super::with_session) rather than calling these
/// directly.
///
/// ## Example
///
/// ```ignore
/// impl Link for MyBridge {
///     fn select(&mut self) -> Result<()> {
///         self.cs.set_high().map_err(|_| Error::TransferFailed)
///     }
///
///     fn deselect(&mut self) -> Result<()> {
///         self.cs.set_low().map_err(|_| Error::TransferFailed)
///     }
///
///     fn write(&mut self, data: &[u8]) -> Result<()> {
///         self.spi.write(data).map_err(|_| Error::TransferFailed)
///     }
///
///     fn read(&mut self, buf: &mut [u8]) -> Result<()> {
///         self.spi.read(buf).map_err(|_| Error::TransferFailed)
///     }
/// }
/// ```
pub trait Link {
    /// Drive the select line to its active level
    fn select(&mut self) -> Result<()>;

    /// Drive the select line to its idle level
    fn deselect(&mut self) -> Result<()>;

    /// Write all of `data` to the channel
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Fill `buf` from the channel
    fn read(&mut self, buf: &mut [u8]) -> Result<()>;
}

impl<L: Link + ?Sized> Link for &mut L {
    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn deselect(&mut self) -> Result<()> {
        (**self).deselect()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }
}

// Boxed links let the CLI pick a transport at runtime
#[cfg(feature = "alloc")]
impl Link for alloc::boxed::Box<dyn Link + Send> {
    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn deselect(&mut self) -> Result<()> {
        (**self).deselect()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        (**self).read(buf)
    }
}

/// Information about a link implementation
#[derive(Debug, Clone)]
pub struct LinkInfo {
    /// Name of the link
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Description, including accepted options
    pub description: &'static str,
}
