//! Block transfers between a local byte stream and device memory
//!
//! Two transfer shapes exist:
//!
//! - [`stream`]: one session moves a contiguous range in `block_size`
//!   chunks.
//! - [`tight`]: consecutive 6 KiB units of the source land in 8 KiB
//!   device slots, one session per slot.
//!
//! Every operation has a `*_with_buffer` form that takes caller-provided
//! scratch space of at least `block_size` bytes, and (with `alloc`) a
//! convenience form that allocates it.

pub mod stream;
pub mod tight;

use core::fmt;

use crate::error::{Error, Result};

/// Default block size for intermediate buffering
pub const DEFAULT_BLOCK_SIZE: u32 = 1024;

/// How a source maps onto device memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "snake_case"))]
pub enum TransferMode {
    /// Contiguous copy starting at the base address
    #[default]
    Stream,
    /// 6 KiB source units packed into 8 KiB destination slots
    TightPacked,
}

impl TransferMode {
    /// Short name used in configuration files and the CLI
    pub fn name(&self) -> &'static str {
        match self {
            Self::Stream => "stream",
            Self::TightPacked => "tight",
        }
    }
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parameters of a single load or save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    /// First device address
    pub base_address: u32,
    /// Upper bound on payload bytes moved
    pub max_length: u32,
    /// Chunk size for intermediate buffering
    pub block_size: u32,
    /// Transfer shape
    pub mode: TransferMode,
}

impl TransferRequest {
    /// Create a request, rejecting a zero block size
    pub fn new(
        base_address: u32,
        max_length: u32,
        block_size: u32,
        mode: TransferMode,
    ) -> Result<Self> {
        let request = Self {
            base_address,
            max_length,
            block_size,
            mode,
        };
        request.validate()?;
        Ok(request)
    }

    /// Stream-mode request with the default block size
    pub fn stream(base_address: u32, max_length: u32) -> Self {
        Self {
            base_address,
            max_length,
            block_size: DEFAULT_BLOCK_SIZE,
            mode: TransferMode::Stream,
        }
    }

    /// Tight-packed request with the default block size
    pub fn tight(base_address: u32, max_length: u32) -> Self {
        Self {
            base_address,
            max_length,
            block_size: DEFAULT_BLOCK_SIZE,
            mode: TransferMode::TightPacked,
        }
    }

    /// Replace the block size
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    /// Check request invariants
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }
        Ok(())
    }

    /// Scratch slice of exactly `block_size` bytes taken from `scratch`
    pub(crate) fn block<'b>(&self, scratch: &'b mut [u8]) -> Result<&'b mut [u8]> {
        self.validate()?;
        scratch
            .get_mut(..self.block_size as usize)
            .ok_or(Error::BufferTooSmall)
    }
}

/// Counters describing a finished transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Payload bytes moved
    pub bytes: u32,
    /// Select/deselect sessions opened
    pub sessions: u32,
    /// Block writes or reads issued after the frame header
    pub blocks: u32,
}

/// Fill `buf` from `source`, stopping early only at end of source
///
/// Returns the number of bytes placed in `buf`; anything less than
/// `buf.len()` means the source is exhausted.
pub(crate) fn fill_block<R>(source: &mut R, buf: &mut [u8]) -> Result<usize>
where
    R: embedded_io::Read + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) => {
                log::error!("transfer: source read failed: {:?}", e);
                return Err(Error::SourceRead);
            }
        }
    }
    Ok(filled)
}

/// Append `data` to `sink`
pub(crate) fn drain_block<W>(sink: &mut W, data: &[u8]) -> Result<()>
where
    W: embedded_io::Write + ?Sized,
{
    sink.write_all(data).map_err(|e| {
        log::error!("transfer: sink write failed: {:?}", e);
        Error::SinkWrite
    })
}

/// Flush `sink` after the last block
pub(crate) fn flush_sink<W>(sink: &mut W) -> Result<()>
where
    W: embedded_io::Write + ?Sized,
{
    sink.flush().map_err(|e| {
        log::error!("transfer: sink flush failed: {:?}", e);
        Error::SinkWrite
    })
}
