//! Transfer progress reporting

use crate::transfer::{TransferMode, TransferStats};

/// Progress callback trait for transfers
///
/// Byte counts are cumulative payload bytes for the current operation;
/// frame headers are not counted.
pub trait TransferProgress {
    /// Called once before any data moves
    ///
    /// `limit` is the request's `max_length`; the real amount may be lower
    /// when the source runs dry.
    fn started(&mut self, mode: TransferMode, limit: u32);

    /// Called when a tight-packed slot session is about to open
    fn slot_started(&mut self, index: u32, address: u32);

    /// Called after every block
    fn advanced(&mut self, bytes: u32);

    /// Called when the operation is complete
    fn finished(&mut self, stats: &TransferStats);
}

/// A no-op progress reporter
pub struct NoProgress;

impl TransferProgress for NoProgress {
    fn started(&mut self, _mode: TransferMode, _limit: u32) {}
    fn slot_started(&mut self, _index: u32, _address: u32) {}
    fn advanced(&mut self, _bytes: u32) {}
    fn finished(&mut self, _stats: &TransferStats) {}
}
