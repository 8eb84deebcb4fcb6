//! Recording link used by unit tests

use std::vec::Vec;

use crate::error::{Error, Result};
use crate::link::Link;

/// Everything that happened inside one select/deselect bracket
#[derive(Debug, Default)]
pub(crate) struct RecordedSession {
    pub writes: Vec<Vec<u8>>,
    pub reads: Vec<usize>,
}

impl RecordedSession {
    /// First write of the session, which carries the frame
    pub fn frame(&self) -> &[u8] {
        self.writes.first().map(|w| w.as_slice()).unwrap_or(&[])
    }

    /// Writes after the frame
    pub fn payload_writes(&self) -> &[Vec<u8>] {
        self.writes.get(1..).unwrap_or(&[])
    }

    /// All payload bytes written after the frame
    pub fn payload(&self) -> Vec<u8> {
        self.payload_writes().concat()
    }
}

/// Link that records sessions and serves reads from a counter
#[derive(Debug, Default)]
pub(crate) struct RecordingLink {
    pub sessions: Vec<RecordedSession>,
    pub selected: bool,
    pub(crate) next_read: u8,
    /// Fail the write with this index (counted across all sessions)
    pub fail_write_at: Option<usize>,
    pub(crate) total_writes: usize,
}

impl Link for RecordingLink {
    fn select(&mut self) -> Result<()> {
        if self.selected {
            return Err(Error::SessionActive);
        }
        self.selected = true;
        self.sessions.push(RecordedSession::default());
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        self.selected = false;
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        assert!(self.selected, "write outside a session");
        let index = self.total_writes;
        self.total_writes += 1;
        if self.fail_write_at == Some(index) {
            return Err(Error::TransferFailed);
        }
        if let Some(session) = self.sessions.last_mut() {
            session.writes.push(data.to_vec());
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        assert!(self.selected, "read outside a session");
        for byte in buf.iter_mut() {
            *byte = self.next_read;
            self.next_read = self.next_read.wrapping_add(1);
        }
        if let Some(session) = self.sessions.last_mut() {
            session.reads.push(buf.len());
        }
        Ok(())
    }
}

/// Deterministic test image of `len` bytes
pub(crate) fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
