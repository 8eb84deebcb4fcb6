//! Scoped select/deselect sessions

use super::Link;
use crate::error::Result;
use crate::frame::ControlFrame;

/// An open session on a [`Link`]
///
/// Only obtainable through [`with_session`]. It borrows the link mutably
/// for its whole lifetime, so a second session cannot start until the
/// first has been closed.
pub struct Session<'a, L: Link + ?Sized> {
    link: &'a mut L,
    bytes_written: usize,
    bytes_read: usize,
    writes: usize,
    reads: usize,
}

impl<'a, L: Link + ?Sized> Session<'a, L> {
    fn new(link: &'a mut L) -> Self {
        Self {
            link,
            bytes_written: 0,
            bytes_read: 0,
            writes: 0,
            reads: 0,
        }
    }

    /// Write raw bytes to the channel
    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.link.write(data)?;
        self.bytes_written += data.len();
        self.writes += 1;
        Ok(())
    }

    /// Read raw bytes from the channel
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.link.read(buf)?;
        self.bytes_read += buf.len();
        self.reads += 1;
        Ok(())
    }

    /// Encode and write a control frame
    pub fn send_frame(&mut self, frame: &ControlFrame) -> Result<()> {
        log::trace!("session: frame {:?}", frame);
        let bytes = frame.to_bytes();
        self.write(&bytes)
    }

    /// Bytes written so far in this session, frames included
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Bytes read so far in this session
    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// Number of write calls issued
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Number of read calls issued
    pub fn reads(&self) -> usize {
        self.reads
    }
}

/// Run `body` inside one select/deselect bracket
///
/// The link is selected exactly once and deselected exactly once. If
/// `body` fails the link is still deselected and the body's error is
/// returned; a deselect failure is only reported when the body succeeded.
/// If selecting fails, `body` is not run and nothing is deselected.
pub fn with_session<L, T, F>(link: &mut L, body: F) -> Result<T>
where
    L: Link + ?Sized,
    F: FnOnce(&mut Session<'_, L>) -> Result<T>,
{
    link.select()?;

    let mut session = Session::new(link);
    let outcome = body(&mut session);
    log::trace!(
        "session: closing after {} bytes out, {} bytes in",
        session.bytes_written,
        session.bytes_read
    );

    let closed = link.deselect();
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(deselect_err)) => {
            log::error!("session: deselect failed after error: {}", deselect_err);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::link::SelectState;

    /// Records select edges and fails writes on demand
    struct ProbeLink {
        state: SelectState,
        selects: usize,
        deselects: usize,
        fail_write: bool,
        fail_select: bool,
        written: usize,
    }

    impl ProbeLink {
        fn new() -> Self {
            Self {
                state: SelectState::Deselected,
                selects: 0,
                deselects: 0,
                fail_write: false,
                fail_select: false,
                written: 0,
            }
        }
    }

    impl Link for ProbeLink {
        fn select(&mut self) -> Result<()> {
            if self.fail_select {
                return Err(Error::TransferFailed);
            }
            assert_eq!(self.state, SelectState::Deselected);
            self.state = SelectState::Selected;
            self.selects += 1;
            Ok(())
        }

        fn deselect(&mut self) -> Result<()> {
            self.state = SelectState::Deselected;
            self.deselects += 1;
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<()> {
            assert_eq!(self.state, SelectState::Selected);
            if self.fail_write {
                return Err(Error::TransferFailed);
            }
            self.written += data.len();
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<()> {
            assert_eq!(self.state, SelectState::Selected);
            buf.fill(0xA5);
            Ok(())
        }
    }

    #[test]
    fn test_session_brackets_body() {
        let mut link = ProbeLink::new();
        let counted = with_session(&mut link, |s| {
            s.send_frame(&ControlFrame::load(0x4000))?;
            s.write(&[1, 2, 3])?;
            let mut buf = [0u8; 2];
            s.read(&mut buf)?;
            assert_eq!(buf, [0xA5, 0xA5]);
            Ok((s.writes(), s.bytes_written(), s.reads(), s.bytes_read()))
        })
        .unwrap();

        assert_eq!(counted, (2, 8, 1, 2));
        assert_eq!(link.selects, 1);
        assert_eq!(link.deselects, 1);
        assert_eq!(link.state, SelectState::Deselected);
    }

    #[test]
    fn test_session_deselects_on_error() {
        let mut link = ProbeLink::new();
        link.fail_write = true;
        let result = with_session(&mut link, |s| s.write(&[0xFF]));

        assert_eq!(result, Err(Error::TransferFailed));
        assert_eq!(link.selects, 1);
        assert_eq!(link.deselects, 1);
        assert_eq!(link.state, SelectState::Deselected);
    }

    #[test]
    fn test_failed_select_skips_body() {
        let mut link = ProbeLink::new();
        link.fail_select = true;
        let mut ran = false;
        let result = with_session(&mut link, |_| {
            ran = true;
            Ok(())
        });

        assert_eq!(result, Err(Error::TransferFailed));
        assert!(!ran);
        assert_eq!(link.deselects, 0);
    }
}
