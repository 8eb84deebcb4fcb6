//! Remote CPU reset control
//!
//! Reset is driven by register commands, one session each. Nothing here
//! remembers the line state; callers sequence assert then release.

use crate::error::Result;
use crate::frame::{ControlFrame, RESET_ASSERT, RESET_RELEASE};
use crate::link::{with_session, Link};

/// Intended level of the remote reset line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    /// CPU held in reset
    Asserted,
    /// CPU running
    Released,
}

impl ResetState {
    /// Control register value that selects this state
    pub fn register_value(&self) -> u8 {
        match self {
            Self::Asserted => RESET_ASSERT,
            Self::Released => RESET_RELEASE,
        }
    }
}

/// Drive the reset line to `state` in one session
pub fn set_reset<L: Link + ?Sized>(link: &mut L, state: ResetState) -> Result<()> {
    log::debug!("reset: {:?}", state);
    with_session(link, |session| {
        session.send_frame(&ControlFrame::register(state.register_value()))
    })
}

/// Hold the remote CPU in reset
pub fn reset_on<L: Link + ?Sized>(link: &mut L) -> Result<()> {
    set_reset(link, ResetState::Asserted)
}

/// Let the remote CPU run
pub fn reset_off<L: Link + ?Sized>(link: &mut L) -> Result<()> {
    set_reset(link, ResetState::Released)
}

/// Assert then release reset, leaving the CPU running
pub fn reset_cycle<L: Link + ?Sized>(link: &mut L) -> Result<()> {
    reset_on(link)?;
    reset_off(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingLink;

    #[test]
    fn test_reset_cycle_emits_two_sessions() {
        let mut link = RecordingLink::default();
        reset_cycle(&mut link).unwrap();

        assert_eq!(link.sessions.len(), 2);
        assert_eq!(link.sessions[0].writes, [[0x00, 0x00, 0x10, 0x00, 0x08, 0xFC]]);
        assert_eq!(link.sessions[1].writes, [[0x00, 0x00, 0x10, 0x00, 0x08, 0xFF]]);
        assert!(!link.selected);
    }

    #[test]
    fn test_reset_propagates_transport_error() {
        let mut link = RecordingLink::default();
        link.fail_write_at = Some(0);
        assert!(reset_cycle(&mut link).is_err());
        // The release is never attempted, and the line is idle
        assert_eq!(link.sessions.len(), 1);
        assert!(!link.selected);
    }
}
