//! Link traits and session scoping
//!
//! A [`Link`] is a duplex byte channel with one select line. Every protocol
//! exchange happens inside a session opened with [`with_session`], which
//! guarantees the select line returns to the deselected state on every exit
//! path.

mod session;
mod traits;

pub use session::{with_session, Session};
pub use traits::*;
