//! CLI command implementations
//!
//! Commands that talk to the device take a `&mut dyn Link`-compatible value
//! opened from the link string; `resolve` and `show-config` only need the
//! loader configuration.

mod list;
pub mod progress;
pub mod resolve;
pub mod transfer;

pub use list::list_links;
