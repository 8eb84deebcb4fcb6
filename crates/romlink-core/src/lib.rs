//! romlink-core - Core library for remote memory image transfer
//!
//! This crate implements the host side of a small protocol for pushing ROM
//! images into the memory of an FPGA-hosted TI-99/4A core over a
//! chip-select framed serial link, and reading memory back. It is `no_std`
//! compatible for use on microcontroller bridges.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`, TOML config)
//! - `alloc` - Enable heap-allocated convenience wrappers
//!
//! # Example
//!
//! ```ignore
//! use romlink_core::{config::LoaderConfig, link::Link, loader, progress::NoProgress};
//!
//! fn flash_cartridge<L: Link>(link: &mut L, image: &[u8]) -> romlink_core::Result<()> {
//!     let config = LoaderConfig::default();
//!     let mut source = image;
//!     let report = loader::load_image(
//!         link,
//!         &mut source,
//!         "/sd/ti99_4a/cart/parsecc.bin",
//!         &config,
//!         &Default::default(),
//!         &mut NoProgress,
//!     )?;
//!     println!("{} bytes at 0x{:08X}", report.stats.bytes, report.resolution.base_address);
//!     Ok(())
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod config;
pub mod error;
pub mod frame;
pub mod link;
pub mod loader;
pub mod progress;
pub mod region;
pub mod reset;
pub mod resolver;
pub mod transfer;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
