//! Loader configuration
//!
//! Region bases, block size and length bounds changed between hardware
//! revisions, so none of them are hardwired. [`LoaderConfig::default`]
//! matches the current core; with the `std` feature a TOML file can
//! override any value and replace the classification rules.

#[cfg(feature = "std")]
mod toml;

use crate::error::{Error, Result};
use crate::region::RegionMap;
use crate::resolver::{AddressResolver, RuleSet};
use crate::transfer::{tight, DEFAULT_BLOCK_SIZE};

/// Default upper bound on a stream-mode load
pub const DEFAULT_STREAM_MAX_LEN: u32 = 0x20_0000;

/// Everything a load or save needs besides the link and the data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Region base addresses
    pub regions: RegionMap,
    /// Chunk size for intermediate buffering
    pub block_size: u32,
    /// Default `max_length` for stream-mode loads
    pub stream_max_len: u32,
    /// Default `max_length` for tight-packed loads
    pub tight_max_len: u32,
    /// Largest tight-packed length any request may ask for
    pub tight_max_bound: u32,
    /// Classification rules, in evaluation order
    pub rules: RuleSet,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            regions: RegionMap::default(),
            block_size: DEFAULT_BLOCK_SIZE,
            stream_max_len: DEFAULT_STREAM_MAX_LEN,
            tight_max_len: tight::DEFAULT_TIGHT_MAX_LEN,
            tight_max_bound: tight::DEFAULT_TIGHT_MAX_LEN,
            rules: RuleSet::canonical(),
        }
    }
}

impl LoaderConfig {
    /// Check the configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidBlockSize);
        }
        if self.tight_max_len > self.tight_max_bound {
            log::error!(
                "config: tight_max_len 0x{:X} exceeds tight_max_bound 0x{:X}",
                self.tight_max_len,
                self.tight_max_bound
            );
            return Err(Error::LengthExceedsBound);
        }
        tight::check_span(self.regions.grom, self.tight_max_bound)
    }

    /// Resolver over this configuration's regions and rules
    pub fn resolver(&self) -> AddressResolver<'_> {
        AddressResolver::new(self.regions, &self.rules)
    }

    /// Check a caller-requested tight-packed length against the bound
    pub fn check_tight_len(&self, max_length: u32) -> Result<()> {
        if max_length > self.tight_max_bound {
            log::error!(
                "Tight-packed length 0x{:X} exceeds configured bound 0x{:X}",
                max_length,
                self.tight_max_bound
            );
            return Err(Error::LengthExceedsBound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = LoaderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.block_size, 1024);
        assert_eq!(config.stream_max_len, 0x200000);
        assert_eq!(config.tight_max_len, 0x80000);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = LoaderConfig::default();
        config.block_size = 0;
        assert_eq!(config.validate(), Err(Error::InvalidBlockSize));

        let mut config = LoaderConfig::default();
        config.tight_max_len = config.tight_max_bound + 1;
        assert_eq!(config.validate(), Err(Error::LengthExceedsBound));

        let mut config = LoaderConfig::default();
        config.regions.grom = 0xFFFF_E000;
        assert_eq!(config.validate(), Err(Error::LengthExceedsBound));
    }

    #[test]
    fn test_tight_len_bound() {
        let config = LoaderConfig::default();
        assert!(config.check_tight_len(0x80000).is_ok());
        assert_eq!(config.check_tight_len(0x80001), Err(Error::LengthExceedsBound));
    }
}
