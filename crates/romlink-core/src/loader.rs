//! Automatic image loading
//!
//! Ties the pieces together the way a front end uses them: classify the
//! image name, move the data with the matching transfer, then pulse the
//! remote reset so the new image starts.

use crate::config::LoaderConfig;
use crate::error::Result;
use crate::link::Link;
use crate::progress::TransferProgress;
use crate::reset;
use crate::resolver::{Resolution, ResolveOverrides};
use crate::transfer::{stream, tight, TransferMode, TransferRequest, TransferStats};

/// Per-call adjustments on top of [`LoaderConfig`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Address and mode overrides for the resolver
    pub overrides: ResolveOverrides,
    /// Replace the configured max length for the chosen mode
    pub max_length: Option<u32>,
    /// Replace the configured block size
    pub block_size: Option<u32>,
    /// Skip the reset pulse after the transfer
    pub skip_reset: bool,
}

/// What [`load_image`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    /// Where the image went
    pub resolution: Resolution,
    /// Transfer counters
    pub stats: TransferStats,
    /// Whether the reset pulse was sent
    pub reset_pulsed: bool,
}

/// Build the transfer request for `resolution`
pub fn plan_request(
    config: &LoaderConfig,
    resolution: &Resolution,
    options: &LoadOptions,
) -> Result<TransferRequest> {
    let max_length = match resolution.mode {
        TransferMode::Stream => options.max_length.unwrap_or(config.stream_max_len),
        TransferMode::TightPacked => {
            let len = options.max_length.unwrap_or(config.tight_max_len);
            config.check_tight_len(len)?;
            len
        }
    };

    TransferRequest::new(
        resolution.base_address,
        max_length,
        options.block_size.unwrap_or(config.block_size),
        resolution.mode,
    )
}

/// Classify `name`, transfer `source`, then cycle the remote reset
///
/// The reset pulse is sent after both stream and tight-packed loads unless
/// `options.skip_reset` is set. A transport failure during the transfer
/// aborts before any reset command is issued.
#[cfg(feature = "alloc")]
pub fn load_image<L, R, P>(
    link: &mut L,
    source: &mut R,
    name: &str,
    config: &LoaderConfig,
    options: &LoadOptions,
    progress: &mut P,
) -> Result<LoadReport>
where
    L: Link + ?Sized,
    R: embedded_io::Read + ?Sized,
    P: TransferProgress + ?Sized,
{
    let resolution = config.resolver().resolve_with(name, options.overrides);
    let request = plan_request(config, &resolution, options)?;

    log::info!(
        "Loading '{}' to {} at 0x{:08X} ({} mode)",
        name,
        resolution.region,
        resolution.base_address,
        resolution.mode
    );

    let stats = match request.mode {
        TransferMode::Stream => stream::load(link, source, &request, progress)?,
        TransferMode::TightPacked => tight::load_tight(link, source, &request, progress)?,
    };

    if !options.skip_reset {
        reset::reset_cycle(link)?;
    }

    Ok(LoadReport {
        resolution,
        stats,
        reset_pulsed: !options.skip_reset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::region::RegionRole;

    fn resolution(mode: TransferMode) -> Resolution {
        Resolution {
            base_address: 0x16000,
            mode,
            region: RegionRole::Grom,
            matched_rules: 1,
            last_rule: Some(12),
        }
    }

    #[test]
    fn test_plan_uses_mode_defaults() {
        let config = LoaderConfig::default();
        let options = LoadOptions::default();

        let stream = plan_request(&config, &resolution(TransferMode::Stream), &options).unwrap();
        assert_eq!(stream.max_length, 0x200000);
        assert_eq!(stream.block_size, 1024);

        let tight = plan_request(&config, &resolution(TransferMode::TightPacked), &options).unwrap();
        assert_eq!(tight.max_length, 0x80000);
        assert_eq!(tight.mode, TransferMode::TightPacked);
    }

    #[test]
    fn test_plan_checks_overrides() {
        let config = LoaderConfig::default();
        let options = LoadOptions {
            max_length: Some(0x100000),
            ..Default::default()
        };
        assert_eq!(
            plan_request(&config, &resolution(TransferMode::TightPacked), &options),
            Err(Error::LengthExceedsBound)
        );
        // Stream mode has no configured bound
        assert!(plan_request(&config, &resolution(TransferMode::Stream), &options).is_ok());

        let options = LoadOptions {
            block_size: Some(0),
            ..Default::default()
        };
        assert_eq!(
            plan_request(&config, &resolution(TransferMode::Stream), &options),
            Err(Error::InvalidBlockSize)
        );
    }
}
