//! Load, save and reset commands

use super::progress::IndicatifProgress;
use crate::cli::{ModeArg, ResetAction, TransferArgs};
use romlink_core::config::LoaderConfig;
use romlink_core::link::Link;
use romlink_core::loader::{self, LoadOptions};
use romlink_core::reset;
use romlink_core::resolver::ResolveOverrides;
use romlink_core::transfer::{stream, tight, TransferMode, TransferRequest};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Read file contents into a Vec
fn read_file(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut file = File::open(path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)?;
    println!("Read {} bytes from {:?}", data.len(), path);
    Ok(data)
}

/// Arguments of the load command
pub struct LoadArgs<'a> {
    pub input: &'a Path,
    pub name: Option<&'a str>,
    pub address: Option<u32>,
    pub mode: Option<ModeArg>,
    pub max_length: Option<u32>,
    pub no_reset: bool,
    pub transfer: &'a TransferArgs,
}

/// Run the load command
pub fn run_load<L: Link + ?Sized>(
    link: &mut L,
    config: &LoaderConfig,
    args: &LoadArgs<'_>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = read_file(args.input)?;
    let input_name = args.input.to_string_lossy();
    let name = args.name.unwrap_or(input_name.as_ref());

    let options = LoadOptions {
        overrides: ResolveOverrides {
            address: args.address,
            mode: args.mode.map(TransferMode::from),
        },
        max_length: args.max_length,
        block_size: args.transfer.block_size,
        skip_reset: args.no_reset,
    };

    if (data.len() as u64) > u64::from(u32::MAX) {
        return Err(format!("{:?} is too large ({} bytes)", args.input, data.len()).into());
    }

    let mut source = data.as_slice();
    let mut progress = IndicatifProgress::new("Loading");
    let report = loader::load_image(link, &mut source, name, config, &options, &mut progress)?;

    println!(
        "Loaded {} bytes to {} at 0x{:08X} ({} mode, {} session{})",
        report.stats.bytes,
        report.resolution.region,
        report.resolution.base_address,
        report.resolution.mode,
        report.stats.sessions,
        if report.stats.sessions == 1 { "" } else { "s" }
    );
    if (report.stats.bytes as usize) < data.len() {
        log::warn!(
            "Image truncated: {} of {} bytes transferred",
            report.stats.bytes,
            data.len()
        );
    }
    if report.reset_pulsed {
        println!("Remote CPU reset");
    }
    Ok(())
}

/// Run the save command
pub fn run_save<L: Link + ?Sized>(
    link: &mut L,
    config: &LoaderConfig,
    output: &Path,
    address: u32,
    length: u32,
    mode: ModeArg,
    transfer: &TransferArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mode = TransferMode::from(mode);
    if mode == TransferMode::TightPacked {
        config.check_tight_len(length)?;
    }
    let request = TransferRequest::new(
        address,
        length,
        transfer.block_size.unwrap_or(config.block_size),
        mode,
    )?;

    let mut data = Vec::with_capacity(length as usize);
    let mut progress = IndicatifProgress::new("Saving");
    let stats = match mode {
        TransferMode::Stream => stream::save(link, &mut data, &request, &mut progress)?,
        TransferMode::TightPacked => tight::save_tight(link, &mut data, &request, &mut progress)?,
    };

    let mut file = File::create(output)?;
    file.write_all(&data)?;

    println!(
        "Wrote {} bytes from 0x{:08X} to {:?}",
        stats.bytes, address, output
    );
    Ok(())
}

/// Run the reset command
pub fn run_reset<L: Link + ?Sized>(
    link: &mut L,
    action: ResetAction,
) -> Result<(), Box<dyn std::error::Error>> {
    for &state in action.states() {
        reset::set_reset(link, state)?;
        println!("Reset {:?}", state);
    }
    Ok(())
}
