//! romlink - Load ROM images into a remote TI-99/4A core
//!
//! Pushes cartridge, GROM and DSR images into the memory of an FPGA-hosted
//! TI-99/4A over a chip-select framed serial link, reads memory back, and
//! drives the console's reset line.
//!
//! # Architecture
//!
//! All protocol logic lives in `romlink-core` and works over any
//! [`Link`](romlink_core::link::Link). This binary only picks a link from
//! the `-l name:key=value,...` string, loads the TOML configuration and
//! reports progress.

mod cli;
mod commands;
mod links;

use clap::Parser;
use cli::{Cli, Commands};
use romlink_core::config::LoaderConfig;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    logger_builder(env_logger::Env::default(), cli.verbose).init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Load {
            link,
            input,
            name,
            address,
            mode,
            max_length,
            no_reset,
            transfer,
        } => {
            let mut link = links::open_link(&link)?;
            let args = commands::transfer::LoadArgs {
                input: &input,
                name: name.as_deref(),
                address,
                mode,
                max_length,
                no_reset,
                transfer: &transfer,
            };
            commands::transfer::run_load(&mut link, &config, &args)
        }
        Commands::Save {
            link,
            output,
            address,
            length,
            mode,
            transfer,
        } => {
            let mut link = links::open_link(&link)?;
            commands::transfer::run_save(
                &mut link, &config, &output, address, length, mode, &transfer,
            )
        }
        Commands::Reset { link, action } => {
            let mut link = links::open_link(&link)?;
            commands::transfer::run_reset(&mut link, action)
        }
        Commands::Resolve {
            names,
            address,
            mode,
        } => commands::resolve::run_resolve(&config, &names, address, mode),
        Commands::ListLinks => {
            commands::list_links();
            Ok(())
        }
        Commands::ShowConfig => commands::resolve::run_show_config(&config),
    }
}

/// Load the loader configuration from `path`, or use built-in defaults
fn load_config(path: Option<&Path>) -> Result<LoaderConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let config = LoaderConfig::from_toml_file(path)
                .map_err(|e| format!("{}: {}", path.display(), e))?;
            log::info!("Loaded configuration from {:?}", path);
            Ok(config)
        }
        None => {
            log::debug!("Using built-in loader configuration");
            Ok(LoaderConfig::default())
        }
    }
}

/// Log level selected by `-v` flags
fn verbosity_filter(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Logger honouring `RUST_LOG`, with `-v`/`-vv` overriding the global level
fn logger_builder(env: env_logger::Env<'_>, verbose: u8) -> env_logger::Builder {
    let mut builder = env_logger::Builder::from_env(env.default_filter_or("info"));
    if verbose > 0 {
        builder.filter_level(verbosity_filter(verbose));
    }
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log, Metadata};

    fn enabled(verbose: u8, level: Level) -> bool {
        let env = env_logger::Env::new().filter("ROMLINK_TEST_LOG");
        let logger = logger_builder(env, verbose).build();
        let metadata = Metadata::builder()
            .level(level)
            .target("romlink_core::resolver")
            .build();
        logger.enabled(&metadata)
    }

    #[test]
    fn test_verbosity_enables_debug_and_trace() {
        assert!(enabled(0, Level::Info));
        assert!(!enabled(0, Level::Debug));
        assert!(enabled(1, Level::Debug));
        assert!(!enabled(1, Level::Trace));
        assert!(enabled(2, Level::Trace));
    }
}
