//! CLI argument parsing

use crate::links;
use clap::{Parser, Subcommand, ValueEnum};
use romlink_core::reset::ResetState;
use romlink_core::transfer::TransferMode;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Generate dynamic help text for the link argument
fn link_help() -> String {
    format!("Link to use [available: {}]", links::link_names_short())
}

#[derive(Parser)]
#[command(name = "romlink")]
#[command(author, version, about = "Load ROM images into a remote TI-99/4A core", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Loader configuration file (TOML format)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Transfer mode as spelled on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// One contiguous session
    Stream,
    /// 6 KiB units into 8 KiB GROM slots
    Tight,
}

impl From<ModeArg> for TransferMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Stream => TransferMode::Stream,
            ModeArg::Tight => TransferMode::TightPacked,
        }
    }
}

/// Reset line action
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResetAction {
    /// Hold the CPU in reset
    On,
    /// Let the CPU run
    Off,
    /// Assert then release
    Cycle,
}

impl ResetAction {
    /// Line states to drive, in order
    pub fn states(&self) -> &'static [ResetState] {
        match self {
            Self::On => &[ResetState::Asserted],
            Self::Off => &[ResetState::Released],
            Self::Cycle => &[ResetState::Asserted, ResetState::Released],
        }
    }
}

/// Transfer tuning shared by load and save
#[derive(clap::Args, Debug, Clone, Default)]
pub struct TransferArgs {
    /// Block size for buffered transfers (hex or decimal)
    #[arg(long, value_parser = parse_hex_u32)]
    pub block_size: Option<u32>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load an image, picking its destination from the name, then reset
    Load {
        /// Link to use
        #[arg(short, long, help = link_help())]
        link: String,

        /// Image file
        input: PathBuf,

        /// Name to classify instead of the input path (e.g. /sd/ti99_4a/grom/foo.bin)
        #[arg(short, long)]
        name: Option<String>,

        /// Destination address, bypassing the rule table (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: Option<u32>,

        /// Transfer mode, bypassing the rule table
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,

        /// Upper bound on bytes to transfer (hex or decimal)
        #[arg(long, value_parser = parse_hex_u32)]
        max_length: Option<u32>,

        /// Leave the remote CPU alone after loading
        #[arg(long)]
        no_reset: bool,

        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Read device memory to a file
    Save {
        /// Link to use
        #[arg(short, long, help = link_help())]
        link: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Source address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: u32,

        /// Number of bytes to read (hex or decimal)
        #[arg(short = 'n', long, value_parser = parse_hex_u32, default_value = "1024")]
        length: u32,

        /// Transfer mode
        #[arg(short, long, value_enum, default_value = "stream")]
        mode: ModeArg,

        #[command(flatten)]
        transfer: TransferArgs,
    },

    /// Drive the remote CPU reset line
    Reset {
        /// Link to use
        #[arg(short, long, help = link_help())]
        link: String,

        /// What to do with the reset line
        #[arg(value_enum, default_value = "cycle")]
        action: ResetAction,
    },

    /// Show where an image name would be loaded
    Resolve {
        /// Image names to classify
        #[arg(required = true)]
        names: Vec<String>,

        /// Destination address override (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u32)]
        address: Option<u32>,

        /// Transfer mode override
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// List available links
    ListLinks,

    /// Print the effective loader configuration as TOML
    ShowConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0x16000"), Ok(0x16000));
        assert_eq!(parse_hex_u32("0X4000"), Ok(0x4000));
        assert_eq!(parse_hex_u32("1024"), Ok(1024));
        assert!(parse_hex_u32("0xZZ").is_err());
        assert!(parse_hex_u32("-1").is_err());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_load() {
        let cli = Cli::try_parse_from([
            "romlink",
            "-v",
            "load",
            "-l",
            "dummy",
            "game.bin",
            "--name",
            "/sd/ti99_4a/grom/game.bin",
            "--mode",
            "tight",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Load { link, name, mode, .. } => {
                assert_eq!(link, "dummy");
                assert_eq!(name.as_deref(), Some("/sd/ti99_4a/grom/game.bin"));
                assert_eq!(mode.map(TransferMode::from), Some(TransferMode::TightPacked));
            }
            _ => panic!("expected load"),
        }
    }

    #[test]
    fn test_reset_actions() {
        assert_eq!(
            ResetAction::Cycle.states(),
            &[ResetState::Asserted, ResetState::Released]
        );
        assert_eq!(ResetAction::On.states(), &[ResetState::Asserted]);
    }
}
