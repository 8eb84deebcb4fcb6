//! Resolve and show-config commands

use crate::cli::ModeArg;
use romlink_core::config::LoaderConfig;
use romlink_core::resolver::ResolveOverrides;
use romlink_core::transfer::TransferMode;

/// Print where each name would be loaded
pub fn run_resolve(
    config: &LoaderConfig,
    names: &[String],
    address: Option<u32>,
    mode: Option<ModeArg>,
) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = config.resolver();
    let overrides = ResolveOverrides {
        address,
        mode: mode.map(TransferMode::from),
    };

    println!(
        "{:<40} {:<14} {:>10} {:<7} Rule",
        "Name", "Region", "Address", "Mode"
    );
    println!("{}", "-".repeat(80));

    for name in names {
        let resolution = resolver.resolve_with(name, overrides);
        let rule = match resolution.last_rule {
            Some(index) => format!("#{} ({} matched)", index, resolution.matched_rules),
            None => "default".to_string(),
        };
        println!(
            "{:<40} {:<14} 0x{:08X} {:<7} {}",
            name,
            resolution.region.name(),
            resolution.base_address,
            resolution.mode.name(),
            rule
        );
    }
    Ok(())
}

/// Print the effective configuration as TOML
pub fn run_show_config(config: &LoaderConfig) -> Result<(), Box<dyn std::error::Error>> {
    print!("{}", config.to_toml_string());
    Ok(())
}
