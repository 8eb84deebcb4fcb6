//! Link registration and dispatch
//!
//! Links are selected with a string of the form `name` or
//! `name:key=value,key=value`. Each link crate is feature-gated and
//! publishes its own [`LinkInfo`].

use romlink_core::link::{Link, LinkInfo};
use thiserror::Error;

/// Errors opening a link from a link string
#[derive(Debug, Error)]
pub enum LinkError {
    /// No compiled-in link has this name
    #[error("Unknown link: {name}\n\n{help}Use 'romlink list-links' for more details")]
    Unknown { name: String, help: String },

    /// The link rejected its options
    #[error("Invalid {link} parameters: {reason}")]
    InvalidOptions { link: &'static str, reason: String },

    /// The link could not be opened
    #[error("Failed to open {link}: {reason}")]
    OpenFailed { link: &'static str, reason: String },
}

/// Get information about all available links (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_links() -> Vec<LinkInfo> {
    let mut links = Vec::new();

    #[cfg(feature = "dummy")]
    links.push(romlink_dummy::LINK_INFO);

    #[cfg(feature = "linux-spi")]
    links.push(romlink_linux_spi::LINK_INFO);

    links
}

/// Generate help text listing all available links
pub fn link_help() -> String {
    let links = available_links();

    if links.is_empty() {
        return "No links available (recompile with link features enabled)\n".to_string();
    }

    let mut help = String::from("Available links:\n");
    for link in &links {
        help.push_str(&format!("  {:12} - {}\n", link.name, link.description));
        if !link.aliases.is_empty() {
            help.push_str(&format!("  {:12}   aliases: {}\n", "", link.aliases.join(", ")));
        }
    }
    help
}

/// Generate a short list of link names for CLI help
pub fn link_names_short() -> String {
    let links = available_links();
    let names: Vec<&str> = links.iter().map(|l| l.name).collect();
    names.join(", ")
}

/// Canonical name of the link called `name`, if it is compiled in
pub fn find_link(name: &str) -> Option<&'static str> {
    available_links()
        .into_iter()
        .find(|l| l.name == name || l.aliases.iter().any(|a| *a == name))
        .map(|l| l.name)
}

/// Parse a link string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_link_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

/// Open the link described by a link string
#[allow(unused_variables)]
pub fn open_link(link_str: &str) -> Result<Box<dyn Link + Send>, LinkError> {
    let (name, options) = parse_link_string(link_str);

    let canonical = find_link(name).ok_or_else(|| LinkError::Unknown {
        name: name.to_string(),
        help: link_help(),
    })?;

    match canonical {
        #[cfg(feature = "dummy")]
        "dummy" => {
            use romlink_dummy::{DummyConfig, DummyDevice};

            let config = DummyConfig::from_options(options.iter().copied()).map_err(|e| {
                LinkError::InvalidOptions {
                    link: "dummy",
                    reason: e.to_string(),
                }
            })?;
            log::info!(
                "Opening dummy device ({} bytes, contents discarded on exit)",
                config.size
            );
            Ok(Box::new(DummyDevice::new(config)))
        }

        #[cfg(feature = "linux-spi")]
        "linux_spi" => {
            use romlink_linux_spi::{parse_options, LinuxSpiLink};

            log::info!("Opening Linux SPI link...");

            let config = parse_options(&options).map_err(|reason| LinkError::InvalidOptions {
                link: "linux_spi",
                reason,
            })?;

            let link = LinuxSpiLink::open(&config).map_err(|e| LinkError::OpenFailed {
                link: "linux_spi",
                reason: format!(
                    "{}\n\
                     Make sure the spidev and gpiochip devices exist and you have read/write permissions.\n\
                     You may need to: sudo usermod -aG spi,gpio $USER",
                    e
                ),
            })?;
            Ok(Box::new(link))
        }

        _ => Err(LinkError::Unknown {
            name: name.to_string(),
            help: link_help(),
        }),
    }
}
