//! TOML configuration file parsing
//!
//! Every key is optional; missing keys keep their defaults. Numbers may be
//! integers or hex strings:
//!
//! ```toml
//! [regions]
//! cartridge_rom = 0x40000
//! grom = "0x16000"
//! dsr_tipi = 0x4000
//!
//! [transfer]
//! block_size = 1024
//! stream_max_len = 0x200000
//! tight_max_len = 0x80000
//! tight_max_bound = 0x80000
//!
//! # Any [[rule]] replaces the built-in table, in file order
//! [[rule]]
//! suffix = "6k.bin"
//! region = "grom"
//! mode = "tight_packed"
//! ```

use std::fs;
use std::path::Path;
use std::string::String;
use std::vec::Vec;
use std::format;

use super::LoaderConfig;
use crate::error::{Error, Result};
use crate::region::RegionRole;
use crate::resolver::{Matcher, Rule, RuleSet};
use crate::transfer::TransferMode;

/// TOML configuration file structure
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfigFile {
    #[serde(default)]
    regions: TomlRegions,
    #[serde(default)]
    transfer: TomlTransfer,
    #[serde(default)]
    rule: Vec<TomlRule>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRegions {
    cartridge_rom: Option<HexOrInt>,
    grom: Option<HexOrInt>,
    dsr_tipi: Option<HexOrInt>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTransfer {
    block_size: Option<HexOrInt>,
    stream_max_len: Option<HexOrInt>,
    tight_max_len: Option<HexOrInt>,
    tight_max_bound: Option<HexOrInt>,
}

/// Rule definition in TOML; exactly one of `prefix` and `suffix`
#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRule {
    prefix: Option<String>,
    suffix: Option<String>,
    region: RegionRole,
    #[serde(default)]
    offset: Option<HexOrInt>,
    mode: Option<TransferMode>,
}

/// A u32 written as a TOML integer or a hex/decimal string
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum HexOrInt {
    Int(u32),
    Str(String),
}

impl HexOrInt {
    fn value(&self) -> core::result::Result<u32, String> {
        match self {
            Self::Int(n) => Ok(*n),
            Self::Str(s) => parse_number(s),
        }
    }
}

/// Parse a number that can be hex (0x...) or decimal
fn parse_number(s: &str) -> core::result::Result<u32, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

fn apply(target: &mut u32, value: &Option<HexOrInt>, key: &str) -> Result<()> {
    if let Some(value) = value {
        *target = value.value().map_err(|e| {
            log::error!("config: {}: {}", key, e);
            Error::ConfigError
        })?;
    }
    Ok(())
}

impl TomlRule {
    fn into_rule(self) -> Result<Rule> {
        let matcher = match (&self.prefix, &self.suffix) {
            (Some(p), None) => Matcher::prefix(p)?,
            (None, Some(s)) => Matcher::suffix(s)?,
            _ => {
                log::error!("config: a rule needs exactly one of 'prefix' or 'suffix'");
                return Err(Error::ConfigError);
            }
        };

        let mut offset = 0;
        apply(&mut offset, &self.offset, "rule.offset")?;
        let rule = Rule::new(matcher, self.region, offset);
        Ok(match self.mode {
            Some(mode) => rule.with_mode(mode),
            None => rule,
        })
    }
}

impl LoaderConfig {
    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            log::error!("config: cannot read {}: {}", path.display(), e);
            Error::ConfigError
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string, starting from the defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlConfigFile = ::toml::from_str(content).map_err(|e| {
            log::error!("config: {}", e);
            Error::ConfigError
        })?;

        let mut config = LoaderConfig::default();
        apply(&mut config.regions.cartridge_rom, &file.regions.cartridge_rom, "regions.cartridge_rom")?;
        apply(&mut config.regions.grom, &file.regions.grom, "regions.grom")?;
        apply(&mut config.regions.dsr_tipi, &file.regions.dsr_tipi, "regions.dsr_tipi")?;
        apply(&mut config.block_size, &file.transfer.block_size, "transfer.block_size")?;
        apply(&mut config.stream_max_len, &file.transfer.stream_max_len, "transfer.stream_max_len")?;
        apply(&mut config.tight_max_len, &file.transfer.tight_max_len, "transfer.tight_max_len")?;
        apply(&mut config.tight_max_bound, &file.transfer.tight_max_bound, "transfer.tight_max_bound")?;

        if !file.rule.is_empty() {
            let mut rules = RuleSet::empty();
            for rule in file.rule {
                rules.push(rule.into_rule()?)?;
            }
            config.rules = rules;
        }

        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> String {
        let mut output = String::new();

        output.push_str("[regions]\n");
        for region in self.regions.regions() {
            output.push_str(&format!("{} = 0x{:X}\n", region.role.name(), region.base));
        }
        output.push('\n');

        output.push_str("[transfer]\n");
        output.push_str(&format!("block_size = {}\n", self.block_size));
        output.push_str(&format!("stream_max_len = 0x{:X}\n", self.stream_max_len));
        output.push_str(&format!("tight_max_len = 0x{:X}\n", self.tight_max_len));
        output.push_str(&format!("tight_max_bound = 0x{:X}\n", self.tight_max_bound));

        for rule in self.rules.iter() {
            output.push_str("\n[[rule]]\n");
            match &rule.matcher {
                Matcher::Prefix(p) => output.push_str(&format!("prefix = \"{}\"\n", p)),
                Matcher::Suffix(s) => output.push_str(&format!("suffix = \"{}\"\n", s)),
            }
            output.push_str(&format!("region = \"{}\"\n", rule.region.name()));
            if rule.offset != 0 {
                output.push_str(&format!("offset = 0x{:X}\n", rule.offset));
            }
            if let Some(mode) = rule.mode {
                let name = match mode {
                    TransferMode::Stream => "stream",
                    TransferMode::TightPacked => "tight_packed",
                };
                output.push_str(&format!("mode = \"{}\"\n", name));
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("4096"), Ok(4096));
        assert_eq!(parse_number("0x1000"), Ok(4096));
        assert_eq!(parse_number(" 0X16000 "), Ok(0x16000));
        assert!(parse_number("sixteen").is_err());
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(LoaderConfig::from_toml_str("").unwrap(), LoaderConfig::default());
    }

    #[test]
    fn test_overrides_and_rules() {
        let toml = r#"
[regions]
cartridge_rom = 0x60000
grom = "0x20000"

[transfer]
block_size = 512
tight_max_len = "0x30000"

[[rule]]
suffix = "_grom.bin"
region = "grom"
offset = "0x2000"

[[rule]]
prefix = "/sd/TIPI"
region = "dsr_tipi"
mode = "tight_packed"
"#;
        let config = LoaderConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.regions.cartridge_rom, 0x60000);
        assert_eq!(config.regions.grom, 0x20000);
        assert_eq!(config.regions.dsr_tipi, 0x4000);
        assert_eq!(config.block_size, 512);
        assert_eq!(config.tight_max_len, 0x30000);
        assert_eq!(config.rules.len(), 2);

        let resolver = config.resolver();
        assert_eq!(resolver.resolve("x_grom.bin").base_address, 0x22000);
        let r = resolver.resolve("/sd/tipi/boot.bin");
        assert_eq!(r.base_address, 0x4000);
        assert_eq!(r.mode, TransferMode::TightPacked);
    }

    #[test]
    fn test_rejects_invalid_files() {
        assert_eq!(
            LoaderConfig::from_toml_str("[transfer]\nblock_size = 0\n"),
            Err(Error::InvalidBlockSize)
        );
        assert_eq!(
            LoaderConfig::from_toml_str("[transfer]\ntight_max_len = 0x90000\n"),
            Err(Error::LengthExceedsBound)
        );
        assert_eq!(
            LoaderConfig::from_toml_str("[[rule]]\nregion = \"grom\"\n"),
            Err(Error::ConfigError)
        );
        assert_eq!(
            LoaderConfig::from_toml_str("[regions]\nvdp = 0x8000\n"),
            Err(Error::ConfigError)
        );
    }

    #[test]
    fn test_toml_output_parses_back() {
        let config = LoaderConfig::default();
        let text = config.to_toml_string();
        assert!(text.contains("grom = 0x16000"));
        assert!(text.contains("suffix = \"6k.bin\""));
        assert_eq!(LoaderConfig::from_toml_str(&text).unwrap(), config);
    }
}
