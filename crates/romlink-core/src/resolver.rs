//! Filename-driven destination resolution
//!
//! Images are classified by their path: a fixed, ordered table of prefix
//! and suffix rules maps a name to a region base plus offset, and
//! optionally to a transfer mode. Evaluation is last-match-wins: every
//! matching rule overwrites the address computed so far, so suffix rules
//! (evaluated after the directory prefixes) take precedence.
//!
//! Matching is ASCII case-insensitive and never allocates.
//!
//! | Predicate | Destination |
//! |---|---|
//! | prefix `/sd/ti99_4a/cart` | cartridge ROM |
//! | prefix `/sd/ti99_4a/grom` | GROM |
//! | prefix `/sd/ti99_4a/dsr` | DSR/TIPI |
//! | suffix `8.bin`, `c.bin` | cartridge ROM |
//! | suffix `d.bin` | cartridge ROM + 0x2000 |
//! | suffix `g.bin`, `g3.bin` | GROM |
//! | suffix `g4.bin` .. `g7.bin` | GROM + 0x2000 .. 0x8000 |
//! | suffix `6k.bin` | GROM, tight-packed |

use crate::error::{Error, Result};
use crate::region::{RegionMap, RegionRole};
use crate::transfer::TransferMode;

/// Longest rule pattern in bytes
pub const MAX_PATTERN_LEN: usize = 32;
/// Maximum number of rules in a [`RuleSet`]
pub const MAX_RULES: usize = 32;

/// Lowercased rule pattern
pub type Pattern = heapless::String<MAX_PATTERN_LEN>;

/// Which end of the name a pattern is compared against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Name starts with the pattern
    Prefix(Pattern),
    /// Name ends with the pattern
    Suffix(Pattern),
}

fn lowered(pattern: &str) -> Result<Pattern> {
    let mut out = Pattern::new();
    for c in pattern.chars() {
        out.push(c.to_ascii_lowercase())
            .map_err(|_| Error::PatternTooLong)?;
    }
    Ok(out)
}

impl Matcher {
    /// Prefix matcher for `pattern`
    pub fn prefix(pattern: &str) -> Result<Self> {
        Ok(Self::Prefix(lowered(pattern)?))
    }

    /// Suffix matcher for `pattern`
    pub fn suffix(pattern: &str) -> Result<Self> {
        Ok(Self::Suffix(lowered(pattern)?))
    }

    /// The stored (lowercased) pattern
    pub fn pattern(&self) -> &str {
        match self {
            Self::Prefix(p) | Self::Suffix(p) => p.as_str(),
        }
    }

    /// Test `name` against this matcher, ignoring ASCII case
    pub fn matches(&self, name: &str) -> bool {
        let name = name.as_bytes();
        match self {
            Self::Prefix(p) => name
                .get(..p.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(p.as_bytes())),
            Self::Suffix(p) => name
                .len()
                .checked_sub(p.len())
                .is_some_and(|start| name[start..].eq_ignore_ascii_case(p.as_bytes())),
        }
    }
}

/// One row of the classification table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Name predicate
    pub matcher: Matcher,
    /// Region whose base the address is relative to
    pub region: RegionRole,
    /// Offset added to the region base
    pub offset: u32,
    /// Mode imposed by this rule, if any
    pub mode: Option<TransferMode>,
}

impl Rule {
    /// Rule targeting `region + offset` without touching the mode
    pub fn new(matcher: Matcher, region: RegionRole, offset: u32) -> Self {
        Self {
            matcher,
            region,
            offset,
            mode: None,
        }
    }

    /// Also set the transfer mode when this rule matches
    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Destination address under `regions`
    ///
    /// Region bases are trusted, so the sum wraps rather than failing.
    pub fn address(&self, regions: &RegionMap) -> u32 {
        regions.base(self.region).wrapping_add(self.offset)
    }
}

#[derive(Clone, Copy)]
enum Side {
    Prefix,
    Suffix,
}

const CANONICAL_RULES: &[(Side, &str, RegionRole, u32, Option<TransferMode>)] = &[
    (Side::Prefix, "/sd/ti99_4a/cart", RegionRole::CartridgeRom, 0, None),
    (Side::Prefix, "/sd/ti99_4a/grom", RegionRole::Grom, 0, None),
    (Side::Prefix, "/sd/ti99_4a/dsr", RegionRole::DsrTipi, 0, None),
    (Side::Suffix, "8.bin", RegionRole::CartridgeRom, 0, None),
    (Side::Suffix, "c.bin", RegionRole::CartridgeRom, 0, None),
    (Side::Suffix, "d.bin", RegionRole::CartridgeRom, 0x2000, None),
    (Side::Suffix, "g.bin", RegionRole::Grom, 0, None),
    (Side::Suffix, "g3.bin", RegionRole::Grom, 0, None),
    (Side::Suffix, "g4.bin", RegionRole::Grom, 0x2000, None),
    (Side::Suffix, "g5.bin", RegionRole::Grom, 0x4000, None),
    (Side::Suffix, "g6.bin", RegionRole::Grom, 0x6000, None),
    (Side::Suffix, "g7.bin", RegionRole::Grom, 0x8000, None),
    (Side::Suffix, "6k.bin", RegionRole::Grom, 0, Some(TransferMode::TightPacked)),
];

/// Ordered classification rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: heapless::Vec<Rule, MAX_RULES>,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::canonical()
    }
}

impl RuleSet {
    /// An empty rule set; every name resolves to the default
    pub fn empty() -> Self {
        Self {
            rules: heapless::Vec::new(),
        }
    }

    /// The standard TI-99/4A table, prefix rules first
    pub fn canonical() -> Self {
        let mut set = Self::empty();
        for &(side, pattern, region, offset, mode) in CANONICAL_RULES {
            let matcher = match side {
                Side::Prefix => Matcher::prefix(pattern),
                Side::Suffix => Matcher::suffix(pattern),
            };
            debug_assert!(matcher.is_ok(), "canonical pattern {:?} rejected", pattern);
            if let Ok(matcher) = matcher {
                let pushed = set.rules.push(Rule {
                    matcher,
                    region,
                    offset,
                    mode,
                });
                debug_assert!(pushed.is_ok(), "canonical table exceeds MAX_RULES");
            }
        }
        set
    }

    /// Append a rule; it is evaluated after all existing rules
    pub fn push(&mut self, rule: Rule) -> Result<()> {
        self.rules.push(rule).map_err(|_| Error::RuleTableFull)
    }

    /// Remove all rules
    pub fn clear(&mut self) {
        self.rules.clear();
    }

    /// Number of rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True if there are no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules in evaluation order
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

/// Caller-supplied values that win over the rule table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOverrides {
    /// Use this destination address
    pub address: Option<u32>,
    /// Use this transfer mode
    pub mode: Option<TransferMode>,
}

/// Result of classifying a name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Destination address
    pub base_address: u32,
    /// Transfer mode
    pub mode: TransferMode,
    /// Region the address was derived from
    pub region: RegionRole,
    /// How many rules matched
    pub matched_rules: usize,
    /// Index of the rule that decided the address
    pub last_rule: Option<usize>,
}

/// Maps names to destinations using a [`RuleSet`]
pub struct AddressResolver<'a> {
    regions: RegionMap,
    rules: &'a RuleSet,
}

impl<'a> AddressResolver<'a> {
    /// Create a resolver over `regions` and `rules`
    pub fn new(regions: RegionMap, rules: &'a RuleSet) -> Self {
        Self { regions, rules }
    }

    /// Region bases in use
    pub fn regions(&self) -> &RegionMap {
        &self.regions
    }

    /// Classify `name`
    ///
    /// With no matching rule the result is the cartridge ROM base in stream
    /// mode. Unmatched and conflicting classifications are logged but do not
    /// change the outcome.
    pub fn resolve(&self, name: &str) -> Resolution {
        let mut resolution = Resolution {
            base_address: self.regions.cartridge_rom,
            mode: TransferMode::Stream,
            region: RegionRole::CartridgeRom,
            matched_rules: 0,
            last_rule: None,
        };
        let mut conflicting = false;

        for (index, rule) in self.rules.iter().enumerate() {
            if !rule.matcher.matches(name) {
                continue;
            }

            let address = rule.address(&self.regions);
            if resolution.matched_rules > 0 && address != resolution.base_address {
                conflicting = true;
            }
            log::trace!(
                "resolve: rule {} ({:?}) matched, address 0x{:08X}",
                index,
                rule.matcher,
                address
            );

            resolution.base_address = address;
            resolution.region = rule.region;
            if let Some(mode) = rule.mode {
                resolution.mode = mode;
            }
            resolution.matched_rules += 1;
            resolution.last_rule = Some(index);
        }

        if resolution.matched_rules == 0 {
            log::warn!(
                "No classification rule matched '{}', using cartridge ROM at 0x{:08X}",
                name,
                resolution.base_address
            );
        } else if conflicting {
            log::debug!(
                "resolve: {} rules matched '{}' with different addresses, rule {} wins",
                resolution.matched_rules,
                name,
                resolution.last_rule.unwrap_or(0)
            );
        }

        resolution
    }

    /// Classify `name`, then apply explicit overrides
    pub fn resolve_with(&self, name: &str, overrides: ResolveOverrides) -> Resolution {
        let mut resolution = self.resolve(name);
        if let Some(address) = overrides.address {
            log::debug!("resolve: address overridden to 0x{:08X}", address);
            resolution.base_address = address;
        }
        if let Some(mode) = overrides.mode {
            log::debug!("resolve: mode overridden to {}", mode);
            resolution.mode = mode;
        }
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(name: &str) -> Resolution {
        let rules = RuleSet::canonical();
        AddressResolver::new(RegionMap::default(), &rules).resolve(name)
    }

    #[test]
    fn test_canonical_table_order() {
        let rules = RuleSet::canonical();
        assert_eq!(rules.len(), 13);
        assert_eq!(rules.len(), CANONICAL_RULES.len());
        let patterns: std::vec::Vec<&str> = rules.iter().map(|r| r.matcher.pattern()).collect();
        assert_eq!(patterns[0], "/sd/ti99_4a/cart");
        assert_eq!(patterns[2], "/sd/ti99_4a/dsr");
        assert_eq!(patterns[12], "6k.bin");
    }

    #[test]
    fn test_suffix_overrides_prefix() {
        let r = resolve("/sd/ti99_4a/cart/foo_g5.bin");
        assert_eq!(r.base_address, 0x16000 + 0x4000);
        assert_eq!(r.region, RegionRole::Grom);
        assert_eq!(r.mode, TransferMode::Stream);
        assert_eq!(r.matched_rules, 2);
        assert_eq!(r.last_rule, Some(9));
    }

    #[test]
    fn test_tight_suffix() {
        let r = resolve("whatever6k.bin");
        assert_eq!(r.base_address, 0x16000);
        assert_eq!(r.mode, TransferMode::TightPacked);
    }

    #[test]
    fn test_prefix_rules() {
        assert_eq!(resolve("/sd/ti99_4a/grom/system.rom").base_address, 0x16000);
        assert_eq!(resolve("/sd/ti99_4a/dsr/tipi.rom").base_address, 0x4000);
        assert_eq!(resolve("/sd/ti99_4a/cart/x.rom").base_address, 0x40000);
    }

    #[test]
    fn test_suffix_rules() {
        assert_eq!(resolve("games/parsec8.bin").base_address, 0x40000);
        assert_eq!(resolve("games/parsecc.bin").base_address, 0x40000);
        assert_eq!(resolve("games/parsecd.bin").base_address, 0x42000);
        assert_eq!(resolve("games/parsecg.bin").base_address, 0x16000);
        assert_eq!(resolve("games/xg3.bin").base_address, 0x16000);
        assert_eq!(resolve("games/xg4.bin").base_address, 0x18000);
        assert_eq!(resolve("games/xg6.bin").base_address, 0x1C000);
        assert_eq!(resolve("games/xg7.bin").base_address, 0x1E000);
    }

    #[test]
    fn test_case_insensitive() {
        let r = resolve("/SD/TI99_4A/DSR/TIPI_G4.BIN");
        assert_eq!(r.base_address, 0x18000);
        assert_eq!(resolve("BIG6K.Bin").mode, TransferMode::TightPacked);
    }

    #[test]
    fn test_default_when_nothing_matches() {
        let r = resolve("readme.txt");
        assert_eq!(r.base_address, 0x40000);
        assert_eq!(r.mode, TransferMode::Stream);
        assert_eq!(r.matched_rules, 0);
        assert_eq!(r.last_rule, None);
        // Shorter than every suffix
        assert_eq!(resolve("").matched_rules, 0);
    }

    #[test]
    fn test_non_tight_rule_keeps_mode() {
        let mut rules = RuleSet::canonical();
        rules
            .push(Rule::new(Matcher::suffix("k.bin").unwrap(), RegionRole::DsrTipi, 0x100))
            .unwrap();
        let r = AddressResolver::new(RegionMap::default(), &rules).resolve("a6k.bin");
        assert_eq!(r.base_address, 0x4100);
        assert_eq!(r.mode, TransferMode::TightPacked);
    }

    #[test]
    fn test_custom_bases() {
        let rules = RuleSet::canonical();
        let regions = RegionMap {
            cartridge_rom: 0x60000,
            grom: 0x20000,
            dsr_tipi: 0x8000,
        };
        let resolver = AddressResolver::new(regions, &rules);
        assert_eq!(resolver.resolve("xd.bin").base_address, 0x62000);
        assert_eq!(resolver.resolve("xg7.bin").base_address, 0x28000);
    }

    #[test]
    fn test_overrides_win() {
        let rules = RuleSet::canonical();
        let resolver = AddressResolver::new(RegionMap::default(), &rules);
        let r = resolver.resolve_with(
            "x6k.bin",
            ResolveOverrides {
                address: Some(0x1234),
                mode: Some(TransferMode::Stream),
            },
        );
        assert_eq!(r.base_address, 0x1234);
        assert_eq!(r.mode, TransferMode::Stream);
    }

    #[test]
    fn test_pattern_limits() {
        assert_eq!(
            Matcher::prefix("/a/very/long/pattern/that/does/not/fit"),
            Err(Error::PatternTooLong)
        );
        let mut rules = RuleSet::empty();
        for _ in 0..MAX_RULES {
            rules
                .push(Rule::new(Matcher::suffix(".bin").unwrap(), RegionRole::Grom, 0))
                .unwrap();
        }
        assert_eq!(
            rules.push(Rule::new(Matcher::suffix(".bin").unwrap(), RegionRole::Grom, 0)),
            Err(Error::RuleTableFull)
        );
    }
}
