//! Destination memory regions of the remote device
//!
//! The device exposes three load targets. Their bases are configuration
//! values; overlap between them is the configuration's responsibility and
//! is never checked here.

use core::fmt;

/// Default cartridge ROM base
pub const DEFAULT_CARTRIDGE_ROM_BASE: u32 = 0x40000;
/// Default GROM base
pub const DEFAULT_GROM_BASE: u32 = 0x16000;
/// Default DSR/TIPI base
pub const DEFAULT_DSR_TIPI_BASE: u32 = 0x4000;

/// Role of a memory region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "std", serde(rename_all = "snake_case"))]
pub enum RegionRole {
    /// Cartridge ROM banks
    CartridgeRom,
    /// Graphics/program ROM space
    Grom,
    /// Device service routine ROM for the TIPI interface
    DsrTipi,
}

impl RegionRole {
    /// All roles, in table order
    pub const ALL: [RegionRole; 3] = [Self::CartridgeRom, Self::Grom, Self::DsrTipi];

    /// Short name used in configuration files and the CLI
    pub fn name(&self) -> &'static str {
        match self {
            Self::CartridgeRom => "cartridge_rom",
            Self::Grom => "grom",
            Self::DsrTipi => "dsr_tipi",
        }
    }

    /// Parse a role name as produced by [`RegionRole::name`]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|role| role.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for RegionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A region base together with its role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// First device address of the region
    pub base: u32,
    /// What the region holds
    pub role: RegionRole,
}

/// Base addresses of all regions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionMap {
    /// Cartridge ROM base
    pub cartridge_rom: u32,
    /// GROM base
    pub grom: u32,
    /// DSR/TIPI base
    pub dsr_tipi: u32,
}

impl Default for RegionMap {
    fn default() -> Self {
        Self {
            cartridge_rom: DEFAULT_CARTRIDGE_ROM_BASE,
            grom: DEFAULT_GROM_BASE,
            dsr_tipi: DEFAULT_DSR_TIPI_BASE,
        }
    }
}

impl RegionMap {
    /// Base address for `role`
    pub fn base(&self, role: RegionRole) -> u32 {
        match role {
            RegionRole::CartridgeRom => self.cartridge_rom,
            RegionRole::Grom => self.grom,
            RegionRole::DsrTipi => self.dsr_tipi,
        }
    }

    /// Set the base address for `role`
    pub fn set_base(&mut self, role: RegionRole, base: u32) {
        match role {
            RegionRole::CartridgeRom => self.cartridge_rom = base,
            RegionRole::Grom => self.grom = base,
            RegionRole::DsrTipi => self.dsr_tipi = base,
        }
    }

    /// Region descriptor for `role`
    pub fn region(&self, role: RegionRole) -> MemoryRegion {
        MemoryRegion {
            base: self.base(role),
            role,
        }
    }

    /// Iterate over all regions in table order
    pub fn regions(&self) -> impl Iterator<Item = MemoryRegion> + '_ {
        RegionRole::ALL.iter().map(move |&role| self.region(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bases() {
        let map = RegionMap::default();
        assert_eq!(map.base(RegionRole::CartridgeRom), 0x40000);
        assert_eq!(map.base(RegionRole::Grom), 0x16000);
        assert_eq!(map.base(RegionRole::DsrTipi), 0x4000);
    }

    #[test]
    fn test_role_names() {
        for role in RegionRole::ALL {
            assert_eq!(RegionRole::from_name(role.name()), Some(role));
        }
        assert_eq!(RegionRole::from_name("GROM"), Some(RegionRole::Grom));
        assert_eq!(RegionRole::from_name("vdp"), None);
    }
}
