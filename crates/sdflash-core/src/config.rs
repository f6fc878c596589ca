//! Emulation policy
//!
//! The erase unit and program polarity are runtime parameters validated
//! against the sector device when the emulator is built. With the `std`
//! feature they can also be loaded from a TOML file:
//!
//! ```toml
//! [emulator]
//! erase_unit = "4 KiB"
//! program_polarity = "clear-only"
//! ```

use crate::error::ConfigError;

#[cfg(feature = "std")]
use std::{format, string::String};

/// Default erase unit in bytes
pub const DEFAULT_ERASE_UNIT: u32 = 4096;

/// How program merges new data into what is already stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ProgramPolarity {
    /// Program can only clear bits (stored = stored & data), like real flash
    #[default]
    ClearOnly,
    /// Program replaces stored bytes unconditionally
    Overwrite,
}

impl ProgramPolarity {
    /// Merge `data` into `stored` according to this polarity
    pub fn merge(self, stored: &mut [u8], data: &[u8]) {
        match self {
            Self::ClearOnly => {
                for (dst, src) in stored.iter_mut().zip(data) {
                    *dst &= *src;
                }
            }
            Self::Overwrite => stored.copy_from_slice(data),
        }
    }

    /// Short name used in configuration files and on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ClearOnly => "clear-only",
            Self::Overwrite => "overwrite",
        }
    }
}

impl core::str::FromStr for ProgramPolarity {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clear-only" | "clear_only" | "and" => Ok(Self::ClearOnly),
            "overwrite" | "copy" => Ok(Self::Overwrite),
            _ => Err("expected 'clear-only' or 'overwrite'"),
        }
    }
}

/// Emulation policy for a [`FlashEmulator`](crate::FlashEmulator)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EmulatorConfig {
    /// Erase granularity in bytes, a multiple of the sector size
    #[cfg_attr(feature = "std", serde(deserialize_with = "deserialize_size_u32"))]
    pub erase_unit: u32,
    /// Program merge behavior
    pub program_polarity: ProgramPolarity,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            erase_unit: DEFAULT_ERASE_UNIT,
            program_polarity: ProgramPolarity::ClearOnly,
        }
    }
}

impl EmulatorConfig {
    /// Create a configuration with the given erase unit and polarity
    pub const fn new(erase_unit: u32, program_polarity: ProgramPolarity) -> Self {
        Self {
            erase_unit,
            program_polarity,
        }
    }

    /// Set the erase unit
    pub const fn with_erase_unit(mut self, erase_unit: u32) -> Self {
        self.erase_unit = erase_unit;
        self
    }

    /// Set the program polarity
    pub const fn with_polarity(mut self, program_polarity: ProgramPolarity) -> Self {
        self.program_polarity = program_polarity;
        self
    }

    /// Check this configuration against a device sector size and staging capacity
    pub fn validate(&self, sector_size: u32, staging: usize) -> Result<(), ConfigError> {
        if sector_size == 0 {
            return Err(ConfigError::ZeroSectorSize);
        }
        if self.erase_unit == 0 {
            return Err(ConfigError::ZeroEraseUnit);
        }
        if self.erase_unit % sector_size != 0 {
            return Err(ConfigError::EraseUnitMisaligned {
                erase_unit: self.erase_unit,
                sector_size,
            });
        }
        if staging == 0 || staging % sector_size as usize != 0 {
            return Err(ConfigError::StagingMisaligned {
                staging,
                sector_size,
            });
        }
        Ok(())
    }
}

/// Configuration file structure
#[cfg(feature = "std")]
#[derive(Debug, Default, serde::Deserialize)]
struct TomlConfigFile {
    #[serde(default)]
    emulator: EmulatorConfig,
}

#[cfg(feature = "std")]
impl EmulatorConfig {
    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from a TOML string
    ///
    /// Missing keys keep their default values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TomlConfigFile =
            toml::from_str(content).map_err(|e| ConfigError::Parse(format!("{}", e)))?;
        Ok(file.emulator)
    }
}

/// Deserialize a size that can be an integer or a string like "0x1000" or "4 KiB"
#[cfg(feature = "std")]
fn deserialize_size_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeOrInt {
        Int(u32),
        Str(String),
    }

    match SizeOrInt::deserialize(deserializer)? {
        SizeOrInt::Int(n) => Ok(n),
        SizeOrInt::Str(s) => {
            let n = parse_size(&s).map_err(serde::de::Error::custom)?;
            u32::try_from(n).map_err(|_| serde::de::Error::custom(format!("size too large: {}", s)))
        }
    }
}

/// Parse a size string like "16 MiB", "0x1000" or "4096"
#[cfg(feature = "std")]
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();

    if let Ok(n) = s.parse::<u64>() {
        return Ok(n);
    }

    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u64::from_str_radix(hex.trim(), 16).map_err(|e| format!("invalid hex: {}", e));
    }

    let s_lower = s.to_lowercase();
    let (num_str, multiplier) = if let Some(n) = s_lower.strip_suffix("gib") {
        (n.trim(), 1024 * 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("mib") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("mb") {
        (n.trim(), 1024 * 1024)
    } else if let Some(n) = s_lower.strip_suffix("kib") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix("kb") {
        (n.trim(), 1024)
    } else if let Some(n) = s_lower.strip_suffix('b') {
        (n.trim(), 1)
    } else {
        return Err(format!("invalid size: {}", s));
    };

    let num: u64 = num_str.parse().map_err(|_| format!("invalid size: {}", s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmulatorConfig::default();
        assert_eq!(config.erase_unit, 4096);
        assert_eq!(config.program_polarity, ProgramPolarity::ClearOnly);
        assert!(config.validate(512, 512).is_ok());
    }

    #[test]
    fn test_validate_rejects_misaligned_erase_unit() {
        let config = EmulatorConfig::default().with_erase_unit(1000);
        assert!(matches!(
            config.validate(512, 512),
            Err(ConfigError::EraseUnitMisaligned {
                erase_unit: 1000,
                sector_size: 512
            })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = EmulatorConfig::default();
        assert!(matches!(
            config.validate(0, 512),
            Err(ConfigError::ZeroSectorSize)
        ));
        assert!(matches!(
            config.with_erase_unit(0).validate(512, 512),
            Err(ConfigError::ZeroEraseUnit)
        ));
    }

    #[test]
    fn test_validate_rejects_bad_staging() {
        let config = EmulatorConfig::default();
        assert!(matches!(
            config.validate(512, 0),
            Err(ConfigError::StagingMisaligned { .. })
        ));
        assert!(matches!(
            config.validate(512, 768),
            Err(ConfigError::StagingMisaligned { .. })
        ));
        assert!(config.validate(512, 2048).is_ok());
    }

    #[test]
    fn test_merge_clear_only() {
        let mut stored = [0xFF, 0xF0, 0x00];
        ProgramPolarity::ClearOnly.merge(&mut stored, &[0x0F, 0xFF, 0xFF]);
        assert_eq!(stored, [0x0F, 0xF0, 0x00]);
    }

    #[test]
    fn test_merge_overwrite() {
        let mut stored = [0x00, 0xF0, 0x00];
        ProgramPolarity::Overwrite.merge(&mut stored, &[0x0F, 0xFF, 0xAA]);
        assert_eq!(stored, [0x0F, 0xFF, 0xAA]);
    }

    #[test]
    fn test_polarity_from_str() {
        assert_eq!(
            "clear-only".parse::<ProgramPolarity>(),
            Ok(ProgramPolarity::ClearOnly)
        );
        assert_eq!(
            "overwrite".parse::<ProgramPolarity>(),
            Ok(ProgramPolarity::Overwrite)
        );
        assert!("sometimes".parse::<ProgramPolarity>().is_err());
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("0x1000").unwrap(), 4096);
        assert_eq!(parse_size("4 KiB").unwrap(), 4096);
        assert_eq!(parse_size("64KiB").unwrap(), 65536);
        assert_eq!(parse_size("2 MiB").unwrap(), 2 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_toml() {
        let toml = r#"
[emulator]
erase_unit = "64 KiB"
program_polarity = "overwrite"
"#;
        let config = EmulatorConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.erase_unit, 65536);
        assert_eq!(config.program_polarity, ProgramPolarity::Overwrite);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_toml_defaults() {
        let config = EmulatorConfig::from_toml_str("[emulator]\nerase_unit = 8192\n").unwrap();
        assert_eq!(config.erase_unit, 8192);
        assert_eq!(config.program_polarity, ProgramPolarity::ClearOnly);

        let config = EmulatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, EmulatorConfig::default());
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_parse_toml_rejects_unknown_polarity() {
        let toml = "[emulator]\nprogram_polarity = \"sideways\"\n";
        assert!(matches!(
            EmulatorConfig::from_toml_str(toml),
            Err(ConfigError::Parse(_))
        ));
    }
}
