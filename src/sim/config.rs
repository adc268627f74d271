use std::path::PathBuf;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::Value;

use crate::alloc::FitStrategy;

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        match section {
            Some(value) => value.clone().try_into().expect("cannot deserialize config"),
            None => {
                warn!("config section not found");
                Self::default()
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    pub log_level: u64,
    pub stats_json: Option<PathBuf>,
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            log_level: 0,
            stats_json: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct MemConfig {
    pub total_size: u64,
    pub strategy: FitStrategy,
}

impl Config for MemConfig {}

impl Default for MemConfig {
    fn default() -> Self {
        Self {
            total_size: 0x10_0000, // 1 MiB
            strategy: FitStrategy::FirstFit,
        }
    }
}

/// Geometry for one cache level. `cache_size = 0` leaves the level
/// unconfigured, matching a level that was never set up interactively.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CacheLevelConfig {
    pub cache_size: u64,
    pub block_size: u64,
    pub associativity: u64,
}

impl Config for CacheLevelConfig {}

impl Default for CacheLevelConfig {
    fn default() -> Self {
        Self {
            cache_size: 0,
            block_size: 64,
            associativity: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_section_parses_strategy() {
        let table: toml::Table = toml::from_str(
            r#"
            [mem]
            total_size = 1024
            strategy = "best_fit"
            "#,
        )
        .unwrap();
        let config = MemConfig::from_section(table.get("mem"));
        assert_eq!(config.total_size, 1024);
        assert_eq!(config.strategy, FitStrategy::BestFit);
    }

    #[test]
    fn missing_section_falls_back_to_default() {
        let table: toml::Table = toml::from_str("").unwrap();
        let config = CacheLevelConfig::from_section(table.get("l1"));
        assert_eq!(config.cache_size, 0);
        assert_eq!(config.block_size, 64);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let table: toml::Table = toml::from_str(
            r#"
            [l1]
            cache_size = 512
            "#,
        )
        .unwrap();
        let config = CacheLevelConfig::from_section(table.get("l1"));
        assert_eq!(config.cache_size, 512);
        assert_eq!(config.block_size, 64);
        assert_eq!(config.associativity, 2);
    }
}
