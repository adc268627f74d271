use std::fs;
use std::path::Path;

use anyhow::Context;
use log::{info, warn};
use serde::Serialize;

use crate::alloc::{AllocStats, PhysicalMemory};
use crate::cache::{HierarchyStats, InvalidConfiguration, LevelId, MemoryHierarchy};
use crate::sim::config::{CacheLevelConfig, MemConfig};

/// End-of-session snapshot of both engines, suitable for JSON output.
#[derive(Debug, Serialize)]
pub struct SimSummary {
    pub memory: Option<AllocStats>,
    pub cache: HierarchyStats,
}

/// The owned session context: one optional allocator (absent until
/// `init mem` or a `[mem]` config section creates it) plus the cache
/// hierarchy. All engine state lives here; nothing is ambient.
pub struct Sim {
    pub memory: Option<PhysicalMemory>,
    pub hierarchy: MemoryHierarchy,
}

impl Sim {
    pub fn new() -> Self {
        Self {
            memory: None,
            hierarchy: MemoryHierarchy::new(),
        }
    }

    /// Build a session from config sections. A zero `total_size` leaves
    /// memory uninitialized; a zero `cache_size` leaves that level
    /// unconfigured.
    pub fn from_configs(
        mem: Option<MemConfig>,
        l1: CacheLevelConfig,
        l2: CacheLevelConfig,
    ) -> Result<Self, InvalidConfiguration> {
        let mut sim = Self::new();

        if let Some(mem) = mem {
            if mem.total_size > 0 {
                let mut memory = PhysicalMemory::new(mem.total_size);
                memory.set_strategy(mem.strategy);
                sim.memory = Some(memory);
            } else {
                warn!("[mem] total_size is 0, leaving memory uninitialized");
            }
        }
        for (id, config) in [(LevelId::L1, l1), (LevelId::L2, l2)] {
            if config.cache_size > 0 {
                sim.hierarchy.configure_level(
                    id,
                    config.cache_size,
                    config.block_size,
                    config.associativity,
                )?;
            }
        }
        Ok(sim)
    }

    pub fn summary(&self) -> SimSummary {
        SimSummary {
            memory: self.memory.as_ref().map(|m| m.stats()),
            cache: self.hierarchy.stats(),
        }
    }

    pub fn write_summary(&self, path: &Path) -> anyhow::Result<()> {
        let payload = serde_json::to_string_pretty(&self.summary())?;
        fs::write(path, payload)
            .with_context(|| format!("cannot write stats to {}", path.display()))?;
        info!("stats summary written to {}", path.display());
        Ok(())
    }

    /// Full-session reset: drop the allocator, return every cache level to
    /// Unconfigured, zero the cycle total.
    pub fn reset(&mut self) {
        self.memory = None;
        self.hierarchy.reset();
        info!("simulation reset");
    }
}

impl Default for Sim {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::FitStrategy;

    #[test]
    fn configs_preinitialize_engines() {
        let mem = MemConfig {
            total_size: 1024,
            strategy: FitStrategy::BestFit,
        };
        let l1 = CacheLevelConfig {
            cache_size: 64,
            block_size: 16,
            associativity: 2,
        };
        let l2 = CacheLevelConfig::default();
        let sim = Sim::from_configs(Some(mem), l1, l2).unwrap();

        let memory = sim.memory.as_ref().unwrap();
        assert_eq!(memory.total_size(), 1024);
        assert_eq!(memory.strategy(), FitStrategy::BestFit);
        assert!(sim.hierarchy.level(LevelId::L1).is_configured());
        assert!(!sim.hierarchy.level(LevelId::L2).is_configured());
    }

    #[test]
    fn bad_cache_section_is_rejected() {
        let l1 = CacheLevelConfig {
            cache_size: 64,
            block_size: 0,
            associativity: 2,
        };
        assert!(Sim::from_configs(None, l1, CacheLevelConfig::default()).is_err());
    }

    #[test]
    fn reset_drops_memory_and_cycles() {
        let mut sim = Sim::new();
        sim.memory = Some(PhysicalMemory::new(64));
        sim.hierarchy.configure_level(LevelId::L1, 64, 16, 2).unwrap();
        let id = sim.memory.as_mut().unwrap().allocate(16).unwrap();
        sim.hierarchy
            .access(sim.memory.as_ref().unwrap(), id, 0)
            .unwrap();

        sim.reset();
        assert!(sim.memory.is_none());
        assert_eq!(sim.hierarchy.total_cycles(), 0);
        assert!(!sim.hierarchy.level(LevelId::L1).is_configured());
    }
}
