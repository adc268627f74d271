use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::cache::stats::LevelStats;

/// Shape parameters derived when a level is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheGeometry {
    pub cache_size: u64,
    pub block_size: u64,
    pub associativity: u64,
    pub num_sets: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidConfiguration {
    #[error("cache_size must be > 0")]
    ZeroCacheSize,
    #[error("block_size must be > 0")]
    ZeroBlockSize,
    #[error("associativity must be > 0")]
    ZeroAssociativity,
    #[error("{cache_size} bytes / {block_size}-byte blocks / {associativity} ways derives zero sets")]
    ZeroSets {
        cache_size: u64,
        block_size: u64,
        associativity: u64,
    },
}

/// One associative set: line slots holding tags, plus the insertion-order
/// record used only to pick eviction victims.
#[derive(Debug, Clone)]
struct CacheSet {
    lines: Vec<Option<u64>>,
    fifo: Vec<usize>,
}

impl CacheSet {
    fn new(ways: usize) -> Self {
        Self {
            lines: vec![None; ways],
            fifo: Vec::with_capacity(ways),
        }
    }
}

/// A single set-associative cache level with FIFO replacement. Starts
/// Unconfigured: probes report a miss-equivalent `false` without touching
/// counters or sets until `configure` is called.
#[derive(Debug, Default)]
pub struct CacheLevel {
    geometry: Option<CacheGeometry>,
    sets: Vec<CacheSet>,
    hits: u64,
    misses: u64,
}

impl CacheLevel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the set/way structure and zero all statistics. Re-configuring
    /// an already-configured level discards its previous contents.
    pub fn configure(
        &mut self,
        cache_size: u64,
        block_size: u64,
        associativity: u64,
    ) -> Result<(), InvalidConfiguration> {
        if cache_size == 0 {
            return Err(InvalidConfiguration::ZeroCacheSize);
        }
        if block_size == 0 {
            return Err(InvalidConfiguration::ZeroBlockSize);
        }
        if associativity == 0 {
            return Err(InvalidConfiguration::ZeroAssociativity);
        }
        let num_lines = cache_size / block_size;
        let num_sets = num_lines / associativity;
        if num_sets == 0 {
            return Err(InvalidConfiguration::ZeroSets {
                cache_size,
                block_size,
                associativity,
            });
        }

        self.geometry = Some(CacheGeometry {
            cache_size,
            block_size,
            associativity,
            num_sets,
        });
        self.sets = (0..num_sets)
            .map(|_| CacheSet::new(associativity as usize))
            .collect();
        self.hits = 0;
        self.misses = 0;
        info!(
            "cache configured: {} bytes, {}-byte blocks, {} ways, {} sets",
            cache_size, block_size, associativity, num_sets
        );
        Ok(())
    }

    /// Probe the level. Hits never reorder the FIFO record; misses install
    /// the tag into the first invalid slot, or evict the oldest-inserted
    /// slot when the set is full.
    pub fn access(&mut self, address: u64) -> bool {
        let Some(geom) = self.geometry else {
            return false;
        };

        let block_addr = address / geom.block_size;
        let set_index = (block_addr % geom.num_sets) as usize;
        let tag = block_addr / geom.num_sets;
        let set = &mut self.sets[set_index];

        if set.lines.iter().any(|&line| line == Some(tag)) {
            self.hits = self.hits.saturating_add(1);
            return true;
        }

        self.misses = self.misses.saturating_add(1);
        if let Some(slot) = set.lines.iter().position(Option::is_none) {
            set.lines[slot] = Some(tag);
            set.fifo.push(slot);
        } else {
            let victim = if set.fifo.is_empty() {
                0
            } else {
                set.fifo.remove(0)
            };
            set.lines[victim] = Some(tag);
            set.fifo.push(victim);
        }
        false
    }

    /// Return to Unconfigured, discarding sets, FIFO state, and counters.
    /// Distinct from re-configuring.
    pub fn reset(&mut self) {
        self.geometry = None;
        self.sets.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn is_configured(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn geometry(&self) -> Option<CacheGeometry> {
        self.geometry
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn stats(&self) -> LevelStats {
        LevelStats::from_counts(self.hits, self.misses)
    }
}
