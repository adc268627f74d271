use std::collections::BTreeMap;
use std::str::FromStr;

use log::{debug, info};
use serde::Deserialize;
use thiserror::Error;

use crate::alloc::free_list::{FreeList, FreeRange};
use crate::alloc::stats::{AllocStats, RequestCounters};

pub type BlockId = u64;

/// Placement policy for selecting the free range that satisfies a request.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FitStrategy {
    #[default]
    FirstFit,
    BestFit,
    WorstFit,
}

impl FromStr for FitStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "first_fit" => Ok(Self::FirstFit),
            "best_fit" => Ok(Self::BestFit),
            "worst_fit" => Ok(Self::WorstFit),
            _ => Err(format!(
                "unsupported fit strategy '{}', expected one of: first_fit, best_fit, worst_fit",
                value
            )),
        }
    }
}

/// A live allocation. `size` always equals `requested`; the model never
/// introduces padding or alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedBlock {
    pub id: BlockId,
    pub start: u64,
    pub size: u64,
    pub requested: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("no free range can satisfy {requested} bytes")]
    AllocationFailed { requested: u64 },
    #[error("unknown block id {0}")]
    NotFound(BlockId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Free,
    Used(BlockId),
}

/// One entry in an address-ordered memory dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: u64,
    pub size: u64,
    pub kind: RegionKind,
}

/// Fixed-size physical address space with split-on-allocate and
/// coalesce-on-free bookkeeping. No payload bytes are backed; only range
/// metadata is tracked.
#[derive(Debug)]
pub struct PhysicalMemory {
    total_size: u64,
    free_list: FreeList,
    allocated: BTreeMap<BlockId, AllocatedBlock>,
    next_id: BlockId,
    strategy: FitStrategy,
    counters: RequestCounters,
}

impl PhysicalMemory {
    pub fn new(total_size: u64) -> Self {
        assert!(total_size > 0, "total_size must be > 0");
        info!("physical memory initialized: {} bytes", total_size);
        Self {
            total_size,
            free_list: FreeList::with_range(0, total_size),
            allocated: BTreeMap::new(),
            next_id: 1,
            strategy: FitStrategy::default(),
            counters: RequestCounters::default(),
        }
    }

    /// Service an allocation request. Ids are minted from a monotonically
    /// increasing counter and never reused. A request no free range can
    /// hold fails with `AllocationFailed` and leaves the space untouched.
    pub fn allocate(&mut self, size: u64) -> Result<BlockId, AllocError> {
        self.counters.record_request();

        if size == 0 {
            debug!("rejecting zero-size allocation request");
            return Err(AllocError::AllocationFailed { requested: 0 });
        }
        let Some(range) = self.free_list.find(size, self.strategy) else {
            debug!(
                "allocation of {} bytes failed: largest free range is {}",
                size,
                self.free_list.largest()
            );
            return Err(AllocError::AllocationFailed { requested: size });
        };

        let start = self.free_list.carve(range, size);
        let id = self.next_id;
        self.next_id += 1;
        self.allocated.insert(
            id,
            AllocatedBlock {
                id,
                start,
                size,
                requested: size,
            },
        );
        self.counters.record_success(size);
        debug!("allocated block id={} at [{}, {})", id, start, start + size);
        Ok(id)
    }

    /// Release a live allocation, returning its range to the free set with
    /// immediate coalescing. Unknown ids fail with `NotFound` and change
    /// nothing.
    pub fn deallocate(&mut self, id: BlockId) -> Result<(), AllocError> {
        let block = self.allocated.remove(&id).ok_or(AllocError::NotFound(id))?;
        self.free_list
            .insert(FreeRange::new(block.start, block.size));
        debug!(
            "freed block id={} at [{}, {})",
            id,
            block.start,
            block.start + block.size
        );
        Ok(())
    }

    /// Look up a live allocation. Pure read.
    pub fn get_block(&self, id: BlockId) -> Result<AllocatedBlock, AllocError> {
        self.allocated
            .get(&id)
            .copied()
            .ok_or(AllocError::NotFound(id))
    }

    /// Changes which free range future `allocate` calls select; existing
    /// allocations are never re-evaluated.
    pub fn set_strategy(&mut self, strategy: FitStrategy) {
        info!("allocator strategy set to {:?}", strategy);
        self.strategy = strategy;
    }

    pub fn strategy(&self) -> FitStrategy {
        self.strategy
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn used(&self) -> u64 {
        self.allocated.values().map(|b| b.size).sum()
    }

    pub fn free_list(&self) -> &FreeList {
        &self.free_list
    }

    pub fn allocated(&self) -> impl Iterator<Item = &AllocatedBlock> {
        self.allocated.values()
    }

    /// Address-ordered listing of every free and used range. Pure read.
    pub fn dump(&self) -> Vec<Region> {
        let mut regions: Vec<Region> = self
            .free_list
            .iter()
            .map(|r| Region {
                start: r.start,
                size: r.size,
                kind: RegionKind::Free,
            })
            .chain(self.allocated.values().map(|b| Region {
                start: b.start,
                size: b.size,
                kind: RegionKind::Used(b.id),
            }))
            .collect();
        regions.sort_by_key(|r| r.start);
        regions
    }

    pub fn stats(&self) -> AllocStats {
        let used = self.used();
        let free = self.total_size - used;
        let largest_free = self.free_list.largest();

        let utilization_pct = used as f64 / self.total_size as f64 * 100.0;
        let external_frag_pct = if free > 0 {
            (1.0 - largest_free as f64 / free as f64) * 100.0
        } else {
            0.0
        };
        // requested_bytes only grows and never drops below live `used`,
        // so this difference saturates to zero
        let internal_frag_pct = if used > 0 {
            used.saturating_sub(self.counters.requested_bytes()) as f64 / used as f64 * 100.0
        } else {
            0.0
        };
        let success_rate_pct = if self.counters.requests() > 0 {
            self.counters.successes() as f64 / self.counters.requests() as f64 * 100.0
        } else {
            0.0
        };

        AllocStats {
            total: self.total_size,
            used,
            free,
            largest_free,
            utilization_pct,
            external_frag_pct,
            internal_frag_pct,
            requests: self.counters.requests(),
            successes: self.counters.successes(),
            success_rate_pct,
        }
    }
}
