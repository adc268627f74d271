use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alloc::{BlockId, PhysicalMemory};
use crate::cache::level::{CacheLevel, InvalidConfiguration};
use crate::cache::stats::HierarchyStats;

pub const L1_HIT_CYCLES: u64 = 1;
pub const L2_HIT_CYCLES: u64 = 10;
pub const MEM_ACCESS_CYCLES: u64 = 100;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LevelId {
    L1,
    L2,
}

impl FromStr for LevelId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            _ => Err(format!(
                "unsupported cache level '{}', expected one of: l1, l2",
                value
            )),
        }
    }
}

impl fmt::Display for LevelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelId::L1 => write!(f, "L1"),
            LevelId::L2 => write!(f, "L2"),
        }
    }
}

/// Where an access was resolved. Each outcome carries exactly one cycle
/// charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessOutcome {
    L1Hit,
    L2Hit,
    Memory,
}

impl AccessOutcome {
    pub fn cycles(self) -> u64 {
        match self {
            AccessOutcome::L1Hit => L1_HIT_CYCLES,
            AccessOutcome::L2Hit => L2_HIT_CYCLES,
            AccessOutcome::Memory => MEM_ACCESS_CYCLES,
        }
    }
}

impl fmt::Display for AccessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessOutcome::L1Hit => write!(f, "L1 hit"),
            AccessOutcome::L2Hit => write!(f, "L2 hit"),
            AccessOutcome::Memory => write!(f, "Memory access"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("unknown block id {0}")]
    NotFound(BlockId),
    #[error("offset {offset} out of bounds for block of {size} bytes")]
    OutOfBounds { offset: u64, size: u64 },
}

/// Ordered L1 -> L2 -> backing-memory chain with a running cycle total.
/// The chain is sequential and non-inclusive: each probe stops at the
/// first hit, and only the levels actually probed are mutated.
#[derive(Debug, Default)]
pub struct MemoryHierarchy {
    l1: CacheLevel,
    l2: CacheLevel,
    total_cycles: u64,
}

impl MemoryHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn configure_level(
        &mut self,
        level: LevelId,
        cache_size: u64,
        block_size: u64,
        associativity: u64,
    ) -> Result<(), InvalidConfiguration> {
        self.level_mut(level)
            .configure(cache_size, block_size, associativity)
    }

    pub fn level(&self, level: LevelId) -> &CacheLevel {
        match level {
            LevelId::L1 => &self.l1,
            LevelId::L2 => &self.l2,
        }
    }

    pub fn level_mut(&mut self, level: LevelId) -> &mut CacheLevel {
        match level {
            LevelId::L1 => &mut self.l1,
            LevelId::L2 => &mut self.l2,
        }
    }

    /// Resolve `(id, offset)` to an absolute address through the allocator
    /// and cascade through the levels with early exit. Exactly one cost
    /// constant is added per successful access; failed resolution leaves
    /// every counter untouched.
    pub fn access(
        &mut self,
        memory: &PhysicalMemory,
        id: BlockId,
        offset: u64,
    ) -> Result<AccessOutcome, AccessError> {
        let block = memory.get_block(id).map_err(|_| AccessError::NotFound(id))?;
        if offset >= block.size {
            return Err(AccessError::OutOfBounds {
                offset,
                size: block.size,
            });
        }
        let address = block.start + offset;

        let outcome = if self.l1.access(address) {
            AccessOutcome::L1Hit
        } else if self.l2.access(address) {
            AccessOutcome::L2Hit
        } else {
            AccessOutcome::Memory
        };
        self.total_cycles = self.total_cycles.saturating_add(outcome.cycles());
        debug!(
            "access id={} offset={} -> address {:#x}, {:?} (+{} cycles)",
            id,
            offset,
            address,
            outcome,
            outcome.cycles()
        );
        Ok(outcome)
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles
    }

    pub fn stats(&self) -> HierarchyStats {
        HierarchyStats {
            l1: self.l1.stats(),
            l2: self.l2.stats(),
            total_cycles: self.total_cycles,
        }
    }

    /// Reset both levels to Unconfigured and zero the cycle total. The
    /// allocator is not owned here and is never affected.
    pub fn reset(&mut self) {
        self.l1.reset();
        self.l2.reset();
        self.total_cycles = 0;
    }
}
