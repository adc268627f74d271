use serde::Serialize;

/// Hit/miss snapshot for one cache level.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LevelStats {
    pub hits: u64,
    pub misses: u64,
    pub accesses: u64,
    pub hit_ratio_pct: f64,
}

impl LevelStats {
    pub fn from_counts(hits: u64, misses: u64) -> Self {
        let accesses = hits + misses;
        let hit_ratio_pct = if accesses > 0 {
            hits as f64 / accesses as f64 * 100.0
        } else {
            0.0
        };
        Self {
            hits,
            misses,
            accesses,
            hit_ratio_pct,
        }
    }
}

/// Snapshot across the whole hierarchy plus the cumulative cycle total.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HierarchyStats {
    pub l1: LevelStats,
    pub l2: LevelStats,
    pub total_cycles: u64,
}
