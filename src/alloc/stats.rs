use serde::Serialize;

/// Lifetime request accounting for one allocator instance. The
/// requested-bytes accumulator is increment-only; it feeds the internal
/// fragmentation metric and is never decremented on free.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RequestCounters {
    requests: u64,
    successes: u64,
    requested_bytes: u64,
}

impl RequestCounters {
    pub fn record_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    pub fn record_success(&mut self, bytes: u64) {
        self.successes = self.successes.saturating_add(1);
        self.requested_bytes = self.requested_bytes.saturating_add(bytes);
    }

    pub fn requests(&self) -> u64 {
        self.requests
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn requested_bytes(&self) -> u64 {
        self.requested_bytes
    }
}

/// Point-in-time snapshot of allocator occupancy and quality metrics.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AllocStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
    pub largest_free: u64,
    pub utilization_pct: f64,
    pub external_frag_pct: f64,
    pub internal_frag_pct: f64,
    pub requests: u64,
    pub successes: u64,
    pub success_rate_pct: f64,
}
