use serde::{Deserialize, Serialize};

/// Tuning for listings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    /// Page size used when a listing asks for `limit = 0`.
    pub default_page_size: usize,
    /// Largest page the network servers hand out. The library itself honors
    /// any explicit limit.
    pub max_page_size: usize,
    /// Number of keys requested from the ordered store per scan call.
    pub scan_batch_size: usize,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            default_page_size: 1000,
            max_page_size: 10_000,
            scan_batch_size: 256,
        }
    }
}

impl MetaConfig {
    /// Resolve a caller-supplied limit. `0` means the default page size,
    /// never "unbounded"; any other value is taken as given.
    pub fn effective_limit(&self, requested: usize) -> usize {
        if requested == 0 {
            self.default_page_size.max(1)
        } else {
            requested
        }
    }

    /// Limit for a request arriving over the network: `0` stays `0` so the
    /// default page size still applies, anything else is capped at
    /// `max_page_size`.
    pub fn served_limit(&self, requested: usize) -> usize {
        requested.min(self.max_page_size.max(1))
    }

    /// Keys to fetch per scan for a page of `limit` entries.
    pub(crate) fn batch_for(&self, limit: usize) -> usize {
        self.scan_batch_size.clamp(1, limit.saturating_add(1))
    }
}
