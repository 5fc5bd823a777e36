//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Snapshot of the shared-buffer cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of live cache entries (one per source)
    pub entries: usize,

    /// Entries whose buffer finished decoding
    pub prepared_entries: usize,

    /// Total player references across all entries
    pub references: usize,

    /// Decodes requested and not yet reported by the platform
    pub pending_decodes: usize,

    /// Decode requests issued since the cache was created
    pub decodes_requested: u64,

    /// Buffers handed back to the platform
    pub buffers_unloaded: u64,

    /// Completions that arrived after every player had released
    pub orphaned_completions: u64,

    /// Decodes the platform reported as failed
    pub failed_decodes: u64,
}

impl CacheStats {
    /// Buffers currently owned by the platform on our behalf.
    ///
    /// Pending decodes of released entries are included: they are unloaded
    /// when their completion arrives.
    pub fn outstanding_buffers(&self) -> u64 {
        self.decodes_requested
            .saturating_sub(self.buffers_unloaded)
    }

    /// Average number of players sharing one entry.
    pub fn sharing_ratio(&self) -> f64 {
        if self.entries == 0 {
            return 0.0;
        }

        self.references as f64 / self.entries as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outstanding_buffers() {
        let stats = CacheStats {
            decodes_requested: 5,
            buffers_unloaded: 3,
            ..Default::default()
        };
        assert_eq!(stats.outstanding_buffers(), 2);
        assert_eq!(CacheStats::default().outstanding_buffers(), 0);
    }

    #[test]
    fn test_sharing_ratio() {
        assert_eq!(CacheStats::default().sharing_ratio(), 0.0);

        let stats = CacheStats {
            entries: 2,
            references: 5,
            ..Default::default()
        };
        assert_eq!(stats.sharing_ratio(), 2.5);
    }
}
