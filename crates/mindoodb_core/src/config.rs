//! Database configuration.

/// Configuration for opening a [`crate::Database`].
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether this database is admin-only: every incoming entry must be
    /// signed by the tenant's administration key (used for `TenantDirectory`
    /// and any other database an operator restricts to admin writes).
    pub admin_only: bool,

    /// Number of `doc_change`/`doc_create` entries to accept for a document
    /// before emitting a `doc_snapshot`, capping future replay cost.
    /// Held within `[64, 512]` per the snapshot policy.
    pub snapshot_interval: u32,

    /// Default chunk size, in bytes, for attachment writes.
    pub attachment_chunk_size: usize,

    /// Debounce interval before a dirty database flushes to the cache.
    pub cache_debounce_ms: u64,

    /// Maximum number of entries applied per `syncStoreChanges` batch.
    pub sync_batch_size: usize,

    /// Bound on the number of entries buffered while waiting on a missing
    /// CRDT dependency, per document, before they're dropped with a warning.
    pub max_pending_per_document: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            admin_only: false,
            snapshot_interval: 128,
            attachment_chunk_size: 256 * 1024,
            cache_debounce_ms: 5000,
            sync_batch_size: 1000,
            max_pending_per_document: 256,
        }
    }
}

impl DatabaseConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Marks this database admin-only.
    #[must_use]
    pub const fn admin_only(mut self, value: bool) -> Self {
        self.admin_only = value;
        self
    }

    /// Sets the snapshot emission interval, clamped to `[64, 512]`.
    #[must_use]
    pub fn snapshot_interval(mut self, value: u32) -> Self {
        self.snapshot_interval = value.clamp(64, 512);
        self
    }

    /// Sets the default attachment chunk size in bytes.
    #[must_use]
    pub const fn attachment_chunk_size(mut self, bytes: usize) -> Self {
        self.attachment_chunk_size = bytes;
        self
    }

    /// Sets the cache flush debounce interval, in milliseconds.
    #[must_use]
    pub const fn cache_debounce_ms(mut self, ms: u64) -> Self {
        self.cache_debounce_ms = ms;
        self
    }

    /// Sets the maximum batch size for `syncStoreChanges`.
    #[must_use]
    pub const fn sync_batch_size(mut self, size: usize) -> Self {
        self.sync_batch_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = DatabaseConfig::default();
        assert!(config.create_if_missing);
        assert!(!config.admin_only);
        assert_eq!(config.snapshot_interval, 128);
    }

    #[test]
    fn builder_pattern() {
        let config = DatabaseConfig::new().admin_only(true).snapshot_interval(900);
        assert!(config.admin_only);
        assert_eq!(config.snapshot_interval, 512, "snapshot_interval must clamp into [64, 512]");
    }

    #[test]
    fn snapshot_interval_clamps_low_end() {
        let config = DatabaseConfig::new().snapshot_interval(1);
        assert_eq!(config.snapshot_interval, 64);
    }
}
