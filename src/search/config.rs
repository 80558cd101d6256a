//! Search configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Entity index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Path to the search index directory
    pub index_path: PathBuf,

    /// Keep the index in memory instead of on disk
    pub in_memory: bool,

    /// Index writer heap size in bytes (default: 50MB)
    pub writer_heap_size: usize,

    /// Commit after every indexing call
    pub realtime_indexing: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./data/entity_index"),
            in_memory: false,
            writer_heap_size: 50_000_000, // 50MB
            realtime_indexing: true,
        }
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn index_path(mut self, path: PathBuf) -> Self {
        self.config.index_path = path;
        self
    }

    pub fn in_memory(mut self, enabled: bool) -> Self {
        self.config.in_memory = enabled;
        self
    }

    pub fn writer_heap_size(mut self, size: usize) -> Self {
        self.config.writer_heap_size = size;
        self
    }

    pub fn realtime_indexing(mut self, enabled: bool) -> Self {
        self.config.realtime_indexing = enabled;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
