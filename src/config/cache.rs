use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Off unless explicitly enabled; when off no cache store exists at all.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "CacheConfig::default_max_entries")]
    pub max_entries: usize,
    /// Responses with larger bodies are relayed but never stored
    #[serde(default = "CacheConfig::default_max_entry_bytes")]
    pub max_entry_bytes: usize,
}

impl CacheConfig {
    fn default_max_entries() -> usize {
        1024
    }

    fn default_max_entry_bytes() -> usize {
        64 * 1024 * 1024
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: Self::default_max_entries(),
            max_entry_bytes: Self::default_max_entry_bytes(),
        }
    }
}
