use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter directive when `RUST_LOG` is unset
    #[serde(default = "LoggingConfig::default_filter")]
    pub level: String,
    /// Emit flattened JSON events instead of the human format
    #[serde(default)]
    pub json: bool,
    #[serde(default = "LoggingConfig::default_ansi")]
    pub ansi: bool,
}

impl LoggingConfig {
    fn default_filter() -> String {
        "info".to_string()
    }

    fn default_ansi() -> bool {
        true
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_filter(),
            json: false,
            ansi: Self::default_ansi(),
        }
    }
}
