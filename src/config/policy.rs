use serde::Deserialize;

pub const DEFAULT_WHITELIST: [&str; 3] = [
    "library/nginx",
    "jqknono/weread-challenge",
    "nullprivate/nullprivate",
];

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Exact `owner/repo` names or `owner/*` prefix patterns
    #[serde(default = "PolicyConfig::default_whitelist")]
    pub whitelist: Vec<String>,
}

impl PolicyConfig {
    fn default_whitelist() -> Vec<String> {
        DEFAULT_WHITELIST.iter().map(|s| s.to_string()).collect()
    }

    /// Parses the comma separated form used by the `WHITELIST` variable.
    pub fn parse_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            whitelist: Self::default_whitelist(),
        }
    }
}
