use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

pub mod cache;
pub mod logging;
pub mod policy;
pub mod server;
pub mod upstream;


pub use cache::CacheConfig;
pub use logging::LoggingConfig;
pub use policy::{DEFAULT_WHITELIST, PolicyConfig};
pub use server::ServerConfig;
pub use upstream::UpstreamConfig;

/// Environment variable holding a comma separated whitelist.
pub const WHITELIST_ENV: &str = "WHITELIST";
/// Environment variable toggling the response cache.
pub const ENABLE_CACHE_ENV: &str = "ENABLE_CACHE";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// File the configuration was read from; `None` when defaults were used.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Reads the TOML file (defaults when absent), then applies process environment overrides.
    ///
    /// A missing file is not an error; callers report it through `source` once logging is up.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    fn load_file(path: Option<PathBuf>) -> Result<Self> {
        let candidate = path.unwrap_or_else(|| PathBuf::from("regate.toml"));
        if candidate.exists() {
            let raw = fs::read_to_string(&candidate)
                .with_context(|| format!("failed to read config {}", candidate.display()))?;
            let mut config: Config = toml::from_str(&raw)
                .with_context(|| format!("invalid config {}", candidate.display()))?;
            config.source = Some(candidate);
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Applies `WHITELIST` and `ENABLE_CACHE` as returned by `lookup`.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(WHITELIST_ENV) {
            let entries = PolicyConfig::parse_list(&raw);
            if !entries.is_empty() {
                self.policy.whitelist = entries;
            }
        }

        if let Some(raw) = lookup(ENABLE_CACHE_ENV) {
            self.cache.enabled = parse_flag(&raw)
                .with_context(|| format!("invalid {ENABLE_CACHE_ENV} value {raw:?}"))?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.workers == 0 {
            bail!("server.workers must be at least 1");
        }

        for url in [&self.upstream.registry_url, &self.upstream.auth_url] {
            if url.scheme() != "https" && url.scheme() != "http" {
                bail!("unsupported upstream scheme {url}");
            }
        }
        if self.upstream.registry_url.host_str().is_none() {
            bail!("registry url {} has no host", self.upstream.registry_url);
        }

        for entry in &self.policy.whitelist {
            if entry.is_empty() {
                bail!("empty whitelist entry");
            }
            let literal = entry.strip_suffix("/*").unwrap_or(entry);
            if literal.is_empty() || literal.contains('*') {
                bail!("unsupported whitelist pattern {entry:?}, only a trailing /* is allowed");
            }
        }

        if self.cache.enabled && self.cache.max_entries == 0 {
            bail!("cache.max_entries must be positive when the cache is enabled");
        }
        Ok(())
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => bail!("expected a boolean, got {other:?}"),
    }
}
