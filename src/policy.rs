//! Repository allow-listing.
//!
//! The whitelist is built once from configuration and shared read-only across
//! all requests.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::PolicyConfig;

/// Immutable set of allowed repositories.
///
/// Entries are either exact names (`owner/repo`) or prefix patterns
/// (`owner/*`) that match any repository below `owner/`.
#[derive(Debug, Clone)]
pub struct WhitelistPolicy {
    inner: Arc<Entries>,
}

#[derive(Debug)]
struct Entries {
    exact: HashSet<String>,
    /// Stored with the trailing `/`, so `library/*` becomes `library/`.
    prefixes: Vec<String>,
    ordered: Vec<String>,
}

impl WhitelistPolicy {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ordered: Vec<String> = entries.into_iter().map(Into::into).collect();
        let mut exact = HashSet::new();
        let mut prefixes = Vec::new();

        for entry in &ordered {
            if let Some(owner) = entry.strip_suffix("/*") {
                prefixes.push(format!("{owner}/"));
            }
            exact.insert(entry.clone());
        }

        Self {
            inner: Arc::new(Entries {
                exact,
                prefixes,
                ordered,
            }),
        }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(config.whitelist.iter().cloned())
    }

    /// Case-sensitive; a prefix only matches at a path segment boundary.
    pub fn is_allowed(&self, repository: &str) -> bool {
        if self.inner.exact.contains(repository) {
            return true;
        }
        self.inner
            .prefixes
            .iter()
            .any(|prefix| repository.starts_with(prefix.as_str()))
    }

    /// Entries in configuration order.
    pub fn entries(&self) -> &[String] {
        &self.inner.ordered
    }
}
