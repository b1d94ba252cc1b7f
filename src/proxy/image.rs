use std::fmt;

use crate::token::TokenScope;

/// Path prefix of the registry HTTP API.
pub const API_PREFIX: &str = "/v2/";

const MANIFESTS_SEGMENT: &str = "/manifests/";
const BLOBS_SEGMENT: &str = "/blobs/";

/// Repository name (`owner/name`) extracted from a registry API path.
///
/// Never carries a tag or digest. Paths that do not follow the
/// `/v2/<name>/(manifests|blobs)/<ref>` shape degrade to a best-effort,
/// possibly empty, name which then simply fails the whitelist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryName(String);

impl RepositoryName {
    pub fn from_path(path: &str) -> Self {
        let rest = path.strip_prefix(API_PREFIX).unwrap_or(path);

        let rest = match resource_offset(rest) {
            Some(idx) => &rest[..idx],
            None => rest,
        };

        let end = rest.find([':', '@']).unwrap_or(rest.len());
        Self(rest[..end].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Pull scope for this repository.
    pub fn pull_scope(&self) -> TokenScope {
        TokenScope::pull(self)
    }
}

impl fmt::Display for RepositoryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True for manifest and blob fetches, the only requests that need a token.
pub fn is_resource_path(path: &str) -> bool {
    path.contains(MANIFESTS_SEGMENT) || path.contains(BLOBS_SEGMENT)
}

// Earliest `/manifests/` or `/blobs/` occurrence.
fn resource_offset(rest: &str) -> Option<usize> {
    match (rest.find(MANIFESTS_SEGMENT), rest.find(BLOBS_SEGMENT)) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(path: &str) -> String {
        RepositoryName::from_path(path).to_string()
    }

    #[test]
    fn resolves_manifest_path() {
        assert_eq!(name("/v2/library/nginx/manifests/latest"), "library/nginx");
    }

    #[test]
    fn resolves_blob_path_with_digest() {
        assert_eq!(name("/v2/a/b/blobs/sha256:abcd"), "a/b");
    }

    #[test]
    fn resolves_nested_repository() {
        assert_eq!(
            name("/v2/org/team/tool/manifests/sha256:0123"),
            "org/team/tool"
        );
    }

    #[test]
    fn truncates_at_first_resource_segment() {
        assert_eq!(name("/v2/a/blobs/b/manifests/latest"), "a");
        assert_eq!(name("/v2/a/manifests/b/blobs/x"), "a");
    }

    #[test]
    fn strips_inline_tag_and_digest() {
        assert_eq!(name("/v2/library/nginx:1.25"), "library/nginx");
        assert_eq!(name("/v2/library/nginx@sha256:abcd"), "library/nginx");
    }

    #[test]
    fn malformed_paths_degrade_to_best_effort() {
        assert_eq!(name("/v2/"), "");
        assert_eq!(name("/v2/:tag"), "");
        assert_eq!(name("/v2/library/nginx/tags/list"), "library/nginx/tags/list");
    }

    #[test]
    fn missing_prefix_is_left_alone() {
        assert_eq!(name("library/nginx/manifests/latest"), "library/nginx");
    }

    #[test]
    fn resource_paths_are_detected() {
        assert!(is_resource_path("/v2/library/nginx/manifests/latest"));
        assert!(is_resource_path("/v2/library/nginx/blobs/sha256:abcd"));
        assert!(!is_resource_path("/v2/library/nginx/tags/list"));
        assert!(!is_resource_path("/v2/unknown/path/without/prefix"));
    }

    #[test]
    fn pull_scope_format() {
        let repo = RepositoryName::from_path("/v2/library/nginx/manifests/latest");
        assert_eq!(repo.pull_scope().to_string(), "repository:library/nginx:pull");
    }
}
