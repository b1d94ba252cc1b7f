use serde::Deserialize;
use url::Url;

/// Where pulls are forwarded and where pull tokens come from.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_registry_url", deserialize_with = "serde_url::deserialize")]
    pub registry_url: Url,
    #[serde(default = "default_auth_url", deserialize_with = "serde_url::deserialize")]
    pub auth_url: Url,
    /// `service` parameter sent to the token endpoint
    #[serde(default = "default_service")]
    pub service: String,
}

impl UpstreamConfig {
    /// Authority used for the rewritten `host` header, e.g. `registry-1.docker.io`.
    pub fn registry_authority(&self) -> String {
        let host = self.registry_url.host_str().unwrap_or_default();
        match self.registry_url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            registry_url: default_registry_url(),
            auth_url: default_auth_url(),
            service: default_service(),
        }
    }
}

fn default_registry_url() -> Url {
    Url::parse("https://registry-1.docker.io").expect("static registry url")
}

fn default_auth_url() -> Url {
    Url::parse("https://auth.docker.io/token").expect("static auth url")
}

fn default_service() -> String {
    "registry.docker.io".to_string()
}

mod serde_url {
    use serde::{Deserialize, Deserializer};
    use url::Url;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Url, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Url::parse(&s).map_err(serde::de::Error::custom)
    }
}
