use std::time::Duration;

use serde::Deserialize;

/// Listener settings for the inbound proxy.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
    /// Tokio worker threads; defaults to the number of CPUs
    #[serde(default = "ServerConfig::default_workers")]
    pub workers: usize,
    /// How long in-flight pulls may drain after ctrl-c
    #[serde(default = "ServerConfig::default_shutdown_secs")]
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_workers() -> usize {
        num_cpus::get()
    }

    fn default_shutdown_secs() -> u64 {
        30
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            workers: Self::default_workers(),
            shutdown_timeout_secs: Self::default_shutdown_secs(),
        }
    }
}
