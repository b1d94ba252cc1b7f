#![warn(
    rust_2024_compatibility,
    clippy::all,
    clippy::future_not_send,
    clippy::mod_module_files,
    clippy::needless_pass_by_ref_mut,
    clippy::unused_async
)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rama::{
    Layer as RamaLayer,
    graceful::Shutdown,
    http::{layer::trace::TraceLayer, server::HttpServer},
    layer::ConsumeErrLayer,
    rt::Executor,
    tcp::server::TcpListener,
};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use regate::{
    config::Config,
    policy::WhitelistPolicy,
    proxy::{RegistryProxy, image::{API_PREFIX, RepositoryName}},
    upstream::RamaTransport,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Read-only allow-listed Docker registry proxy")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the registry proxy server
    Serve {
        /// Path to the configuration file
        #[arg(long, default_value = "regate.toml")]
        config: PathBuf,
    },
    /// Perform a health check against a running proxy
    Health {
        /// URL of the health endpoint (defaults to local proxy)
        #[arg(long, default_value = "http://127.0.0.1:8080/version")]
        url: String,
        /// Timeout in seconds for the request
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
    /// Report whether a repository would be allowed by the whitelist
    Check {
        /// Repository name (`library/nginx`) or request path (`/v2/library/nginx/manifests/latest`)
        repository: String,
        /// Path to the configuration file
        #[arg(long, default_value = "regate.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => run_server(config),
        Command::Health { url, timeout } => run_health(url, timeout),
        Command::Check { repository, config } => run_check(repository, config),
    }
}

fn run_server(config_path: PathBuf) -> Result<()> {
    let config =
        Arc::new(Config::load(Some(config_path.clone())).context("loading configuration")?);
    config.validate().context("validating configuration")?;
    init_tracing(&config)?;
    if config.source.is_none() {
        tracing::warn!(
            path = %config_path.display(),
            "configuration file not found, using defaults"
        );
    }

    let transport = Arc::new(RamaTransport::new());
    let proxy = RegistryProxy::new(config.as_ref(), transport).context("creating proxy service")?;

    let rt_server = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers)
        .enable_all()
        .build()
        .context("constructing server runtime")?;

    rt_server.block_on(async move {
        let graceful = Shutdown::default();
        let addr = config.server.bind_addr();

        let tcp_service = TcpListener::build()
            .bind(addr.clone())
            .await
            .map_err(|err| anyhow::anyhow!("binding {addr}: {err}"))?;

        tracing::info!(%addr, "starting Rama HTTP server");

        graceful.spawn_task_fn(move |guard| {
            async move {
                let exec = Executor::graceful(guard.clone());
                let http_service = HttpServer::auto(exec).service(
                    (TraceLayer::new_for_http(), ConsumeErrLayer::default()).into_layer(proxy),
                );

                tcp_service.serve_graceful(guard, http_service).await;
            }
        });

        tokio::signal::ctrl_c()
            .await
            .context("listening for shutdown signal")?;
        tracing::info!("shutdown requested");

        graceful
            .shutdown_with_limit(config.server.shutdown_timeout())
            .await?;

        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

fn run_health(url: String, timeout: u64) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .context("building health check client")?;

    let response = client
        .get(&url)
        .send()
        .context("sending health check request")?;

    if response.status().is_success() {
        println!("regate healthy: {}", response.status());
        Ok(())
    } else {
        bail!("health endpoint returned status {}", response.status());
    }
}

fn run_check(repository: String, config_path: PathBuf) -> Result<()> {
    let config = Config::load(Some(config_path.clone())).context("loading configuration")?;
    config.validate().context("validating configuration")?;
    if config.source.is_none() {
        eprintln!("{} not found, using defaults", config_path.display());
    }

    let name = if repository.starts_with(API_PREFIX) {
        RepositoryName::from_path(&repository).to_string()
    } else {
        repository
    };

    let policy = WhitelistPolicy::from_config(&config.policy);
    if policy.is_allowed(&name) {
        println!("allowed: {name}");
        Ok(())
    } else {
        println!("denied: {name}");
        println!("whitelist: {}", policy.entries().join(", "));
        bail!("repository {name} is not in whitelist");
    }
}

fn init_tracing(config: &Config) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
        .context("building log filter")?;

    let fmt_layer = if config.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_ansi(config.logging.ansi)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}
