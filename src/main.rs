// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use kube::Client;
use kubedns::{
    admin::{self, AdminState},
    config::Config,
    constants::DEFAULT_ZONE,
    mirror::ClusterMirror,
    resolver::ResolutionEngine,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Time allowed for the admin server to drain after shutdown
const ADMIN_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Kubernetes service discovery backend for DNS servers
#[derive(Parser, Debug)]
#[command(name = "kubedns", version, about)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "KUBEDNS_CONFIG")]
    config: Option<PathBuf>,

    /// Zone to serve (repeatable); overrides the zones of the configuration file
    #[arg(long = "zone")]
    zones: Vec<String>,

    /// Namespace to serve (repeatable); overrides the namespace allow-list
    #[arg(long = "namespace")]
    namespaces: Vec<String>,

    /// Label template, e.g. `${service}.${namespace}.${zone}`
    #[arg(long)]
    template: Option<String>,

    /// Seconds between full re-lists
    #[arg(long)]
    resync_period_secs: Option<u64>,

    /// Mirror only this namespace
    #[arg(long)]
    watch_namespace: Option<String>,

    /// Label selector applied to List and Watch calls
    #[arg(long)]
    label_selector: Option<String>,

    /// Listen address of the admin HTTP server
    #[arg(long)]
    admin_addr: Option<SocketAddr>,
}

impl Cli {
    /// Load the configuration file (if any) and apply command-line overrides.
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => Config::default(),
        };

        if !self.zones.is_empty() {
            config.zones.clone_from(&self.zones);
        }
        if !self.namespaces.is_empty() {
            config.namespaces = Some(self.namespaces.clone());
        }
        if let Some(template) = &self.template {
            config.template.clone_from(template);
        }
        if let Some(secs) = self.resync_period_secs {
            config.resync_period_secs = secs;
        }
        if self.watch_namespace.is_some() {
            config.watch_namespace.clone_from(&self.watch_namespace);
        }
        if self.label_selector.is_some() {
            config.label_selector.clone_from(&self.label_selector);
        }
        if let Some(addr) = self.admin_addr {
            config.admin_addr = addr;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("kubedns")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Initialize logging with custom format
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug kubedns --zone cluster.local
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json kubedns
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting kubedns");

    let config = cli.load_config()?;
    let zones = config
        .zone_config(&[DEFAULT_ZONE.to_string()])
        .context("Invalid zone configuration")?;
    let mirror_config = config.mirror_config();
    info!(
        zones = ?zones.zones(),
        namespaces = ?zones.namespaces(),
        template = %zones.template(),
        resync_period = ?mirror_config.resync_period,
        "Configuration loaded"
    );

    debug!("Initializing Kubernetes client");
    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    debug!("Kubernetes client initialized successfully");

    let mirror = Arc::new(ClusterMirror::from_client(client, &mirror_config));
    mirror.run();

    let engine = Arc::new(ResolutionEngine::new(Arc::clone(&mirror), zones));
    let admin_server = tokio::spawn(admin::serve(config.admin_addr, AdminState::new(engine)));

    let mut stopped = mirror.shutdown_signal();
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl-c")?;
            info!("Received SIGINT, initiating graceful shutdown");
        }
        result = wait_for_sigterm() => {
            result?;
            info!("Received SIGTERM (pod termination), initiating graceful shutdown");
        }
        () = stopped.wait() => {
            info!("Shutdown requested through admin server");
        }
    }

    if let Err(e) = mirror.stop() {
        debug!(error = %e, "Mirror already stopping");
    }

    match tokio::time::timeout(ADMIN_DRAIN_TIMEOUT, admin_server).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => error!(error = %e, "Admin server failed"),
        Ok(Err(e)) => error!(error = %e, "Admin server task panicked"),
        Err(_) => warn!("Admin server did not stop in time"),
    }

    info!("Graceful shutdown completed successfully");
    Ok(())
}

/// Resolve on SIGTERM; never resolves on platforms without it.
async fn wait_for_sigterm() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        sigterm.recv().await;
        Ok(())
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
        Ok(())
    }
}
