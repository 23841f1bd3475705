//! # GitGlide Service
//!
//! Binary entry point for the GitGlide auto-remediation service.
//!
//! This executable:
//! - Loads configuration from files and environment
//! - Initializes structured logging
//! - Wires storage, queue and upstream clients
//! - Runs the remediation worker and the stale log sweeper
//! - Serves the HTTP API until SIGINT or SIGTERM

mod backends;

use gitglide_api::{
    shutdown_signal, start_server, AppState, ServiceConfig, ServiceError, ServiceMetrics,
};
use gitglide_core::StaleLogSweeper;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let service_config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load service configuration: {e}");
            std::process::exit(3);
        }
    };

    init_tracing(&service_config);
    info!("Starting GitGlide Service");

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }
    if service_config.autofix.public_base_url.is_none() {
        warn!("autofix.public_base_url is not set; enabling auto-fix will fail");
    }

    let backends = match backends::build_backends(&service_config).await {
        Ok(backends) => backends,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to initialize backends; aborting");
            std::process::exit(3);
        }
    };

    let metrics = match ServiceMetrics::new() {
        Ok(metrics) => metrics,
        Err(e) => {
            error!(error = %e, "Failed to register metrics; aborting");
            std::process::exit(3);
        }
    };

    // -------------------------------------------------------------------------
    // Background tasks
    //
    // Both tasks watch the same channel and stop once the HTTP server has
    // drained.
    // -------------------------------------------------------------------------
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker = backends.worker(&service_config, metrics.clone());
    let worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));

    let workflow = &service_config.workflow;
    let sweeper = StaleLogSweeper::new(
        backends.logs.clone(),
        Duration::from_secs(workflow.stale_after_seconds),
    );
    let sweeper_handle = tokio::spawn(sweeper.run(
        Duration::from_secs(workflow.sweep_interval_seconds),
        shutdown_rx,
    ));

    let shutdown_timeout = Duration::from_secs(service_config.server.shutdown_timeout_seconds);
    let state = AppState::new(service_config, &backends, metrics);

    let server_result = start_server(state, shutdown_signal()).await;

    let _ = shutdown_tx.send(true);
    let drained = tokio::time::timeout(shutdown_timeout, async {
        let _ = worker_handle.await;
        let _ = sweeper_handle.await;
    })
    .await;
    if drained.is_err() {
        warn!(
            timeout_secs = shutdown_timeout.as_secs(),
            "Background tasks did not stop before the shutdown timeout"
        );
    }

    if let Err(e) = server_result {
        error!("Server failed: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };
        std::process::exit(exit_code);
    }

    info!("GitGlide Service stopped");
}

/// Load configuration
///
/// Sources, later overriding earlier:
///  1. /etc/gitglide/service.yaml
///  2. ./config/service.yaml
///  3. The file named by GITGLIDE_CONFIG_FILE
///  4. Environment variables prefixed GITGLIDE__, e.g.
///     GITGLIDE__SERVER__PORT=9090 sets server.port
///
/// Every field has a default, so a missing file is not an error. A malformed
/// file or an uncoercible variable is.
fn load_config() -> Result<ServiceConfig, config::ConfigError> {
    let mut builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/gitglide/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    if let Ok(explicit_path) = std::env::var("GITGLIDE_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            builder = builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }
    }

    builder
        .add_source(config::Environment::with_prefix("GITGLIDE").separator("__"))
        .build()?
        .try_deserialize()
}

fn init_tracing(config: &ServiceConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "gitglide_service={level},gitglide_api={level},gitglide_core={level},tower_http=debug",
            level = config.logging.level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json_format {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
