//! Fusion Access Reconciler
//!
//! Watches nodes, LocalVolumeDiscoveryResults and LocalDisks, keeps the
//! shared LUN candidates and storage-role selection current, and serves
//! them over a REST API.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   snapshots   ┌──────────────────┐   REST   ┌─────────────┐
//! │   Watchers   │ ────────────► │  Storage Console │ ◄──────► │  API Server │
//! └──────────────┘               └────────┬─────────┘          └─────────────┘
//!                                         │ patch / create
//!                                ┌────────▼─────────┐
//!                                │   Kube Gateway   │
//!                                └──────────────────┘
//! ```

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fusion_access_reconciler::{
    spawn_watchers, ApiServer, ApiServerConfig, ConsoleConfig, Error, KubeGateway, LabelPair,
    Result, StorageConsole,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Fusion Access Reconciler - shared LUN discovery and storage node selection
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// REST API bind address
    #[arg(long, env = "API_ADDR", default_value = "0.0.0.0:8090")]
    api_addr: String,

    /// Health server bind address
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8081")]
    health_addr: String,

    /// Metrics server bind address
    #[arg(long, env = "METRICS_ADDR", default_value = "0.0.0.0:8080")]
    metrics_addr: String,

    /// YAML configuration file; flags below override it
    #[arg(long, env = "CONFIG")]
    config: Option<PathBuf>,

    /// Namespace holding discovery results, LocalDisks and claims
    #[arg(long, env = "NAMESPACE")]
    namespace: Option<String>,

    /// Storage role label (key=value)
    #[arg(long, env = "STORAGE_ROLE_LABEL")]
    storage_role_label: Option<String>,

    /// Label selector for storage-eligible nodes
    #[arg(long, env = "WORKER_NODE_SELECTOR")]
    worker_node_selector: Option<String>,

    /// Minimum number of storage nodes
    #[arg(long, env = "MIN_STORAGE_NODES")]
    min_storage_nodes: Option<usize>,

    /// Minimum number of shared disks
    #[arg(long, env = "MIN_SHARED_DISKS")]
    min_shared_disks: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let config = load_config(&args)?;

    info!("Starting Fusion Access Reconciler");
    info!("  Version: {}", fusion_access_reconciler::VERSION);
    info!("  REST API: {}", args.api_addr);
    info!("  Namespace: {}", config.namespace);
    info!("  Storage role label: {}", config.storage_role_label);
    info!(
        "  Minimum requirements: {} nodes, {} shared disks",
        config.requirements.min_nodes, config.requirements.min_shared_disks
    );

    let client = kube::Client::try_default().await?;
    let gateway = Arc::new(KubeGateway::new(client.clone(), config.namespace.clone()));
    let console = StorageConsole::new(config, gateway)?;

    let token = CancellationToken::new();
    let watchers = spawn_watchers(client, console.clone(), token.clone());

    // Start health server
    let health_addr = args.health_addr.clone();
    let health_console = console.clone();
    tokio::spawn(async move {
        if let Err(e) = run_health_server(&health_addr, health_console).await {
            error!("Health server error: {}", e);
        }
    });

    // Start metrics server
    let metrics_addr = args.metrics_addr.clone();
    let metrics_console = console.clone();
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(&metrics_addr, metrics_console).await {
            error!("Metrics server error: {}", e);
        }
    });

    let api_config = ApiServerConfig {
        rest_addr: args.api_addr.parse().map_err(|e| {
            Error::Configuration(format!("Invalid REST API address: {}", e))
        })?,
    };
    let api_server = ApiServer::new(api_config, console);

    // Shut everything down on Ctrl-C
    let shutdown = api_server.shutdown_handle();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received");
        signal_token.cancel();
        let _ = shutdown.send(());
    });

    api_server.run().await?;

    token.cancel();
    futures::future::join_all(watchers).await;

    info!("Reconciler shutdown complete");
    Ok(())
}

// =============================================================================
// Configuration
// =============================================================================

fn load_config(args: &Args) -> Result<ConsoleConfig> {
    let mut config = match &args.config {
        Some(path) => ConsoleConfig::from_yaml_file(path)?,
        None => ConsoleConfig::default(),
    };

    if let Some(namespace) = &args.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(label) = &args.storage_role_label {
        config.storage_role_label = LabelPair::parse(label)?;
    }
    if let Some(selector) = &args.worker_node_selector {
        config.worker_node_selector = selector.clone();
    }
    if let Some(min_nodes) = args.min_storage_nodes {
        config.requirements.min_nodes = min_nodes;
    }
    if let Some(min_disks) = args.min_shared_disks {
        config.requirements.min_shared_disks = min_disks;
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = ["hyper=warn", "kube=info", "tower=warn", "axum=info"]
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(
            EnvFilter::from_default_env().add_directive(level.into()),
            |filter, directive| filter.add_directive(directive),
        );

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// Health Server
// =============================================================================

fn text_response(
    status: hyper::StatusCode,
    body: impl Into<hyper::Body>,
) -> hyper::Response<hyper::Body> {
    let mut response = hyper::Response::new(body.into());
    *response.status_mut() = status;
    response
}

async fn run_health_server(addr: &str, console: Arc<StorageConsole>) -> Result<()> {
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let console = console.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let console = console.clone();
                async move {
                    let response = match req.uri().path() {
                        "/healthz" | "/livez" => text_response(StatusCode::OK, "ok"),
                        "/readyz" if console.is_loaded() => text_response(StatusCode::OK, "ok"),
                        "/readyz" => {
                            text_response(StatusCode::SERVICE_UNAVAILABLE, "watches not loaded")
                        }
                        _ => text_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Internal(format!("Invalid health server address: {}", e))
    })?;

    info!("Health server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Health server error: {}", e)))?;

    Ok(())
}

// =============================================================================
// Metrics Server
// =============================================================================

async fn run_metrics_server(addr: &str, console: Arc<StorageConsole>) -> Result<()> {
    use hyper::header::CONTENT_TYPE;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, Server, StatusCode};

    let make_svc = make_service_fn(move |_conn| {
        let console = console.clone();
        async move {
            Ok::<_, std::convert::Infallible>(service_fn(move |req: Request<Body>| {
                let console = console.clone();
                async move {
                    let response = match req.uri().path() {
                        "/metrics" => match console.metrics().encode() {
                            Ok((content_type, buffer)) => {
                                let mut response = text_response(StatusCode::OK, buffer);
                                if let Ok(value) = content_type.parse() {
                                    response.headers_mut().insert(CONTENT_TYPE, value);
                                }
                                response
                            }
                            Err(e) => text_response(
                                StatusCode::INTERNAL_SERVER_ERROR,
                                format!("failed to encode metrics: {}", e),
                            ),
                        },
                        _ => text_response(StatusCode::NOT_FOUND, "not found"),
                    };
                    Ok::<_, std::convert::Infallible>(response)
                }
            }))
        }
    });

    let addr: SocketAddr = addr.parse().map_err(|e| {
        Error::Internal(format!("Invalid metrics server address: {}", e))
    })?;

    info!("Metrics server listening on {}", addr);
    Server::bind(&addr)
        .serve(make_svc)
        .await
        .map_err(|e| Error::Internal(format!("Metrics server error: {}", e)))?;

    Ok(())
}
