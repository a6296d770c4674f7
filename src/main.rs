//! ScalePolicy Kubernetes Operator
//!
//! Watches `ScalePolicy` resources and horizontally scales their targets.
//!
//! ## Usage
//!
//! ```bash
//! # Run the operator (requires kubeconfig)
//! scalepolicy-operator
//!
//! # Run with custom log level
//! RUST_LOG=debug scalepolicy-operator
//! ```

use clap::Parser;
use kube::Client;
use scalepolicy_operator::{MetricClient, ScalePolicyController};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// ScalePolicy Kubernetes Operator
#[derive(Parser, Debug)]
#[command(name = "scalepolicy-operator")]
#[command(version, about = "Kubernetes operator for horizontal replica scaling")]
struct Args {
    /// Namespace to watch (empty for all namespaces)
    #[arg(long, default_value = "")]
    namespace: String,

    /// Base URL of the Prometheus instance answering metric queries
    #[arg(
        long,
        default_value = "http://prometheus.monitoring.svc.cluster.local:9090"
    )]
    prometheus_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let args = Args::parse();

    info!("Starting ScalePolicy operator");
    info!(
        "Watching namespace: {}",
        if args.namespace.is_empty() {
            "all"
        } else {
            &args.namespace
        }
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    let namespace = (!args.namespace.is_empty()).then(|| args.namespace.clone());
    let metric_client = MetricClient::new(&args.prometheus_url);
    let controller = Arc::new(ScalePolicyController::new(client, metric_client, namespace));

    controller.run().await?;

    info!("ScalePolicy operator shutting down");
    Ok(())
}
