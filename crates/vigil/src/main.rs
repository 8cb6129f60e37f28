//! Process entry point: an HTTP server mode serving the REST surface
//! (spec §6) and a queue worker mode draining the asynchronous analysis
//! path (spec §4.8). Bootstrap is grounded in the teacher's
//! `dashflow-prometheus-exporter::main` shape — `tracing_subscriber` init,
//! an explicit `Registry`, and a ctrl-c/SIGTERM shutdown future fed to
//! whichever mode is running.

mod config;
mod context;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use config::Config;
use context::ServiceContext;
use vigil_core::model::AnalysisInputs;
use vigil_core::workflow::{run_session, EventBus};
use vigil_core::{ErrorPayload, VigilError};
use vigil_queue::{AnalysisConsumer, DlqPublisher, QueuePublisher, WorkflowOutcome};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Counterparty risk analysis engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API (spec §6).
    Serve,
    /// Run the queue consumer that drains the async analysis path (spec §4.8).
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        // No .env file present; environment variables are the only source.
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Worker => worker(config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let ctx = ServiceContext::build(&config).await?;

    let queue_publisher = if config.queue_enabled {
        Some(Arc::new(QueuePublisher::new(config.queue.clone())?))
    } else {
        info!("KAFKA_BROKERS not set; the async analysis path is disabled");
        None
    };

    let state = vigil_api::AppState::new(
        ctx.deps,
        ctx.workflow_config,
        ctx.http,
        ctx.metrics_registry,
        queue_publisher,
        config.admin_token.clone(),
    );
    let app = vigil_api::build_router(state);

    let addr = std::net::SocketAddr::new(config.bind_ip, config.bind_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "vigil REST API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}

/// Drains `analysis_queue`, running each [`AnalysisTask`](vigil_core::model::AnalysisTask)
/// through the same workflow state machine the synchronous route drives,
/// and publishes the outcome to `analysis_results` (spec §4.8).
async fn worker(config: Config) -> anyhow::Result<()> {
    if !config.queue_enabled {
        anyhow::bail!("KAFKA_BROKERS must be set to run the queue worker");
    }

    let ctx = ServiceContext::build(&config).await?;
    let publisher = Arc::new(QueuePublisher::new(config.queue.clone())?);
    let dlq_producer: rdkafka::producer::FutureProducer = rdkafka::config::ClientConfig::new()
        .set("bootstrap.servers", &config.queue.brokers)
        .set("message.timeout.ms", config.queue.send_timeout.as_millis().to_string())
        .create()
        .context("failed to create dead-letter producer")?;
    let dlq = Arc::new(DlqPublisher::new(dlq_producer, &config.queue));

    let consumer = AnalysisConsumer::new(config.queue.clone(), publisher, dlq)
        .context("failed to start analysis consumer")?;

    let deps = ctx.deps.clone();
    let workflow_config = ctx.workflow_config.clone();
    let repository = ctx.deps.repository.clone();

    info!("vigil queue worker started");
    consumer
        .run(
            move |task| {
                let deps = deps.clone();
                let workflow_config = workflow_config.clone();
                let repository = repository.clone();
                async move { run_task(task, deps, workflow_config, repository).await }
            },
            Box::pin(shutdown_signal()),
        )
        .await;

    info!("vigil queue worker stopped");
    Ok(())
}

/// Runs one dequeued [`AnalysisTask`](vigil_core::model::AnalysisTask) to
/// completion, mirroring `routes::agent::analyze_client`'s synchronous path,
/// and keeps `task:{task_id}`'s cache-space status entry (spec §6.1's
/// `GET /agent/task/{task_id}`) current across the pending -> completed/failed
/// transition.
async fn run_task(
    task: vigil_core::model::AnalysisTask,
    deps: Arc<vigil_core::workflow::WorkflowDeps>,
    workflow_config: Arc<vigil_core::workflow::WorkflowConfig>,
    repository: Arc<dyn vigil_core::traits::Repository>,
) -> std::result::Result<WorkflowOutcome, VigilError> {
    let task_cache_key = format!("task:{}", task.task_id);
    let _ = repository
        .cache_set_with_ttl(
            &task_cache_key,
            serde_json::json!({ "status": vigil_core::model::TaskStatus::Processing }),
            86_400,
            "async_task_status",
        )
        .await;

    let inputs = AnalysisInputs { client_name: task.client_name, inn: task.inn, notes: task.notes };
    let cancel = std::sync::atomic::AtomicBool::new(false);
    let bus = EventBus::default();
    let final_state = run_session(task.task_id.clone(), inputs, &deps, &workflow_config, &bus, &cancel).await;

    let outcome = match final_state.report {
        Some(report) => {
            let _ = repository
                .cache_set_with_ttl(
                    &task_cache_key,
                    serde_json::json!({ "status": vigil_core::model::TaskStatus::Completed }),
                    86_400,
                    "async_task_status",
                )
                .await;
            WorkflowOutcome::Completed(report)
        }
        None => {
            let payload = final_state
                .error
                .unwrap_or_else(|| ErrorPayload::from_error(&VigilError::InternalError("workflow produced no report".into()), None));
            let _ = repository
                .cache_set_with_ttl(
                    &task_cache_key,
                    serde_json::json!({ "status": vigil_core::model::TaskStatus::Failed, "error": payload }),
                    86_400,
                    "async_task_status",
                )
                .await;
            WorkflowOutcome::Failed(payload)
        }
    };

    Ok(outcome)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => error!("failed to listen for SIGTERM: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_parses_known_subcommands() {
        let cli = Cli::try_parse_from(["vigil", "serve"]).expect("parse serve");
        assert!(matches!(cli.command, Commands::Serve));

        let cli = Cli::try_parse_from(["vigil", "worker"]).expect("parse worker");
        assert!(matches!(cli.command, Commands::Worker));
    }

    #[test]
    fn clap_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["vigil", "bogus"]).is_err());
    }
}
