//! `ackwire` server binary.
//!
//! Serves an echo service, a demo long-running task service and the task
//! status/cancel services until Ctrl+C.

mod cli;

use std::{error::Error, sync::Arc, thread, time::Duration};

use ackwire::{
    config::ServerConfig,
    frame::{Body, Frame},
    router::{ServiceError, ServiceRouter},
    server::Server,
    services::TaskServices,
    task::{TaskError, TaskManager},
};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Echoes the request body back.
const ECHO_SERVICE: u16 = 1;
/// Starts a demo background task reporting progress in steps.
const DEMO_TASK_SERVICE: u16 = 3000;

const DEMO_STEP: Duration = Duration::from_millis(200);
const DEMO_MAX_STEPS: u64 = 100;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = cli::Cli::parse();
    let config = server_config(&cli);
    let tasks = Arc::new(TaskManager::new(config.workers)?);
    let router = build_router(&tasks)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async {
        install_metrics(&cli)?;
        Server::new(config, router)
            .bind(config.listen)?
            .run()
            .await
            .map_err(Box::<dyn Error>::from)
    });

    tasks.shutdown();
    result
}

fn server_config(cli: &cli::Cli) -> ServerConfig {
    ServerConfig::default()
        .with_listen(cli.listen())
        .with_heartbeat_interval(Duration::from_millis(cli.heartbeat_interval_ms))
        .with_heartbeat_timeout(Duration::from_millis(cli.heartbeat_timeout_ms))
        .with_max_retries(cli.max_retries)
        .with_retransmit_interval(Duration::from_millis(cli.retransmit_interval_ms))
        .with_workers(cli.workers)
}

fn build_router(tasks: &Arc<TaskManager>) -> Result<ServiceRouter, Box<dyn Error>> {
    let demo = Arc::clone(tasks);
    let mut router = ServiceRouter::new()
        .route(ECHO_SERVICE, |_, frame: &Frame| Ok(frame.body.clone()))?
        .route(DEMO_TASK_SERVICE, move |_, frame: &Frame| submit_demo(&demo, frame))?;
    TaskServices::new(Arc::clone(tasks)).register(&mut router)?;
    Ok(router)
}

fn submit_demo(tasks: &TaskManager, frame: &Frame) -> Result<Body, ServiceError> {
    let steps = frame
        .body
        .get("steps")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(10)
        .clamp(1, DEMO_MAX_STEPS);
    let owner = frame
        .body
        .get("userId")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or_default();

    let handle = tasks
        .submit("demo", owner, move |ctx| {
            for step in 1..=steps {
                thread::sleep(DEMO_STEP);
                let percent = i64::try_from(step * 100 / steps).map_err(|e| TaskError::failed(e.to_string()))?;
                ctx.report_progress(percent, &format!("step {step} of {steps}"));
            }
            Ok(format!("finished {steps} steps"))
        })
        .map_err(|err| ServiceError::Failed(err.to_string()))?;

    Ok(Body::new()
        .with("success", true)
        .with("taskId", handle.id().as_str()))
}

#[cfg(feature = "metrics")]
fn install_metrics(cli: &cli::Cli) -> Result<(), Box<dyn Error>> {
    if let Some(addr) = cli.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        tracing::info!(%addr, "serving metrics");
    }
    Ok(())
}

#[cfg(not(feature = "metrics"))]
fn install_metrics(cli: &cli::Cli) -> Result<(), Box<dyn Error>> {
    if cli.metrics_addr.is_some() {
        tracing::warn!("--metrics-addr ignored: built without the metrics feature");
    }
    Ok(())
}
