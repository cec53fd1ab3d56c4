// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use axum::{http::StatusCode, routing::get, Router};
use clap::Parser;
use futures::TryStreamExt;
use kube::{
    runtime::{watcher, WatchStreamExt},
    Api, Client,
};
use sqs_queue_operator::{
    config::{ControllerConfig, LogFormat, QueueBackend},
    constants::{
        HEALTH_SERVER_PATH, METRICS_SERVER_BIND_ADDRESS, METRICS_SERVER_PATH, TOKIO_WORKER_THREADS,
    },
    crd::Queue,
    metrics,
    reconcilers::{reason_for_event, reason_for_relist, QueueReconciler},
    scheduler::{QueueKey, ReconcileReason, Scheduler},
    sqs::{DeadlineQueueService, MemoryQueueService, QueueService, SqsQueueService},
    store::{KubeQueueStore, QueueStore},
};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = ControllerConfig::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("sqs-queue-operator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_logging(format: LogFormat) {
    // Respects RUST_LOG if set, otherwise defaults to INFO level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        LogFormat::Text => {
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
}

async fn async_main(config: ControllerConfig) -> Result<()> {
    init_logging(config.log_format);

    info!("Starting SQS Queue Operator");
    debug!(?config, "Configuration loaded");

    debug!("Initializing Kubernetes client");
    let client = Client::try_default().await?;
    debug!("Kubernetes client initialized successfully");

    let service = build_queue_service(&config).await;
    let store: Arc<dyn QueueStore> = Arc::new(KubeQueueStore::new(
        client.clone(),
        config.watch_namespace.clone(),
    ));
    let reconciler = QueueReconciler::new(store.clone(), service);
    let scheduler = Scheduler::new(config.backoff_policy());

    let workers = {
        let scheduler = scheduler.clone();
        let count = config.workers;
        tokio::spawn(async move {
            scheduler
                .run(count, move |request| {
                    let reconciler = reconciler.clone();
                    async move { reconciler.reconcile(request).await }
                })
                .await;
        })
    };
    let resync = scheduler.spawn_resync(store, config.resync_interval());

    let api: Api<Queue> = match &config.watch_namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };

    info!("Starting Queue controller");

    // The watcher and metrics server should never exit - if one does, stop the process
    let result = tokio::select! {
        result = run_watcher(api, scheduler.clone()) => {
            error!("CRITICAL: Queue watcher exited unexpectedly: {:?}", result);
            result.and_then(|()| Err(anyhow::anyhow!("Queue watcher exited unexpectedly without error")))
        }
        result = run_metrics_server(config.metrics_port) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result.and_then(|()| Err(anyhow::anyhow!("Metrics server exited unexpectedly without error")))
        }
        result = shutdown_signal() => {
            result.map(|()| info!("Shutdown signal received, draining reconcile workers"))
        }
    };

    resync.abort();
    scheduler.shutdown();
    if let Err(e) = workers.await {
        warn!("Reconcile workers did not stop cleanly: {e}");
    }
    info!("SQS Queue Operator stopped");

    result
}

/// Build the remote queue service selected by the configuration, bounded by the call deadline
async fn build_queue_service(config: &ControllerConfig) -> Arc<dyn QueueService> {
    let deadline = config.remote_timeout();
    match config.queue_backend {
        QueueBackend::Sqs => {
            info!("Using Amazon SQS backend");
            let sqs =
                SqsQueueService::from_env(config.region.clone(), config.endpoint_url.clone()).await;
            Arc::new(DeadlineQueueService::new(sqs, deadline))
        }
        QueueBackend::Memory => {
            warn!("Using in-memory queue backend; queues do not outlive the process");
            let memory = MemoryQueueService::new(config.memory_region());
            Arc::new(DeadlineQueueService::new(memory, deadline))
        }
    }
}

/// Watch `Queue` objects and turn every relevant change into a reconcile request
async fn run_watcher(api: Api<Queue>, scheduler: Scheduler) -> Result<()> {
    debug!("Initializing Queue watcher");

    watcher(api, watcher::Config::default())
        .default_backoff()
        .map_err(anyhow::Error::from)
        .try_for_each(|event| {
            match event {
                watcher::Event::Apply(queue) => {
                    if let Some(reason) = reason_for_event(&queue) {
                        scheduler.enqueue(QueueKey::from_queue(&queue), reason);
                    }
                }
                watcher::Event::InitApply(queue) => {
                    scheduler.enqueue(QueueKey::from_queue(&queue), reason_for_relist(&queue));
                }
                watcher::Event::Delete(queue) => {
                    scheduler.enqueue(QueueKey::from_queue(&queue), ReconcileReason::Delete);
                }
                watcher::Event::Init => debug!("Queue watcher (re)listing"),
                watcher::Event::InitDone => info!("Queue watcher initial list complete"),
            }
            futures::future::ready(Ok(()))
        })
        .await
        .context("Queue watch stream failed")
}

/// Serve Prometheus metrics and a liveness endpoint
async fn run_metrics_server(port: u16) -> Result<()> {
    let app = Router::new()
        .route(
            METRICS_SERVER_PATH,
            get(|| async {
                metrics::gather_metrics().map_err(|e| {
                    error!("Failed to encode metrics: {e}");
                    StatusCode::INTERNAL_SERVER_ERROR
                })
            }),
        )
        .route(HEALTH_SERVER_PATH, get(|| async { "ok" }));

    let address = format!("{METRICS_SERVER_BIND_ADDRESS}:{port}");
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind metrics server to {address}"))?;
    info!("Serving metrics on {address}{METRICS_SERVER_PATH}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn shutdown_signal() -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
