use crate::channels::{self, Channel};
use crate::config::Config;
use crate::heartbeat::HeartbeatReporter;
use crate::memory::ConversationMemory;
use crate::observability::{
    self, MultiObserver, Observer, ObserverEvent, ObserverMetric, SqliteObserver,
};
use crate::providers::{self, Provider};
use crate::rag::RetrievalEngine;
use crate::store::{SqliteStore, Store};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

use super::processor::MessageProcessor;

#[allow(clippy::too_many_lines)]
pub async fn run(
    config: Config,
    provider_override: Option<String>,
    model_override: Option<String>,
) -> Result<()> {
    // ── Wire up storage and telemetry ────────────────────────────
    let db_path = config.db_path();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(&db_path)?);

    let observer: Arc<dyn Observer> = Arc::new(MultiObserver::new(vec![
        observability::create_observer(&config.observability),
        Box::new(SqliteObserver::new(&db_path)?),
    ]));
    tracing::info!(backend = store.name(), "Store initialized");

    // ── Resolve provider ─────────────────────────────────────────
    let provider_name = provider_override
        .as_deref()
        .or(config.default_provider.as_deref())
        .unwrap_or("groq");

    let model_name = model_override
        .as_deref()
        .or(config.default_model.as_deref())
        .unwrap_or("llama-3.3-70b-versatile");

    let provider: Arc<dyn Provider> =
        Arc::from(providers::create_provider(provider_name, config.api_key.as_deref())?);

    if let Err(error) = provider.warmup().await {
        // Run anyway; per-message handling turns this into a visible
        // setup notice for whoever talks to the agent.
        observer.record_event(&ObserverEvent::Warning {
            component: "provider".into(),
            message: format!("provider not ready: {error}"),
        });
    }

    observer.record_event(&ObserverEvent::AgentStart {
        provider: provider_name.to_string(),
        model: model_name.to_string(),
    });
    let start = Instant::now();

    // ── Channel ──────────────────────────────────────────────────
    let channel: Arc<dyn Channel> = Arc::from(channels::create_channel(&config)?);
    observer.record_event(&ObserverEvent::ChannelReady {
        channel: channel.name().to_string(),
    });

    // ── Heartbeat ────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let heartbeat_handle = if config.heartbeat.enabled {
        let reporter = HeartbeatReporter::new(
            store.clone(),
            observer.clone(),
            config.heartbeat.interval_secs,
        );
        Some(tokio::spawn(async move {
            reporter.run(shutdown_rx).await;
        }))
    } else {
        None
    };

    // ── Reply pipeline ───────────────────────────────────────────
    let processor = Arc::new(MessageProcessor {
        store: store.clone(),
        provider: provider.clone(),
        channel: channel.clone(),
        retrieval: RetrievalEngine::new(store.clone(), observer.clone(), config.retrieval.limit),
        memory: ConversationMemory::new(
            store.clone(),
            provider.clone(),
            observer.clone(),
            model_name,
            config.default_temperature,
            config.memory.summary_max_chars,
        ),
        observer: observer.clone(),
        model: model_name.to_string(),
        temperature: config.default_temperature,
    });

    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    let listener_channel = channel.clone();
    let listen_handle = tokio::spawn(async move {
        if let Err(e) = listener_channel.listen(tx).await {
            tracing::error!("Channel listener stopped: {e}");
        }
    });

    // One task per message; slow replies never block fast ones.
    let mut tasks: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            maybe_message = rx.recv() => {
                let Some(message) = maybe_message else {
                    break;
                };

                while tasks.try_join_next().is_some() {}

                let task_processor = processor.clone();
                tasks.spawn(async move {
                    task_processor.handle(message).await;
                });
                observer.record_metric(&ObserverMetric::InFlightMessages(tasks.len() as u64));
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                break;
            }
        }
    }

    // ── Graceful shutdown: stop intake, drain, mark offline ──────
    listen_handle.abort();
    drop(rx);

    while tasks.join_next().await.is_some() {}

    let _ = shutdown_tx.send(true);
    if let Some(handle) = heartbeat_handle {
        let _ = handle.await;
    }

    observer.record_event(&ObserverEvent::AgentEnd {
        duration: start.elapsed(),
    });
    observer.flush();

    Ok(())
}
