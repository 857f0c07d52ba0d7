//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{error, info};

use super::TimerRegistry;
use crate::{
    config::EngineConfig,
    services::{ActivitySink, QueuedStore, TimerStore},
    tasks::{
        escalation_task, spawn_idle_detector, ticker_task, EscalationCoordinator, IdleEvent,
        IdleHandle, TickSnapshot,
    },
    utils::Clock,
};

/// Shared engine state plus the handles of its background tasks
#[derive(Debug)]
pub struct AppState {
    pub config: EngineConfig,
    pub registry: Arc<TimerRegistry>,
    pub coordinator: Arc<EscalationCoordinator>,
    pub idle: IdleHandle,
    /// Idle transitions, for extra subscribers beyond the coordinator
    pub idle_events_tx: broadcast::Sender<IdleEvent>,
    /// Latest display tick
    pub ticks_tx: watch::Sender<TickSnapshot>,
    /// Keep the receiver alive so the ticker keeps publishing
    pub _ticks_rx: watch::Receiver<TickSnapshot>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    store: Arc<QueuedStore>,
    tasks: Mutex<Option<EngineTasks>>,
}

#[derive(Debug)]
struct EngineTasks {
    detector: JoinHandle<()>,
    escalation: JoinHandle<()>,
    ticker: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl AppState {
    /// Build the engine and spawn its tasks. Must run inside a tokio runtime.
    pub fn start(
        config: EngineConfig,
        store: Arc<dyn TimerStore>,
        sink: Arc<dyn ActivitySink>,
        clock: Arc<dyn Clock>,
        host: String,
        port: u16,
    ) -> Arc<Self> {
        let (store, writer) = QueuedStore::spawn(store);
        let registry = Arc::new(TimerRegistry::new(store.clone(), clock));
        let coordinator = Arc::new(EscalationCoordinator::new(
            Arc::clone(&registry),
            sink,
            config.user_id.clone(),
            config.session_id.clone(),
            config.pause_on_hidden,
        ));

        let (idle_events_tx, idle_events_rx) = broadcast::channel(100);
        let escalation = tokio::spawn(escalation_task(Arc::clone(&coordinator), idle_events_rx));
        let (idle, detector) = spawn_idle_detector(config.idle, idle_events_tx.clone());

        let (ticks_tx, ticks_rx) = watch::channel(TickSnapshot::capture(&registry));
        let ticker = tokio::spawn(ticker_task(
            Arc::clone(&registry),
            ticks_tx.clone(),
            config.tick_interval,
        ));

        info!(
            "Engine started for user {} (session timer {})",
            config.user_id, config.session_id
        );

        Arc::new(Self {
            config,
            registry,
            coordinator,
            idle,
            idle_events_tx,
            ticks_tx,
            _ticks_rx: ticks_rx,
            start_time: Instant::now(),
            port,
            host,
            store,
            tasks: Mutex::new(Some(EngineTasks {
                detector,
                escalation,
                ticker,
                writer,
            })),
        })
    }

    pub fn subscribe_ticks(&self) -> watch::Receiver<TickSnapshot> {
        self.ticks_tx.subscribe()
    }

    /// Stop the idle detector first so no deferred transition reaches the
    /// registry, then stop the remaining tasks and drain queued store writes.
    pub async fn shutdown(&self) {
        self.idle.shutdown();
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(tasks) = tasks else {
            return;
        };

        if let Err(e) = tasks.detector.await {
            error!("Idle detector task failed: {}", e);
        }
        for task in [tasks.escalation, tasks.ticker] {
            task.abort();
            // Wait for cancellation so nothing queues a write after the flush
            let _ = task.await;
        }

        self.store.flush().await;
        tasks.writer.abort();
        info!("Engine tasks stopped");
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}
