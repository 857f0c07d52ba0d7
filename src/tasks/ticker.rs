//! Display tick source
//!
//! One interval for the whole process. Each tick reads every timer at a
//! single instant and publishes the readings on a watch channel; ticks never
//! mutate timer state.

use std::{sync::Arc, time::Duration};
use serde::{Deserialize, Serialize};
use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{debug, info};

use crate::state::{TimerReading, TimerRegistry};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickSnapshot {
    pub at_ms: i64,
    pub readings: Vec<TimerReading>,
}

impl TickSnapshot {
    pub fn capture(registry: &TimerRegistry) -> Self {
        Self {
            at_ms: registry.now_ms(),
            readings: registry.readings(),
        }
    }

    /// Reading for one subscribed timer
    pub fn reading(&self, timer_id: &str) -> Option<&TimerReading> {
        self.readings.iter().find(|r| r.timer_id == timer_id)
    }
}

/// Background task publishing a snapshot every `period`
pub async fn ticker_task(
    registry: Arc<TimerRegistry>,
    ticks: watch::Sender<TickSnapshot>,
    period: Duration,
) {
    info!("Starting ticker task ({}ms period)", period.as_millis());

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if ticks.send(TickSnapshot::capture(&registry)).is_err() {
            debug!("No tick subscribers left");
            break;
        }
    }

    info!("Ticker task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{services::MemoryStore, state::TimerSpec, utils::ManualClock};

    #[tokio::test(start_paused = true)]
    async fn publishes_readings_without_mutating() {
        let clock = ManualClock::new(10_000);
        let registry = Arc::new(TimerRegistry::new(
            Arc::new(MemoryStore::new()),
            Arc::new(clock.clone()),
        ));
        registry.register(TimerSpec::new("t").started_at(0), None);
        registry.pause("t");
        let before = registry.get("t");

        let (tx, mut rx) = watch::channel(TickSnapshot::default());
        let task = tokio::spawn(ticker_task(registry.clone(), tx, Duration::from_secs(1)));

        rx.changed().await.unwrap();
        clock.advance(5_000);
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.at_ms, 15_000);
        assert_eq!(snapshot.reading("t").unwrap().elapsed_ms, 10_000);
        assert_eq!(registry.get("t"), before);

        drop(rx);
        task.await.unwrap();
    }
}
