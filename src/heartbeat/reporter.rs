//! Durable liveness reporting.
//!
//! While the agent runs, a single status row says "online" and carries
//! enough metadata to find the process. External dashboards read that row
//! instead of probing the agent directly.

use crate::observability::{Observer, ObserverEvent};
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub struct HeartbeatReporter {
    store: Arc<dyn Store>,
    observer: Arc<dyn Observer>,
    interval: Duration,
}

impl HeartbeatReporter {
    pub fn new(store: Arc<dyn Store>, observer: Arc<dyn Observer>, interval_secs: u64) -> Self {
        Self {
            store,
            observer,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    fn status_metadata() -> serde_json::Value {
        serde_json::json!({
            "agent": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "pid": std::process::id(),
        })
    }

    /// Write one "online" beat. A failed write is reported and retried
    /// on the next tick; the loop never stops over it.
    async fn beat(&self) {
        match self
            .store
            .write_status("online", &Self::status_metadata())
            .await
        {
            Ok(()) => self.observer.record_event(&ObserverEvent::HeartbeatTick),
            Err(error) => self.observer.record_event(&ObserverEvent::Warning {
                component: "heartbeat".into(),
                message: format!("status write failed: {error}"),
            }),
        }
    }

    /// Beat immediately, then on every interval tick, until `shutdown`
    /// flips to true. The final act is writing "offline".
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.beat().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Err(error) = self
            .store
            .write_status("offline", &Self::status_metadata())
            .await
        {
            self.observer.record_event(&ObserverEvent::Warning {
                component: "heartbeat".into(),
                message: format!("offline status write failed: {error}"),
            });
        }
    }
}
