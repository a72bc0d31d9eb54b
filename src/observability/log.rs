use super::traits::{Observer, ObserverEvent, ObserverMetric};
use std::any::Any;
use tracing::{error, info, warn};

/// Log-based observer - uses tracing, zero external deps
pub struct LogObserver;

impl LogObserver {
    pub fn new() -> Self {
        Self
    }
}

impl Observer for LogObserver {
    fn record_event(&self, event: &ObserverEvent) {
        match event {
            ObserverEvent::AgentStart { provider, model } => {
                info!(provider = %provider, model = %model, "agent.start");
            }
            ObserverEvent::ChannelReady { channel } => {
                info!(channel = %channel, "channel.ready");
            }
            ObserverEvent::MessageProcessed {
                sender,
                channel_id,
                model,
                retrieval_hit,
            } => {
                info!(
                    sender = %sender,
                    channel = %channel_id,
                    model = %model,
                    rag = retrieval_hit,
                    "message.processed"
                );
            }
            ObserverEvent::LlmCall {
                purpose,
                duration,
                success,
            } => {
                let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                info!(purpose = %purpose, duration_ms = ms, success = success, "llm.call");
            }
            ObserverEvent::HeartbeatTick => {
                info!("heartbeat.tick");
            }
            ObserverEvent::AgentEnd { duration } => {
                let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
                info!(duration_ms = ms, "agent.end");
            }
            ObserverEvent::Warning { component, message } => {
                warn!(component = %component, "{message}");
            }
            ObserverEvent::Error { component, message } => {
                error!(component = %component, "{message}");
            }
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        match metric {
            ObserverMetric::RequestLatency(d) => {
                let ms = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
                info!(latency_ms = ms, "metric.request_latency");
            }
            ObserverMetric::RetrievedChunks(n) => {
                info!(chunks = n, "metric.retrieved_chunks");
            }
            ObserverMetric::InFlightMessages(n) => {
                info!(in_flight = n, "metric.in_flight_messages");
            }
            ObserverMetric::SummaryChars(n) => {
                info!(chars = n, "metric.summary_chars");
            }
        }
    }

    fn name(&self) -> &str {
        "log"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
