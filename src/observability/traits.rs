use std::time::Duration;

/// Discrete events emitted by the agent runtime for observability.
///
/// Each variant marks a pipeline milestone that observers can record or
/// forward. Events carry identifiers and outcomes only, never prompt or
/// response content.
#[derive(Debug, Clone)]
pub enum ObserverEvent {
    /// The agent runtime has come online.
    AgentStart { provider: String, model: String },
    /// A channel adapter is connected and receiving messages.
    ChannelReady { channel: String },
    /// One inbound message made it through the full reply pipeline.
    MessageProcessed {
        sender: String,
        channel_id: String,
        model: String,
        /// Whether retrieval contributed any knowledge chunks.
        retrieval_hit: bool,
    },
    /// Result of a single language model call.
    LlmCall {
        /// `"reply"` or `"summary"`.
        purpose: String,
        duration: Duration,
        success: bool,
    },
    /// Periodic tick from the liveness loop.
    HeartbeatTick,
    /// The agent runtime is shutting down.
    AgentEnd { duration: Duration },
    /// A component degraded but the pipeline continued without it.
    Warning {
        /// Subsystem that degraded (e.g., `"retrieval"`, `"heartbeat"`).
        component: String,
        /// Human-readable description. Must not contain secrets or tokens.
        message: String,
    },
    /// An error occurred in a named component.
    Error { component: String, message: String },
}

/// Numeric metrics emitted by the agent runtime.
///
/// Each variant carries a single scalar sample with implicit units.
#[derive(Debug, Clone)]
pub enum ObserverMetric {
    /// Time elapsed for a single language model call.
    RequestLatency(Duration),
    /// Chunks returned by one retrieval pass.
    RetrievedChunks(u64),
    /// Messages currently being processed concurrently.
    InFlightMessages(u64),
    /// Size of the rolling summary after an update, in characters.
    SummaryChars(u64),
}

/// Core observability trait for recording agent runtime telemetry.
///
/// The runtime holds one or more `Observer` instances behind `Arc` and
/// calls [`record_event`](Observer::record_event) and
/// [`record_metric`](Observer::record_metric) at pipeline milestones,
/// so implementations must be `Send + Sync + 'static`.
pub trait Observer: Send + Sync + 'static {
    /// Record a discrete lifecycle event.
    ///
    /// Called synchronously on the hot path. Backends that buffer must
    /// drain in [`flush`](Observer::flush).
    fn record_event(&self, event: &ObserverEvent);

    /// Record a numeric metric sample.
    fn record_metric(&self, metric: &ObserverMetric);

    /// Flush any buffered telemetry to the backend.
    ///
    /// The runtime calls this during graceful shutdown. The default
    /// no-op suits backends that write synchronously.
    fn flush(&self) {}

    /// Human-readable backend name, used in logs and diagnostics.
    fn name(&self) -> &str;

    /// Downcast to `Any` for backend-specific operations.
    fn as_any(&self) -> &dyn std::any::Any;
}
