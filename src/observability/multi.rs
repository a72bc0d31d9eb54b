use super::traits::{Observer, ObserverEvent, ObserverMetric};
use std::any::Any;

/// Fan events out to several backends at once. The runtime uses this to
/// pair the configured telemetry backend with the durable SQLite sink.
pub struct MultiObserver {
    observers: Vec<Box<dyn Observer>>,
}

impl MultiObserver {
    pub fn new(observers: Vec<Box<dyn Observer>>) -> Self {
        Self { observers }
    }
}

impl Observer for MultiObserver {
    fn record_event(&self, event: &ObserverEvent) {
        for obs in &self.observers {
            obs.record_event(event);
        }
    }

    fn record_metric(&self, metric: &ObserverMetric) {
        for obs in &self.observers {
            obs.record_metric(metric);
        }
    }

    fn flush(&self) {
        for obs in &self.observers {
            obs.flush();
        }
    }

    fn name(&self) -> &str {
        "multi"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct Counts {
        events: Arc<AtomicUsize>,
        metrics: Arc<AtomicUsize>,
        flushes: Arc<AtomicUsize>,
    }

    /// Test observer that counts calls
    struct CountingObserver {
        counts: Counts,
    }

    impl Observer for CountingObserver {
        fn record_event(&self, _event: &ObserverEvent) {
            self.counts.events.fetch_add(1, Ordering::SeqCst);
        }
        fn record_metric(&self, _metric: &ObserverMetric) {
            self.counts.metrics.fetch_add(1, Ordering::SeqCst);
        }
        fn flush(&self) {
            self.counts.flushes.fetch_add(1, Ordering::SeqCst);
        }
        fn name(&self) -> &str {
            "counting"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn multi_of_two() -> (MultiObserver, Counts, Counts) {
        let a = Counts::default();
        let b = Counts::default();
        let multi = MultiObserver::new(vec![
            Box::new(CountingObserver { counts: a.clone() }),
            Box::new(CountingObserver { counts: b.clone() }),
        ]);
        (multi, a, b)
    }

    #[test]
    fn multi_name() {
        let m = MultiObserver::new(vec![]);
        assert_eq!(m.name(), "multi");
    }

    #[test]
    fn multi_empty_no_panic() {
        let m = MultiObserver::new(vec![]);
        m.record_event(&ObserverEvent::HeartbeatTick);
        m.record_metric(&ObserverMetric::RetrievedChunks(1));
        m.flush();
    }

    #[test]
    fn multi_fans_out_events() {
        let (m, a, b) = multi_of_two();

        m.record_event(&ObserverEvent::HeartbeatTick);
        m.record_event(&ObserverEvent::HeartbeatTick);
        m.record_event(&ObserverEvent::HeartbeatTick);

        assert_eq!(a.events.load(Ordering::SeqCst), 3);
        assert_eq!(b.events.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn multi_fans_out_metrics() {
        let (m, a, b) = multi_of_two();

        m.record_metric(&ObserverMetric::RetrievedChunks(3));
        m.record_metric(&ObserverMetric::RequestLatency(Duration::from_millis(5)));

        assert_eq!(a.metrics.load(Ordering::SeqCst), 2);
        assert_eq!(b.metrics.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn multi_fans_out_flush() {
        let (m, a, b) = multi_of_two();

        m.flush();
        assert_eq!(a.flushes.load(Ordering::SeqCst), 1);
        assert_eq!(b.flushes.load(Ordering::SeqCst), 1);
    }
}
