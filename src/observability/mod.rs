pub mod log;
pub mod multi;
pub mod noop;
pub mod sqlite;
pub mod traits;

pub use self::log::LogObserver;
pub use multi::MultiObserver;
pub use noop::NoopObserver;
pub use sqlite::SqliteObserver;
pub use traits::{Observer, ObserverEvent};
#[allow(unused_imports)]
pub use traits::ObserverMetric;

use crate::config::ObservabilityConfig;

/// Factory: create the configured telemetry observer.
///
/// This picks the tracing-side backend only. The runtime pairs it with
/// a [`SqliteObserver`] through [`MultiObserver`] so operator-facing
/// rows always reach the database, whatever the backend here.
pub fn create_observer(config: &ObservabilityConfig) -> Box<dyn Observer> {
    match config.backend.as_str() {
        "log" => Box::new(LogObserver::new()),
        "none" | "noop" => Box::new(NoopObserver),
        _ => {
            tracing::warn!(
                "Unknown observability backend '{}', falling back to log",
                config.backend
            );
            Box::new(LogObserver::new())
        }
    }
}
