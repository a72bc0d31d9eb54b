pub mod reporter;

pub use reporter::HeartbeatReporter;
