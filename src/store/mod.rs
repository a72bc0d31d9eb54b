pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteStore;
pub use traits::Store;
#[allow(unused_imports)]
pub use traits::{AgentConfig, Document, LogRecord, StatusSnapshot, DEFAULT_SYSTEM_INSTRUCTIONS};
