pub mod schema;

pub use schema::{
    ChannelsConfig, Config, HeartbeatConfig, MemoryConfig, ObservabilityConfig, RetrievalConfig,
    TelegramConfig,
};
