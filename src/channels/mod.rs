pub mod telegram;
pub mod traits;

pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelMessage};

use crate::config::Config;

/// Factory: create the configured channel adapter
pub fn create_channel(config: &Config) -> anyhow::Result<Box<dyn Channel>> {
    if let Some(telegram) = &config.channels_config.telegram {
        if telegram.bot_token.trim().is_empty() {
            anyhow::bail!("[channels_config.telegram] bot_token is empty");
        }
        return Ok(Box::new(TelegramChannel::new(telegram.bot_token.clone())));
    }

    anyhow::bail!(
        "No channel configured. Add [channels_config.telegram] with bot_token to config.toml."
    )
}
