pub mod compatible;
pub mod traits;

pub use compatible::{AuthStyle, OpenAiCompatibleProvider};
pub use traits::{ChatMessage, Provider, ProviderError};

/// Factory: create the right provider from config
pub fn create_provider(name: &str, api_key: Option<&str>) -> anyhow::Result<Box<dyn Provider>> {
    match name {
        "groq" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "Groq",
            "https://api.groq.com/openai",
            api_key,
            AuthStyle::Bearer,
        ))),
        "openai" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "OpenAI",
            "https://api.openai.com",
            api_key,
            AuthStyle::Bearer,
        ))),
        "mistral" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "Mistral",
            "https://api.mistral.ai",
            api_key,
            AuthStyle::Bearer,
        ))),
        "xai" | "grok" => Ok(Box::new(OpenAiCompatibleProvider::new(
            "xAI",
            "https://api.x.ai",
            api_key,
            AuthStyle::Bearer,
        ))),

        // Any OpenAI-compatible endpoint: "custom:https://your-api.com"
        name if name.starts_with("custom:") => {
            let base_url = name.strip_prefix("custom:").unwrap_or("");
            if base_url.is_empty() {
                anyhow::bail!(
                    "Custom provider requires a URL. Format: custom:https://your-api.com"
                );
            }
            Ok(Box::new(OpenAiCompatibleProvider::new(
                "Custom",
                base_url,
                api_key,
                AuthStyle::Bearer,
            )))
        }

        _ => anyhow::bail!(
            "Unknown provider: {name}. Use groq, openai, mistral, xai, \
             or \"custom:https://your-api.com\" for any OpenAI-compatible endpoint."
        ),
    }
}
