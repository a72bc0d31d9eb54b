#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::single_match_else,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use ragline::config::Config;
use ragline::store::{SqliteStore, Store};
use ragline::{agent, rag};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

/// `Ragline` - a retrieval-augmented chat agent with durable memory.
#[derive(Parser, Debug)]
#[command(name = "ragline")]
#[command(version)]
#[command(about = "Channel-connected chat agent with keyword retrieval.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the agent loop (channel listener, reply pipeline, heartbeat)
    Run {
        /// Provider to use (groq, openai, mistral, xai, custom:<url>)
        #[arg(short, long)]
        provider: Option<String>,

        /// Model to use
        #[arg(long)]
        model: Option<String>,

        /// Temperature (0.0 - 2.0)
        #[arg(short, long)]
        temperature: Option<f64>,
    },

    /// Ingest a UTF-8 text file into the knowledge base
    Ingest {
        /// Path to the file
        path: PathBuf,

        /// Document title (defaults to the file stem)
        #[arg(long)]
        title: Option<String>,
    },

    /// Manage ingested documents
    Docs {
        #[command(subcommand)]
        docs_command: DocsCommands,
    },

    /// Admit a channel: its messages will be answered
    Allow {
        /// Platform channel identifier (e.g. a Telegram chat id)
        channel_id: String,
    },

    /// Remove a channel from the allow-list
    Deny {
        channel_id: String,
    },

    /// Replace the agent's system instructions
    Instructions {
        text: String,
    },

    /// Clear the rolling conversation summary
    ResetMemory,

    /// Show configuration and the latest liveness row
    Status,

    /// Tail recent durable log rows
    Logs {
        /// How many rows to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum DocsCommands {
    /// List ingested documents
    List,
    /// Delete a document and its chunks
    Delete {
        /// Document id, as shown by `docs list`
        id: i64,
    },
}

fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    Ok(Arc::new(SqliteStore::new(&config.db_path())?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut config = Config::load_or_init()?;
    config.apply_env_overrides();

    match cli.command {
        Commands::Run {
            provider,
            model,
            temperature,
        } => {
            if let Some(t) = temperature {
                if !(0.0..=2.0).contains(&t) {
                    bail!("temperature must be between 0.0 and 2.0, got {t}");
                }
                config.default_temperature = t;
            }
            agent::run(config, provider, model).await
        }

        Commands::Ingest { path, title } => {
            let store = open_store(&config)?;
            let outcome =
                rag::ingest_file(&store, &config.retrieval, &path, title.as_deref()).await?;
            println!(
                "✅ Ingested \"{}\" as document {} ({} chunks)",
                outcome.title, outcome.document_id, outcome.chunk_count
            );
            Ok(())
        }

        Commands::Docs { docs_command } => {
            let store = open_store(&config)?;
            match docs_command {
                DocsCommands::List => {
                    let documents = store.list_documents().await?;
                    if documents.is_empty() {
                        println!("No documents ingested yet. Try: ragline ingest <file>");
                        return Ok(());
                    }
                    println!("{:>6}  {:<25}  TITLE", "ID", "CREATED");
                    for doc in documents {
                        println!("{:>6}  {:<25}  {}", doc.id, doc.created_at, doc.title);
                    }
                    Ok(())
                }
                DocsCommands::Delete { id } => {
                    if store.delete_document(id).await? {
                        println!("✅ Document {id} and its chunks deleted");
                        Ok(())
                    } else {
                        bail!("No document with id {id}")
                    }
                }
            }
        }

        Commands::Allow { channel_id } => {
            let store = open_store(&config)?;
            store.allow_channel(&channel_id).await?;
            println!("✅ Channel {channel_id} admitted");
            Ok(())
        }

        Commands::Deny { channel_id } => {
            let store = open_store(&config)?;
            store.deny_channel(&channel_id).await?;
            println!("✅ Channel {channel_id} removed from the allow-list");
            Ok(())
        }

        Commands::Instructions { text } => {
            let store = open_store(&config)?;
            store.set_instructions(&text).await?;
            println!("✅ System instructions updated");
            Ok(())
        }

        Commands::ResetMemory => {
            let store = open_store(&config)?;
            store.reset_summary().await?;
            println!("✅ Conversation summary cleared");
            Ok(())
        }

        Commands::Status => {
            println!("🧵 Ragline Status");
            println!();
            println!("Version:     {}", env!("CARGO_PKG_VERSION"));
            println!("Workspace:   {}", config.workspace_dir.display());
            println!("Config:      {}", config.config_path.display());
            println!();
            println!(
                "🤖 Provider:       {}",
                config.default_provider.as_deref().unwrap_or("groq")
            );
            println!(
                "   Model:          {}",
                config.default_model.as_deref().unwrap_or("(default)")
            );
            println!("📊 Observability:  {}", config.observability.backend);
            println!(
                "💓 Heartbeat:      {}",
                if config.heartbeat.enabled {
                    format!("every {}s", config.heartbeat.interval_secs)
                } else {
                    "disabled".into()
                }
            );
            println!(
                "🔎 Retrieval:      chunk {} / overlap {} / top {}",
                config.retrieval.chunk_size, config.retrieval.chunk_overlap, config.retrieval.limit
            );
            println!();
            println!("Channels:");
            println!(
                "  Telegram:  {}",
                if config.channels_config.telegram.is_some() {
                    "✅ configured"
                } else {
                    "❌ not configured"
                }
            );

            let store = open_store(&config)?;
            println!();
            println!("Agent:");
            match store.load_agent_config().await? {
                Some(agent_config) => {
                    println!(
                        "  Allowed channels:  {}",
                        if agent_config.allowed_channel_ids.is_empty() {
                            "(none)".to_string()
                        } else {
                            agent_config.allowed_channel_ids.join(", ")
                        }
                    );
                    println!(
                        "  Summary:           {}",
                        agent_config.conversation_summary.as_deref().map_or_else(
                            || "(empty)".to_string(),
                            |s| format!("{} chars", s.chars().count())
                        )
                    );
                }
                None => {
                    println!("  (not seeded yet — run `ragline allow <channel_id>`)");
                }
            }
            println!("  Knowledge chunks:  {}", store.count_chunks().await?);
            match store.latest_status().await? {
                Some(snapshot) => {
                    println!(
                        "  Last heartbeat:    {} at {}",
                        snapshot.status, snapshot.updated_at
                    );
                }
                None => println!("  Last heartbeat:    (never run)"),
            }

            Ok(())
        }

        Commands::Logs { limit } => {
            let store = open_store(&config)?;
            let rows = store.recent_logs(limit).await?;
            if rows.is_empty() {
                println!("No log rows yet.");
                return Ok(());
            }
            for row in rows {
                match row.details {
                    Some(details) => println!(
                        "[{}] [{}] {} {}",
                        row.created_at,
                        row.level.to_uppercase(),
                        row.message,
                        details
                    ),
                    None => println!(
                        "[{}] [{}] {}",
                        row.created_at,
                        row.level.to_uppercase(),
                        row.message
                    ),
                }
            }
            Ok(())
        }
    }
}
