use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use medirag_gateway::{
    ChatPipeline, ModelTranslator, OpenAiCompatibleClient, PipelineRequest, Provider,
    RecordingStatus,
};
use medirag_knowledge::{Corpus, IndexStatus, KnowledgeEngine, RetrievalFlags};

#[derive(Debug, Parser)]
#[command(name = "medirag", version, about = "Retrieval-augmented medical chat")]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, global = true, env = "MEDIRAG_CONFIG_DIR", value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage the vector indexes
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },
    /// Inspect or wipe the conversation log
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Ask one question through the full pipeline
    Ask {
        prompt: String,
        /// Use the persona template
        #[arg(long)]
        persona: bool,
        /// Augment with similar past exchanges
        #[arg(long)]
        history: bool,
        /// Augment with medicine records
        #[arg(long)]
        knowledge: bool,
        /// Do not store this exchange
        #[arg(long)]
        no_record: bool,
    },
}

#[derive(Debug, Subcommand)]
enum IndexAction {
    Create {
        #[arg(value_enum, default_value_t = Target::All)]
        target: Target,
    },
    Drop {
        #[arg(value_enum, default_value_t = Target::All)]
        target: Target,
    },
}

#[derive(Debug, Subcommand)]
enum HistoryAction {
    /// Delete every stored exchange
    Clear,
    /// Show the newest exchanges
    Recent {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Target {
    Knowledge,
    History,
    All,
}

impl Target {
    fn corpora(self) -> &'static [Corpus] {
        match self {
            Target::Knowledge => &[Corpus::Knowledge],
            Target::History => &[Corpus::History],
            Target::All => &[Corpus::Knowledge, Corpus::History],
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    medirag_core::load_dotenv();
    let cli = Cli::parse();

    let config = match &cli.config_dir {
        Some(dir) => medirag_core::Config::load_from(&dir.join("config.toml"))?,
        None => medirag_core::Config::load()?,
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.settings.logging.level.clone().into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let engine = KnowledgeEngine::open(&config.settings).await?;
    info!("Configuration loaded (model {})", config.settings.model.model);

    match cli.command {
        Command::Index { action } => match action {
            IndexAction::Create { target } => {
                for corpus in target.corpora() {
                    match engine.create_index(*corpus).await? {
                        IndexStatus::Created => println!("{corpus:?}: created"),
                        IndexStatus::AlreadyExists => println!("{corpus:?}: already exists"),
                    }
                }
            }
            IndexAction::Drop { target } => {
                for corpus in target.corpora() {
                    if engine.drop_index(*corpus).await? {
                        println!("{corpus:?}: dropped");
                    } else {
                        println!("{corpus:?}: no index");
                    }
                }
            }
        },
        Command::History { action } => match action {
            HistoryAction::Clear => {
                let removed = engine.history().clear().await?;
                println!("Removed {removed} exchanges");
            }
            HistoryAction::Recent { limit } => {
                for exchange in engine.history().recent(limit).await? {
                    println!("[{}] {}", exchange.local_time_label(), exchange.id);
                    println!("User: {}", exchange.prompt);
                    println!("Assistant: {}\n", exchange.response);
                }
            }
        },
        Command::Ask {
            prompt,
            persona,
            history,
            knowledge,
            no_record,
        } => {
            let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatibleClient::from_config(&config)?);
            let engine = if config.settings.retrieval.translate {
                engine.with_translator(Arc::new(ModelTranslator::new(provider.clone())))
            } else {
                engine
            };
            engine.ensure_indexes().await?;

            let flags = if persona || history || knowledge {
                RetrievalFlags {
                    persona,
                    history_rag: history,
                    knowledge_rag: knowledge,
                }
            } else {
                RetrievalFlags::from_settings(&config.settings.retrieval)
            };
            let mut request = PipelineRequest::new(prompt, flags);
            if no_record {
                request = request.without_recording();
            }

            let pipeline = ChatPipeline::new(engine, provider).with_settings(&config.settings);
            let outcome = pipeline.run(request).await?;
            println!("{}", outcome.response.text);
            match outcome.recording {
                RecordingStatus::Recorded(id) => info!("Recorded exchange {id}"),
                RecordingStatus::Failed(reason) => warn!("Exchange not recorded: {reason}"),
                RecordingStatus::Skipped => {}
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ask_flags() {
        let cli = Cli::try_parse_from(["medirag", "ask", "dosage?", "--knowledge", "--no-record"])
            .unwrap();
        match cli.command {
            Command::Ask {
                prompt,
                knowledge,
                persona,
                no_record,
                ..
            } => {
                assert_eq!(prompt, "dosage?");
                assert!(knowledge);
                assert!(!persona);
                assert!(no_record);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_config_dir_flag_is_global() {
        let cli = Cli::try_parse_from(["medirag", "history", "recent", "--config-dir", "/tmp/medirag"])
            .unwrap();
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/medirag")));
    }

    #[test]
    fn test_index_target_defaults_to_all() {
        let cli = Cli::try_parse_from(["medirag", "index", "drop"]).unwrap();
        match cli.command {
            Command::Index {
                action: IndexAction::Drop { target },
            } => assert_eq!(target.corpora().len(), 2),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
