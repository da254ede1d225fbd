use strata::cli::{Cli, Commands, ConfigAction};
use strata::config::Config;
use strata::engine::ChatEngine;
use strata::error::{Result, StrataError};
use strata::storage::StorageStats;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Ingest { file, name } => {
            cmd_ingest(cli.config, &file, name).await?;
        }
        Commands::Search {
            query,
            document,
            top_k,
            json,
        } => {
            cmd_search(cli.config, &query, document, top_k, json).await?;
        }
        Commands::Ask {
            question,
            user,
            document,
        } => {
            cmd_ask(cli.config, &question, user, document).await?;
        }
        Commands::Documents => {
            cmd_documents(cli.config)?;
        }
        Commands::Remove { id } => {
            cmd_remove(cli.config, id).await?;
        }
        Commands::Forget { user, document } => {
            cmd_forget(cli.config, user, document).await?;
        }
        Commands::Status => {
            cmd_status(cli.config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose { "strata=debug" } else { "strata=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn cmd_ingest(
    config_path: Option<std::path::PathBuf>,
    file: &std::path::Path,
    name: Option<String>,
) -> Result<()> {
    let engine = build_engine(config_path)?;

    let text = std::fs::read_to_string(file).map_err(|e| StrataError::Io {
        source: e,
        context: format!("Failed to read document: {}", file.display()),
    })?;
    let name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string())
    });

    let report = engine.ingest(&name, &text).await?;
    println!("✓ Ingested '{}'", name);
    println!("  Document id: {}", report.document_id);
    println!("  Chunks indexed: {}", report.chunk_count);

    Ok(())
}

async fn cmd_search(
    config_path: Option<std::path::PathBuf>,
    query: &str,
    document: Option<u64>,
    top_k: usize,
    json: bool,
) -> Result<()> {
    let engine = build_engine(config_path)?;
    let outcome = engine.search(query, document, top_k).await?;

    if json {
        let rendered =
            serde_json::to_string_pretty(&outcome.candidates).map_err(|e| StrataError::Json {
                source: e,
                context: "Failed to serialize search results".to_string(),
            })?;
        println!("{}", rendered);
        return Ok(());
    }

    if outcome.candidates.is_empty() {
        println!("No matching passages");
        return Ok(());
    }

    for (index, candidate) in outcome.candidates.iter().enumerate() {
        println!(
            "[{}] chunk {} (score {:.3})",
            index + 1,
            candidate.chunk_id,
            candidate.effective_score()
        );
        println!("    {}", preview(&candidate.content, 160));
    }
    if !outcome.relevant {
        println!("\n(below the relevance gate; an answer would fall back to general knowledge)");
    }

    Ok(())
}

async fn cmd_ask(
    config_path: Option<std::path::PathBuf>,
    question: &str,
    user: u64,
    document: Option<u64>,
) -> Result<()> {
    let engine = build_engine(config_path)?;
    let answer = engine.ask(user, document, question).await?;

    println!("{}", answer.text);
    if answer.grounded {
        println!("\nSources: {}", answer.sources.join(", "));
    }

    Ok(())
}

fn cmd_documents(config_path: Option<std::path::PathBuf>) -> Result<()> {
    let engine = build_engine(config_path)?;
    let documents = engine.documents()?;

    if documents.is_empty() {
        println!("No documents ingested");
        return Ok(());
    }

    println!("{:<6} {:<8} {:<20} NAME", "ID", "CHUNKS", "CREATED");
    for doc in documents {
        let created = chrono::DateTime::from_timestamp(doc.created_at, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| doc.created_at.to_string());
        println!(
            "{:<6} {:<8} {:<20} {}",
            doc.id, doc.chunk_count, created, doc.name
        );
    }

    Ok(())
}

async fn cmd_remove(config_path: Option<std::path::PathBuf>, id: u64) -> Result<()> {
    let engine = build_engine(config_path)?;

    if engine.remove_document(id).await? {
        println!("✓ Removed document {}", id);
    } else {
        println!("Document {} not found", id);
    }

    Ok(())
}

async fn cmd_forget(
    config_path: Option<std::path::PathBuf>,
    user: u64,
    document: Option<u64>,
) -> Result<()> {
    let engine = build_engine(config_path)?;
    engine.forget(user, document).await?;

    match document {
        Some(id) => println!("✓ Cleared conversation for user {} on document {}", user, id),
        None => println!("✓ Cleared general conversation for user {}", user),
    }

    Ok(())
}

fn cmd_status(config_path: Option<std::path::PathBuf>) -> Result<()> {
    let engine = build_engine(config_path)?;
    let stats = engine.stats()?;

    println!("Strata Status");
    println!("=============");
    println!("Documents:    {}", stats.db.document_count);
    println!("Chunks:       {}", stats.db.chunk_count);
    println!("Embeddings:   {}", stats.db.embedding_count);
    println!("Memory keys:  {}", stats.db.memory_key_count);
    println!("Disk usage:   {}", StorageStats::format_size(stats.disk_size));
    println!(
        "LLM:          {}",
        if engine.config().llm.enabled {
            engine.config().llm.model.as_str()
        } else {
            "disabled"
        }
    );
    println!(
        "Reranker:     {}",
        if engine.config().rerank.enabled {
            engine.config().rerank.model.as_str()
        } else {
            "disabled"
        }
    );

    Ok(())
}

fn cmd_config(config_path: Option<std::path::PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let rendered = toml::to_string_pretty(&config)?;
            println!("{}", rendered);
        }
        ConfigAction::Path => {
            let path = config_path.map(Ok).unwrap_or_else(Config::default_path)?;
            println!("{}", path.display());
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| StrataError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

fn build_engine(config_path: Option<std::path::PathBuf>) -> Result<ChatEngine> {
    ChatEngine::new(load_config(config_path)?)
}

fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'strata config init' to create one."
        );
        return Ok(Config::default());
    }

    Config::load(&path)
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut preview: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        preview.push('…');
    }
    preview.replace('\n', " ")
}
