use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ragwire_core::config::{Config, StorageMode};
use ragwire_core::rag::retriever::describe_hit;
use ragwire_core::rag::{CollectionSchema, RagEngine, UploadSummary};
use ragwire_core::samples::sample_documents;
use ragwire_core::{Answer, AnswerStatus, ChatManager, OllamaProvider, OpenAiProvider};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragwire")]
#[command(about = "Retrieval augmented generation over a hosted LLM and a vector store", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Ask the model directly, without retrieval")]
    Chat {
        #[arg(trailing_var_arg = true, help = "Your question")]
        question: Vec<String>,
    },

    #[command(about = "Retrieve context from the knowledge base, then ask the model")]
    Ask {
        #[arg(trailing_var_arg = true, help = "Your question")]
        question: Vec<String>,
    },

    #[command(about = "Let the model search the knowledge base through a tool call")]
    Agent {
        #[arg(trailing_var_arg = true, help = "Your question")]
        question: Vec<String>,
    },

    #[command(about = "Chunk, embed and upload files (the sample documents when no paths are given)")]
    Upload {
        #[arg(help = "Files or directories to upload")]
        paths: Vec<PathBuf>,
    },

    #[command(about = "Export every vector in the configured store to JSON and bincode files")]
    Export {
        #[arg(short, long, help = "JSON output path (defaults to export.path)")]
        output: Option<PathBuf>,
    },

    #[command(about = "Import an export file into the configured store")]
    Migrate {
        #[arg(short, long, help = "Export file, .json or .bin (defaults to export.path)")]
        input: Option<PathBuf>,

        #[arg(long, help = "Keep an existing collection instead of recreating it")]
        keep_existing: bool,
    },

    #[command(about = "Configuration commands")]
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Set the inference model")]
    SetModel {
        #[arg(help = "Model id (e.g., 'qwen.qwen3-coder-30b-a3b-v1:0')")]
        model: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ragwire_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config_path = cli.config;

    match cli.command {
        Commands::Config { command } => match command.unwrap_or(ConfigCommands::Show) {
            ConfigCommands::Show => show_config(&config_path),
            ConfigCommands::SetModel { model } => set_model(&config_path, &model),
        },
        Commands::Chat { question } => chat(&load_config(&config_path)?, &question).await,
        Commands::Ask { question } => ask(&load_config(&config_path)?, "ask", &question, false).await,
        Commands::Agent { question } => ask(&load_config(&config_path)?, "agent", &question, true).await,
        Commands::Upload { paths } => upload(&load_config(&config_path)?, &paths).await,
        Commands::Export { output } => {
            let config = load_config(&config_path)?;
            let output = output.unwrap_or_else(|| config.export.path.clone());
            export(&config, &output).await
        }
        Commands::Migrate { input, keep_existing } => {
            let config = load_config(&config_path)?;
            let input = input.unwrap_or_else(|| config.export.path.clone());
            migrate(&config, &input, keep_existing).await
        }
    }
}

/// Loads the config file when present, defaults otherwise, then applies
/// environment overrides.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        tracing::debug!(path = %path.display(), "Config file not found, using defaults");
        let config = Config::default();
        config.validate().context("Invalid default configuration")?;
        config
    };
    config.apply_env();
    Ok(config)
}

/// Joins the trailing arguments; `None` after printing usage when empty.
fn question_or_usage(command: &str, words: &[String]) -> Option<String> {
    let question = words.join(" ");
    if question.trim().is_empty() {
        eprintln!("Usage: ragwire {} <your_question>", command);
        eprintln!("Example: ragwire {} what are Legus favorite foods", command);
        return None;
    }
    Some(question)
}

async fn open_engine(config: &Config) -> Result<RagEngine> {
    let target = match &config.storage.storage_mode {
        StorageMode::Grpc { url } => format!("Qdrant at {}", url),
        StorageMode::Embedded { path } => format!("LanceDB at {}", path),
        StorageMode::Memory => "in-memory store".to_string(),
    };
    println!("{} Connecting to {}...", "→".blue(), target);

    let embeddings = Arc::new(OllamaProvider::new(&config.embedding));
    let engine = RagEngine::open(config, embeddings).await?;
    Ok(engine)
}

async fn close_engine(engine: &RagEngine) {
    if let Err(e) = engine.close().await {
        eprintln!("{} Failed to close store: {:#}", "!".yellow(), e);
    }
}

fn print_answer(answer: &Answer) {
    match &answer.status {
        AnswerStatus::NoResponse { available_keys } => {
            println!("{}", "Error: No choices found in response".red());
            println!("Available keys: {:?}", available_keys);
        }
        _ => println!("\n{} {}", "Assistant:".bold().green(), answer.content),
    }
}

async fn chat(config: &Config, words: &[String]) -> Result<ExitCode> {
    let Some(question) = question_or_usage("chat", words) else {
        return Ok(ExitCode::FAILURE);
    };

    let provider = Arc::new(OpenAiProvider::from_config(config));
    let manager = ChatManager::new(config.clone(), provider);

    println!("{} {}", "Question:".bold(), question);
    let answer = manager.chat(&question).await?;
    print_answer(&answer);
    Ok(ExitCode::SUCCESS)
}

async fn ask(config: &Config, command: &str, words: &[String], use_tools: bool) -> Result<ExitCode> {
    let Some(question) = question_or_usage(command, words) else {
        return Ok(ExitCode::FAILURE);
    };
    println!("{} {}", "Question:".bold(), question);

    let engine = open_engine(config).await?;
    let provider = Arc::new(OpenAiProvider::from_config(config));
    let manager = ChatManager::new(config.clone(), provider).with_rag(engine.clone());

    let result = if use_tools {
        manager.ask_with_tools(&question).await
    } else {
        manager.ask(&question).await
    };
    close_engine(&engine).await;
    let answer = result?;

    if !use_tools {
        println!("Found {} relevant documents", answer.sources.len());
        for (i, hit) in answer.sources.iter().enumerate() {
            println!("  {}", describe_hit(i + 1, hit));
        }
    }
    for call in &answer.turn.tool_calls {
        println!(
            "{} {}({}) → {} bytes",
            "Tool:".bold().cyan(),
            call.name,
            call.arguments,
            call.result.len()
        );
    }
    if answer.status == AnswerStatus::NoContext {
        println!("{}", "No relevant context found, answering from general knowledge".yellow());
    }

    print_answer(&answer);
    Ok(ExitCode::SUCCESS)
}

fn print_upload_summary(summary: &UploadSummary) {
    println!();
    println!("{}", "Upload complete!".bold().green());
    println!("  Documents:      {}", summary.documents);
    println!("  Chunks:         {}", summary.chunks);
    println!("  Batches:        {} ({} failed)", summary.batches, summary.failed_batches);
    println!("  Vectors stored: {}", summary.succeeded);
    if summary.failed > 0 {
        println!("  {} {} vectors failed to upload", "!".yellow(), summary.failed);
    }
}

async fn upload(config: &Config, paths: &[PathBuf]) -> Result<ExitCode> {
    let engine = open_engine(config).await?;
    println!("Using embedding model: {}", config.embedding.model.cyan());
    println!("Collection: {}", config.storage.collection_name.cyan());

    let result = if paths.is_empty() {
        println!("Uploading sample documents...");
        engine.upload(&sample_documents()).await
    } else {
        engine.upload_paths(paths).await
    };
    close_engine(&engine).await;

    print_upload_summary(&result?);
    Ok(ExitCode::SUCCESS)
}

async fn export(config: &Config, output: &Path) -> Result<ExitCode> {
    let engine = open_engine(config).await?;
    let result = engine.export(output).await;
    close_engine(&engine).await;

    let Some((files, summary)) = result? else {
        println!("{}", "No vectors found to export".yellow());
        return Ok(ExitCode::SUCCESS);
    };

    println!("{} Exported {} vectors", "✓".green().bold(), summary.count);
    println!("  JSON:          {}", files.json.display());
    println!("  Binary:        {}", files.binary.display());
    if let Some(dimension) = summary.dimension {
        println!("  Dimensions:    {}", dimension);
    }
    println!("  Metadata keys: {}", summary.metadata_keys.join(", "));
    if let Some(sample) = &summary.sample {
        let preview: String = sample.metadata.text.chars().take(100).collect();
        println!("  Sample:        {} ({}): {}...", sample.id, sample.metadata.title, preview);
    }
    Ok(ExitCode::SUCCESS)
}

async fn migrate(config: &Config, input: &Path, keep_existing: bool) -> Result<ExitCode> {
    let engine = open_engine(config).await?;
    let schema = CollectionSchema::standard(config.embedding.dimensions, config.storage.index);

    println!(
        "{} Migrating {} into {}",
        "→".blue(),
        input.display(),
        config.storage.collection_name.cyan()
    );
    let result = engine.import(input, &schema, !keep_existing).await;
    close_engine(&engine).await;
    let report = result?;

    println!("{} Migration complete", "✓".green().bold());
    println!("  Loaded:       {}", report.loaded);
    println!("  Inserted:     {} ({} failed)", report.upload.succeeded, report.upload.failed);
    println!("  Index built:  {}", if report.index_built { "yes" } else { "skipped" });
    println!("  Final count:  {}", report.final_count);
    if !report.smoke_test.is_empty() {
        println!("{}", "Test search with the first vector:".bold());
        for (i, hit) in report.smoke_test.iter().enumerate() {
            println!("  {}", describe_hit(i + 1, hit));
        }
    }

    Ok(if report.upload.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn show_config(config_path: &Path) -> Result<ExitCode> {
    let config = load_config(config_path)?;

    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:          {}", config.llm.model.cyan());
    println!("  Base URL:       {}", config.llm.base_url);
    println!("  Max Tokens:     {}", config.llm.max_tokens);
    match config.llm.temperature {
        Some(temperature) => println!("  Temperature:    {}", temperature),
        None => println!("  Temperature:    (endpoint default)"),
    }
    println!(
        "  API Key:        {}",
        if config.llm_api_key().is_some() { "set".green() } else { "missing".red() }
    );
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Model:          {}", config.embedding.model.cyan());
    println!("  Base URL:       {}", config.embedding.base_url);
    println!("  Dimensions:     {}", config.embedding.dimensions);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Chunk Size:     {}", config.rag.chunk_size);
    println!("  Chunk Overlap:  {}", config.rag.chunk_overlap);
    println!("  Batch Size:     {}", config.rag.batch_size);
    println!("  Top K:          {}", config.rag.top_k);
    println!();
    println!("{}", "Storage:".bold());
    match &config.storage.storage_mode {
        StorageMode::Grpc { url } => println!("  Qdrant:         {}", url),
        StorageMode::Embedded { path } => println!("  LanceDB:        {}", path),
        StorageMode::Memory => println!("  In-memory"),
    }
    println!("  Collection:     {}", config.storage.collection_name);
    println!(
        "  Index:          {:?} (nlist {}, nprobe {})",
        config.storage.index.index_type, config.storage.index.nlist, config.storage.index.nprobe
    );
    println!("  Export Path:    {}", config.export.path.display());

    Ok(ExitCode::SUCCESS)
}

fn set_model(config_path: &Path, model: &str) -> Result<ExitCode> {
    let content = std::fs::read_to_string(config_path)
        .context("Failed to read config file")?;

    let mut config: serde_yaml::Value = serde_yaml::from_str(&content)
        .context("Failed to parse config")?;

    let root = config
        .as_mapping_mut()
        .context("Config file must be a YAML mapping")?;
    let llm = root
        .entry(serde_yaml::Value::String("llm".to_string()))
        .or_insert_with(|| serde_yaml::Value::Mapping(Default::default()));
    let llm_map = llm
        .as_mapping_mut()
        .context("'llm' must be a YAML mapping")?;
    llm_map.insert(
        serde_yaml::Value::String("model".to_string()),
        serde_yaml::Value::String(model.to_string()),
    );

    let updated_content = serde_yaml::to_string(&config)
        .context("Failed to serialize config")?;

    std::fs::write(config_path, updated_content)
        .context("Failed to write config file")?;

    println!(
        "{} Model updated to: {}",
        "✓".green().bold(),
        model.cyan()
    );

    Ok(ExitCode::SUCCESS)
}
