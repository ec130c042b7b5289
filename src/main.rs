use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hotelrag_cli::{
    EmbedderKind, GeneratorKind, Session, Settings, StoreKind, display_banner, print_chunk,
    print_references, prompt_line,
};
use hotelrag_core::{EmbeddingProvider, GenerativeBackend, Query, ResponseChunk, SimilarityStore};
use hotelrag_gemini::GeminiClient;
use hotelrag_ollama::OllamaClient;
use hotelrag_rag::{
    FilterExtractor, LocalVectorStore, QdrantVectorStore, RagConfig, RagPipeline,
    SupabaseVectorStore,
};

#[derive(Parser)]
#[command(name = "hotelrag")]
#[command(about = "Chat about Tokyo hotels and Airbnb listings", long_about = None)]
struct Cli {
    /// Ask a single question and exit
    #[arg(short, long)]
    query: Option<String>,

    /// Minimum similarity of a listing, in [0, 1]
    #[arg(long)]
    threshold: Option<f32>,

    /// Maximum number of listings used per answer
    #[arg(long)]
    count: Option<usize>,

    #[arg(long, value_enum)]
    embedder: Option<EmbedderKind>,

    #[arg(long, value_enum)]
    generator: Option<GeneratorKind>,

    #[arg(long, value_enum)]
    store: Option<StoreKind>,

    /// JSON Lines listings file for the local store
    #[arg(long)]
    local_store: Option<PathBuf>,

    /// Ask the generator for price bounds mentioned in each question
    #[arg(long)]
    extract_filters: bool,

    /// Debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings(&cli)?;

    let embedder = build_embedder(settings.embedder)?;
    let generator = build_generator(settings.generator)?;
    let store = connect_store(&settings, embedder.dimension()).await?;

    let mut pipeline = RagPipeline::new(
        embedder.clone(),
        store,
        generator.clone(),
        RagConfig::default(),
    )?;
    if settings.extract_filters {
        pipeline = pipeline.with_filter_extractor(FilterExtractor::new(generator.clone()));
    }

    let mut session = Session::new();

    // Handle one-shot questions
    if let Some(question) = cli.query {
        ask(&pipeline, &settings, &mut session, &question).await?;
        return Ok(());
    }

    // Interactive mode
    display_banner(embedder.model_id(), generator.model_id(), &settings.store.to_string());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt_line()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.to_lowercase().as_str() {
            "exit" | "quit" => break,
            "clear" => {
                session.clear();
                println!("{}", "Conversation cleared.".dimmed());
                continue;
            }
            _ => {}
        }

        ask(&pipeline, &settings, &mut session, input).await?;
    }

    println!("{}", "Goodbye!".green());
    Ok(())
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::from_env()?;

    if let Some(threshold) = cli.threshold {
        settings.threshold = threshold;
    }
    if let Some(count) = cli.count {
        settings.count = count;
    }
    if let Some(embedder) = cli.embedder {
        settings.embedder = embedder;
    }
    if let Some(generator) = cli.generator {
        settings.generator = generator;
    }
    if let Some(store) = cli.store {
        settings.store = store;
    }
    if let Some(path) = &cli.local_store {
        settings.local_store_path = Some(path.clone());
    }
    settings.extract_filters |= cli.extract_filters;

    settings.validate()?;
    Ok(settings)
}

fn build_embedder(kind: EmbedderKind) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match kind {
        EmbedderKind::Ollama => Arc::new(OllamaClient::from_env()?),
        EmbedderKind::Gemini => Arc::new(GeminiClient::from_env()?),
    };
    Ok(embedder)
}

fn build_generator(kind: GeneratorKind) -> Result<Arc<dyn GenerativeBackend>> {
    let generator: Arc<dyn GenerativeBackend> = match kind {
        GeneratorKind::Ollama => Arc::new(OllamaClient::from_env()?),
        GeneratorKind::Gemini => Arc::new(GeminiClient::from_env()?),
    };
    Ok(generator)
}

async fn connect_store(settings: &Settings, dimension: usize) -> Result<Arc<dyn SimilarityStore>> {
    let store: Arc<dyn SimilarityStore> = match settings.store {
        StoreKind::Supabase => {
            let mut store = SupabaseVectorStore::from_env()?;
            store.connect().await.context("Failed to connect to Supabase")?;
            Arc::new(store)
        }
        StoreKind::Qdrant => {
            let mut store = QdrantVectorStore::from_env()?;
            store.connect().await.context("Failed to connect to Qdrant")?;
            Arc::new(store)
        }
        StoreKind::Local => {
            let path = settings
                .local_store_path
                .as_ref()
                .context("The local store needs a listings file")?;
            let mut store = LocalVectorStore::new(dimension);
            store.connect().await?;
            store
                .load_jsonl(path)
                .await
                .with_context(|| format!("Failed to load listings from {}", path.display()))?;
            Arc::new(store)
        }
    };
    Ok(store)
}

/// Stream one answer to stdout. Ctrl-C cancels this answer only.
async fn ask(
    pipeline: &RagPipeline,
    settings: &Settings,
    session: &mut Session,
    question: &str,
) -> Result<()> {
    info!(query = %question, "User query");

    let history = session.trailing(pipeline.config().history_turns);
    let query = Query::new(question).with_history(history);
    let mut response = pipeline.respond(query, settings.threshold, settings.count, None)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut answer = String::new();
    let cancelled = loop {
        tokio::select! {
            chunk = response.next() => match chunk {
                Some(chunk) => {
                    if let ResponseChunk::Text(text) = &chunk {
                        answer.push_str(text);
                    }
                    print_chunk(&chunk)?;
                }
                None => break false,
            },
            _ = &mut ctrl_c => break true,
        }
    };

    println!();
    if cancelled {
        println!("{}", "Answer cancelled.".dimmed());
    } else {
        print_references(response.references());
    }
    drop(response);

    info!(answer = %answer, cancelled, "Assistant response");
    session.record(question, &answer);
    Ok(())
}
