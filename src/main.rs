//! # DebtWise: retrieval-grounded debt advice
//!
//! Usage:
//!   debtwise init                          # Write a default config
//!   debtwise index ./docs                  # Chunk, embed and store .txt/.md/.pdf files
//!   debtwise search "avalanche method"     # Show the top matching chunks
//!   debtwise ask "Which debt first?"       # Answer using retrieved context
//!   debtwise stats                         # Store, embedder and LLM status

use anyhow::Result;
use clap::{Parser, Subcommand};
use debtwise_core::DebtWiseConfig;
use debtwise_core::config::expand_path;
use debtwise_knowledge::{Indexer, RagPipeline, RecursiveSplitter, SimilarityRetriever};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "debtwise",
    version,
    about = "💸 DebtWise: debt advice grounded in your own documents"
)]
struct Cli {
    /// Config file (default: ~/.debtwise/config.toml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Index every .txt / .md / .pdf file in a directory
    Index {
        dir: PathBuf,
    },
    /// Show the chunks most similar to a query
    Search {
        query: String,
        /// Number of chunks (default: retrieval.top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        /// Print similarity scores and chunk ids
        #[arg(long)]
        scores: bool,
    },
    /// Answer a question using retrieved context
    Ask {
        question: String,
        /// Also print the model's <think> reasoning
        #[arg(long)]
        show_reasoning: bool,
    },
    /// Show store statistics and provider status
    Stats,
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(DebtWiseConfig::default_path)
}

fn load_config(cli: &Cli) -> Result<DebtWiseConfig> {
    let path = config_path(cli);
    let config = if path.exists() {
        DebtWiseConfig::load_from(&path)?
    } else {
        tracing::debug!("no config at {}, using defaults", path.display());
        DebtWiseConfig::default()
    };
    Ok(config)
}

fn build_retriever(config: &DebtWiseConfig) -> Result<Arc<SimilarityRetriever>> {
    let store = debtwise_knowledge::open_store(&config.store)?;
    let embedder = debtwise_providers::create_embedder(&config.embedding)?;
    let embedder_name = embedder.name().to_string();
    let retriever =
        SimilarityRetriever::new(store, embedder).with_similarity(config.retrieval.similarity);
    tracing::info!(
        "store={} embedder={} similarity={:?}",
        retriever.store().name(),
        embedder_name,
        retriever.similarity()
    );
    Ok(Arc::new(retriever))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "debtwise=debug,debtwise_knowledge=debug,debtwise_providers=debug"
    } else {
        "debtwise=info,debtwise_knowledge=info,debtwise_providers=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match &cli.command {
        Command::Init { force } => {
            let path = config_path(&cli);
            if path.exists() && !force {
                println!(
                    "⚠️  {} already exists (use --force to overwrite)",
                    path.display()
                );
                return Ok(());
            }
            DebtWiseConfig::default().save_to(&path)?;
            println!("✅ Wrote default config to {}", path.display());
        }

        Command::Index { dir } => {
            let config = load_config(&cli)?;
            let store = debtwise_knowledge::open_store(&config.store)?;
            let embedder = debtwise_providers::create_embedder(&config.embedding)?;
            let splitter = RecursiveSplitter::from_config(&config.chunking);
            let indexer = Indexer::new(store, embedder, splitter);
            let report = indexer.index_directory(dir).await?;
            println!(
                "✅ Indexed {} documents into {} chunks",
                report.documents, report.chunks
            );
        }

        Command::Search { query, top_k, scores } => {
            let config = load_config(&cli)?;
            let retriever = build_retriever(&config)?;
            let top_k = top_k.unwrap_or(config.retrieval.top_k);
            let results = retriever.retrieve_scored(query, top_k).await?;
            if results.is_empty() {
                println!("⚠️  No documents indexed yet. Run `debtwise index <dir>` first.");
            } else if *scores {
                println!("🔎 {:?} similarity\n", retriever.similarity());
            }
            for (i, r) in results.iter().enumerate() {
                if *scores {
                    println!("{}. [{:.4}] ({})\n{}\n", i + 1, r.score, r.chunk_id, r.text);
                } else {
                    println!("{}. {}\n", i + 1, r.text);
                }
            }
        }

        Command::Ask { question, show_reasoning } => {
            let config = load_config(&cli)?;
            let retriever = build_retriever(&config)?;
            let provider = debtwise_providers::create_provider(&config.llm)?;
            let pipeline = RagPipeline::new(retriever, provider, &config);

            let answer = pipeline.answer(question).await?;
            if answer.degraded {
                println!(
                    "⚠️  Knowledge base unavailable, answer is not grounded in your documents.\n"
                );
            }
            println!("{}", answer.text);
            if *show_reasoning {
                match &answer.reasoning {
                    Some(r) => println!("\n### Reasoning\n{r}"),
                    None => println!("\n(no reasoning returned)"),
                }
            }
            tracing::debug!("sources: {}", serde_json::to_string(&answer.sources)?);
        }

        Command::Stats => {
            let config = load_config(&cli)?;
            let store = debtwise_knowledge::open_store(&config.store)?;
            let len = store.len().await?;
            let dim = store.dimension().await?;
            println!("📚 Store:     {} ({})", store.name(), config.store.path);
            println!("   Chunks:    {len}");
            match dim {
                Some(d) => println!("   Dimension: {d}"),
                None => println!("   Dimension: (empty)"),
            }

            let embedder = debtwise_providers::create_embedder(&config.embedding)?;
            println!("🧮 Embedder:  {} ({})", embedder.name(), config.embedding.model);

            let provider = debtwise_providers::create_provider(&config.llm)?;
            let status = match provider.health_check().await {
                Ok(true) => "✅ ready".to_string(),
                Ok(false) => "⚠️  not reachable or API key missing".to_string(),
                Err(e) => format!("❌ {e}"),
            };
            println!("🤖 LLM:       {} ({}) {status}", provider.name(), config.llm.model);
        }
    }

    Ok(())
}
