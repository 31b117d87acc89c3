use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use chrono::Utc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ai_client::{Claude, OpenAi};
use stancegraph_common::{
    config::load_config, AppConfig, FileConfig, IngestResponse, Provider, ThreadData,
};
use stancegraph_graph::{migrate::migrate, GraphClient, GraphReader, GraphWriter};
use stancegraph_pipeline::{
    ArgumentExtractor, DiscussionStore, GroupingEngine, Ingestor, StanceClassifier,
    StanceSummarizer, TextGenerator, ThreadClassifier, TopicIdentifier,
};

#[derive(Parser)]
#[command(name = "stancegraph", about = "Build a stance and argument graph from discussion threads")]
struct Cli {
    /// Path to config TOML file (models, timeouts, concurrency)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create graph constraints and indexes
    Migrate,
    /// Classify a thread JSON file if needed, then ingest it
    Ingest {
        /// Thread JSON produced by the scraper
        thread: PathBuf,
        /// Discussion URL; defaults to the post's url field
        #[arg(long)]
        url: Option<String>,
        /// Write the classified thread here before ingesting
        #[arg(long)]
        classified_out: Option<PathBuf>,
    },
    /// Recompute argument groups for a discussion
    Regroup { discussion_id: String },
    /// Print a discussion snapshot as JSON
    Show {
        discussion_id: String,
        /// Summarize each stance and store the summaries before printing
        #[arg(long)]
        summarize: bool,
    },
    /// List ingested discussions
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("stancegraph=info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let file_config = match &cli.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Migrate => {
            let client = connect(&config).await?;
            migrate(&client).await?;
            info!("Migrations complete");
        }
        Command::Ingest {
            thread,
            url,
            classified_out,
        } => {
            let response =
                run_ingest(&config, &file_config, &thread, url, classified_out.as_deref()).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.is_success() {
                std::process::exit(1);
            }
        }
        Command::Regroup { discussion_id } => {
            let client = connect(&config).await?;
            let store: Arc<dyn DiscussionStore> = Arc::new(GraphWriter::new(client));
            store.ping().await?;
            let engine = GroupingEngine::new(
                store,
                generator(&config, &file_config, &file_config.models.grouping)?,
                file_config.pipeline.llm_timeout(),
            );
            let stats = engine.regroup(&discussion_id).await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Show {
            discussion_id,
            summarize,
        } => {
            let client = connect(&config).await?;
            let reader = GraphReader::new(client.clone());
            let Some(mut snapshot) = reader.snapshot(&discussion_id).await? else {
                bail!("no discussion with id {discussion_id}");
            };
            if summarize {
                let summarizer = StanceSummarizer::new(
                    generator(&config, &file_config, &file_config.models.summary)?,
                    file_config.pipeline.llm_timeout(),
                );
                let summaries = summarizer.summarize_snapshot(&snapshot).await;
                GraphWriter::new(client)
                    .save_stance_summaries(&discussion_id, &summaries, Utc::now())
                    .await?;
                info!(discussion_id = discussion_id.as_str(), "Stance summaries saved");
                snapshot.summaries = summaries;
            }
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::List => {
            let reader = GraphReader::new(connect(&config).await?);
            let discussions = reader.list_discussions().await?;
            println!("{}", serde_json::to_string_pretty(&discussions)?);
        }
    }

    Ok(())
}

/// Every failure, including setup, is reported in the `{status: "error"}` shape.
async fn run_ingest(
    config: &AppConfig,
    file_config: &FileConfig,
    thread_path: &Path,
    url: Option<String>,
    classified_out: Option<&Path>,
) -> IngestResponse {
    match prepare_and_ingest(config, file_config, thread_path, url, classified_out).await {
        Ok(response) => response,
        Err(e) => IngestResponse::error(format!("{e:#}")),
    }
}

async fn prepare_and_ingest(
    config: &AppConfig,
    file_config: &FileConfig,
    thread_path: &Path,
    url: Option<String>,
    classified_out: Option<&Path>,
) -> Result<IngestResponse> {
    let raw = std::fs::read_to_string(thread_path)
        .with_context(|| format!("Failed to read thread file: {}", thread_path.display()))?;
    let mut thread: ThreadData = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse thread file: {}", thread_path.display()))?;
    let url = url.unwrap_or_else(|| thread.post.url.clone());

    let models = &file_config.models;
    let pipeline = &file_config.pipeline;
    let timeout = pipeline.llm_timeout();

    if thread.classified_comments.is_none() {
        let topic = match thread.topic.clone() {
            Some(topic) => topic,
            None => {
                TopicIdentifier::new(generator(config, file_config, &models.topic)?, timeout)
                    .identify(&thread.post.title, &thread.post.selftext)
                    .await
            }
        };
        let classifier = ThreadClassifier::new(
            StanceClassifier::new(generator(config, file_config, &models.classification)?, timeout),
            pipeline.classify_concurrency,
            pipeline.max_comments,
        );
        thread = classifier.classify_thread(thread, &topic).await;

        if let Some(path) = classified_out {
            std::fs::write(path, serde_json::to_string_pretty(&thread)?)
                .with_context(|| format!("Failed to write classified thread: {}", path.display()))?;
            info!(path = %path.display(), "Classified thread written");
        }
    }

    let client = connect(config).await?;
    migrate(&client).await?;
    let store: Arc<dyn DiscussionStore> = Arc::new(GraphWriter::new(client));

    let extraction = generator(config, file_config, &models.extraction)?;
    let ingestor = Ingestor::new(
        store.clone(),
        extraction.clone(),
        ArgumentExtractor::new(extraction, timeout),
        GroupingEngine::new(
            store,
            generator(config, file_config, &models.grouping)?,
            timeout,
        ),
    );

    Ok(ingestor.ingest(&url, &thread).await)
}

async fn connect(config: &AppConfig) -> Result<GraphClient> {
    GraphClient::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
        .await
        .with_context(|| format!("Failed to connect to Neo4j at {}", config.neo4j_uri))
}

/// A text generator for one task, on the configured provider.
fn generator(
    config: &AppConfig,
    file_config: &FileConfig,
    model: &str,
) -> Result<Arc<dyn TextGenerator>> {
    let provider = file_config.models.provider;
    let api_key = config.api_key_for(provider)?;
    let timeout = file_config.pipeline.llm_timeout();

    Ok(match provider {
        Provider::OpenAi => {
            let mut ai = OpenAi::new(api_key, model).with_timeout(timeout);
            if let Some(base_url) = &config.openai_base_url {
                ai = ai.with_base_url(base_url.as_str());
            }
            Arc::new(ai)
        }
        Provider::Anthropic => Arc::new(Claude::new(api_key, model).with_timeout(timeout)),
    })
}
