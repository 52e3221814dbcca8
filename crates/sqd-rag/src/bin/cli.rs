//! Operator CLI: ask, index, evaluate, invoke

use anyhow::Context;
use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sqd_rag::{
    config::AppConfig,
    deployment::{DeploymentClient, Invocation, DEFAULT_QUERY},
    evaluation::{load_dataset, parse_metrics, Evaluator},
    ingestion::Indexer,
    providers::azure::{AzureOpenAiClient, AzureSearchClient},
    types::conversation::{flatten_history, HistoryEntry},
    ChatPipeline,
};

/// Retrieval-augmented chat over Azure OpenAI and Azure AI Search
#[derive(Parser, Debug)]
#[command(name = "sqd-rag", author, version, about)]
struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer one chat turn locally
    Ask {
        /// The user turn
        #[arg(long)]
        query: String,

        /// JSON file with prior turns
        #[arg(long, value_name = "FILE")]
        history: Option<PathBuf>,
    },

    /// Upload the text files of a directory to the search index
    Index {
        /// Directory to index (defaults to indexing.data_dir)
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Score the pipeline against a JSONL dataset
    Evaluate {
        /// JSONL file with chat_input and ground_truth fields
        #[arg(long, value_name = "FILE")]
        evaluation_data_path: PathBuf,

        /// Name recorded in the report
        #[arg(long, default_value = "eval-sdk-dev")]
        evaluation_name: String,

        /// Metrics to compute
        #[arg(long, num_args = 1.., required = true, value_name = "METRIC")]
        metrics: Vec<String>,

        /// Write per-row results as JSONL
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Send a query to the deployed scoring endpoint
    Invoke {
        /// Query to send
        #[arg(long)]
        query: Option<String>,

        /// Request a streamed response
        #[arg(long)]
        stream: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Command::Ask { query, history } => ask(&config, &query, history.as_deref()).await,
        Command::Index { data_dir } => index(&config, data_dir).await,
        Command::Evaluate {
            evaluation_data_path,
            evaluation_name,
            metrics,
            output,
        } => {
            let passed = evaluate(
                &config,
                &evaluation_data_path,
                &evaluation_name,
                &metrics,
                output.as_deref(),
            )
            .await?;
            if !passed {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Invoke { query, stream } => {
            invoke(&config, query.as_deref().unwrap_or(DEFAULT_QUERY), stream).await
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "sqd_rag=warn",
        1 => "sqd_rag=info",
        _ => "sqd_rag=debug",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_pipeline(config: &AppConfig) -> anyhow::Result<ChatPipeline> {
    config.validate_connections()?;
    let openai = Arc::new(AzureOpenAiClient::new(&config.openai, &config.network)?);
    let search = Arc::new(AzureSearchClient::new(&config.search, &config.network)?);
    Ok(ChatPipeline::new(config, openai.clone(), search, openai))
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn ask(config: &AppConfig, query: &str, history_path: Option<&Path>) -> anyhow::Result<()> {
    let history = match history_path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let entries: Vec<HistoryEntry> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid history in {}", path.display()))?;
            flatten_history(entries)
        }
        None => Vec::new(),
    };

    let pipeline = build_pipeline(config)?;
    let pb = spinner("Thinking...");
    let result = pipeline.handle_turn(query, &history).await;
    pb.finish_and_clear();
    let response = result?;

    println!("{}", style("Reply").bold().cyan());
    println!("{}\n", response.reply);
    println!("{}", style("Context").bold().cyan());
    if response.context.is_empty() {
        println!("{}", style("(no documents retrieved)").dim());
    } else {
        println!("{}", response.context);
    }
    Ok(())
}

async fn index(config: &AppConfig, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    config.validate_connections()?;
    let dir = data_dir.unwrap_or_else(|| config.indexing.data_dir.clone());

    let openai = Arc::new(AzureOpenAiClient::new(&config.openai, &config.network)?);
    let search = Arc::new(AzureSearchClient::new(&config.search, &config.network)?);
    let indexer = Indexer::new(&config.indexing, openai, search);

    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} chunks {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }

    let report = indexer
        .index_directory_with_progress(&dir, |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        })
        .await;
    pb.finish_and_clear();
    let report = report?;

    println!(
        "{} Indexed {} chunks from {} files into '{}' in {}ms",
        style("✓").green(),
        report.chunks_uploaded,
        report.files_indexed,
        config.search.index_name,
        report.elapsed_ms
    );
    for path in &report.skipped {
        println!("  {} skipped {}", style("-").dim(), path.display());
    }
    Ok(())
}

async fn evaluate(
    config: &AppConfig,
    data_path: &Path,
    name: &str,
    metric_names: &[String],
    output: Option<&Path>,
) -> anyhow::Result<bool> {
    let metrics = parse_metrics(metric_names)?;
    let rows = load_dataset(data_path)
        .with_context(|| format!("Failed to load {}", data_path.display()))?;

    let pipeline = build_pipeline(config)?;
    let judge = AzureOpenAiClient::new(&config.openai, &config.network)?
        .with_chat_deployment(config.openai.judge_deployment());
    let evaluator = Evaluator::new(pipeline, Arc::new(judge), config.evaluation.clone());

    let pb = spinner(&format!("Evaluating {} rows...", rows.len()));
    let result = evaluator.run(name, &rows, &metrics).await;
    pb.finish_and_clear();
    let report = result?;

    println!("{}", style("-----Summarized Metrics-----").bold());
    for summary in &report.summaries {
        let line = format!(
            "{:<14} mean {:>6.3}  {:>6.2}%",
            summary.metric.name(),
            summary.mean,
            summary.percentage
        );
        if summary.passed {
            println!("{} {}", style("✓").green(), line);
        } else {
            println!("{} {}", style("✗").red(), line);
        }
    }

    if let Some(path) = output {
        report.write_rows(path)?;
        println!("Rows written to {}", path.display());
    }

    let passed = report.passed();
    if !passed {
        println!(
            "{}",
            style(format!(
                "Not all metrics are above {}%. Please review the results.",
                report.threshold_percent
            ))
            .yellow()
        );
    }
    Ok(passed)
}

async fn invoke(config: &AppConfig, query: &str, stream: bool) -> anyhow::Result<()> {
    let client = DeploymentClient::new(&config.deployment, &config.network)?;

    if stream {
        client.invoke_with(query, true, |line| println!("{}", line)).await?;
        return Ok(());
    }

    match client.invoke(query, false).await? {
        Invocation::Reply(reply) => println!("\n{}", reply),
        Invocation::Lines(lines) => lines.iter().for_each(|l| println!("{}", l)),
    }
    Ok(())
}
