use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde::Serialize;
use support_core::{
    evaluate_cases, load_dataset, load_faqs, Answer, Assistant, AssistantConfig, EmbeddingProvider,
    EvalCase, HashEmbeddingProvider, MiniLmEmbeddingProvider, ProviderChain, ProviderSettings, SearchIndex, Thresholds,
    DEFAULT_REQUIRED_PASS_RATE,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "support-agent")]
#[command(about = "Employee support assistant over a curated FAQ corpus")]
struct Cli {
    /// FAQ file (JSON array or .jsonl).
    #[arg(long, global = true, env = "FAQ_PATH", default_value = "data/faqs_large.json")]
    faqs: PathBuf,

    /// Used when --faqs does not exist.
    #[arg(long, global = true, env = "FAQ_FALLBACK_PATH", default_value = "data/faqs.json")]
    faqs_fallback: PathBuf,

    /// CSV side dataset for fallback search.
    #[arg(long, global = true, env = "DATASET_PATH", default_value = "data/dataset.csv")]
    dataset: PathBuf,

    /// Sentence encoder weights (.safetensors). With --tokenizer-path enables dense search.
    #[arg(long, global = true, env = "EMBED_MODEL_PATH")]
    model_path: Option<PathBuf>,

    #[arg(long, global = true, env = "EMBED_TOKENIZER_PATH")]
    tokenizer_path: Option<PathBuf>,

    /// Model-free dense search (feature hashing) when no sentence encoder is loaded.
    #[arg(long, global = true)]
    hash_embeddings: bool,

    /// Reduced-latency mode. FAST_MODE accepts 1/0, yes/no, on/off, true/false.
    #[arg(long, global = true, env = "FAST_MODE", value_parser = BoolishValueParser::new())]
    fast: bool,

    /// Never call a generative provider.
    #[arg(long, global = true)]
    offline: bool,

    #[arg(long, global = true)]
    dense_threshold: Option<f32>,

    #[arg(long, global = true)]
    sparse_threshold: Option<f32>,

    /// Dense threshold under --fast.
    #[arg(long, global = true)]
    dense_fast_threshold: Option<f32>,

    /// Sparse threshold under --fast.
    #[arg(long, global = true)]
    sparse_fast_threshold: Option<f32>,

    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Answer one question.
    Ask { question: String },
    /// Interactive session.
    Chat,
    /// Show the raw FAQ ranking for a question.
    Search {
        question: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Suggested starter questions.
    Suggest {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Check answer tiers against labelled cases.
    Eval {
        #[arg(long)]
        cases: PathBuf,
        #[arg(long, default_value_t = DEFAULT_REQUIRED_PASS_RATE)]
        min_pass_rate: f32,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

/// Dense search needs both model files, or --hash-embeddings. Anything
/// missing or unloadable leaves the sparse backend in charge.
fn make_embedder(cli: &Cli) -> Option<Arc<dyn EmbeddingProvider>> {
    let encoder = load_encoder(cli);
    if encoder.is_some() || !cli.hash_embeddings {
        return encoder;
    }
    info!("using feature-hashing embeddings");
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbeddingProvider::default());
    Some(provider)
}

fn load_encoder(cli: &Cli) -> Option<Arc<dyn EmbeddingProvider>> {
    let (model, tokenizer) = match (&cli.model_path, &cli.tokenizer_path) {
        (Some(m), Some(t)) => (m, t),
        (None, None) => return None,
        _ => {
            warn!("--model-path and --tokenizer-path must be given together");
            return None;
        }
    };

    match MiniLmEmbeddingProvider::load(model, tokenizer) {
        Ok(provider) => {
            info!(model = %model.display(), "sentence encoder loaded");
            let provider: Arc<dyn EmbeddingProvider> = Arc::new(provider);
            Some(provider)
        }
        Err(err) => {
            warn!(error = %err, "sentence encoder unavailable");
            None
        }
    }
}

fn make_config(cli: &Cli) -> AssistantConfig {
    let defaults = Thresholds::default();
    AssistantConfig {
        fast_mode: cli.fast,
        thresholds: Thresholds {
            dense: cli.dense_threshold.unwrap_or(defaults.dense),
            dense_fast: cli.dense_fast_threshold.unwrap_or(defaults.dense_fast),
            sparse: cli.sparse_threshold.unwrap_or(defaults.sparse),
            sparse_fast: cli.sparse_fast_threshold.unwrap_or(defaults.sparse_fast),
        },
        ..AssistantConfig::default()
    }
}

fn make_assistant(cli: &Cli, offline: bool) -> Result<Assistant> {
    let faqs = load_faqs(&cli.faqs, &cli.faqs_fallback)?;
    // the side dataset is optional; only the FAQ corpus is fatal
    let rows = load_dataset(&cli.dataset).unwrap_or_else(|err| {
        warn!(error = %err, "dataset unavailable, fallback search disabled");
        Vec::new()
    });
    let providers = if offline {
        ProviderChain::default()
    } else {
        ProviderChain::from_settings(&ProviderSettings::from_env())
    };

    Ok(Assistant::new(
        faqs,
        rows,
        SearchIndex::new(make_embedder(cli)),
        providers,
        make_config(cli),
    ))
}

fn print_answer(answer: &Answer, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{}", answer.text);
            if answer.metadata.escalate {
                println!("[escalate] this looks like an HR/legal matter; a human will follow up");
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(answer)?),
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn read_eval_cases(path: &Path) -> Result<Vec<EvalCase>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    serde_json::from_reader(file).context("parse eval cases json")
}

fn run_chat(assistant: &Assistant, format: OutputFormat) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    for s in assistant.suggestions(5) {
        println!("  try: {s}");
    }

    loop {
        let line = match rl.readline("you> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let trimmed = line.trim();
        if matches!(trimmed.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }
        if !trimmed.is_empty() {
            rl.add_history_entry(trimmed).ok();
        }

        print_answer(&assistant.answer(trimmed), format)?;
    }

    Ok(())
}

#[derive(Serialize)]
struct SearchRow<'a> {
    rank: usize,
    score: f32,
    question: &'a str,
    answer: &'a str,
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Ask { question } => {
            let assistant = make_assistant(&cli, cli.offline)?;
            print_answer(&assistant.answer(question), cli.format)?;
        }
        Commands::Chat => {
            let assistant = make_assistant(&cli, cli.offline)?;
            run_chat(&assistant, cli.format)?;
        }
        Commands::Search { question, top_k } => {
            let assistant = make_assistant(&cli, true)?;
            let rows: Vec<SearchRow> = assistant
                .search(question, *top_k)
                .into_iter()
                .enumerate()
                .map(|(i, m)| {
                    let faq = m.faq;
                    SearchRow {
                        rank: i + 1,
                        score: m.score,
                        question: &faq.question,
                        answer: &faq.answer,
                    }
                })
                .collect();

            match cli.format {
                OutputFormat::Json => print_json(&rows)?,
                OutputFormat::Text => {
                    println!("backend={:?}", assistant.index().backend());
                    for r in &rows {
                        println!("{} score={:.4} question={}", r.rank, r.score, r.question);
                    }
                }
            }
        }
        Commands::Suggest { limit } => {
            let assistant = make_assistant(&cli, true)?;
            let suggestions = assistant.suggestions(*limit);
            match cli.format {
                OutputFormat::Json => print_json(&suggestions)?,
                OutputFormat::Text => suggestions.iter().for_each(|s| println!("{s}")),
            }
        }
        Commands::Eval {
            cases,
            min_pass_rate,
        } => {
            let run_id = format!("eval-{}", chrono::Utc::now().timestamp_millis());
            let assistant = make_assistant(&cli, true)?;
            let cases = read_eval_cases(cases)?;
            let summary = evaluate_cases(&assistant, &cases);

            match cli.format {
                OutputFormat::Json => print_json(&summary)?,
                OutputFormat::Text => {
                    println!(
                        "run_id={} backend={:?} total={} passed={} failed={} pass_rate={:.4} required={:.4}",
                        run_id,
                        assistant.index().backend(),
                        summary.total,
                        summary.passed,
                        summary.failed,
                        summary.pass_rate,
                        min_pass_rate
                    );
                    for o in &summary.outcomes {
                        println!(
                            "case={} passed={} tier={:?} score={} latency={:.1}ms",
                            o.case_id,
                            o.passed,
                            o.actual_tier,
                            o.top_score.map_or("null".to_string(), |s| format!("{s:.4}")),
                            o.latency_ms
                        );
                    }
                }
            }

            if !summary.meets(*min_pass_rate) {
                anyhow::bail!(
                    "pass rate {:.4} below required {:.4}",
                    summary.pass_rate,
                    min_pass_rate
                );
            }
        }
    }

    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
