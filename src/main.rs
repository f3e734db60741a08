//! Tutorlens CLI
//!
//! Usage:
//!   tutorlens distribution data.json --conditional     # Tutor actions per student action
//!   tutorlens agreement data.json                      # Inter-annotator agreement
//!   tutorlens generate data.json --model openai/gpt-4o # Collect model responses (resumable)
//!   tutorlens compare data.json --model openai/gpt-4o  # Human vs model + chi-square
//!   tutorlens normalize data.json --turns --json       # Normalized records

use std::path::{Path, PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tutorlens::core::{
    collect_responses, export_human_responses, stamp, write_json_atomic, AgreementEngine,
    DatasetNormalization, DistributionEngine, OpenRouterClient, RecordNormalizer, ResponseStore,
};
use tutorlens::types::{
    ActionLabel, ActionsPerResponse, AgreementReport, ConditionalDistribution, Distribution,
    SourceComparison, StudentAction, TutorAction,
};
use tutorlens::{Result, DEFAULT_GENERATION_URL, DEFAULT_MAX_ATTEMPTS, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "tutorlens",
    version = VERSION,
    about = "Tutorlens - Statistics over annotated language-tutoring dialogues",
    long_about = "Tutorlens normalizes annotated tutoring conversations and reports\n\
                  how tutors respond to students.\n\n\
                  Commands:\n  \
                  normalize     Cleaned records as JSON\n  \
                  distribution  Tutor-action frequencies (overall / per student action)\n  \
                  agreement     Pairwise agreement between parallel tutor responses\n  \
                  export        Human annotations as a response file\n  \
                  generate      Collect model responses into a resumable cache\n  \
                  compare       Human vs model distributions with a chi-square test"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    no_color: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print normalized conversations
    Normalize {
        #[command(flatten)]
        dataset: DatasetArg,

        /// Segment into tutor/student turns
        #[arg(long)]
        turns: bool,
    },

    /// Tutor-action distribution
    Distribution {
        #[command(flatten)]
        dataset: DatasetArg,

        /// Break down by student action
        #[arg(long)]
        conditional: bool,

        /// Also show the labels-per-response histogram
        #[arg(long)]
        per_response: bool,
    },

    /// Agreement between parallel tutor responses
    Agreement {
        #[command(flatten)]
        dataset: DatasetArg,
    },

    /// Write human annotations as a response file
    Export {
        #[command(flatten)]
        dataset: DatasetArg,

        /// Output file
        out: PathBuf,
    },

    /// Generate model responses for every conversation not yet cached
    Generate {
        #[command(flatten)]
        dataset: DatasetArg,

        #[command(flatten)]
        model: ModelArgs,

        /// Only the first N conversations
        #[arg(long)]
        limit: Option<usize>,

        /// Generation calls per conversation, first try included
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        attempts: u32,

        /// Generation service API key
        #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
        api_key: String,

        /// OpenAI-compatible chat-completion endpoint
        #[arg(long, default_value = DEFAULT_GENERATION_URL)]
        endpoint: String,
    },

    /// Compare cached model responses against the human annotations
    Compare {
        #[command(flatten)]
        dataset: DatasetArg,

        #[command(flatten)]
        model: ModelArgs,
    },
}

#[derive(ClapArgs, Debug)]
struct DatasetArg {
    /// Dataset JSON file
    dataset: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct ModelArgs {
    /// Model id, e.g. openai/gpt-4o
    #[arg(long)]
    model: String,

    /// Directory holding <model>_responses.json caches
    #[arg(long, default_value = ".")]
    cache_dir: PathBuf,
}

/// Normalized dataset plus the raw bytes it came from
struct Loaded {
    bytes: Vec<u8>,
    normalized: DatasetNormalization,
}

impl Loaded {
    fn stamp<T: Serialize>(&self, result: T) -> tutorlens::types::AnalysisReport<T> {
        stamp(
            result,
            &self.bytes,
            self.normalized.conversations.len(),
            self.normalized.failure_count(),
        )
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(&cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Normalize { dataset, turns } => {
            let loaded = load(&dataset.dataset)?;
            if *turns {
                print_json(&loaded.stamp(loaded.normalized.turns()))
            } else {
                print_json(&loaded.stamp(&loaded.normalized.conversations))
            }
        }

        Command::Distribution {
            dataset,
            conditional,
            per_response,
        } => {
            let loaded = load(&dataset.dataset)?;
            let engine = DistributionEngine::new();
            let convs = &loaded.normalized.conversations;

            #[derive(Serialize)]
            struct DistributionOutput {
                #[serde(skip_serializing_if = "Option::is_none")]
                unconditional: Option<Distribution>,
                #[serde(skip_serializing_if = "Option::is_none")]
                conditional: Option<ConditionalDistribution>,
                #[serde(skip_serializing_if = "Option::is_none")]
                actions_per_response: Option<ActionsPerResponse>,
            }

            let output = DistributionOutput {
                unconditional: (!conditional).then(|| engine.unconditional(convs)),
                conditional: conditional.then(|| engine.conditional(convs)),
                actions_per_response: per_response.then(|| engine.actions_per_response(convs)),
            };

            if cli.json {
                return print_json(&loaded.stamp(output));
            }
            if let Some(dist) = &output.unconditional {
                print_distribution("Tutor actions", dist);
            }
            if let Some(cond) = &output.conditional {
                print_conditional(cond);
            }
            if let Some(hist) = &output.actions_per_response {
                print_histogram(hist);
            }
            Ok(())
        }

        Command::Agreement { dataset } => {
            let loaded = load(&dataset.dataset)?;
            let report = AgreementEngine::new().agreement(&loaded.normalized.conversations);
            if cli.json {
                print_json(&loaded.stamp(report))
            } else {
                print_agreement(&report);
                Ok(())
            }
        }

        Command::Export { dataset, out } => {
            let loaded = load(&dataset.dataset)?;
            let entries = export_human_responses(&loaded.normalized.conversations);
            write_json_atomic(out, &entries)?;
            eprintln!("Exported {} conversations to {}", entries.len(), out.display());
            Ok(())
        }

        Command::Generate {
            dataset,
            model,
            limit,
            attempts,
            api_key,
            endpoint,
        } => {
            let loaded = load(&dataset.dataset)?;
            let convs = &loaded.normalized.conversations;
            let convs = &convs[..limit.unwrap_or(convs.len()).min(convs.len())];

            let client = OpenRouterClient::new(api_key.as_str())?.with_url(endpoint.as_str());
            let mut store = ResponseStore::open(&model.cache_dir, &model.model)?;
            let summary = collect_responses(&mut store, &client, convs, *attempts).await?;

            if cli.json {
                return print_json(&summary);
            }
            println!("{}", format!("Responses for {}", model.model).bold());
            println!("  generated:  {}", summary.generated.to_string().green());
            println!("  cached:     {}", summary.cached);
            println!("  failed:     {}", fmt_nonzero(summary.failed));
            println!("  sentinel:   {}", fmt_nonzero(summary.sentinel));
            println!("  cache file: {}", store.path().display());
            Ok(())
        }

        Command::Compare { dataset, model } => {
            let loaded = load(&dataset.dataset)?;
            let human = &loaded.normalized.conversations;
            let store = ResponseStore::open(&model.cache_dir, &model.model)?;
            let synthetic = store.synthesize(human);

            let comparison = AgreementEngine::new().compare_sources(human, &synthetic)?;
            if cli.json {
                print_json(&loaded.stamp(comparison))
            } else {
                print_comparison(&model.model, &comparison);
                Ok(())
            }
        }
    }
}

/// Read and normalize a dataset file; failures are reported, not fatal
fn load(path: &Path) -> Result<Loaded> {
    let bytes = std::fs::read(path)?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    let normalized = RecordNormalizer::new().normalize_dataset(&value)?;

    if normalized.failure_count() > 0 {
        eprintln!(
            "{} {} record(s) skipped",
            "warning:".yellow().bold(),
            normalized.failure_count()
        );
        for failure in &normalized.failures {
            eprintln!("  {}", format!("{}: {}", failure.id, failure.error).dimmed());
        }
    }

    Ok(Loaded { bytes, normalized })
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn fmt_nonzero(n: usize) -> colored::ColoredString {
    if n == 0 {
        n.to_string().normal()
    } else {
        n.to_string().yellow()
    }
}

fn print_distribution(title: &str, dist: &Distribution) {
    println!("{}", title.bold());
    if dist.is_empty() {
        println!("  {}", "(no labelled responses)".dimmed());
        return;
    }
    for (label, p) in dist.iter() {
        println!("  {:<14} {:>6.1}%", label.name(), p * 100.0);
    }
    println!();
}

fn print_conditional(cond: &ConditionalDistribution) {
    println!("{}", "Tutor actions by student action".bold());

    let mut header = format!("  {:<12}", "");
    for label in TutorAction::ALL {
        header.push_str(&format!(" {:>12}", label.name()));
    }
    println!("{}", header.cyan());

    for student in StudentAction::ALL {
        let Some(dist) = cond.get(student) else {
            continue;
        };
        let mut row = format!("  {:<12}", student.name());
        for label in TutorAction::ALL {
            row.push_str(&format!(" {:>12.2}", dist.get(*label)));
        }
        println!("{}", row);
    }
    println!();
}

fn print_histogram(hist: &ActionsPerResponse) {
    println!("{}", "Actions per response".bold());
    for (size, p) in hist {
        println!("  {:<3} {:>6.1}%", size, p * 100.0);
    }
    println!();
}

fn print_agreement(report: &AgreementReport) {
    println!("{}", "Agreement".bold());
    println!("  pairs:        {}", report.pair_count);
    println!(
        "  exact match:  {}",
        format!("{:.3}", report.overall_agreement).green()
    );
    for (label, rate) in &report.per_action_agreement {
        println!("  {:<13} {:.3}", label.name(), rate);
    }
}

fn print_comparison(model: &str, cmp: &SourceComparison) {
    println!("{}", format!("Human (n={}) vs {} (n={})", cmp.human_n, model, cmp.model_n).bold());
    println!("  {:<14} {:>8} {:>8}", "", "human".cyan(), "model".cyan());
    for label in TutorAction::ALL {
        println!(
            "  {:<14} {:>7.1}% {:>7.1}%",
            label.name(),
            cmp.human_distribution.get(*label) * 100.0,
            cmp.model_distribution.get(*label) * 100.0
        );
    }

    let chi = &cmp.chi_square;
    let p = format!("{:.4}", chi.p_value);
    let p = if chi.p_value < 0.05 { p.red() } else { p.green() };
    println!();
    println!(
        "  chi-square = {:.3} (dof {}), p = {}",
        chi.statistic, chi.degrees_of_freedom, p
    );
}
