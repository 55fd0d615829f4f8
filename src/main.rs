//! Lucid CLI - local summaries for documents, PDFs and video
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use lucid::source::supported_extensions;
use lucid::{ui, Config, ContentProcessor};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lucid")]
#[command(version, about = "Accessible summaries of documents, PDFs and video with a local LLM", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    summarise: SummariseArgs,
}

#[derive(Args)]
struct SummariseArgs {
    /// Files to summarise
    files: Vec<PathBuf>,
    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
    /// Also show the extracted source text
    #[arg(long)]
    source: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise one or more files
    Summarise(SummariseArgs),
    /// List models installed in the local Ollama service
    Models,
    /// Check that Ollama and the extraction tools are ready
    Check,
    /// List supported file formats
    Formats,
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Files processed at once in a batch; inference itself is bounded by config.
const BATCH_PARALLELISM: usize = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Summarise(args)) => summarise(args).await,
        Some(Commands::Models) => models().await,
        Some(Commands::Check) => check().await,
        Some(Commands::Formats) => {
            for (extension, category) in supported_extensions() {
                println!("  .{:<10} {}", extension, category);
            }
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "lucid", &mut std::io::stdout());
            Ok(())
        }
        None if !cli.summarise.files.is_empty() => summarise(cli.summarise).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

fn init(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }
}

async fn summarise(args: SummariseArgs) -> anyhow::Result<()> {
    let config = Config::load()?;
    init(&config);
    let processor = ContentProcessor::from_config(config)?;

    let cancel = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let results = processor
        .process_many_until(&args.files, BATCH_PARALLELISM, cancel)
        .await;

    let mut failures = 0;
    if args.json {
        let items: Vec<serde_json::Value> = args
            .files
            .iter()
            .zip(&results)
            .map(|(file, result)| match result {
                Ok(summary) => {
                    let mut value = serde_json::json!({
                        "file": file,
                        "summary": summary,
                    });
                    if args.source {
                        value["source_text"] = summary.source_text().into();
                    }
                    value
                }
                Err(e) => serde_json::json!({
                    "file": e.file(),
                    "error": { "kind": e.kind(), "message": ui::error_message(e.kind()), "cause": e.cause() },
                }),
            })
            .collect();
        failures = results.iter().filter(|r| r.is_err()).count();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for (file, result) in args.files.iter().zip(&results) {
            match result {
                Ok(summary) => println!("{}", ui::render_summary(file, summary, args.source)),
                Err(e) => {
                    failures += 1;
                    eprintln!("{}\n", ui::render_error(e));
                }
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} file(s) could not be summarised", results.len());
    }
    Ok(())
}

async fn models() -> anyhow::Result<()> {
    let config = Config::load()?;
    init(&config);
    let small = config.models.small.name.clone();
    let large = config.models.large.name.clone();
    let processor = ContentProcessor::from_config(config)?;

    let installed = processor.list_models().await?;
    if installed.is_empty() {
        println!("No models installed.");
    }
    for model in &installed {
        let role = if *model == small {
            " (small)".green().to_string()
        } else if *model == large {
            " (large)".green().to_string()
        } else {
            String::new()
        };
        println!("  {model}{role}");
    }

    for (tier, name) in [("small", &small), ("large", &large)] {
        if !installed.contains(name) {
            println!(
                "{}",
                format!("  configured {tier} model {name} is not installed (ollama pull {name})")
                    .yellow()
            );
        }
    }
    Ok(())
}

async fn check() -> anyhow::Result<()> {
    let config = Config::load()?;
    init(&config);
    let processor = ContentProcessor::from_config(config)?;

    let report = processor.check_health().await;
    print!("{}", ui::render_health(&report));
    if !report.is_healthy() {
        anyhow::bail!("lucid is not ready to summarise files");
    }
    Ok(())
}
