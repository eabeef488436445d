// src/main.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use casepilot::config::AppConfig;
use casepilot::llm::LlmClient;
use casepilot::pipeline::{self, RunOptions};
use casepilot::server;
use casepilot::sheets::{self, GoogleSheetsStore, SheetReporter};
use casepilot::testgen::{estimate_required_test_cases, TestCaseGenerator};

#[derive(Parser)]
#[command(
    name = "casepilot",
    version,
    about = "BRD-driven UI test automation: generate, execute, and report web test cases."
)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run a worksheet's test cases in Chrome and write results back
    Run(RunArgs),
    /// Generate test cases from a BRD text file
    Generate(GenerateArgs),
    /// Estimate how many test cases a BRD needs
    Estimate(EstimateArgs),
    /// List worksheets that carry test cases
    Worksheets,
    /// Blank the result columns of a worksheet
    Clear(ClearArgs),
    /// Serve the HTTP API
    Serve,
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[arg(long, help = "Worksheet holding the test cases")]
    worksheet: String,

    #[arg(long, help = "Run only this test id")]
    case: Option<String>,

    #[arg(long, help = "Run at most this many cases")]
    limit: Option<usize>,

    #[arg(long, default_value_t = false, help = "Force headless Chrome for this run")]
    headless: bool,
}

#[derive(Args, Debug, Clone)]
struct GenerateArgs {
    #[arg(long, help = "Path to the BRD text file")]
    brd: PathBuf,

    #[arg(long, help = "Target test-case count (estimated from the BRD when omitted)")]
    count: Option<usize>,

    #[arg(long, default_value_t = false, help = "Disable the 3-batch strategy")]
    single_batch: bool,

    #[arg(long, help = "Write the generated records to this JSON file")]
    out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct EstimateArgs {
    #[arg(long, help = "Path to the BRD text file")]
    brd: PathBuf,

    #[arg(long, default_value_t = 0, help = "Test cases already generated")]
    generated: usize,
}

#[derive(Args, Debug, Clone)]
struct ClearArgs {
    #[arg(long, help = "Worksheet whose result columns to blank")]
    worksheet: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env();
    cfg.bootstrap()?;

    match cli.command {
        CliCommand::Run(args) => cmd_run(cfg, args).await,
        CliCommand::Generate(args) => cmd_generate(cfg, args).await,
        CliCommand::Estimate(args) => cmd_estimate(cfg, args).await,
        CliCommand::Worksheets => cmd_worksheets(cfg).await,
        CliCommand::Clear(args) => cmd_clear(cfg, args).await,
        CliCommand::Serve => cmd_serve(cfg).await,
    }
}

async fn cmd_run(mut cfg: AppConfig, args: RunArgs) -> anyhow::Result<()> {
    if args.headless {
        cfg.headless = true;
    }
    let store = GoogleSheetsStore::from_config(&cfg)?;
    let model = LlmClient::from_app_config(&cfg)?;

    let opts = RunOptions { case_id: args.case, limit: args.limit };
    let summary = pipeline::run_suite(&cfg, &store, &model, &args.worksheet, &opts).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    anyhow::ensure!(
        summary.failed == 0,
        "{} of {} test cases failed",
        summary.failed,
        summary.total
    );
    Ok(())
}

async fn cmd_generate(cfg: AppConfig, args: GenerateArgs) -> anyhow::Result<()> {
    let brd = std::fs::read_to_string(&args.brd)
        .with_context(|| format!("reading BRD {}", args.brd.display()))?;
    let model = LlmClient::from_app_config(&cfg)?;

    let target = match args.count {
        Some(count) => count,
        None => estimate_required_test_cases(&model, &brd, 0).await,
    };
    info!(target, batch = !args.single_batch, "generating test cases");

    let generator = TestCaseGenerator::new(&model);
    let outcome = generator.generate(&brd, target, !args.single_batch).await;
    if !outcome.success {
        anyhow::bail!(
            "generation failed: {}",
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    let report = serde_json::json!({
        "total": outcome.records.len(),
        "breakdown": outcome.breakdown,
        "test_cases": outcome.records,
    });
    let text = serde_json::to_string_pretty(&report)?;
    match args.out {
        Some(path) => {
            std::fs::write(&path, text)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), count = outcome.records.len(), "test cases written");
        }
        None => println!("{text}"),
    }
    Ok(())
}

async fn cmd_estimate(cfg: AppConfig, args: EstimateArgs) -> anyhow::Result<()> {
    let brd = std::fs::read_to_string(&args.brd)
        .with_context(|| format!("reading BRD {}", args.brd.display()))?;
    let model = LlmClient::from_app_config(&cfg)?;

    let estimate = estimate_required_test_cases(&model, &brd, args.generated).await;
    println!("{estimate}");
    Ok(())
}

async fn cmd_worksheets(cfg: AppConfig) -> anyhow::Result<()> {
    let store = GoogleSheetsStore::from_config(&cfg)?;
    let mut list = sheets::list_worksheets(&store, &cfg.test_prefix).await?;

    let url = store.spreadsheet_url();
    for ws in &mut list {
        ws.url = Some(url.clone());
    }
    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}

async fn cmd_clear(cfg: AppConfig, args: ClearArgs) -> anyhow::Result<()> {
    let store = GoogleSheetsStore::from_config(&cfg)?;
    let cases = sheets::read_test_cases(&store, &args.worksheet, &cfg.test_prefix).await?;

    let reporter = SheetReporter::new(&store, &args.worksheet);
    let cleared = reporter.clear_results(&cases).await?;
    info!(worksheet = %args.worksheet, rows = cleared, "result columns cleared");
    Ok(())
}

async fn cmd_serve(cfg: AppConfig) -> anyhow::Result<()> {
    let store = GoogleSheetsStore::from_config(&cfg)?;
    let sheet_url = Some(store.spreadsheet_url());
    let model = LlmClient::from_app_config(&cfg)?;

    server::serve(cfg, Arc::new(store), Arc::new(model), sheet_url).await?;
    Ok(())
}
