use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ai_client::{Gemini, RetryPolicy};
use freshservice_client::{is_valid_api_key, ExtractionProfile, FreshServiceClient};
use triage_common::file_config::FileConfig;
use triage_common::{
    dataset_name_for, AppConfig, BackendCredentials, CompanyCache, JobMode, PromptLibrary,
    RunConfig, Taxonomy, TicketPromptTemplate, Worklist,
};
use triage_pipeline::{
    BatchController, GeminiAnalyzer, PipelineDeps, RunEvent, RunHandle, RunOutcome,
};

const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Parser)]
#[command(name = "triage", about = "Batch support-ticket analysis with FreshService and Gemini")]
struct Cli {
    /// Path to config TOML file
    #[arg(long, default_value = "./triage.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and analyze a batch of tickets
    Run(RunArgs),
    /// List Gemini models that support content generation
    Models,
    /// List the prompts available for overall analysis
    Prompts,
    /// Department cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete the persisted department cache
    Clear,
}

#[derive(Args)]
struct RunArgs {
    /// Ticket input: JSON rows, a text file of ids, or a ticket extract
    input: PathBuf,

    /// Dotted path to the ticket id in each JSON row
    #[arg(long)]
    column: Option<String>,

    /// Treat the input as a full ticket extract and skip fetching
    #[arg(long)]
    extract: bool,

    #[arg(long)]
    mode: Option<JobMode>,

    #[arg(long)]
    profile: Option<ExtractionProfile>,

    /// Prompt id from the library (overall mode)
    #[arg(long)]
    prompt: Option<String>,

    #[arg(long)]
    model: Option<String>,

    /// Canned AI output; no Gemini calls
    #[arg(long)]
    simulate: bool,

    #[arg(long)]
    delay_ms: Option<u64>,

    /// Where to write the JSON report
    #[arg(long, default_value = "triage-report.json")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("triage=info".parse()?))
        .init();

    let cli = Cli::parse();
    let file_config = FileConfig::load_or_default(&cli.config)?;
    let app_config = AppConfig::from_env();

    match cli.command {
        Command::Run(args) => run(args, &cli.config, &file_config, &app_config).await,
        Command::Models => list_models(&file_config, &app_config).await,
        Command::Prompts => list_prompts(&cli.config, &file_config),
        Command::Cache {
            action: CacheAction::Clear,
        } => {
            let path = FileConfig::resolve_path(&cli.config, &file_config.cache.departments);
            CompanyCache::remove(&path)?;
            info!(path = %path.display(), "Department cache cleared");
            Ok(())
        }
    }
}

async fn run(
    args: RunArgs,
    config_path: &Path,
    file: &FileConfig,
    app: &AppConfig,
) -> Result<()> {
    let worklist = load_worklist(&args)?;
    let job_mode = args.mode.unwrap_or(file.run.job_mode);
    let simulate = args.simulate || file.run.simulate;
    let model = args
        .model
        .clone()
        .or_else(|| app.gemini_model.clone())
        .or_else(|| file.run.model.clone());

    let prompt = match (job_mode, &args.prompt) {
        (JobMode::Overall, Some(id)) => {
            let library = PromptLibrary::load(&FileConfig::resolve_path(config_path, &file.prompts.library))?;
            let prompt = library
                .get(id)
                .cloned()
                .with_context(|| format!("No prompt with id {id:?} in the library"))?;
            Some(prompt)
        }
        _ => None,
    };

    let backend = match (&app.freshservice_domain, &app.freshservice_api_key) {
        (Some(domain), Some(api_key)) => Some(BackendCredentials {
            domain: domain.clone(),
            api_key: api_key.clone(),
        }),
        _ => None,
    };

    let config = RunConfig::builder()
        .job_mode(job_mode)
        .extraction_profile(args.profile.unwrap_or(file.run.extraction_profile))
        .backend(backend.clone())
        .gemini_api_key(app.gemini_api_key.clone())
        .model(model.clone())
        .simulate(simulate)
        .api_delay(Duration::from_millis(args.delay_ms.unwrap_or(file.run.api_delay_ms)))
        .taxonomy(Taxonomy::new(&file.taxonomy.modules, &file.taxonomy.use_cases))
        .prompt(prompt)
        .dataset_name(dataset_name_for(Some(&args.input)))
        .build();
    config.validate(&worklist)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<RunEvent>();
    let mut deps = PipelineDeps::builder()
        .observer(Arc::new(tx))
        .department_cache(FileConfig::resolve_path(config_path, &file.cache.departments))
        .build();

    if let Some(creds) = backend.filter(|b| is_valid_api_key(&b.api_key)) {
        deps.fetcher = Some(Arc::new(FreshServiceClient::new(&creds.domain, creds.api_key)?));
    }
    if let (Some(key), Some(model)) = (&app.gemini_api_key, &model) {
        let retry = RetryPolicy::default()
            .with_max_attempts(file.retry.max_attempts)
            .with_base_delay(Duration::from_millis(file.retry.base_delay_ms));
        let template = match &file.prompts.per_ticket {
            Some(path) => TicketPromptTemplate::load(&FileConfig::resolve_path(config_path, path))?,
            None => TicketPromptTemplate::default(),
        };
        let gemini = Gemini::new(key.clone(), model.clone()).with_retry_policy(retry);
        deps.analyzer = Some(Arc::new(GeminiAnalyzer::new(gemini, template)));
    }

    let controller = Arc::new(BatchController::new(deps));
    spawn_controls(controller.handle());

    let progress = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::FetchProgress { done, total } => info!(done, total, "Fetching tickets"),
                RunEvent::AnalysisProgress { done, total } => info!(done, total, "Analyzing"),
                _ => {}
            }
        }
    });

    let summary = controller.clone().start(worklist, config).await??;
    drop(controller);
    progress.abort();

    let body = match &summary.outcome {
        RunOutcome::Completed(report) => {
            info!(run_id = %summary.run_id, "Run completed");
            serde_json::json!({ "run_id": summary.run_id, "status": "completed", "result": report, "stats": summary.stats })
        }
        RunOutcome::Cancelled { partial } => {
            warn!(run_id = %summary.run_id, "Run cancelled");
            serde_json::json!({ "run_id": summary.run_id, "status": "cancelled", "partial": partial, "stats": summary.stats })
        }
        RunOutcome::FatalFallback { message, partial } => {
            warn!(run_id = %summary.run_id, reason = %message, "Automated analysis stopped; partial data saved for manual processing");
            serde_json::json!({ "run_id": summary.run_id, "status": "fatal-fallback", "message": message, "partial": partial, "stats": summary.stats })
        }
        RunOutcome::PayloadTooLarge { token_count, limit } => {
            warn!(token_count, limit, "Dataset too large for the selected model. Try fewer tickets or a model with a larger context");
            serde_json::json!({ "run_id": summary.run_id, "status": "payload-too-large", "token_count": token_count, "limit": limit })
        }
        RunOutcome::NoValidData => {
            warn!("No valid ticket data was fetched; nothing to analyze");
            serde_json::json!({ "run_id": summary.run_id, "status": "no-valid-data", "stats": summary.stats })
        }
    };

    std::fs::write(&args.output, serde_json::to_string_pretty(&body)?)
        .with_context(|| format!("Failed to write report: {}", args.output.display()))?;
    info!(path = %args.output.display(), "Report written");
    Ok(())
}

fn load_worklist(args: &RunArgs) -> Result<Worklist> {
    if args.extract {
        return Worklist::load_extract(&args.input);
    }
    match args.input.extension().and_then(|e| e.to_str()) {
        Some("json") => Worklist::load_rows(&args.input, args.column.clone()),
        Some("txt") | None => Worklist::load_ids(&args.input),
        Some(other) => bail!("Unsupported input type: .{other} (use .json rows or a .txt id list)"),
    }
}

/// `p` + Enter toggles pause, `c` + Enter or Ctrl-C cancels.
fn spawn_controls(handle: RunHandle) {
    let keys = handle.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match line.trim() {
                "p" => {
                    let paused = keys.toggle_pause();
                    info!(paused, "Pause toggled");
                }
                "c" => {
                    keys.cancel();
                    info!("Cancelling after the current ticket");
                }
                _ => {}
            }
        }
    });
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.cancel();
            warn!("Ctrl-C received, cancelling");
        }
    });
}

async fn list_models(file: &FileConfig, app: &AppConfig) -> Result<()> {
    let key = app
        .gemini_api_key
        .clone()
        .context("GEMINI_API_KEY is required to list models")?;
    let model = app
        .gemini_model
        .clone()
        .or_else(|| file.run.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let models = Gemini::new(key, model).list_models().await?;
    for m in models {
        println!(
            "{:<40} {:<32} in={:<9} out={}",
            m.id,
            m.display_name.as_deref().unwrap_or("-"),
            m.input_token_limit.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
            m.output_token_limit.map(|n| n.to_string()).unwrap_or_else(|| "-".into()),
        );
    }
    Ok(())
}

fn list_prompts(config_path: &Path, file: &FileConfig) -> Result<()> {
    let library = PromptLibrary::load(&FileConfig::resolve_path(config_path, &file.prompts.library))?;
    if library.is_empty() {
        println!("No prompts defined");
    }
    for prompt in library.iter() {
        println!("{:<20} {}", prompt.id, prompt.name);
    }
    Ok(())
}
