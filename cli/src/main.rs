//! CLI entrypoint for Diagnostic Panel
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, bail};
use clap::Parser;
use panel_application::{
    AuditLogger, FlowRepository, NoAuditLogger, PanelParams, PanelRunReport, RunPanelInput,
    RunPanelUseCase,
};
use panel_domain::CaseId;
use panel_infrastructure::{
    CaseFile, ConfigLoader, FileConfig, FileOutputFormat, InMemoryFlowRepository,
    JsonlAuditLogger, OpenAiOracle, OpenAiOracleConfig, SqliteFlowRepository,
};
use panel_presentation::{Cli, ConsoleFormatter, OutputFormat, ProgressReporter};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = init_logging(&cli)?;

    info!("Starting Diagnostic Panel");

    if cli.show_config {
        ConfigLoader::print_config_sources();
        return Ok(());
    }

    // === Configuration ===
    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref()).context("Failed to load configuration")?
    };
    config.validate()?;

    if !config.output.color {
        colored::control::set_override(false);
    }

    let params = panel_params(&cli, &config);
    let format = cli.output.unwrap_or(match config.output.format.unwrap_or_default() {
        FileOutputFormat::Full => OutputFormat::Full,
        FileOutputFormat::Summary => OutputFormat::Summary,
        FileOutputFormat::Json => OutputFormat::Json,
    });

    // === Dependency Injection ===
    let oracle = Arc::new(build_oracle(&cli, &config)?);

    let audit_path = cli.audit_log.as_ref().or(config.logging.audit_log.as_ref());
    let audit: Arc<dyn AuditLogger> = match audit_path {
        Some(path) => Arc::new(
            JsonlAuditLogger::open(path)
                .with_context(|| format!("Failed to open audit log {}", path.display()))?,
        ),
        None => Arc::new(NoAuditLogger),
    };

    let case_file = cli
        .case_file
        .as_deref()
        .map(CaseFile::load)
        .transpose()?;
    let case_id = match (&cli.case_id, &case_file) {
        (Some(id), _) => CaseId::new(id.clone()),
        (None, Some(case)) => case.case_id.clone(),
        (None, None) => bail!("A case is required. Use --case-file, or --database with --case-id."),
    };

    let database = cli.database.as_ref().or(config.storage.database.as_ref());
    let report = match database {
        Some(path) => {
            let repository = Arc::new(
                SqliteFlowRepository::open(path)
                    .with_context(|| format!("Failed to open database {}", path.display()))?,
            );
            if let Some(case) = &case_file {
                repository.upsert_case(&case_id, &case.fields)?;
            }
            run(&cli, oracle, repository, audit, case_id, params).await?
        }
        None => {
            let Some(case) = case_file else {
                bail!("--case-id without --database: nothing to load the case from.");
            };
            let repository = Arc::new(InMemoryFlowRepository::new());
            repository.upsert_case(case_id.clone(), case.fields)?;
            run(&cli, oracle, repository, audit, case_id, params).await?
        }
    };

    let output = match format {
        OutputFormat::Full => ConsoleFormatter::format(&report),
        OutputFormat::Summary => ConsoleFormatter::format_summary(&report),
        OutputFormat::Json => ConsoleFormatter::format_json(&report),
    };

    println!("{}", output);

    Ok(())
}

/// Initialize logging based on verbosity level; `RUST_LOG` wins when set.
fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    });

    match &cli.log_file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let Some(file_name) = path.file_name() else {
                bail!("Invalid log file path: {}", path.display());
            };
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

/// Config file values, overridden by explicit flags
fn panel_params(cli: &Cli, config: &FileConfig) -> PanelParams {
    let mut params = config.panel.to_params();
    if let Some(max_steps) = cli.max_steps {
        params = params.with_max_steps(max_steps);
    }
    if let Some(threshold) = cli.threshold {
        params = params.with_commit_threshold(threshold);
    }
    if cli.seed.is_some() {
        params = params.with_seed(cli.seed);
    }
    params
}

fn build_oracle(cli: &Cli, config: &FileConfig) -> Result<OpenAiOracle> {
    let oracle = &config.oracle;
    let api_key = std::env::var(&oracle.api_key_env).ok();
    if api_key.is_none() {
        warn!(
            "{} is not set; the oracle will reject every request",
            oracle.api_key_env
        );
    }

    let oracle = OpenAiOracle::new(OpenAiOracleConfig {
        endpoint: cli.endpoint.clone().unwrap_or_else(|| oracle.endpoint.clone()),
        model: cli.model.clone().unwrap_or_else(|| oracle.model.clone()),
        api_key,
        timeout: oracle.timeout(),
        json_mode: oracle.json_mode,
    })?;
    Ok(oracle)
}

async fn run<R: FlowRepository + 'static>(
    cli: &Cli,
    oracle: Arc<OpenAiOracle>,
    repository: Arc<R>,
    audit: Arc<dyn AuditLogger>,
    case_id: CaseId,
    params: PanelParams,
) -> Result<PanelRunReport> {
    let use_case = RunPanelUseCase::new(oracle, repository).with_audit_logger(audit);
    let input = RunPanelInput::new(case_id).with_params(params);

    let report = if cli.quiet {
        use_case.execute(input).await?
    } else {
        let progress = ProgressReporter::new();
        use_case.execute_with_progress(input, &progress).await?
    };
    Ok(report)
}
