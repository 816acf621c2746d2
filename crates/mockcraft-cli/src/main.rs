mod config;
mod registry;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use thiserror::Error;

use config::CliConfig;
use mockcraft_backend::{BackendError, Context, Driver, connect_backend, redact_dsn};
use mockcraft_core::{Params, Schema, plan_order_with_deferral};
use mockcraft_generate::{GeneratorEngine, GeneratorError};
use mockcraft_seed::{SeedError, Seeder, new_run_id, validate_and_enhance};
use registry::{LogFormat, RunConfig, collect_git_info, init_logging, start_run, write_report};

const DRY_RUN_DSN: &str = "memory://dry-run";

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("schema error: {0}")]
    Schema(#[from] mockcraft_core::Error),
    #[error("generator error: {0}")]
    Generator(#[from] GeneratorError),
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("seed failed ({}): {}", .0.kind(), .0)]
    Seed(#[from] SeedError),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("integrity violation: {orphans} orphaned references across {relationships} relationships")]
    IntegrityViolation { orphans: u64, relationships: usize },
}

#[derive(Parser, Debug)]
#[command(name = "mockcraft", version, about = "Synthetic data seeder")]
struct Cli {
    /// Settings file; defaults to ./mockcraft.toml when present.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Log output format on stderr.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create and populate every table of a schema.
    Seed(SeedArgs),
    /// Validate a schema and print its table order.
    Validate(ValidateArgs),
    /// Draw values from one generator.
    Generate(GenerateArgs),
    /// List industries, or the generators of one industry.
    List(ListArgs),
    /// Describe one generator.
    Info(InfoArgs),
    /// Dump a database with the backend's native tooling.
    Backup(TransferArgs),
    /// Load a dump produced by `backup`.
    Restore(TransferArgs),
    /// Print the JSON Schema of the schema document.
    SchemaJson,
}

#[derive(Args, Debug)]
struct SeedArgs {
    /// Schema document (YAML).
    #[arg(long, short = 's')]
    schema: PathBuf,
    /// Target database URL.
    #[arg(long, env = "MOCKCRAFT_DSN")]
    dsn: Option<String>,
    /// Seed an in-process store instead of a database; ignores --dsn.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// PRNG seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Rows per insert call.
    #[arg(long)]
    batch_size: Option<usize>,
    /// Keep existing tables instead of dropping them first.
    #[arg(long, default_value_t = false)]
    no_drop: bool,
    /// Skip the post-seed integrity check.
    #[arg(long, default_value_t = false)]
    no_verify: bool,
    /// Back up the target here before seeding.
    #[arg(long, value_name = "PATH")]
    backup: Option<PathBuf>,
    /// Require at least this many valid relationships when any are declared.
    #[arg(long, value_name = "N")]
    min_relationships: Option<usize>,
    /// Abort the run after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
    /// Output directory for run artifacts.
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[arg(long, short = 's')]
    schema: PathBuf,
    #[arg(long, value_name = "N")]
    min_relationships: Option<usize>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Generator name.
    name: String,
    #[arg(long, default_value = "base")]
    industry: String,
    /// Generator parameter as `key=value`; values are parsed as JSON when possible.
    #[arg(long = "param", short = 'p', value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, serde_json::Value)>,
    #[arg(long, short = 'n', default_value_t = 1)]
    count: usize,
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Args, Debug)]
struct ListArgs {
    industry: Option<String>,
}

#[derive(Args, Debug)]
struct InfoArgs {
    industry: String,
    name: String,
}

#[derive(Args, Debug)]
struct TransferArgs {
    #[arg(long, env = "MOCKCRAFT_DSN")]
    dsn: Option<String>,
    /// Dump file.
    #[arg(long, value_name = "PATH")]
    path: PathBuf,
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let config = CliConfig::discover(cli.config.as_deref()).map_err(CliError::InvalidConfig)?;
    let log_format = cli.log_format.or(config.log_format).unwrap_or_default();

    match cli.command {
        Command::Seed(args) => run_seed(args, config, log_format).await,
        command => {
            init_logging(log_format, None)?;
            match command {
                Command::Validate(args) => run_validate(args, &config),
                Command::Generate(args) => run_generate(args),
                Command::List(args) => run_list(args),
                Command::Info(args) => run_info(args),
                Command::Backup(args) => run_transfer(args, &config, true).await,
                Command::Restore(args) => run_transfer(args, &config, false).await,
                Command::SchemaJson => run_schema_json(),
                Command::Seed(_) => Ok(()),
            }
        }
    }
}

async fn run_seed(args: SeedArgs, config: CliConfig, log_format: LogFormat) -> Result<(), CliError> {
    let mut options = config.seed.clone();
    if let Some(seed) = args.seed {
        options.seed = seed;
    }
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    if args.no_drop {
        options.drop_before_create = false;
    }
    if args.no_verify {
        options.verify = false;
    }
    if args.backup.is_some() {
        options.backup_path = args.backup.clone();
    }
    if args.min_relationships.is_some() {
        options.validation.min_valid_relationships = args.min_relationships;
    }

    let dsn = if args.dry_run {
        DRY_RUN_DSN.to_string()
    } else {
        args.dsn
            .or(config.dsn.clone())
            .ok_or_else(|| CliError::InvalidConfig("--dsn or MOCKCRAFT_DSN is required".to_string()))?
    };
    let driver = Driver::from_dsn(&dsn)?;
    let schema = Schema::from_path(&args.schema)?;

    let run_id = new_run_id();
    let run_dir = args
        .run_dir
        .or(config.run_dir.clone())
        .unwrap_or_else(|| PathBuf::from("runs"));
    let run_config = RunConfig {
        run_id: run_id.clone(),
        started_at: Utc::now().to_rfc3339(),
        command: "seed".to_string(),
        schema_path: Some(args.schema.clone()),
        driver: driver.to_string(),
        connection: redact_dsn(&dsn),
        options: options.clone(),
        git: collect_git_info(),
    };
    let paths = start_run(&run_dir, &run_config)?;
    init_logging(log_format, Some(&paths.logs_path))?;
    tracing::info!(event = "run_started", run_id = %run_id, driver = %driver, dir = %paths.root.display());

    let ctx = run_context(args.timeout);
    let timer = Instant::now();
    let backend = connect_backend(&dsn, &ctx).await?;
    let mut seeder = Seeder::new(backend, options)
        .with_context(ctx)
        .with_run_id(run_id.clone());
    let result = seeder.seed(schema).await;
    let mut backend = seeder.into_backend();
    if let Err(err) = backend.close().await {
        tracing::warn!(error = %err, "backend close failed");
    }

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            tracing::error!(event = "run_failed", kind = %err.kind(), error = %err);
            return Err(err.into());
        }
    };
    write_report(&paths, &report)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let duration_ms = timer.elapsed().as_millis();
    if report.verification_failed() {
        let relationships = report
            .verification
            .iter()
            .filter(|check| !check.is_valid())
            .count();
        tracing::error!(event = "run_finished", status = "integrity_violation", duration_ms = duration_ms);
        return Err(CliError::IntegrityViolation {
            orphans: report.orphan_count(),
            relationships,
        });
    }
    tracing::info!(event = "run_finished", status = "success", rows = report.total_rows(), duration_ms = duration_ms);
    Ok(())
}

fn run_validate(args: ValidateArgs, config: &CliConfig) -> Result<(), CliError> {
    let mut schema = Schema::from_path(&args.schema)?;
    let mut validation = config.seed.validation.clone();
    if args.min_relationships.is_some() {
        validation.min_valid_relationships = args.min_relationships;
    }
    let engine = GeneratorEngine::new(config.seed.seed);
    let summary = validate_and_enhance(&mut schema, &engine, &validation)?;
    let plan = plan_order_with_deferral(&schema);
    let output = json!({
        "tables": summary.tables,
        "columns": summary.columns,
        "relationships": summary.relationships,
        "order": plan.order,
        "circular": plan.circular,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let mut engine = GeneratorEngine::new(args.seed);
    engine.validate(&args.industry, &args.name)?;
    let params: Params = args.params.into_iter().collect();
    for _ in 0..args.count {
        let value = engine.generate(&args.industry, &args.name, &params)?;
        println!("{}", value.to_json());
    }
    Ok(())
}

fn run_list(args: ListArgs) -> Result<(), CliError> {
    let engine = GeneratorEngine::new(0);
    let names = match &args.industry {
        Some(industry) => {
            let names = engine.list_generators(industry);
            if names.is_empty() {
                return Err(CliError::InvalidConfig(format!("unknown industry: {industry}")));
            }
            names
        }
        None => engine.list_industries(),
    };
    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn run_info(args: InfoArgs) -> Result<(), CliError> {
    let engine = GeneratorEngine::new(0);
    let info = engine.info(&args.industry, &args.name)?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

async fn run_transfer(args: TransferArgs, config: &CliConfig, backup: bool) -> Result<(), CliError> {
    let dsn = args
        .dsn
        .or(config.dsn.clone())
        .ok_or_else(|| CliError::InvalidConfig("--dsn or MOCKCRAFT_DSN is required".to_string()))?;
    let ctx = run_context(args.timeout);
    let mut backend = connect_backend(&dsn, &ctx).await?;
    let result = if backup {
        backend.backup(&ctx, &args.path).await
    } else {
        backend.restore(&ctx, &args.path).await
    };
    backend.close().await?;
    result?;
    let event = if backup { "backup_written" } else { "restore_finished" };
    tracing::info!(
        event = event,
        path = %args.path.display(),
        dsn = %redact_dsn(&dsn)
    );
    Ok(())
}

fn run_schema_json() -> Result<(), CliError> {
    let schema = schemars::schema_for!(Schema);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Context tripped by Ctrl-C and bounded by `timeout` seconds.
fn run_context(timeout: Option<u64>) -> Context {
    let ctx = match timeout {
        Some(seconds) => Context::new().with_timeout(Duration::from_secs(seconds)),
        None => Context::new(),
    };
    let signal_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!(event = "interrupted", "cancelling run");
            signal_ctx.cancel();
        }
    });
    ctx
}

fn parse_param(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty parameter name in `{raw}`"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_parse_as_json_or_text() {
        assert_eq!(parse_param("min=5"), Ok(("min".to_string(), json!(5))));
        assert_eq!(
            parse_param("values=[\"a\",\"b\"]"),
            Ok(("values".to_string(), json!(["a", "b"])))
        );
        assert_eq!(parse_param("charset=abc"), Ok(("charset".to_string(), json!("abc"))));
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=1").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn seed_flags_parse() {
        let cli = Cli::try_parse_from([
            "mockcraft", "seed", "--schema", "schema.yaml", "--dry-run", "--seed", "42", "--no-verify",
        ])
        .expect("parse");
        match cli.command {
            Command::Seed(args) => {
                assert!(args.dry_run);
                assert_eq!(args.seed, Some(42));
                assert!(args.no_verify);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
