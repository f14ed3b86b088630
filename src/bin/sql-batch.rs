use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use sql_batch::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a batch of SQL statements against a SQLite database")]
struct Args {
    /// Database file; created if missing.
    #[arg(long)]
    db: PathBuf,
    /// Result flavor: bool, increment, affected, all, column, row, value,
    /// pair, unique, count or check.
    #[arg(long, default_value = "bool", value_parser = parse_flavor)]
    flavor: Flavor,
    /// Column index for the `column` flavor.
    #[arg(long)]
    column: Option<usize>,
    /// Shared bindings as a JSON object, e.g. `{"id": 1, "?1": "x"}`.
    #[arg(long)]
    bindings: Option<String>,
    /// Treat the statement argument as a JSON batch (string, array of
    /// statements, or `[text, bindings]` pairs).
    #[arg(long)]
    json: bool,
    /// JSON engine config file.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    max_tries: Option<u32>,
    #[arg(long)]
    sleep_secs: Option<u64>,
    #[arg(long)]
    max_run_time_secs: Option<u64>,
    /// Dump bound parameters of every statement.
    #[arg(long)]
    debug: bool,
    /// Print query statistics to stderr when done.
    #[arg(long)]
    stats: bool,
    /// SQL text, or `-` to read from stdin.
    sql: String,
}

fn parse_flavor(raw: &str) -> Result<Flavor, SqlBatchError> {
    raw.parse()
}

fn init_tracing(debug: bool) {
    let default = if debug { "sql_batch=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn engine_config(args: &Args) -> Result<EngineConfig, SqlBatchError> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    }
    .with_env_overrides()?;
    if let Some(tries) = args.max_tries {
        config.set_max_tries(tries);
    }
    if let Some(secs) = args.sleep_secs {
        config.set_sleep(Duration::from_secs(secs));
    }
    if let Some(secs) = args.max_run_time_secs {
        config.set_max_run_time(Duration::from_secs(secs));
    }
    Ok(config)
}

fn read_input(args: &Args) -> Result<BatchInput, SqlBatchError> {
    let text = if args.sql == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| SqlBatchError::ConfigError(format!("cannot read stdin: {e}")))?;
        buf
    } else {
        args.sql.clone()
    };
    if !args.json {
        return Ok(BatchInput::Text(text));
    }
    let value: serde_json::Value = serde_json::from_str(&text)
        .map_err(|e| SqlBatchError::Validation(format!("batch is not valid JSON: {e}")))?;
    BatchInput::from_json(&value)
}

async fn run(args: Args) -> Result<(), SqlBatchError> {
    let config = engine_config(&args)?;
    let input = read_input(&args)?;
    let bindings = match &args.bindings {
        Some(raw) => {
            let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
                SqlBatchError::Validation(format!("bindings are not valid JSON: {e}"))
            })?;
            bindings_from_json(&value)?
        }
        None => Bindings::new(),
    };
    let flavor = match (args.flavor, args.column) {
        (Flavor::Column(_), Some(idx)) => Flavor::Column(idx),
        (flavor, _) => flavor,
    };

    let provider = SqliteProvider::open(&args.db).await?;
    let mut engine = BatchEngine::new(config).with_provider(std::sync::Arc::new(provider));
    let output = engine
        .query_with(
            input,
            &bindings,
            flavor,
            QueryOptions::default().with_debug(args.debug),
        )
        .await?;

    let rendered = serde_json::to_string_pretty(&output.to_json())
        .map_err(|e| SqlBatchError::Other(format!("cannot render output: {e}")))?;
    println!("{rendered}");
    if args.stats {
        let stats = serde_json::to_string_pretty(engine.stats())
            .map_err(|e| SqlBatchError::Other(format!("cannot render stats: {e}")))?;
        eprintln!("{stats}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.debug);
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "batch failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
