// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::metadata::LevelFilter;
use tracing::{debug, error, info};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer, Registry};

use nginx_shipper::ingest::persistence::{LoadOutcome, PersistedStateV1, StateFile};
use nginx_shipper::ingest::{IngestConfig, IngestionDriver, PassReport, describe_state};
use nginx_shipper::init::args::{DdlArgs, RunArgs, StateArgs};
use nginx_shipper::store::{BoxedError, create_store, schema_script};

const DEFAULT_LOG_RETENTION: usize = 7;

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Run one ingestion pass and exit
    Run(Box<RunArgs>),

    /// Print the nginx_logs table definition, or apply it with --apply
    Ddl(DdlArgs),

    /// Print the persisted progress state
    State(StateArgs),

    /// Return version
    Version,
}

#[derive(Debug, Parser)]
#[command(name = "nginx-shipper")]
#[command(bin_name = "nginx-shipper")]
#[command(version, about, long_about = None)]
#[command(subcommand_required = true)]
struct Arguments {
    #[arg(
        value_enum,
        long,
        global = true,
        env = "NGINX_SHIPPER_LOG_FORMAT",
        default_value = "text"
    )]
    /// Log format
    log_format: LogFormatArg,

    #[arg(long, global = true, env = "LOG_LEVEL")]
    /// Log filter directive (e.g. "debug" or "nginx_shipper=debug"); overrides RUST_LOG
    log_level: Option<String>,

    #[arg(long, global = true, env = "LOG_FILE")]
    /// Write logs to a daily-rolling file instead of stdout; errors are mirrored to stderr
    log_file: Option<PathBuf>,

    #[arg(long, global = true, env = "LOG_RETENTION", default_value_t = DEFAULT_LOG_RETENTION)]
    /// Number of daily log files kept when logging to a file
    log_retention: usize,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let mut opt = Arguments::parse();

    match opt.command.take() {
        Some(Commands::Version) => {
            println!("{}", get_version());
        }
        Some(Commands::State(args)) => return print_state(&args.state_file),
        Some(Commands::Ddl(args)) if !args.apply => {
            print!("{}", schema_script(args.backend()));
        }
        Some(Commands::Ddl(args)) => {
            let _guard = match setup_logging(&opt) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("ERROR: failed to setup logging: {}", e);
                    return ExitCode::from(1);
                }
            };

            if let Err(e) = apply_schema(args) {
                error!(error = e, "Failed to apply schema.");
                return ExitCode::from(1);
            }
        }
        Some(Commands::Run(args)) => {
            let _guard = match setup_logging(&opt) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("ERROR: failed to setup logging: {}", e);
                    return ExitCode::from(1);
                }
            };

            match run_pass(args) {
                Ok(report) => log_report(&report),
                Err(e) => {
                    error!(error = e, "Fatal error in ingestion pass.");
                    return ExitCode::from(1);
                }
            }
        }
        None => {
            // it shouldn't be possible to get here since we mark a subcommand as
            // required
            eprintln!("ERROR: must specify a command");
            return ExitCode::from(2);
        }
    }

    ExitCode::SUCCESS
}

#[tokio::main(flavor = "current_thread")]
async fn run_pass(args: Box<RunArgs>) -> Result<PassReport, BoxedError> {
    let config = IngestConfig::from(&args.ingest);
    let driver = IngestionDriver::new(config)?;

    let store_config = args.database.store_config()?;
    debug!(
        backend = store_config.backend.as_str(),
        database = %store_config.redacted(),
        "Connecting to store"
    );
    let store = create_store(&store_config).await?;

    if !args.database.skip_schema {
        if let Err(e) = store.initialize().await {
            store.close().await;
            return Err(e.into());
        }
    }

    let result = driver.run_pass(store.as_ref()).await;
    store.close().await;

    Ok(result?)
}

#[tokio::main(flavor = "current_thread")]
async fn apply_schema(args: DdlArgs) -> Result<(), BoxedError> {
    let store_config = args.database.store_config()?;
    let store = create_store(&store_config).await?;

    let result = store.initialize().await;
    store.close().await;
    result?;

    info!(
        backend = store_config.backend.as_str(),
        database = %store_config.redacted(),
        "Schema applied"
    );
    Ok(())
}

fn log_report(report: &PassReport) {
    if let Some(drained) = &report.drained {
        info!(
            path = %drained.path.display(),
            records = drained.stats.records_emitted,
            unmatched = drained.stats.unmatched,
            "Drained rotated log file"
        );
    }

    info!(
        rotated = report.rotated,
        truncation_reset = report.truncation_reset,
        lines = report.lines_read,
        records = report.records_emitted,
        inserted = report.records_inserted,
        unmatched = report.unmatched,
        "Processed up to offset {} in {}",
        report.offset,
        report.active_path.display()
    );
}

fn print_state(path: &Path) -> ExitCode {
    let state = match StateFile::new(path).load() {
        LoadOutcome::Corrupt(reason) => {
            eprintln!("ERROR: {}: {}", path.display(), reason);
            return ExitCode::from(1);
        }
        outcome => outcome.into_state(),
    };

    match serde_json::to_string_pretty(&PersistedStateV1::from(&state)) {
        Ok(json) => {
            println!("{}", json);
            eprintln!("{}", describe_state(&state));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: failed to encode state: {}", e);
            ExitCode::from(1)
        }
    }
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

/// Subscriber stack below the output layers.
type FilteredRegistry = Layered<EnvFilter, Registry>;

fn setup_logging(opt: &Arguments) -> Result<LoggerGuard, BoxedError> {
    LogTracer::init()?;

    let (non_blocking_writer, guard) = match &opt.log_file {
        Some(path) => tracing_appender::non_blocking(rolling_log_file(path, opt.log_retention)?),
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let subscriber = build_subscriber(opt, non_blocking_writer)?;
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(guard)
}

/// Daily-rolling appender that keeps at most `retention` files.
fn rolling_log_file(path: &Path, retention: usize) -> Result<RollingFileAppender, BoxedError> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| format!("log file has no file name: {}", path.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(name.to_string_lossy().into_owned())
        .max_log_files(retention.max(1))
        .build(dir)?;
    Ok(appender)
}

fn build_subscriber<W>(
    opt: &Arguments,
    writer: W,
) -> Result<impl tracing::Subscriber + Send + Sync + 'static, BoxedError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = match &opt.log_level {
        Some(directive) => EnvFilter::builder().parse(directive)?,
        None => EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env()?,
    }
    .add_directive("sqlx=warn".parse()?);

    let output: Box<dyn Layer<FilteredRegistry> + Send + Sync> = match opt.log_format {
        LogFormatArg::Json => {
            let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), get_version());
            JsonStorageLayer
                .and_then(BunyanFormattingLayer::new(app_name, writer))
                .boxed()
        }
        LogFormatArg::Text => {
            use std::io::IsTerminal;

            // Skip color codes when not in a terminal
            let use_ansi = opt.log_file.is_none() && std::io::stdout().is_terminal();

            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_target(false)
                .with_level(true)
                .with_ansi(use_ansi)
                .compact()
                .boxed()
        }
    };

    // A scheduler watching the process still sees failures when logs go to a file
    let stderr_layer = opt.log_file.as_ref().map(|_| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(false)
            .compact()
            .with_filter(LevelFilter::ERROR)
    });

    Ok(Registry::default()
        .with(filter)
        .with(output)
        .with(stderr_layer))
}

fn get_version() -> String {
    // Set during CI
    let version_build = option_env!("BUILD_SHORT_SHA").unwrap_or("dev");

    format!("{}-{}", env!("CARGO_PKG_VERSION"), version_build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tracing::warn;

    fn parse(args: &[&str]) -> Arguments {
        Arguments::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_subscriber_builds_for_every_format() {
        let dir = TempDir::new().unwrap();
        let log_file = dir.path().join("shipper.log");
        let log_file = log_file.to_str().unwrap();

        for format in ["text", "json"] {
            for file in [None, Some(log_file)] {
                let mut args = vec!["nginx-shipper", "--log-format", format, "--log-level", "info"];
                if let Some(f) = file {
                    args.extend(["--log-file", f]);
                }
                args.push("version");
                let opt = parse(&args);

                let subscriber = build_subscriber(&opt, std::io::sink).unwrap();
                tracing::subscriber::with_default(subscriber, || {
                    warn!(format, "Logging configured");
                });
            }
        }
    }

    #[test]
    fn test_rolling_log_file_writes_into_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("shipper.log");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();

        let mut appender = rolling_log_file(&path, 3).unwrap();
        std::io::Write::write_all(&mut appender, b"line\n").unwrap();
        std::io::Write::flush(&mut appender).unwrap();

        let names: Vec<String> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("shipper.log"));
    }

    #[test]
    fn test_log_retention_default_and_env_flag() {
        let opt = parse(&["nginx-shipper", "version"]);
        assert_eq!(opt.log_retention, DEFAULT_LOG_RETENTION);

        let opt = parse(&["nginx-shipper", "--log-retention", "14", "version"]);
        assert_eq!(opt.log_retention, 14);
    }

    #[test]
    fn test_rolling_log_file_requires_file_name() {
        assert!(rolling_log_file(Path::new("/"), 7).is_err());
    }
}
