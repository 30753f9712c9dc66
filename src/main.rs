use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use resilient_reporter::config::AppConfig;
use resilient_reporter::io::space;
use resilient_reporter::report::{AggregatedData, GenerationOptions, GenerationResult};
use resilient_reporter::ui::{format_duration, human_bytes, TerminalProgress};
use resilient_reporter::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "resilient-reporter")]
#[command(about = "Recover malformed test output and generate test reports that survive failures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, YAML or JSON)
    #[arg(long, global = true, env = "RESILIENT_REPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Recover test results (or coverage) from a possibly malformed file
    Recover {
        /// Input file, `-` for stdin
        input: PathBuf,

        /// Treat the input as a coverage summary
        #[arg(long)]
        coverage: bool,

        /// Write the recovered JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recover test results and generate reports
    Generate {
        /// Jest JSON output, `-` for stdin
        #[arg(short, long)]
        input: PathBuf,

        /// Directory the reports are written to
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Formats to generate (comma-separated: html, markdown, json)
        #[arg(short, long, value_delimiter = ',', default_values_t = [ReportFormat::Html, ReportFormat::Json])]
        format: Vec<ReportFormat>,

        /// Generate formats concurrently
        #[arg(long)]
        parallel: bool,

        /// Upper bound on concurrent generators
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Coverage summary to include
        #[arg(long)]
        coverage: Option<PathBuf>,

        /// Report title
        #[arg(long)]
        title: Option<String>,

        /// Do not render progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Remove old report backups
    CleanupBackups {
        /// Maximum age to keep (e.g. 12h, 7d)
        #[arg(long, default_value = "7d", value_parser = humantime::parse_duration)]
        max_age: Duration,
    },

    /// Check whether a directory has room for a report of the given size
    Space {
        /// Directory to check
        dir: PathBuf,

        /// Bytes that need to fit
        bytes: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    #[cfg(not(feature = "color-output"))]
    colored::control::set_override(false);

    let mut config = AppConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if cli.debug {
        config.error_handling.log_level = LogLevel::Debug;
        config.error_handling.enable_detailed_logging = true;
    }

    let handler = Arc::new(ErrorHandler::new(config.error_handling.clone()));
    let fs = Arc::new(ResilientFileSystem::new(
        config.file_system.clone(),
        handler.clone(),
    ));

    let ok = match cli.command {
        Commands::Recover {
            input,
            coverage,
            output,
        } => recover(&config, &fs, &input, coverage, output.as_deref()).await?,
        Commands::Generate {
            input,
            output_dir,
            format,
            parallel,
            max_concurrency,
            coverage,
            title,
            no_progress,
        } => {
            let mut options = GenerationOptions::new(format, &output_dir).parallel(parallel);
            if let Some(max) = max_concurrency {
                options = options.with_max_concurrency(max);
            }
            if let Some(title) = title {
                options = options.with_title(title);
            }
            if !no_progress {
                options = options.with_progress(Arc::new(TerminalProgress::stderr(30)));
            }
            generate(&config, &fs, &input, coverage.as_deref(), options).await?
        }
        Commands::CleanupBackups { max_age } => {
            let removed = fs.cleanup_backups(max_age).await;
            println!(
                "Removed {} backup(s) older than {} from {}",
                removed,
                humantime::format_duration(max_age),
                config.file_system.backup_directory.display()
            );
            true
        }
        Commands::Space { dir, bytes } => check_space(&fs, &dir, bytes).await,
    };

    if handler.is_system_degraded() {
        eprintln!(
            "{}",
            "Warning: several serious errors occurred, output may be incomplete".yellow()
        );
    }

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let default_level = if cli.debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr_layer = if cli.json_logs {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_target(false).with_writer(std::io::stderr).boxed()
    };

    let (file_layer, guard) = match &cli.log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .context("--log-file must name a file")?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn read_input(fs: &ResilientFileSystem, input: &Path) -> Result<String> {
    if input == Path::new("-") {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    fs.read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))
}

fn print_recovery_notes(label: &str, recovery: &TestResultRecovery) {
    for warning in &recovery.warnings {
        eprintln!("{} {}: {}", "warning".yellow(), label, warning);
    }
    for error in &recovery.errors {
        eprintln!("{} {}: {}", "error".red(), label, error);
    }
    if recovery.used_fallback() {
        eprintln!(
            "{} {}: input was unusable, minimal data substituted",
            "note".cyan(),
            label
        );
    }
}

async fn recover(
    config: &AppConfig,
    fs: &Arc<ResilientFileSystem>,
    input: &Path,
    coverage: bool,
    output: Option<&Path>,
) -> Result<bool> {
    let text = read_input(fs, input).await?;
    let recovery = MalformedDataRecovery::new(config.recovery.clone()).with_handler(fs.handler().clone());

    let (label, result) = if coverage {
        ("coverage", recovery.recover_coverage_text(&text))
    } else {
        ("test results", recovery.recover_jest_text(&text))
    };
    print_recovery_notes(label, &result);

    let Some(data) = result.data() else {
        eprintln!("{}", "No data could be recovered".red());
        return Ok(false);
    };

    let json = serde_json::to_string_pretty(data)?;
    match output {
        Some(path) => {
            fs.write_file(path, &json).await?;
            eprintln!("Recovered {} written to {}", label, path.display());
        }
        None => println!("{}", json),
    }
    Ok(result.success)
}

async fn generate(
    config: &AppConfig,
    fs: &Arc<ResilientFileSystem>,
    input: &Path,
    coverage: Option<&Path>,
    options: GenerationOptions,
) -> Result<bool> {
    let recovery = MalformedDataRecovery::new(config.recovery.clone()).with_handler(fs.handler().clone());

    let text = read_input(fs, input).await?;
    let results = recovery.recover_jest_text(&text);
    print_recovery_notes("test results", &results);
    let mut data = AggregatedData::from_recovery(&results);

    if let Some(path) = coverage {
        let coverage_text = read_input(fs, path).await?;
        let recovered = recovery.recover_coverage_text(&coverage_text);
        print_recovery_notes("coverage", &recovered);
        data.warnings.extend(recovered.warnings.iter().cloned());
        if let Some(summary) = recovered.data() {
            data = data.with_coverage(summary.clone());
        }
    }

    let factory = ReportGeneratorFactory::new(fs.clone(), config.generation.clone());
    let result = tokio::select! {
        result = factory.generate_reports(&data, options) => result?,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n{}", "Interrupted, reports may be incomplete".red());
            return Ok(false);
        }
    };

    print_summary(&data, &result);
    Ok(result.success)
}

fn print_summary(data: &AggregatedData, result: &GenerationResult) {
    let summary = &data.summary;
    println!();
    println!(
        "Tests: {} total, {} passed, {} failed, {} pending ({:.1}% pass rate)",
        summary.total_tests,
        summary.passed_tests.to_string().green(),
        summary.failed_tests.to_string().red(),
        summary.pending_tests,
        summary.pass_rate()
    );

    for report in &result.reports {
        let note = if report.fallback_used { " (fallback)" } else { "" };
        println!(
            "  {} {:<8} {} {}{}",
            "✓".green(),
            report.format.to_string(),
            report.file_path.display(),
            human_bytes(report.size as f64),
            note.yellow()
        );
    }
    for failure in &result.errors {
        println!(
            "  {} {:<8} failed while {}: {}",
            "✗".red(),
            failure.format.to_string(),
            failure.stage,
            failure.message
        );
    }
    if !result.temp_files.is_empty() {
        println!("  {} stray temp file(s) handled", result.temp_files.len());
    }
    println!(
        "Reports written to {} in {}",
        result.output_directory.display(),
        format_duration(result.total_time.as_secs())
    );
}

async fn check_space(fs: &ResilientFileSystem, dir: &Path, bytes: u64) -> bool {
    let lookup = dir.to_path_buf();
    let available = tokio::task::spawn_blocking(move || space::available_space(&lookup))
        .await
        .ok()
        .flatten();
    let enough = fs.has_enough_space(dir, bytes).await;

    match available {
        Some(available) => println!(
            "{}: {} available, {} required (+10% margin)",
            dir.display(),
            human_bytes(available as f64),
            human_bytes(bytes as f64)
        ),
        None => println!("{}: free space unknown", dir.display()),
    }
    if enough {
        println!("{}", "Enough space".green());
    } else {
        println!("{}", "Not enough space".red());
    }
    enough
}
