/// Report generator factory - registry plus the generation pipeline
///
/// Each requested format runs as one job:
///
/// ```text
///   Starting ─► Generating ─► Writing ─► Validating ─► Completed
///                   │            │            │
///                   └────────────┴────────────┴──────► Failed
/// ```
///
/// A failing job is recorded in `GenerationResult::errors` and never stops
/// the other formats. Only invalid options or an unusable output directory
/// make `generate_reports` itself return an error.
use super::pool::{PoolTask, TaskPool};
use super::progress::{ProgressEvent, ProgressObserver, ProgressStage};
use super::validation::validate_report;
use super::{
    serialize_millis, AggregatedData, BasicHtmlGenerator, BasicMarkdownGenerator, GeneratedReport,
    GenerationError, JsonGenerator, ReportConfig, ReportGenerator,
};
use crate::error::{
    ErrorContext, ErrorHandler, ErrorKind, RecoveredData, RecoveryStrategy, ReportingError, Severity,
};
use crate::error::mechanisms::fallback_template;
use crate::io::{IOResult, ResilientFileSystem};
use crate::{GenerationConfig, RawError, ReportFormat};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

const COMPONENT: &str = "ReportGeneratorFactory";

/// What to generate and where
#[derive(Clone)]
pub struct GenerationOptions {
    pub formats: Vec<ReportFormat>,
    pub output_directory: PathBuf,
    pub parallel: bool,

    /// Overrides `GenerationConfig::max_concurrency` for this run
    pub max_concurrency: Option<usize>,

    /// Overrides `GenerationConfig::title` for this run
    pub title: Option<String>,

    pub progress: Option<Arc<dyn ProgressObserver>>,
}

impl GenerationOptions {
    pub fn new(formats: impl IntoIterator<Item = ReportFormat>, output_directory: impl AsRef<Path>) -> Self {
        Self {
            formats: formats.into_iter().collect(),
            output_directory: output_directory.as_ref().to_path_buf(),
            parallel: false,
            max_concurrency: None,
            title: None,
            progress: None,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_progress(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = Some(observer);
        self
    }
}

/// One format that did not produce a valid report
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationFailure {
    pub format: ReportFormat,

    /// Stage the job was in when it failed
    pub stage: ProgressStage,
    pub message: String,

    /// Set once the job got as far as choosing its output file
    pub file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub success: bool,
    pub reports: Vec<GeneratedReport>,
    pub errors: Vec<GenerationFailure>,
    #[serde(serialize_with = "serialize_millis")]
    pub total_time: Duration,

    /// Stray temp files found (or removed, with cleanup enabled) after the run
    pub temp_files: Vec<PathBuf>,

    /// Where reports were written; differs from the requested directory after a fallback
    pub output_directory: PathBuf,
}

impl GenerationResult {
    pub fn report_for(&self, format: ReportFormat) -> Option<&GeneratedReport> {
        self.reports.iter().find(|r| r.format == format)
    }

    pub fn failure_for(&self, format: ReportFormat) -> Option<&GenerationFailure> {
        self.errors.iter().find(|e| e.format == format)
    }
}

pub struct ReportGeneratorFactory {
    generators: HashMap<ReportFormat, Arc<dyn ReportGenerator>>,
    fs: Arc<ResilientFileSystem>,
    handler: Arc<ErrorHandler>,
    config: GenerationConfig,
}

impl ReportGeneratorFactory {
    /// Factory with the built-in JSON, HTML and Markdown generators registered
    pub fn new(fs: Arc<ResilientFileSystem>, config: GenerationConfig) -> Self {
        let handler = fs.handler().clone();
        let mut factory = Self {
            generators: HashMap::new(),
            fs,
            handler,
            config,
        };
        factory.register(Arc::new(JsonGenerator));
        factory.register(Arc::new(BasicHtmlGenerator));
        factory.register(Arc::new(BasicMarkdownGenerator));
        factory
    }

    /// Register a generator, replacing any existing one for its format
    pub fn register(&mut self, generator: Arc<dyn ReportGenerator>) {
        let format = generator.format();
        if self.generators.insert(format, generator).is_some() {
            tracing::debug!(format = %format, "Replaced report generator");
        }
    }

    pub fn unregister(&mut self, format: ReportFormat) -> bool {
        self.generators.remove(&format).is_some()
    }

    pub fn registered_formats(&self) -> Vec<ReportFormat> {
        let mut formats: Vec<ReportFormat> = self.generators.keys().copied().collect();
        formats.sort();
        formats
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate every requested format into the output directory
    pub async fn generate_reports(
        &self,
        data: &AggregatedData,
        options: GenerationOptions,
    ) -> Result<GenerationResult, GenerationError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("generate_reports", run_id = %run_id);
        self.generate_inner(data, options).instrument(span).await
    }

    async fn generate_inner(
        &self,
        data: &AggregatedData,
        options: GenerationOptions,
    ) -> Result<GenerationResult, GenerationError> {
        let started = Instant::now();
        let formats = self.validate_options(&options)?;
        let output_directory = self.prepare_output_directory(&options.output_directory).await?;

        tracing::info!(
            formats = ?formats,
            output = %output_directory.display(),
            parallel = options.parallel,
            "Generating reports"
        );

        let report_config = Arc::new(ReportConfig {
            title: options.title.clone().unwrap_or_else(|| self.config.title.clone()),
            output_directory: output_directory.clone(),
            file_stem: self.config.file_stem.clone(),
        });
        let data = Arc::new(data.clone());
        let timeout = match self.handler.config().timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };

        let jobs: Vec<FormatJob> = formats
            .iter()
            .filter_map(|format| {
                let generator = self.generators.get(format)?.clone();
                Some(FormatJob {
                    format: *format,
                    generator,
                    data: data.clone(),
                    config: report_config.clone(),
                    fs: self.fs.clone(),
                    handler: self.handler.clone(),
                    observer: options.progress.clone(),
                    timeout,
                })
            })
            .collect();

        let outcomes = if options.parallel && jobs.len() > 1 {
            let max = options.max_concurrency.unwrap_or(self.config.max_concurrency);
            run_parallel(jobs, max).await
        } else {
            let mut outcomes = Vec::with_capacity(jobs.len());
            for job in jobs {
                outcomes.push(job.run().await);
            }
            outcomes
        };

        let mut reports = Vec::new();
        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(report) => reports.push(report),
                Err(failure) => errors.push(failure),
            }
        }

        let temp_dir = self.fs.temp_directory_for(&output_directory);
        let temp_files = if self.config.cleanup_temp_files {
            self.fs.cleanup_temp_files(&temp_dir).await
        } else {
            self.fs.find_temp_files(&temp_dir).await
        };

        let success = errors.is_empty() && !reports.is_empty();
        let total_time = started.elapsed();
        tracing::info!(
            success = success,
            reports = reports.len(),
            errors = errors.len(),
            elapsed_ms = total_time.as_millis() as u64,
            "Report generation finished"
        );

        Ok(GenerationResult {
            success,
            reports,
            errors,
            total_time,
            temp_files,
            output_directory,
        })
    }

    /// Requested formats, de-duplicated in request order
    fn validate_options(&self, options: &GenerationOptions) -> Result<Vec<ReportFormat>, GenerationError> {
        if options.formats.is_empty() {
            return Err(GenerationError::NoFormats);
        }
        if options.output_directory.as_os_str().is_empty() {
            return Err(GenerationError::MissingOutputDirectory);
        }

        let mut formats = Vec::with_capacity(options.formats.len());
        for format in &options.formats {
            if !self.generators.contains_key(format) {
                return Err(GenerationError::UnregisteredFormat(*format));
            }
            if !formats.contains(format) {
                formats.push(*format);
            }
        }
        Ok(formats)
    }

    /// Create the directory and prove it is writable, falling back when the handler offers a directory
    async fn prepare_output_directory(&self, dir: &Path) -> Result<PathBuf, GenerationError> {
        let source = match self.check_directory_writable(dir).await {
            Ok(()) => return Ok(dir.to_path_buf()),
            Err(e) => e,
        };

        let error = ReportingError::new(
            ErrorKind::OutputDirectory,
            Severity::High,
            RecoveryStrategy::Fallback,
            format!("Output directory {} is not writable: {}", dir.display(), source),
        )
        .with_context(ErrorContext::new("prepare_output_directory", COMPONENT).with_file_path(dir))
        .with_guidance("Check that the output directory path is valid and writable");

        let outcome = self.handler.handle_error(error, None).await;
        if let Some(RecoveredData::FallbackDirectory(fallback)) = outcome.recovered_data {
            match self.check_directory_writable(&fallback).await {
                Ok(()) => {
                    tracing::warn!(
                        requested = %dir.display(),
                        fallback = %fallback.display(),
                        "Writing reports to fallback directory"
                    );
                    return Ok(fallback);
                }
                Err(e) => tracing::error!(
                    fallback = %fallback.display(),
                    error = %e,
                    "Fallback directory is not writable either"
                ),
            }
        }

        Err(GenerationError::OutputDirectory {
            path: dir.to_path_buf(),
            source,
        })
    }

    async fn check_directory_writable(&self, dir: &Path) -> IOResult<()> {
        self.fs.create_dir_all(dir).await?;
        let marker = dir.join(format!(".write-test-{}", Uuid::new_v4()));
        self.fs.write_file(&marker, b"ok").await?;
        self.fs.delete_file(&marker).await?;
        Ok(())
    }
}

async fn run_parallel(jobs: Vec<FormatJob>, max_concurrency: usize) -> Vec<JobOutcome> {
    let pool = TaskPool::new(max_concurrency);
    let formats: Vec<ReportFormat> = jobs.iter().map(|job| job.format).collect();
    let tasks: Vec<_> = jobs
        .into_iter()
        .map(|job| PoolTask::new(job.format.priority(), job.run()))
        .collect();

    pool.run(tasks)
        .await
        .into_iter()
        .zip(formats)
        .map(|(joined, format)| {
            joined.unwrap_or_else(|e| {
                Err(GenerationFailure {
                    format,
                    stage: ProgressStage::Failed,
                    message: e.to_string(),
                    file_path: None,
                })
            })
        })
        .collect()
}

type JobOutcome = Result<GeneratedReport, GenerationFailure>;

/// Everything one format needs, owned so it can run on the pool
struct FormatJob {
    format: ReportFormat,
    generator: Arc<dyn ReportGenerator>,
    data: Arc<AggregatedData>,
    config: Arc<ReportConfig>,
    fs: Arc<ResilientFileSystem>,
    handler: Arc<ErrorHandler>,
    observer: Option<Arc<dyn ProgressObserver>>,
    timeout: Option<Duration>,
}

impl FormatJob {
    async fn run(self) -> JobOutcome {
        let started = Instant::now();
        self.emit(ProgressStage::Starting, format!("Starting {} report", self.format));

        let (content, fallback_used) = match self.render().await {
            Ok(rendered) => rendered,
            Err(message) => return Err(self.fail(ProgressStage::Generating, message, None)),
        };

        let path = self.config.file_path(self.format);
        self.emit(ProgressStage::Writing, format!("Writing {}", path.display()));
        if let Err(e) = self.write(&path, &content).await {
            return Err(self.fail(ProgressStage::Writing, e.to_string(), Some(path)));
        }

        self.emit(ProgressStage::Validating, format!("Validating {}", path.display()));
        let size = match self.validate(&path).await {
            Ok(size) => size,
            Err(message) => return Err(self.fail(ProgressStage::Validating, message, Some(path))),
        };

        let generation_time = started.elapsed();
        self.emit(
            ProgressStage::Completed,
            format!("{} report written ({} bytes)", self.format, size),
        );
        tracing::info!(
            format = %self.format,
            path = %path.display(),
            size = size,
            fallback = fallback_used,
            elapsed_ms = generation_time.as_millis() as u64,
            "Report generated"
        );

        Ok(GeneratedReport {
            format: self.format,
            success: true,
            file_path: path,
            size,
            generation_time,
            error: None,
            fallback_used,
        })
    }

    /// Generator output, or a fallback body when the handler supplies one.
    /// The flag is true for fallback content.
    async fn render(&self) -> Result<(String, bool), String> {
        loop {
            self.emit(ProgressStage::Generating, format!("Generating {} report", self.format));

            let raw = match self.invoke().await {
                Ok(content) => return Ok((content, false)),
                Err(raw) => raw,
            };

            let context = ErrorContext::for_format("generate_report", self.format);
            let outcome = self.handler.handle_error(raw.clone(), Some(context)).await;
            if !outcome.success {
                return Err(format!("{} ({})", raw.message, outcome.message));
            }

            match outcome.recovered_data {
                Some(RecoveredData::FallbackTemplate { content, .. }) => {
                    tracing::warn!(format = %self.format, error = %raw, "Using fallback template");
                    return Ok((content, true));
                }
                Some(artifact) if artifact.is_partial() => {
                    tracing::warn!(format = %self.format, error = %raw, "Writing minimal report");
                    return Ok((fallback_template(self.format, &raw.message), true));
                }
                Some(_) => return Err(raw.message),
                None => {}
            }

            let retried = outcome
                .new_error
                .as_ref()
                .map(|e| e.recovery_strategy == RecoveryStrategy::Retry)
                .unwrap_or(false);
            if !retried {
                return Err(format!("{} ({})", raw.message, outcome.message));
            }
        }
    }

    /// Run the generator on the blocking pool under the deadline
    async fn invoke(&self) -> Result<String, RawError> {
        let generator = self.generator.clone();
        let data = self.data.clone();
        let config = self.config.clone();
        let task = tokio::task::spawn_blocking(move || generator.generate_report(&data, &config));

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    return Err(RawError::new(
                        "TimeoutError",
                        format!(
                            "{} report generation timed out after {} ms",
                            self.format,
                            limit.as_millis()
                        ),
                    )
                    .with_code("ETIMEDOUT"))
                }
            },
            None => task.await,
        };

        match joined {
            Ok(Ok(content)) => Ok(content),
            Ok(Err(e)) => Err(RawError::from(e)),
            Err(e) => Err(RawError::new(
                "InternalError",
                format!("{} generator panicked: {}", self.format, e),
            )),
        }
    }

    async fn write(&self, path: &Path, content: &str) -> IOResult<()> {
        self.fs
            .ensure_space(&self.config.output_directory, content.len() as u64)
            .await?;
        self.fs.create_backup(path).await;
        self.fs.write_file(path, content).await
    }

    /// Read the file back and check its structure; returns the size on disk
    async fn validate(&self, path: &Path) -> Result<u64, String> {
        let written = self.fs.read_to_string(path).await.map_err(|e| e.to_string())?;
        validate_report(self.format, &written).map_err(|e| {
            let error = ReportingError::new(
                ErrorKind::ReportGeneration,
                Severity::Medium,
                RecoveryStrategy::Skip,
                format!("{} report failed validation: {}", self.format, e),
            )
            .with_context(ErrorContext::for_format("validate_report", self.format).with_file_path(path));
            self.handler.record(error);
            e.to_string()
        })?;

        let size = self.fs.stat(path).await.map_err(|e| e.to_string())?.len();
        if size == 0 {
            return Err("report file is empty".to_string());
        }
        Ok(size)
    }

    fn emit(&self, stage: ProgressStage, message: String) {
        tracing::debug!(format = %self.format, stage = %stage, "{}", message);
        if let Some(observer) = &self.observer {
            observer.on_progress(&ProgressEvent::new(self.format, stage, message));
        }
    }

    fn fail(&self, stage: ProgressStage, message: String, file_path: Option<PathBuf>) -> GenerationFailure {
        tracing::error!(format = %self.format, stage = %stage, error = %message, "Report generation failed");
        self.emit(ProgressStage::Failed, message.clone());
        GenerationFailure {
            format: self.format,
            stage,
            message,
            file_path,
        }
    }
}
