mod registry;
mod settings;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use synthehr_core::{Error as CoreError, Template, discover_files, load_templates, redact_endpoint};
use synthehr_generate::{
    CodedTextTable, DEFAULT_CAPACITY, Destination, DispatchError, DispatchOptions, Dispatcher,
    DistributionPolicy, HttpIntake, IntakeConfig, IntakeError, LexiconAnalyzer, RunReport,
    TextAnalysisError, Thesaurus, VariationEngine, VariationOptions,
};
use synthehr_sink::SinkError;
use thiserror::Error;
use uuid::Uuid;

use registry::{
    RunContext, RunOptions, RunPaths, ServiceOptions, init_console_logging, init_run_logging,
    start_run, write_json, write_report,
};
use settings::{Settings, SettingsError, load_settings};

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const MAX_DATE_WINDOW_DAYS: i64 = 36_500;
const MAX_DATE_WINDOW_MINUTES: i64 = 525_600;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    Dispatch(#[from] DispatchError),
    #[error("text analysis error: {0}")]
    TextAnalysis(#[from] TextAnalysisError),
    #[error("connection failed: {0}")]
    Connection(IntakeError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(name = "synthehr", version, about = "Synthetic openEHR composition generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write randomized compositions as JSON files.
    Generate(GenerateArgs),
    /// Upload randomized compositions to an openEHR intake service.
    Upload(UploadArgs),
    /// Write the canonical form of every template.
    Canonicalize(CanonicalizeArgs),
    /// Run the stand-in intake service.
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Distribution {
    Proportional,
    Random,
}

impl From<Distribution> for DistributionPolicy {
    fn from(value: Distribution) -> Self {
        match value {
            Distribution::Proportional => DistributionPolicy::Proportional,
            Distribution::Random => DistributionPolicy::RandomPartition,
        }
    }
}

#[derive(Args, Debug)]
struct GenerationArgs {
    /// Directory of template compositions (`*.json`, searched recursively).
    #[arg(long, default_value = "compositions")]
    templates: PathBuf,
    /// Variants to produce across all templates.
    #[arg(long)]
    total: usize,
    /// How the total is split across templates.
    #[arg(long, value_enum, default_value_t = Distribution::Proportional)]
    distribution: Distribution,
    /// Deliveries in flight at once [default: 50].
    #[arg(long)]
    concurrency: Option<usize>,
    /// Seed for reproducible variants.
    #[arg(long)]
    seed: Option<u64>,
    /// Extra thesaurus entries (JSON word -> synonyms).
    #[arg(long)]
    thesaurus: Option<PathBuf>,
    /// Extra coded-text displays (JSON code -> displays).
    #[arg(long)]
    coded_synonyms: Option<PathBuf>,
    /// Settings file [default: ./synthehr.toml when present].
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    generation: GenerationArgs,
    /// Directory receiving one JSON file per variant.
    #[arg(long, default_value = "stored_compositions")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct UploadArgs {
    #[command(flatten)]
    generation: GenerationArgs,
    /// Base URL of the openEHR REST API.
    #[arg(long)]
    url: String,
    /// Basic-auth user.
    #[arg(long)]
    user: Option<String>,
    /// Basic-auth password.
    #[arg(long, env = "SYNTHEHR_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    /// EHRs to create before uploading.
    #[arg(long)]
    ehrs: usize,
    /// Per-request timeout in seconds [default: 60].
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Directory of operational templates (`*.opt`) to upload first.
    #[arg(long)]
    opt_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CanonicalizeArgs {
    #[arg(long, default_value = "compositions")]
    templates: PathBuf,
    #[arg(long, default_value = "canonical_compositions")]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = synthehr_sink::DEFAULT_ADDR)]
    addr: SocketAddr,
    /// Directory receiving posted compositions.
    #[arg(long, default_value = "stored_compositions")]
    storage: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Upload(args) => run_upload(args).await,
        Command::Canonicalize(args) => run_canonicalize(args),
        Command::Serve(args) => run_serve(args).await,
    };

    if let Err(err) = &result {
        tracing::error!(event = "run_failed", error = %err);
    }
    result
}

async fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let GenerateArgs { generation, out } = args;
    let settings = load_settings(generation.config.as_deref())?;
    let options = run_options(&generation, &settings, "file", Some(out.clone()), None)?;
    let (run_id, paths) = open_run(&generation.run_dir, options.clone())?;

    let templates = load_template_set(&generation.templates)?;
    let engine = build_engine(&options)?;
    let dispatch = dispatch_options(&options, &run_id, 0, DEFAULT_REQUEST_TIMEOUT_SECS);

    let dispatcher = Dispatcher::new(engine, Destination::Files { out_dir: out }, dispatch);
    let report = dispatcher.run(&templates).await?;
    finish_run(&paths, &report)
}

async fn run_upload(args: UploadArgs) -> Result<(), CliError> {
    let UploadArgs {
        generation,
        url,
        user,
        password,
        ehrs,
        timeout_secs,
        opt_dir,
    } = args;

    if user.is_none() && password.is_some() {
        return Err(CliError::InvalidConfig(
            "--password requires --user".to_string(),
        ));
    }
    if ehrs == 0 {
        return Err(CliError::InvalidConfig(
            "--ehrs must be at least 1".to_string(),
        ));
    }

    let settings = load_settings(generation.config.as_deref())?;
    let request_timeout_secs = timeout_secs
        .or(settings.request_timeout_secs)
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    let connect_timeout_secs = settings
        .connect_timeout_secs
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);
    let endpoint = redact_endpoint(&url);

    let service = ServiceOptions {
        endpoint: endpoint.clone(),
        user: user.clone(),
        ehrs,
        request_timeout_secs,
        connect_timeout_secs,
        opt_dir: opt_dir.clone(),
    };
    let options = run_options(&generation, &settings, "api", None, Some(service))?;
    let (run_id, paths) = open_run(&generation.run_dir, options.clone())?;

    let mut config = IntakeConfig::new(url);
    config.request_timeout = Duration::from_secs(request_timeout_secs.max(1));
    config.connect_timeout = Duration::from_secs(connect_timeout_secs.max(1));
    config.max_idle_per_host = options.concurrency;
    if let Some(user) = user {
        config = config.with_credentials(user, password);
    }
    let intake = HttpIntake::new(config).map_err(DispatchError::from)?;

    tracing::info!(event = "connection_check", url = %endpoint.redacted);
    intake
        .check_connection()
        .await
        .map_err(CliError::Connection)?;
    tracing::info!(event = "connection_ok", url = %endpoint.redacted);

    if let Some(dir) = &opt_dir {
        upload_operational_templates(&intake, dir).await?;
    }

    let templates = load_template_set(&generation.templates)?;
    let engine = build_engine(&options)?;
    let dispatch = dispatch_options(&options, &run_id, ehrs, request_timeout_secs);

    let dispatcher = Dispatcher::new(engine, Destination::Service(Arc::new(intake)), dispatch);
    let report = dispatcher.run(&templates).await?;
    finish_run(&paths, &report)
}

fn run_canonicalize(args: CanonicalizeArgs) -> Result<(), CliError> {
    init_console_logging()?;
    let templates = load_template_set(&args.templates)?;

    std::fs::create_dir_all(&args.out).map_err(|source| CliError::Io {
        path: args.out.clone(),
        source,
    })?;
    for template in &templates {
        let path = args.out.join(template.name());
        write_json(&path, template.document())?;
        tracing::info!(event = "canonical_written", path = %path.display());
    }
    println!("Wrote {} canonical templates to {}", templates.len(), args.out.display());
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<(), CliError> {
    init_console_logging()?;
    synthehr_sink::serve(args.addr, args.storage).await?;
    Ok(())
}

/// Resolve flags over settings over defaults.
fn run_options(
    args: &GenerationArgs,
    settings: &Settings,
    mode: &'static str,
    out: Option<PathBuf>,
    service: Option<ServiceOptions>,
) -> Result<RunOptions, CliError> {
    let concurrency = args
        .concurrency
        .or(settings.concurrency)
        .unwrap_or(DEFAULT_CAPACITY);
    if concurrency == 0 {
        return Err(CliError::InvalidConfig(
            "concurrency must be at least 1".to_string(),
        ));
    }

    let defaults = VariationOptions::default();
    let variation = VariationOptions {
        text_replace_probability: settings
            .text_replace_probability
            .unwrap_or(defaults.text_replace_probability),
        quantity_jitter: settings.quantity_jitter.unwrap_or(defaults.quantity_jitter),
        date_window_days: settings.date_window_days.unwrap_or(defaults.date_window_days),
        date_window_minutes: settings
            .date_window_minutes
            .unwrap_or(defaults.date_window_minutes),
    };
    validate_variation(&variation)?;

    Ok(RunOptions {
        mode,
        templates: args.templates.clone(),
        out,
        total: args.total,
        distribution: args.distribution.into(),
        concurrency,
        seed: args.seed,
        progress_every: settings.progress_every,
        variation,
        thesaurus: args.thesaurus.clone().or_else(|| settings.thesaurus.clone()),
        coded_synonyms: args
            .coded_synonyms
            .clone()
            .or_else(|| settings.coded_synonyms.clone()),
        service,
    })
}

fn validate_variation(variation: &VariationOptions) -> Result<(), CliError> {
    if !(0.0..=1.0).contains(&variation.text_replace_probability) {
        return Err(CliError::InvalidConfig(format!(
            "text_replace_probability must be within [0, 1], got {}",
            variation.text_replace_probability
        )));
    }
    if !(0.0..=1.0).contains(&variation.quantity_jitter) {
        return Err(CliError::InvalidConfig(format!(
            "quantity_jitter must be within [0, 1], got {}",
            variation.quantity_jitter
        )));
    }
    if !(0..=MAX_DATE_WINDOW_DAYS).contains(&variation.date_window_days) {
        return Err(CliError::InvalidConfig(format!(
            "date_window_days must be within [0, {MAX_DATE_WINDOW_DAYS}], got {}",
            variation.date_window_days
        )));
    }
    if !(0..=MAX_DATE_WINDOW_MINUTES).contains(&variation.date_window_minutes) {
        return Err(CliError::InvalidConfig(format!(
            "date_window_minutes must be within [0, {MAX_DATE_WINDOW_MINUTES}], got {}",
            variation.date_window_minutes
        )));
    }
    Ok(())
}

fn open_run(run_dir: &Path, options: RunOptions) -> Result<(String, RunPaths), CliError> {
    let run_id = Uuid::new_v4().to_string();
    let mode = options.mode;
    let ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir: run_dir.to_path_buf(),
        options,
    };

    let paths = start_run(&ctx)?;
    init_run_logging(&paths.logs_path)?;
    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        mode,
        run_dir = %paths.root.display()
    );
    Ok((run_id, paths))
}

fn load_template_set(dir: &Path) -> Result<Vec<Template>, CliError> {
    let templates = load_templates(dir)?;
    tracing::info!(event = "templates_loaded", dir = %dir.display(), count = templates.len());
    Ok(templates)
}

fn build_engine(options: &RunOptions) -> Result<Arc<VariationEngine>, CliError> {
    let mut thesaurus = Thesaurus::builtin();
    if let Some(path) = &options.thesaurus {
        let extra = Thesaurus::from_path(path)?;
        tracing::info!(event = "thesaurus_loaded", path = %path.display(), entries = extra.len());
        thesaurus.merge(extra);
    }

    let mut coded = CodedTextTable::clinical();
    if let Some(path) = &options.coded_synonyms {
        let extra = CodedTextTable::from_path(path)?;
        tracing::info!(event = "coded_synonyms_loaded", path = %path.display(), codes = extra.len());
        coded.merge(extra);
    }

    let engine = VariationEngine::new(Arc::new(LexiconAnalyzer::new(thesaurus)), coded)
        .with_options(options.variation.clone());
    Ok(Arc::new(engine))
}

fn dispatch_options(
    options: &RunOptions,
    run_id: &str,
    ehr_count: usize,
    delivery_timeout_secs: u64,
) -> DispatchOptions {
    DispatchOptions {
        total: options.total,
        policy: options.distribution,
        concurrency: options.concurrency,
        seed: options.seed,
        ehr_count,
        delivery_timeout_secs,
        progress_every: options.progress_every,
        run_id: Some(run_id.to_string()),
    }
}

/// POST every `*.opt` under `dir`. Rejections are logged, not fatal.
async fn upload_operational_templates(intake: &HttpIntake, dir: &Path) -> Result<(), CliError> {
    let files = discover_files(dir, "opt")?;
    let mut uploaded = 0_usize;
    let mut rejected = 0_usize;

    for path in &files {
        let xml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CliError::Io {
                path: path.clone(),
                source,
            })?;
        match intake.upload_template(xml).await {
            Ok(()) => {
                uploaded += 1;
                tracing::info!(event = "opt_uploaded", path = %path.display());
            }
            Err(err) => {
                rejected += 1;
                tracing::warn!(
                    event = "opt_rejected",
                    path = %path.display(),
                    status = ?err.status(),
                    error = %err
                );
            }
        }
    }

    tracing::info!(event = "opt_upload_finished", uploaded, rejected);
    Ok(())
}

fn finish_run(paths: &RunPaths, report: &RunReport) -> Result<(), CliError> {
    write_report(paths, report)?;
    tracing::info!(
        event = "run_finished",
        run_id = %report.run_id,
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failed,
        duration_ms = report.duration_ms,
        report = %paths.report_path.display()
    );
    print_summary(report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!(
        "Finished. Processed {} items: {} succeeded, {} failed.",
        report.attempted, report.succeeded, report.failed
    );
    let width = report
        .templates
        .keys()
        .map(String::len)
        .max()
        .unwrap_or(0)
        .max("template".len());
    println!(
        "{:<width$}  {:>8}  {:>9}  {:>6}",
        "template", "planned", "succeeded", "failed"
    );
    for (name, counts) in &report.templates {
        println!(
            "{:<width$}  {:>8}  {:>9}  {:>6}",
            name,
            counts.planned,
            counts.succeeded,
            counts.failed()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse cli")
    }

    #[test]
    fn flags_override_settings() {
        let Command::Generate(args) = parse(&[
            "synthehr",
            "generate",
            "--total",
            "10",
            "--concurrency",
            "4",
            "--distribution",
            "random",
        ])
        .command
        else {
            panic!("expected generate");
        };
        let settings = Settings {
            concurrency: Some(16),
            quantity_jitter: Some(0.05),
            ..Settings::default()
        };

        let options = run_options(&args.generation, &settings, "file", Some(args.out), None)
            .expect("options");
        assert_eq!(options.concurrency, 4);
        assert_eq!(options.distribution, DistributionPolicy::RandomPartition);
        assert_eq!(options.variation.quantity_jitter, 0.05);
        assert_eq!(options.out, Some(PathBuf::from("stored_compositions")));
    }

    #[test]
    fn settings_fill_in_missing_flags() {
        let Command::Generate(args) = parse(&["synthehr", "generate", "--total", "3"]).command
        else {
            panic!("expected generate");
        };
        let from_file = Settings {
            concurrency: Some(16),
            ..Settings::default()
        };
        let options =
            run_options(&args.generation, &from_file, "file", None, None).expect("options");
        assert_eq!(options.concurrency, 16);

        let options = run_options(&args.generation, &Settings::default(), "file", None, None)
            .expect("options");
        assert_eq!(options.concurrency, DEFAULT_CAPACITY);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let Command::Generate(args) =
            parse(&["synthehr", "generate", "--total", "3", "--concurrency", "0"]).command
        else {
            panic!("expected generate");
        };
        assert!(matches!(
            run_options(&args.generation, &Settings::default(), "file", None, None),
            Err(CliError::InvalidConfig(_))
        ));
    }

    #[test]
    fn out_of_range_variation_settings_are_rejected() {
        let Command::Generate(args) = parse(&["synthehr", "generate", "--total", "3"]).command
        else {
            panic!("expected generate");
        };
        let rejected = [
            Settings {
                quantity_jitter: Some(f64::NAN),
                ..Settings::default()
            },
            Settings {
                quantity_jitter: Some(f64::INFINITY),
                ..Settings::default()
            },
            Settings {
                quantity_jitter: Some(-0.1),
                ..Settings::default()
            },
            Settings {
                date_window_days: Some(1_000_000_000),
                ..Settings::default()
            },
            Settings {
                date_window_days: Some(-1),
                ..Settings::default()
            },
            Settings {
                date_window_minutes: Some(i64::MAX),
                ..Settings::default()
            },
        ];
        for settings in &rejected {
            assert!(
                matches!(
                    run_options(&args.generation, settings, "file", None, None),
                    Err(CliError::InvalidConfig(_))
                ),
                "accepted {settings:?}"
            );
        }

        let accepted = Settings {
            quantity_jitter: Some(0.0),
            date_window_days: Some(36_500),
            ..Settings::default()
        };
        assert!(run_options(&args.generation, &accepted, "file", None, None).is_ok());
    }

    #[test]
    fn upload_requires_url_and_ehrs() {
        assert!(Cli::try_parse_from(["synthehr", "upload", "--total", "3"]).is_err());
        let Command::Upload(args) = parse(&[
            "synthehr",
            "upload",
            "--total",
            "3",
            "--url",
            "http://localhost:8080/ehrbase/rest/openehr/v1",
            "--ehrs",
            "2",
            "--user",
            "clinician",
        ])
        .command
        else {
            panic!("expected upload");
        };
        assert_eq!(args.ehrs, 2);
        assert_eq!(args.user.as_deref(), Some("clinician"));
    }
}
