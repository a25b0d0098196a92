use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use orthoreg::{
    GeoReferencePolicy, GeoTiffStore, LogObserver, NoopObserver, ProgressObserver, RegisterError,
    Registrar, RegistrationConfig, RegistrationReport, TimingsMs,
};
#[cfg(feature = "tracing")]
use tracing_log::LogTracer;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PolicyArg {
    Target,
    SourceTranslated,
}

impl From<PolicyArg> for GeoReferencePolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Target => GeoReferencePolicy::Target,
            PolicyArg::SourceTranslated => GeoReferencePolicy::SourceTranslated,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogLevelArg {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LevelFilter {
    fn from(value: LogLevelArg) -> Self {
        match value {
            LogLevelArg::Off => LevelFilter::Off,
            LogLevelArg::Error => LevelFilter::Error,
            LogLevelArg::Warn => LevelFilter::Warn,
            LogLevelArg::Info => LevelFilter::Info,
            LogLevelArg::Debug => LevelFilter::Debug,
            LogLevelArg::Trace => LevelFilter::Trace,
        }
    }
}

/// Register a source raster onto a target raster's pixel grid.
#[derive(Debug, Parser)]
#[command(name = "register", version, about)]
struct Cli {
    /// Raster to be aligned.
    source: PathBuf,
    /// Reference raster defining the output grid and georeference.
    target: PathBuf,
    /// Where the registered GeoTIFF is written.
    output: PathBuf,
    /// JSON run configuration; command-line options override it.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write a JSON report of the run here.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Lowe ratio for descriptor matching.
    #[arg(long)]
    ratio: Option<f32>,
    /// RANSAC inlier tolerance in target pixels.
    #[arg(long)]
    ransac_threshold: Option<f64>,
    #[arg(long)]
    max_iterations: Option<usize>,
    /// RANSAC sampling seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Georeference of the output.
    #[arg(long, value_enum)]
    geo_policy: Option<PolicyArg>,
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevelArg,
    /// Only report errors.
    #[arg(long, short)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Crates the `--log-level` filter applies to; everything else stays at `warn`.
const LOG_TARGETS: [&str; 3] = ["orthoreg", "orthoreg_features", "register"];

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        LevelFilter::Error
    } else {
        cli.log_level.into()
    };

    #[cfg(feature = "tracing")]
    init_tracing(level);
    #[cfg(not(feature = "tracing"))]
    init_env_logger(level);
}

/// `RUST_LOG`, when set, refines the level given on the command line.
#[cfg(not(feature = "tracing"))]
fn init_env_logger(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.min(LevelFilter::Warn));
    for target in LOG_TARGETS {
        builder.filter_module(target, level);
    }
    let _ = builder
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}

/// Stage spans are reported when they close. `RUST_LOG` replaces the
/// command-line filter entirely.
#[cfg(feature = "tracing")]
fn init_tracing(level: LevelFilter) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let _ = LogTracer::init();
    let level = level.as_str().to_ascii_lowercase();
    let directives: Vec<String> = LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{}", directives.join(","))));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<RegistrationConfig, RegisterError> {
    let mut cfg = match cli.config.as_ref() {
        Some(path) => RegistrationConfig::load_json(path)?,
        None => RegistrationConfig::default(),
    };

    let params = &mut cfg.params;
    if let Some(ratio) = cli.ratio {
        params.matching.ratio = ratio;
    }
    if let Some(threshold) = cli.ransac_threshold {
        params.ransac.threshold = threshold;
    }
    if let Some(max_iterations) = cli.max_iterations {
        params.ransac.max_iterations = max_iterations;
    }
    if let Some(seed) = cli.seed {
        params.ransac.seed = seed;
    }
    if let Some(policy) = cli.geo_policy {
        params.geo_policy = policy.into();
    }
    params.validate()?;
    Ok(cfg)
}

fn run(cli: &Cli) -> Result<(), RegisterError> {
    let t_total = Instant::now();
    let cfg = load_config(cli)?;
    let report_path = cli.report.clone().or_else(|| cfg.report_path());

    let registrar = Registrar::new(cfg.params.clone());
    let mut log_observer = LogObserver;
    let mut noop_observer = NoopObserver;
    let observer: &mut dyn ProgressObserver = if cli.quiet {
        &mut noop_observer
    } else {
        &mut log_observer
    };

    let mut timings = TimingsMs::default();
    let result = registrar.register_paths_timed(
        &GeoTiffStore,
        &cli.source,
        &cli.target,
        &cli.output,
        observer,
        &mut timings,
    );
    timings.total = t_total.elapsed().as_millis() as u64;

    if let Some(path) = report_path {
        let mut report = RegistrationReport::new(
            &cli.source,
            &cli.target,
            &cli.output,
            cfg.params.geo_policy,
        );
        match &result {
            Ok(outcome) => report.set_outcome(outcome),
            Err(err) => report.set_error(err),
        }
        report.timings_ms = timings;
        if let Err(err) = report.write_json(&path) {
            log::warn!("failed to write report to {}: {err}", path.display());
        }
    }

    let outcome = result?;
    log::info!(
        "wrote {} ({} inliers of {} matches)",
        cli.output.display(),
        outcome.inliers,
        outcome.matches
    );
    Ok(())
}
