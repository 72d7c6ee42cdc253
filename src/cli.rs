use crate::{
    config::Config,
    extractor::{ExtractionRequest, Extractor},
    magick::MagickCommands,
    page_count::PdfinfoCounter,
    runner::{CommandLine, ProcessRunner, SystemRunner},
    util::{ensure_dir, expand_tilde},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "docraster")]
#[command(about = "Rasterize document pages to images at one or more sizes and formats")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./docraster.toml if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the rasterization engine and page counter are callable.
    Doctor {},
    /// Print the resolved pages and render jobs without running anything.
    Plan {
        #[command(flatten)]
        request: RequestArgs,
    },
    /// Render pages to image files.
    Extract {
        #[command(flatten)]
        request: RequestArgs,
        /// Continue with the next document after a failure.
        #[arg(long)]
        keep_going: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct RequestArgs {
    #[arg(required = true)]
    pub documents: Vec<PathBuf>,

    /// Output directory.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Pages to extract, e.g. "1-3,5,9-". Defaults to every page.
    #[arg(long, short)]
    pub pages: Option<String>,

    /// Render density in DPI.
    #[arg(long, short)]
    pub density: Option<String>,

    /// Output format(s), e.g. png, jpg, gif.
    #[arg(long = "format", short, value_delimiter = ',')]
    pub formats: Vec<String>,

    /// Resize geometry per output size, e.g. 1000x, 300x, 50%.
    #[arg(long = "size", short, value_delimiter = ',')]
    pub sizes: Vec<String>,

    /// Downsample each size from the previous one instead of re-rendering.
    #[arg(long, short)]
    pub rolling: bool,

    /// Per-command timeout in seconds.
    #[arg(long)]
    pub timeout: Option<u64>,
}

pub fn dispatch(args: Args) -> Result<()> {
    let mut cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    match &args.cmd {
        Command::Doctor {} => doctor(&cfg),
        Command::Plan { request } => {
            let req = build_request(&mut cfg, request)?;
            plan(&cfg, &req)
        }
        Command::Extract {
            request,
            keep_going,
        } => {
            let req = build_request(&mut cfg, request)?;
            extract(&cfg, &req, *keep_going)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("docraster.toml");
    default.exists().then_some(default)
}

type BoxedLayer = Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>;

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the JSON results, so diagnostics only ever go to stderr
    let mut layers = vec![console_layer(cfg.logging.json)];
    let guard = match file_path {
        Some(path) => {
            let (layer, guard) = file_layer(path)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;
    Ok(guard)
}

fn console_layer(json: bool) -> BoxedLayer {
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    if json {
        layer.json().boxed()
    } else {
        layer.with_target(false).boxed()
    }
}

/// Plain-text log file, truncated per run and written off the calling thread.
fn file_layer(path: &Path) -> Result<(BoxedLayer, WorkerGuard)> {
    ensure_dir(path.parent().unwrap_or_else(|| Path::new(".")))?;
    let file = std::fs::File::create(path)
        .with_context(|| format!("create log file: {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .boxed();
    Ok((layer, guard))
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(expand_tilde(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.output.root).join("docraster.log"))
}

/// Folds command-line overrides into the config and builds the request.
fn build_request(cfg: &mut Config, args: &RequestArgs) -> Result<ExtractionRequest> {
    for doc in &args.documents {
        validate_input(doc)?;
    }

    if let Some(out) = &args.output {
        cfg.output.root = out.display().to_string();
    }
    if let Some(d) = &args.density {
        cfg.output.density = d.clone();
    }
    if !args.formats.is_empty() {
        cfg.output.formats = args.formats.clone();
    }
    if !args.sizes.is_empty() {
        cfg.output.sizes = args.sizes.clone();
    }
    if args.rolling {
        cfg.output.rolling = true;
    }
    if let Some(t) = args.timeout {
        cfg.engine.timeout_seconds = t;
    }

    let mut req = ExtractionRequest::from_config(&cfg.output, args.documents.clone())
        .with_context(|| "invalid extraction options")?;
    req.page_spec = args.pages.clone();
    req.validate().with_context(|| "invalid extraction options")?;
    Ok(req)
}

fn validate_input(input: &Path) -> Result<()> {
    if !input.is_file() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }
    match input.extension().and_then(|s| s.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => {}
        _ => warn!(
            "input is not a PDF; page counting needs an explicit --pages: {}",
            input.display()
        ),
    }
    Ok(())
}

fn plan(cfg: &Config, req: &ExtractionRequest) -> Result<()> {
    let runner = SystemRunner::new(cfg.engine.max_output_lines);
    let counter = PdfinfoCounter::new(&cfg.page_count, &runner);
    let extractor = Extractor::new(cfg, &runner, counter);
    let jobs = extractor.plan(req)?;
    println!("{}", serde_json::to_string_pretty(&jobs)?);
    Ok(())
}

fn extract(cfg: &Config, req: &ExtractionRequest, keep_going: bool) -> Result<()> {
    let runner = SystemRunner::new(cfg.engine.max_output_lines);
    let counter = PdfinfoCounter::new(&cfg.page_count, &runner);
    let extractor = Extractor::new(cfg, &runner, counter);

    if !keep_going {
        let summary = extractor.extract(req)?;
        info!(
            "done documents={} invocations={}",
            summary.documents.len(),
            summary.invocations()
        );
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let layout = req.layout();
    let mut reports = Vec::new();
    let mut failures = Vec::new();
    for document in &req.documents {
        match extractor.extract_document(req, &layout, document) {
            Ok(report) => reports.push(report),
            Err(err) => {
                error!("{}: {err}", document.display());
                failures.push(serde_json::json!({
                    "document": document,
                    "timeout": err.is_timeout(),
                    "error": err.to_string(),
                }));
            }
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "documents": reports,
            "failures": failures,
        }))?
    );

    if failures.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} of {} documents failed", failures.len(), req.documents.len()))
    }
}

/// Runs a version check against every external tool, prints the JSON report
/// and fails if any tool is unusable.
pub fn doctor(cfg: &Config) -> Result<()> {
    let (report, ok) = doctor_report(cfg, &SystemRunner::new(cfg.engine.max_output_lines));
    println!("{}", serde_json::to_string_pretty(&report)?);
    if ok {
        Ok(())
    } else {
        Err(anyhow!("doctor: one or more tools are unusable"))
    }
}

pub fn doctor_report<R: ProcessRunner>(cfg: &Config, runner: R) -> (serde_json::Value, bool) {
    let commands = MagickCommands::new(&cfg.engine, &cfg.quality);
    let timeout = Duration::from_secs(cfg.page_count.timeout_seconds.min(30));

    let mut pdfinfo = CommandLine::new(&cfg.page_count.pdfinfo);
    pdfinfo.arg("-v");

    let checks = [
        ("convert", commands.version_check(&cfg.engine.convert)),
        ("mogrify", commands.version_check(&cfg.engine.mogrify)),
        ("pdfinfo", pdfinfo),
    ];

    let mut report = serde_json::Map::new();
    let mut ok = true;
    for (name, cmd) in checks {
        let entry = match runner.run(&cmd, timeout) {
            Ok(out) => serde_json::json!({
                "ok": true,
                "command": cmd.display(),
                "version": out.lines().next().unwrap_or_default(),
            }),
            Err(err) => {
                warn!("{name} check failed: {err}");
                ok = false;
                serde_json::json!({
                    "ok": false,
                    "command": cmd.display(),
                    "error": err.to_string(),
                })
            }
        };
        report.insert(name.to_string(), entry);
    }
    report.insert("ok".to_string(), serde_json::Value::Bool(ok));
    (serde_json::Value::Object(report), ok)
}
