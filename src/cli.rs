use crate::{
    config::Config,
    engine::LlamaRunner,
    ocr::OcrMyPdf,
    pipeline::Analyzer,
    platform::Platform,
    probe::{Capabilities, resource_status},
    progress::{ProgressEvent, UpdateProgress},
    report::FileOutcome,
    resources::{ResourceDirectory, fetch::HttpFetcher, install, update},
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "sop-scout")]
#[command(about = "Offline SOP automation analysis with a local model and OCR fallback")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./sop-scout.toml if present, else defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report what is installed in the resource directory.
    Status {},
    /// Download and install the full offline resource pack.
    Install {
        /// Reinstall even when the pack is already present.
        #[arg(long)]
        force: bool,
    },
    /// Compare the installed resources with the remote manifest.
    CheckUpdate {},
    /// Download and install changed components.
    Update {
        /// Print update progress as JSON lines on stderr.
        #[arg(long)]
        progress_json: bool,
    },
    /// Analyze one or more SOP PDFs.
    Analyze {
        #[arg(long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Write `<stem>.report.json` per document here (defaults to `paths.out_dir`).
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Print progress events as JSON lines on stderr.
        #[arg(long)]
        progress_json: bool,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;

    match &args.cmd {
        Command::Status {} => status(&cfg),
        Command::Install { force } => install_pack(&cfg, *force),
        Command::CheckUpdate {} => check_update(&cfg),
        Command::Update { progress_json } => apply_update(&cfg, *progress_json),
        Command::Analyze {
            input,
            out_dir,
            progress_json,
        } => analyze(&cfg, input, out_dir.as_deref(), *progress_json),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    let default = PathBuf::from("sop-scout.toml");
    default.exists().then_some(default)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.paths.out_dir).join("sop-scout.log"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_progress<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => eprintln!("{line}"),
        Err(e) => tracing::warn!("cannot serialize progress event: {e}"),
    }
}

fn status(cfg: &Config) -> Result<()> {
    let platform = Platform::configured(cfg)?;
    let dir = ResourceDirectory::from_config(cfg);
    let status = resource_status(cfg, &dir, platform);
    print_json(&serde_json::json!({
        "resourceDir": dir.root(),
        "platform": platform,
        "status": status,
    }))
}

fn install_pack(cfg: &Config, force: bool) -> Result<()> {
    let mut dir = ResourceDirectory::from_config(cfg);
    let fetcher = HttpFetcher::new(cfg);
    let status = install::install(cfg, &mut dir, &fetcher, force)
        .with_context(|| format!("installing resource pack into {}", dir.root().display()))?;
    print_json(&status)
}

fn check_update(cfg: &Config) -> Result<()> {
    let dir = ResourceDirectory::from_config(cfg);
    let fetcher = HttpFetcher::new(cfg);
    let check = update::check_for_update(cfg, &dir, &fetcher)?;
    print_json(&check)
}

fn apply_update(cfg: &Config, progress_json: bool) -> Result<()> {
    let mut dir = ResourceDirectory::from_config(cfg);
    let fetcher = HttpFetcher::new(cfg);
    let status = update::apply_update(cfg, &mut dir, &fetcher, &mut |p: UpdateProgress| {
        if progress_json {
            print_progress(&p);
        } else {
            info!("{:?} {} {}%", p.status, p.component, p.percent);
        }
    })
    .context("updating resources")?;
    print_json(&status)
}

fn analyze(
    cfg: &Config,
    inputs: &[PathBuf],
    out_override: Option<&Path>,
    progress_json: bool,
) -> Result<()> {
    let platform = Platform::configured(cfg)?;
    let dir = ResourceDirectory::from_config(cfg);
    let capabilities = Capabilities::probe(cfg, &dir, platform);
    info!("ocr_available={}", capabilities.ocr_available);

    let inference = LlamaRunner::new(cfg, &dir, platform)?;
    let ocr = OcrMyPdf::from_capabilities(cfg, &capabilities);
    let analyzer = Analyzer::new(cfg, capabilities, inference, ocr);

    let started = now_rfc3339();
    let outcomes = analyzer.analyze_batch(inputs, &mut |event: ProgressEvent| {
        if progress_json {
            print_progress(&event);
        } else {
            debug!(?event, "progress");
        }
    });

    let out_root = out_override
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.paths.out_dir));
    ensure_dir(&out_root)?;
    let written = write_reports(&out_root, &outcomes)?;

    let failed = outcomes.iter().filter(|o| !o.ok).count();
    print_json(&serde_json::json!({
        "started": started,
        "finished": now_rfc3339(),
        "outDir": out_root,
        "reports": written,
        "outcomes": outcomes,
    }))?;

    if failed > 0 {
        return Err(anyhow!("{failed} of {} documents failed", outcomes.len()));
    }
    Ok(())
}

fn write_reports(out_root: &Path, outcomes: &[FileOutcome]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for outcome in outcomes {
        let Some(report) = &outcome.report else {
            continue;
        };
        let stem = Path::new(&outcome.file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let path = out_root.join(format!("{stem}.report.json"));
        std::fs::write(&path, serde_json::to_string_pretty(report)?)
            .with_context(|| format!("writing report: {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
