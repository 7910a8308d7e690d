mod collectors;
mod config;
mod live;
mod present;
mod snapshot;

use clap::Parser;
use collectors::system::SysinfoSource;
use collectors::{CollectError, Collector, MetricsSource};
use config::{Config, ConfigError};
use crossterm::style::Stylize;
use live::{LiveError, TerminalScreen};
use present::{ExportError, Styling};
use snapshot::FullSnapshot;
use std::future::Future;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const NO_ACTION_HINT: &str = "No action specified. Use -h for help.";

#[derive(Parser, Debug)]
#[command(name = "sysreport")]
#[command(version, about = "Display or export system metrics")]
struct Cli {
    /// Display all system information
    #[arg(short, long)]
    display: bool,
    /// Export information to FILE (.json for JSON, anything else for plain text)
    #[arg(short, long, value_name = "FILE")]
    export: Option<PathBuf>,
    /// Start live CPU and memory monitoring
    #[arg(short, long)]
    live: bool,
    /// Seconds between live updates [default: 2]
    #[arg(short, long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    interval: Option<u64>,
    /// YAML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long)]
    print_default_config: bool,
    /// CPU sampling window for --display and --export, e.g. 500ms or 0s
    #[arg(long, value_name = "DURATION")]
    cpu_window: Option<String>,
    #[arg(long)]
    no_color: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Display,
    Export(PathBuf),
    Live,
    None,
}

impl Action {
    /// Display wins over export, export over live.
    fn from_cli(cli: &Cli) -> Self {
        if cli.display {
            Action::Display
        } else if let Some(path) = &cli.export {
            Action::Export(path.clone())
        } else if cli.live {
            Action::Live
        } else {
            Action::None
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    sample_window: Duration,
    live_interval: Duration,
    styling: Styling,
}

impl Settings {
    fn resolve(cli: &Cli, cfg: &Config) -> Result<Self, ConfigError> {
        let sample_window = match &cli.cpu_window {
            Some(raw) => config::parse_window(raw)?,
            None => cfg.sample_window()?,
        };
        let live_interval = cli
            .interval
            .map(Duration::from_secs)
            .unwrap_or_else(|| cfg.live_interval());
        Ok(Self {
            sample_window,
            live_interval,
            styling: Styling::for_console(cfg.color && !cli.no_color),
        })
    }
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Live(#[from] LiveError),
    #[error("collection task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("failed to write to stdout: {0}")]
    Stdout(#[from] io::Error),
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let action = Action::from_cli(&cli);
    if let Err(err) = execute(action, settings).await {
        error!(error = %err, "action failed");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings, ConfigError> {
    let cfg = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    Settings::resolve(cli, &cfg)
}

async fn execute(action: Action, settings: Settings) -> Result<(), AppError> {
    match action {
        Action::Display => {
            info!("collecting snapshot for display");
            let snapshot = collect_snapshot(SysinfoSource::new, settings.sample_window).await?;
            let mut out = io::stdout().lock();
            present::render_console(&mut out, &snapshot, settings.styling)?;
            out.flush()?;
        }
        Action::Export(path) => {
            info!(path = %path.display(), "collecting snapshot for export");
            let snapshot = collect_snapshot(SysinfoSource::new, settings.sample_window).await?;
            export(&path, &snapshot, settings.styling)?;
        }
        Action::Live => {
            info!(
                interval_secs = settings.live_interval.as_secs(),
                "starting live monitoring"
            );
            let interrupted = interrupt_listener();
            let mut collector = Collector::new(SysinfoSource::new()?, Duration::ZERO);
            let mut screen = TerminalScreen::stdout(settings.styling);
            live::run(
                &mut collector,
                &mut screen,
                settings.live_interval,
                interrupted,
            )
            .await?;
        }
        Action::None => {
            let mut out = io::stdout().lock();
            match settings.styling {
                Styling::Color => writeln!(out, "{}", NO_ACTION_HINT.bold())?,
                Styling::Plain => writeln!(out, "{NO_ACTION_HINT}")?,
            }
        }
    }
    Ok(())
}

/// Runs a full collection on the blocking pool; the CPU window sleeps.
async fn collect_snapshot<S, F>(
    open: F,
    sample_window: Duration,
) -> Result<FullSnapshot, AppError>
where
    S: MetricsSource + 'static,
    F: FnOnce() -> Result<S, CollectError> + Send + 'static,
{
    let snapshot = tokio::task::spawn_blocking(move || {
        Collector::new(open()?, sample_window).collect_all()
    })
    .await??;
    Ok(snapshot)
}

fn export(
    path: &Path,
    snapshot: &FullSnapshot,
    styling: Styling,
) -> Result<(), AppError> {
    let format = present::export_to_file(path, snapshot)?;
    info!(path = %path.display(), ?format, "snapshot exported");
    let mut out = io::stdout().lock();
    present::export_notice(&mut out, path, styling)?;
    Ok(())
}

/// Registers for Ctrl+C immediately and resolves on the next interrupt.
///
/// If the handler cannot be installed the returned future never resolves and
/// the loop runs until killed.
fn interrupt_listener() -> impl Future<Output = ()> {
    let registered = register_interrupt()
        .map_err(|err| warn!(error = %err, "failed to listen for Ctrl+C"))
        .ok();
    async move {
        if let Some(mut interrupts) = registered {
            if interrupts.recv().await.is_some() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

#[cfg(unix)]
fn register_interrupt() -> io::Result<tokio::signal::unix::Signal> {
    use tokio::signal::unix::{signal, SignalKind};
    signal(SignalKind::interrupt())
}

#[cfg(windows)]
fn register_interrupt() -> io::Result<tokio::signal::windows::CtrlC> {
    tokio::signal::windows::ctrl_c()
}
