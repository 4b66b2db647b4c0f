use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use engine_client::ApiClient;
use lifecycle::{EngineLifecycle, OutputSink, Platform};
use scan_phases::Startup;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Debug, Parser)]
#[command(name = "zapctl", version, about = "Drive a ZAP engine through a complete scan run")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./zapctl.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct EngineArgs {
    /// Engine host
    #[arg(long)]
    host: Option<String>,
    /// Engine control port
    #[arg(long, allow_negative_numbers = true)]
    port: Option<i64>,
    /// Engine installation directory (holds zap.sh / zap.bat)
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,
    /// API key sent with every call
    #[arg(long)]
    api_key: Option<String>,
    /// Launch the engine with its user interface instead of as a daemon
    #[arg(long, default_value_t = false)]
    gui: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Launch the engine (when local) and wait until it accepts connections; leave it running
    Start {
        #[command(flatten)]
        engine: EngineArgs,
        /// Append the engine's output to this file; discarded when omitted
        #[arg(long, value_name = "FILE")]
        engine_log: Option<PathBuf>,
    },
    /// Run the configured scan phases, write the reports, then shut down or reset the engine
    Run {
        #[command(flatten)]
        engine: EngineArgs,
        /// Target URLs separated by ';' or ','. Empty uses every site the engine knows.
        #[arg(long)]
        targets: Option<String>,
        /// Directory the reports are written to
        #[arg(long, value_name = "DIR", default_value = ".")]
        work_dir: PathBuf,
        /// The engine was started earlier (`zapctl start`); only wait for it
        #[arg(long, default_value_t = false)]
        engine_running: bool,
    },
    /// Shut down (managed) or reset (shared) the configured engine
    Stop {
        #[command(flatten)]
        engine: EngineArgs,
    },
}

impl EngineArgs {
    fn into_overrides(self, target_urls: Option<String>) -> config::Overrides {
        config::Overrides {
            host: self.host,
            port: self.port,
            install_dir: self.install_dir,
            api_key: self.api_key,
            gui: self.gui,
            target_urls,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}

/// The engine outlives `zapctl start`, so its output must not go to a pipe this process owns.
fn detached_sink(engine_log: Option<PathBuf>) -> OutputSink {
    match engine_log {
        Some(path) => OutputSink::File(path),
        None => OutputSink::Null,
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    if let Commands::Version = cli.command {
        println!("zapctl {} (core {})", env!("CARGO_PKG_VERSION"), zapctl_core::version());
        return Ok(());
    }
    let mut cfg = config::load_config(cli.config.as_deref())?;

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    match cli.command {
        Commands::Version => {}
        Commands::Start { engine, engine_log } => {
            cfg.apply(engine.into_overrides(None));
            let mut lc = EngineLifecycle::new(cfg.engine_settings()?);
            rt.block_on(lc.start(Platform::current(), &detached_sink(engine_log)))?;
            match lc.detach() {
                Some(pid) => info!("engine running as process {}", pid),
                None => info!("engine is reachable"),
            }
        }
        Commands::Run { engine, targets, work_dir, engine_running } => {
            cfg.apply(engine.into_overrides(targets));
            let mut lc = EngineLifecycle::new(cfg.engine_settings()?);
            let startup = if engine_running { Startup::AlreadyRunning } else { Startup::Launch(Platform::current()) };
            let summary = rt.block_on(scan_phases::run(&mut lc, startup, &cfg.scan, &work_dir))?;
            info!(
                "scan of {} target(s) done: {} alert(s), {} report(s)",
                summary.targets.len(),
                summary.total_alerts,
                summary.reports.len()
            );
        }
        Commands::Stop { engine } => {
            cfg.apply(engine.into_overrides(None));
            let mut lc = EngineLifecycle::new(cfg.engine_settings()?);
            let client = ApiClient::from_settings(lc.settings())?;
            rt.block_on(lc.teardown(&client))?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dispatch(cli).map_err(|e| {
        error!("zapctl failed: {:#}", e);
        e
    })
}
