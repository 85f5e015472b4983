mod config;
mod data_dir;
mod probe;
mod settings;
mod shutdown;
mod signals;
mod status;
mod watchdog;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// A connectivity watchdog: probe a target address on a fixed interval and
/// schedule a cancellable system shutdown once it has been unreachable for
/// longer than the configured grace period.
#[derive(Parser, Debug)]
#[command(name = "linkwatch", version, about)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "linkwatch.toml")]
    config: PathBuf,

    /// Probe target, `host` or `host:port` (overrides config)
    #[arg(short, long)]
    target: Option<String>,

    /// Failure timeout in seconds (overrides config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Poll interval in milliseconds (overrides config)
    #[arg(long)]
    interval: Option<u64>,

    /// Validate config and print resolved settings, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (settings reload detail)
    #[arg(short, long)]
    verbose: bool,

    /// Suppress routine logging, only warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Print current watchdog state and exit
    #[arg(long)]
    status: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.quiet {
        "warn"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.parse().unwrap()),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "linkwatch failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config::load_config(&cli.config)?;
    config.apply_overrides(cli.target.as_deref(), cli.timeout, cli.interval);
    config.validate()?;

    let dd = data_dir::DataDir::new(&config.storage.data_dir);

    if cli.status {
        print_status(&dd);
        return Ok(());
    }

    if cli.dry_run {
        println!("linkwatch v{}", env!("CARGO_PKG_VERSION"));
        println!("Config file: {}", cli.config.display());
        println!("Settings file: {}", config.watch.settings_file.display());
        println!("Target: {}", config.watch.target);
        println!("Failure timeout: {}s", config.watch.timeout_secs);
        println!("Poll interval: {}ms", config.watch.poll_interval_ms);
        println!("Probe timeout: {}ms", config.probe.timeout_ms);
        println!("Data dir: {}", dd.root().display());
        println!("Dry run mode — config validated, not running.");
        return Ok(());
    }

    dd.ensure()?;
    let _lock = dd.acquire_lock()?;

    tracing::info!("linkwatch starting");
    // The shutdown-active flag is in-memory only: a shutdown scheduled by a
    // previous run cannot be seen or cancelled from here.
    let settings = settings::SettingsStore::new(
        &config.watch.settings_file,
        config.default_snapshot(),
    );
    let prober: Arc<dyn probe::Prober> =
        Arc::new(probe::TcpProber::new(config.probe.default_port));
    let controller: Arc<dyn shutdown::ShutdownController> =
        Arc::new(shutdown::SystemShutdown::new());
    let status_file = status::StatusFile::new(dd.status());

    let wd = watchdog::Watchdog::new(
        prober,
        controller,
        settings,
        config.probe_timeout(),
        Some(status_file),
    );
    let handle = wd.spawn();

    signals::wait_for_stop().await?;
    tracing::info!("stopping watchdog");
    tokio::select! {
        _ = handle.stop() => {}
        _ = signals::wait_for_stop() => {
            tracing::warn!("second signal received, exiting immediately");
            std::process::exit(130);
        }
    }
    tracing::info!("linkwatch stopped");
    Ok(())
}

fn print_status(dd: &data_dir::DataDir) {
    match status::StatusFile::read(&dd.status()) {
        Ok(s) => {
            println!("pid: {}", s.pid);
            println!("state: {}", s.state);
            println!("target: {}", s.target);
            if let Some(since) = s.failing_since {
                println!("failing since: {since}");
            }
            println!("shutdown active: {}", s.shutdown_active);
            println!("last update: {}", s.last_update);
        }
        Err(e) => println!("no status available ({e})"),
    }
}
