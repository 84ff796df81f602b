// # dnsyncd - zone reconciler daemon
//
// This is a thin integration layer. All reconciliation logic lives in
// dnsync-core; the daemon is responsible for:
// 1. Parsing command-line flags
// 2. Loading and validating the JSON configuration file
// 3. Initializing logging and the runtime
// 4. Registering providers and sources
// 5. Feeding ticks to the reconciler until told to stop
//
// ## Usage
//
// ```bash
// # One dry-run pass, print what would change
// dnsyncd --config /etc/dnsync/config.json --once --dry-run
//
// # Run continuously, applying without asking
// DNSYNC_CONFIG=/etc/dnsync/config.json dnsyncd --yes
// ```
//
// Without `--yes` or `--dry-run`, every change set is shown and confirmed
// on the terminal.

use anyhow::{Context, Result};
use clap::Parser;
use dnsync_core::engine::EngineEvent;
use dnsync_core::{
    ConfirmPolicy, DnsyncConfig, PluginRegistry, Reconciler, Registry, Ticker, TickerConfig,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (fatal pass failure)
#[derive(Debug, Clone, Copy)]
enum DnsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (fatal pass failure)
    RuntimeError = 2,
}

impl From<DnsyncExitCode> for ExitCode {
    fn from(code: DnsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Keep DNS zones in sync with the records your sources ask for
#[derive(Debug, Parser)]
#[command(name = "dnsyncd", version, about)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(long, env = "DNSYNC_CONFIG")]
    config: PathBuf,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Compute and show changes without applying them
    #[arg(long)]
    dry_run: bool,

    /// Apply changes without asking
    #[arg(long)]
    yes: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DNSYNC_LOG_LEVEL", default_value = "info")]
    log_level: Level,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsyncExitCode::ConfigError.into();
    }

    // Load configuration from file
    let config = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DnsyncExitCode::ConfigError.into();
        }
    };

    info!("Starting dnsyncd");
    info!(
        "Configuration loaded: {} source(s), {} provider(s)",
        config.sources.len(),
        config.providers.len()
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        let (reconciler, events) = match build_reconciler(&cli, &config) {
            Ok(built) => built,
            Err(e) => {
                error!("Startup error: {:#}", e);
                return DnsyncExitCode::ConfigError;
            }
        };

        match run_daemon(&cli, &config, reconciler, events).await {
            Ok(()) => DnsyncExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DnsyncExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Read and validate the configuration file
fn load_config(cli: &Cli) -> Result<DnsyncConfig> {
    let config = DnsyncConfig::from_file(&cli.config)
        .with_context(|| format!("reading {}", cli.config.display()))?;
    config.validate()?;
    Ok(config)
}

/// Create the reconciler and every configured source and provider
fn build_reconciler(
    cli: &Cli,
    config: &DnsyncConfig,
) -> Result<(Reconciler, mpsc::Receiver<EngineEvent>)> {
    let mut plugins = PluginRegistry::with_builtin_sources();

    // Register built-in providers
    #[cfg(feature = "cloudflare")]
    {
        debug!("Registering Cloudflare provider");
        dnsync_provider_cloudflare::register(&mut plugins);
    }

    let registry = Registry::from_config(&config.registry)?;
    let confirm = ConfirmPolicy::from_flags(cli.dry_run, cli.yes);
    info!("Registry: {}, confirmation: {:?}", registry.name(), confirm);

    let (mut reconciler, events) = Reconciler::new(registry, confirm, &config.reconciler)?;

    for source_config in &config.sources {
        let source = plugins
            .create_source(source_config)
            .with_context(|| format!("creating {} source", source_config.type_name()))?;
        reconciler.add_source(source);
    }

    for provider_config in &config.providers {
        let provider = plugins
            .create_provider(provider_config)
            .with_context(|| format!("creating {} provider", provider_config.type_name()))?;
        reconciler.add_provider(provider);
    }

    Ok((reconciler, events))
}

/// Run passes on every tick until the ticker ends or a signal arrives
async fn run_daemon(
    cli: &Cli,
    config: &DnsyncConfig,
    reconciler: Reconciler,
    mut events: mpsc::Receiver<EngineEvent>,
) -> Result<()> {
    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!(?event, "Engine event");
        }
    });

    let streams = reconciler
        .sources()
        .iter()
        .filter_map(|source| source.watch())
        .collect();
    let mut ticker = Ticker::spawn(TickerConfig::from_config(&config.reconciler, cli.once), streams);

    let shutdown = wait_for_shutdown();
    tokio::pin!(shutdown);

    let result = loop {
        tokio::select! {
            tick = ticker.next() => {
                let Some(tick) = tick else {
                    break Ok(());
                };

                debug!("Tick {} ({:?})", tick.seq, tick.reason);
                if let Err(e) = reconciler.run_once().await {
                    if cli.once || e.is_fatal() {
                        break Err(e.into());
                    }
                    warn!("Pass failed, retrying on next tick: {}", e);
                }
            }

            signal = &mut shutdown => {
                match signal {
                    Ok(name) => info!("Received shutdown signal: {}", name),
                    Err(e) => break Err(e),
                }
                break Ok(());
            }
        }
    };

    info!("Shutting down");
    ticker.shutdown();
    event_logger.abort();
    result
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    // Set up signal handlers for SIGTERM and SIGINT
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
