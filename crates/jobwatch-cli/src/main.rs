use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jobwatch_core::config::{SitesFile, WatchConfig, default_sites};

#[derive(Parser)]
#[command(name = "jobwatch", version, about = "Watch career sites for new job listings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll every site on an interval and notify about new listings
    Run(WatchArgs),

    /// Scrape every site once and print the listings as JSON (no notifications)
    Once(WatchArgs),

    /// Print the effective site configuration as TOML
    Sites {
        /// TOML file with site definitions (defaults to the built-in sites)
        #[arg(long, env = "JOBWATCH_SITES")]
        sites: Option<PathBuf>,
    },
}

#[derive(Args)]
struct WatchArgs {
    /// Webhook receiving one message per new listing; delivery is skipped when unset
    #[arg(long, env = "NOTIFICATION_WEBHOOK")]
    webhook: Option<String>,

    /// Minutes between two polling cycles
    #[arg(long, env = "REFRESH_DURATION", default_value_t = 60)]
    interval: u64,

    /// IANA timezone used for timestamps
    #[arg(long, env = "TZ", default_value = "UTC")]
    timezone: String,

    /// TOML file with site definitions (defaults to the built-in sites)
    #[arg(long, env = "JOBWATCH_SITES")]
    sites: Option<PathBuf>,

    /// Delay after every delivered notification, in milliseconds
    #[arg(long, env = "JOBWATCH_PACING_MS", default_value_t = 20)]
    pacing_ms: u64,
}

impl WatchArgs {
    fn into_config(self) -> Result<WatchConfig> {
        let config = WatchConfig::default()
            .with_interval_minutes(self.interval)?
            .with_timezone(&self.timezone)?
            .with_webhook(self.webhook)
            .with_pacing(Duration::from_millis(self.pacing_ms))
            .with_sites(load_sites(self.sites.as_deref())?.sites);
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobwatch=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(args.into_config()?).await?,
        Commands::Once(args) => cmd_once(args.into_config()?).await?,
        Commands::Sites { sites } => {
            let file = load_sites(sites.as_deref())?;
            print!("{}", file.to_toml()?);
        }
    }

    Ok(())
}

fn load_sites(path: Option<&Path>) -> Result<SitesFile> {
    match path {
        Some(path) => SitesFile::load(path)
            .with_context(|| format!("Failed to load sites from {}", path.display())),
        None => Ok(SitesFile {
            sites: default_sites(),
        }),
    }
}

#[cfg(feature = "browser")]
async fn cmd_run(config: WatchConfig) -> Result<()> {
    use jobwatch_client::{ChromiumLauncher, ChromiumScraper, WebhookNotifier};
    use jobwatch_core::watcher::{TracingWatchReporter, Watcher};
    use tokio_util::sync::CancellationToken;

    let notifier = config
        .webhook_url
        .as_deref()
        .map(WebhookNotifier::new)
        .transpose()?;

    tracing::info!(
        interval_secs = config.interval.as_secs(),
        timezone = %config.timezone,
        webhook = notifier.is_some(),
        "Starting job watcher"
    );

    let watcher = Watcher::new(ChromiumLauncher::new(), ChromiumScraper::new(), notifier, config);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), cancel.clone()));

    watcher.run(cancel, &TracingWatchReporter).await?;
    Ok(())
}

/// Cancel `token` once `signal` fires. A handler that cannot be installed
/// is logged and leaves the watcher running.
#[cfg(any(feature = "browser", test))]
async fn cancel_on_signal<F>(signal: F, token: tokio_util::sync::CancellationToken)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            tracing::info!("Shutdown signal received");
            token.cancel();
        }
        Err(e) => tracing::error!("Failed to listen for Ctrl+C, stop with SIGTERM instead: {e}"),
    }
}

#[cfg(feature = "browser")]
async fn cmd_once(config: WatchConfig) -> Result<()> {
    use jobwatch_client::{ChromiumLauncher, ChromiumScraper, WebhookNotifier};
    use jobwatch_core::snapshot::Snapshot;
    use jobwatch_core::watcher::{TracingWatchReporter, Watcher};

    let watcher: Watcher<_, _, WebhookNotifier> =
        Watcher::new(ChromiumLauncher::new(), ChromiumScraper::new(), None, config);

    let result = watcher
        .scrape_all(&Snapshot::new(), &TracingWatchReporter)
        .await;
    watcher.pool().force_close().await;
    let (snapshot, failed_sites) = result?;

    if !failed_sites.is_empty() {
        tracing::warn!(?failed_sites, "Some sites could not be scraped");
    }

    let listings: Vec<_> = snapshot.records().collect();
    println!("{}", serde_json::to_string_pretty(&listings)?);
    Ok(())
}

#[cfg(not(feature = "browser"))]
async fn cmd_run(_config: WatchConfig) -> Result<()> {
    anyhow::bail!("jobwatch was built without the `browser` feature; rebuild with --features browser")
}

#[cfg(not(feature = "browser"))]
async fn cmd_once(_config: WatchConfig) -> Result<()> {
    anyhow::bail!("jobwatch was built without the `browser` feature; rebuild with --features browser")
}
