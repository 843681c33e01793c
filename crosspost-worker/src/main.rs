//! crosspost-worker - Background daemon for scheduled publishing
//!
//! Monitors the publish job queue and runs the publishing executor for
//! every post whose time has come.

use clap::Parser;
use libcrosspost::executor::PublishExecutor;
use libcrosspost::publish::mock::MockPublisher;
use libcrosspost::publish::{CredentialResolver, MediaResolver, PublisherRegistry, Publisher};
use libcrosspost::types::{Credentials, Platform, Profile, ResolvedMedia};
use libcrosspost::worker::Worker;
use libcrosspost::{Config, Database, JobQueue, Result, RetryPolicy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "crosspost-worker")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
crosspost-worker - Background daemon for scheduled publishing

DESCRIPTION:
    crosspost-worker is a long-running daemon that polls the publish job
    queue and executes due jobs: it claims each post destination, calls the
    bound platform publisher, replays thread chains in order, and records
    per-destination outcomes. Several workers may share one database; the
    per-destination claim keeps them from double-publishing.

    Platform publishers are linked in by the embedding application. This
    binary ships with only the mock set, so it runs the full pipeline
    against logging publishers when --dry-run is passed and refuses
    otherwise.

USAGE:
    # Exercise the queue end to end without touching any platform
    crosspost-worker --dry-run

    # Custom poll interval
    crosspost-worker --dry-run --poll-interval 10

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current batch)

CONFIGURATION:
    Configuration file: ~/.config/crosspost/config.toml
    Override with CROSSPOST_CONFIG.

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    poll_interval: Option<u64>,

    /// Use mock publishers instead of real platform clients
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Process due jobs once and exit (for testing)
    #[arg(long, hide = true)]
    once: bool,
}

/// Dry-run credential resolver: hands out a placeholder token
struct DryRunCreds;

#[async_trait::async_trait]
impl CredentialResolver for DryRunCreds {
    async fn resolve(
        &self,
        _profile: &Profile,
    ) -> std::result::Result<Credentials, libcrosspost::error::PublishError> {
        Ok(Credentials {
            access_token: secrecy::SecretString::from("dry-run".to_string()),
            access_secret: None,
        })
    }
}

/// Dry-run media resolver: echoes ids back as bare descriptors
struct DryRunMedia;

#[async_trait::async_trait]
impl MediaResolver for DryRunMedia {
    async fn resolve(&self, ids: &[String]) -> Result<Vec<ResolvedMedia>> {
        Ok(ids
            .iter()
            .map(|id| ResolvedMedia {
                id: id.clone(),
                url: format!("dry-run://{}", id),
                mime_type: "image/jpeg".to_string(),
                width: None,
                height: None,
                duration_seconds: None,
                size_bytes: None,
            })
            .collect())
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        use libcrosspost::logging::{LogFormat, LoggingConfig};
        LoggingConfig::new(LogFormat::Text, "debug".to_string(), true).init();
    } else {
        libcrosspost::logging::init_default();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    if !cli.dry_run {
        return Err(libcrosspost::CrosspostError::InvalidInput(
            "No platform publishers are linked into this binary. \
             Embed libcrosspost with your publisher set, or pass --dry-run."
                .to_string(),
        ));
    }

    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    info!("crosspost-worker starting (dry run)");

    let registry = PublisherRegistry::new(
        Platform::ALL
            .iter()
            .map(|p| Arc::new(MockPublisher::success(*p)) as Arc<dyn Publisher>)
            .collect(),
    )?;
    registry.ensure_bound(&Platform::ALL)?;

    let queue = JobQueue::new(db.clone(), RetryPolicy::from(&config.retry));
    let executor = Arc::new(PublishExecutor::new(
        db,
        Arc::new(registry),
        Arc::new(DryRunCreds),
        Arc::new(DryRunMedia),
    ));
    let worker = Worker::new(queue, executor, config.worker.batch_size);

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = cli.poll_interval.unwrap_or(config.worker.poll_interval);
    info!("Poll interval: {}s", poll_interval);

    if cli.once {
        let processed = worker.tick().await?;
        info!("crosspost-worker: processed {} job(s), exiting", processed);
    } else {
        worker.run(poll_interval, shutdown).await?;
    }

    info!("crosspost-worker stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libcrosspost::CrosspostError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    let shutdown_clone = shutdown.clone();
    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown_clone.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}
