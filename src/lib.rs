//! # debrid-relay
//!
//! Relays magnet links found in an RSS feed through a remote debrid service and hands the
//! resulting direct download URLs to a downstream consumer, such as a NAS download station.
//!
//! ## Pipeline
//!
//! - [`FeedSource`] fetches the feed, extracts magnet links and filters out the ones
//!   already recorded in the download ledger
//! - [`ConcurrencyScheduler`] resolves the remaining links with a bounded number in flight
//! - [`DebridOrchestrator`] drives each link through submit, file selection, remote
//!   download and unrestriction, retrying transient failures with jittered backoff
//! - [`PendingResults`] streams `(original, direct)` pairs as they become available
//! - the consumer submits each direct URL downstream, then marks the original as downloaded
//!
//! ## Quick Start
//!
//! ```no_run
//! use debrid_relay::{Config, DebridRelay, DownloadSink, MagnetLink, Result};
//! use url::Url;
//!
//! struct PrintSink;
//!
//! #[async_trait::async_trait]
//! impl DownloadSink for PrintSink {
//!     async fn submit(&self, original: &MagnetLink, direct: &Url) -> Result<()> {
//!         println!("{} -> {}", original, direct);
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut config = Config::new("https://example.com/rss", "api-token");
//!     config.ledger_path = Some("history.txt".into());
//!
//!     let relay = DebridRelay::new(config)?;
//!
//!     // Subscribe to events
//!     let mut events = relay.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = relay.process(&PrintSink).await?;
//!     println!("{} resolved, {} failed", summary.resolved, summary.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Remote debrid service client
pub mod debrid;
/// Error types
pub mod error;
/// RSS feed access and download ledger
pub mod feed;
/// Magnet URI parsing
pub mod magnet;
/// Per-link remote state machine
pub mod orchestrator;
/// Feed-to-consumer wiring
pub mod relay;
/// Retry logic with exponential backoff
pub mod retry;
/// Bounded-concurrency link scheduling
pub mod scheduler;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, DebridConfig, RetryConfig};
pub use debrid::{DebridApi, RealDebridClient, TorrentFile, TorrentInfo, TorrentStatus};
pub use error::{Error, RemoteApiError, Result};
pub use feed::{DownloadLedger, FeedSource};
pub use magnet::MagnetLink;
pub use orchestrator::DebridOrchestrator;
pub use relay::{DebridRelay, DownloadSink};
pub use scheduler::{ConcurrencyScheduler, LinkResolver, PendingResults};
pub use types::{Event, LinkOutcome, PendingResult, RunSummary, SkipReason};

/// Run the relay periodically until a termination signal arrives
///
/// - **Unix:** stops on SIGTERM or SIGINT.
/// - **Windows/other:** stops on Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use debrid_relay::{Config, DebridRelay, DownloadSink, MagnetLink, Result, run_with_shutdown};
///
/// # struct Nas;
/// # #[async_trait::async_trait]
/// # impl DownloadSink for Nas {
/// #     async fn submit(&self, _: &MagnetLink, _: &url::Url) -> Result<()> { Ok(()) }
/// # }
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let relay = DebridRelay::new(Config::new("https://example.com/rss", "api-token"))?;
///     run_with_shutdown(&relay, &Nas).await;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown<S>(relay: &DebridRelay, sink: &S)
where
    S: DownloadSink + ?Sized,
{
    let shutdown = tokio_util::sync::CancellationToken::new();
    let trigger = shutdown.clone();

    tokio::join!(relay.run_periodically(sink, shutdown), async move {
        wait_for_signal().await;
        trigger.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
