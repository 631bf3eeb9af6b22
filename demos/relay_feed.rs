//! Relay a feed example
//!
//! This example demonstrates the core functionality of debrid-relay:
//! - Building a configuration from environment variables
//! - Creating a relay instance
//! - Subscribing to events
//! - Running the relay periodically until Ctrl+C
//!
//! ```text
//! RELAY_FEED_URL=https://example.com/rss RELAY_API_TOKEN=... \
//!     cargo run --example relay_feed
//! ```

use debrid_relay::{Config, DebridRelay, DownloadSink, Event, MagnetLink, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Prints every direct URL instead of handing it to a download station
struct StdoutSink;

#[async_trait::async_trait]
impl DownloadSink for StdoutSink {
    async fn submit(&self, original: &MagnetLink, direct: &Url) -> Result<()> {
        let name = original.display_name().unwrap_or_else(|| original.label());
        println!("⇢ {name}: {direct}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debrid_relay=info".into()),
        )
        .init();

    // Build configuration
    let mut config = Config::new(
        std::env::var("RELAY_FEED_URL").unwrap_or_default(),
        std::env::var("RELAY_API_TOKEN").unwrap_or_default(),
    );
    config.ledger_path = Some(
        std::env::var("RELAY_LEDGER")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("history.txt")),
    );
    config.check_interval = Duration::from_secs(5 * 60);

    // Fails here, before any request, when the feed URL or token is missing
    let relay = DebridRelay::new(config)?;

    // Subscribe to events
    let mut events = relay.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::FeedFetched { total, new } => {
                    println!("✓ Feed fetched: {} links, {} new", total, new);
                }
                Event::LinkResolved {
                    magnet, emitted, ..
                } => {
                    println!("✓ Resolved {} ({} files)", magnet, emitted);
                }
                Event::LinkSkipped { magnet, reason } => {
                    println!("- Skipped {}: {}", magnet, reason);
                }
                Event::LinkFailed { magnet, error } => {
                    println!("✗ Failed {}: {}", magnet, error);
                }
                Event::RunFinished { summary } => {
                    println!(
                        "Run finished: {} resolved, {} skipped, {} failed",
                        summary.resolved, summary.skipped, summary.failed
                    );
                }
                _ => {}
            }
        }
    });

    println!("Relaying feed, press Ctrl+C to stop");
    debrid_relay::run_with_shutdown(&relay, &StdoutSink).await;

    Ok(())
}
