//! Relay wiring: feed, orchestration and the downstream consumer loop
//!
//! [`DebridRelay`] owns the configured components. [`DebridRelay::run_once`] hands out the
//! raw stream of resolved downloads; [`DebridRelay::process`] drives that stream into a
//! [`DownloadSink`] and records each link in the ledger only after the sink accepted it.

use crate::config::Config;
use crate::debrid::{DebridApi, RealDebridClient};
use crate::error::Result;
use crate::feed::FeedSource;
use crate::magnet::MagnetLink;
use crate::orchestrator::DebridOrchestrator;
use crate::scheduler::{ConcurrencyScheduler, PendingResults};
use crate::types::{Event, RunSummary};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

/// Events buffered per subscriber before it starts lagging
const EVENT_BUFFER: usize = 1000;

/// Downstream target for direct download URLs (a NAS download station, a queue, ...)
#[async_trait::async_trait]
pub trait DownloadSink: Send + Sync {
    /// Hand `direct` to the downstream system
    ///
    /// Returning `Ok` means the download was accepted; the originating magnet link is then
    /// recorded as downloaded and will not be relayed again.
    async fn submit(&self, original: &MagnetLink, direct: &Url) -> Result<()>;
}

/// Relays new magnet links from an RSS feed through a debrid service
pub struct DebridRelay {
    config: Config,
    feed: FeedSource,
    scheduler: ConcurrencyScheduler<DebridOrchestrator>,
    event_tx: broadcast::Sender<Event>,
}

impl DebridRelay {
    /// Create a relay talking to the configured debrid service
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if the configuration is invalid. Nothing touches the
    /// network before validation passes.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = RealDebridClient::new(&config.debrid, config.retry.clone())?;
        Self::with_api(config, Arc::new(client))
    }

    /// Create a relay on top of an arbitrary [`DebridApi`] implementation
    pub fn with_api(config: Config, api: Arc<dyn DebridApi>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_BUFFER);
        let feed = FeedSource::from_config(&config)?;
        let orchestrator = DebridOrchestrator::new(api, config.debrid.poll_interval);
        let scheduler = ConcurrencyScheduler::new(Arc::new(orchestrator), config.max_concurrent)
            .with_events(event_tx.clone());

        Ok(Self {
            config,
            feed,
            scheduler,
            event_tx,
        })
    }

    /// The validated configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The feed source, for direct ledger access
    pub fn feed(&self) -> &FeedSource {
        &self.feed
    }

    /// Subscribe to relay events
    ///
    /// Each subscriber receives every event. A subscriber more than 1000 events behind
    /// gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Fetch the feed, drop already downloaded links and start resolving the rest
    ///
    /// The returned stream yields results unordered and closes once every link is done.
    /// The caller must submit each result downstream and then call
    /// [`FeedSource::mark_downloaded`] on its original link.
    ///
    /// # Errors
    /// Feed fetch, feed parse and ledger read errors abort the run.
    pub async fn run_once(&self) -> Result<PendingResults> {
        let links = self.feed.fetch_links().await?;
        let total = links.len();
        let links = self.feed.filter_undownloaded(links).await?;

        info!(total, new = links.len(), "Starting relay run");
        self.event_tx
            .send(Event::FeedFetched {
                total,
                new: links.len(),
            })
            .ok();

        Ok(self.scheduler.spawn(links))
    }

    /// Run once and feed every result into `sink`, marking links only after acceptance
    ///
    /// A rejected submission is logged and its link stays unmarked, so the next run
    /// relays it again.
    ///
    /// Marking happens per accepted pair. A link whose torrent yields several direct
    /// URLs is recorded as soon as its first pair is accepted, and pairs of that link
    /// rejected later in the run are not relayed again.
    ///
    /// # Errors
    /// Returns fatal errors only: feed failures and ledger write failures.
    pub async fn process<S>(&self, sink: &S) -> Result<RunSummary>
    where
        S: DownloadSink + ?Sized,
    {
        let mut pending = self.run_once().await?;
        let mut submitted = 0usize;

        while let Some(result) = pending.recv().await {
            match sink.submit(&result.original, &result.direct).await {
                Ok(()) => {
                    self.feed.mark_downloaded(&result.original).await?;
                    submitted += 1;
                    self.event_tx
                        .send(Event::Submitted {
                            magnet: result.original.to_string(),
                            direct: result.direct.to_string(),
                        })
                        .ok();
                }
                Err(e) => {
                    warn!(
                        magnet = %result.original.label(),
                        direct = %result.direct,
                        error = %e,
                        "Downstream submission failed, link left unmarked"
                    );
                    self.event_tx
                        .send(Event::SubmitFailed {
                            magnet: result.original.to_string(),
                            direct: result.direct.to_string(),
                            error: e.to_string(),
                        })
                        .ok();
                }
            }
        }

        let summary = pending.finish().await?;
        info!(submitted, failed = summary.failed, "Relay run complete");
        Ok(summary)
    }

    /// Call [`process`](Self::process) every `check_interval` until `shutdown` is cancelled
    ///
    /// Errors of one cycle are logged and the next cycle still runs. Cancelling abandons an
    /// in-flight cycle; unmarked links are picked up again by the next start.
    pub async fn run_periodically<S>(&self, sink: &S, shutdown: CancellationToken)
    where
        S: DownloadSink + ?Sized,
    {
        info!(
            interval_secs = self.config.check_interval.as_secs(),
            "Relay scheduler started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = self.process(sink) => match outcome {
                    Ok(summary) => debug!(
                        resolved = summary.resolved,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "Relay cycle finished"
                    ),
                    Err(e) => error!(error = %e, "Relay cycle failed"),
                },
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.check_interval) => {}
            }
        }

        info!("Relay scheduler shutting down");
    }
}
