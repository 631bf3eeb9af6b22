//! Concurrency scheduler: resolves a batch of magnet links with a bounded number in flight
//!
//! Every link is handed to a [`LinkResolver`] in its own task. A semaphore caps how many
//! run at once; each task holds its permit until the link reaches a terminal state. Results
//! stream out through [`PendingResults`] as soon as any link produces them, and the stream
//! ends once every link is done.

use crate::error::{Error, Result};
use crate::magnet::MagnetLink;
use crate::orchestrator::DebridOrchestrator;
use crate::types::{Event, LinkOutcome, PendingResult, RunSummary};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

/// Pending results buffered before resolvers wait for the consumer
const DEFAULT_RESULT_BUFFER: usize = 64;

/// Drives a single magnet link to a terminal state
#[async_trait::async_trait]
pub trait LinkResolver: Send + Sync + 'static {
    /// Resolve `link`, sending every direct URL it produces to `results`
    async fn resolve(
        &self,
        link: &MagnetLink,
        results: &mpsc::Sender<PendingResult>,
    ) -> Result<LinkOutcome>;
}

#[async_trait::async_trait]
impl LinkResolver for DebridOrchestrator {
    async fn resolve(
        &self,
        link: &MagnetLink,
        results: &mpsc::Sender<PendingResult>,
    ) -> Result<LinkOutcome> {
        DebridOrchestrator::resolve(self, link, results).await
    }
}

/// Runs resolvers for many links with at most `max_concurrent` in flight
pub struct ConcurrencyScheduler<R> {
    resolver: Arc<R>,
    max_concurrent: usize,
    result_buffer: usize,
    events: Option<broadcast::Sender<Event>>,
}

impl<R> Clone for ConcurrencyScheduler<R> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            max_concurrent: self.max_concurrent,
            result_buffer: self.result_buffer,
            events: self.events.clone(),
        }
    }
}

impl<R: LinkResolver> ConcurrencyScheduler<R> {
    /// Create a scheduler; a `max_concurrent` of zero is treated as one
    pub fn new(resolver: Arc<R>, max_concurrent: usize) -> Self {
        Self {
            resolver,
            max_concurrent: max_concurrent.max(1),
            result_buffer: DEFAULT_RESULT_BUFFER,
            events: None,
        }
    }

    /// Publish per-link events on `events`
    pub fn with_events(mut self, events: broadcast::Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    /// Number of pending results buffered before resolvers wait for the consumer
    pub fn with_result_buffer(mut self, capacity: usize) -> Self {
        self.result_buffer = capacity.max(1);
        self
    }

    /// The concurrency bound
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Start resolving `links` in the background
    ///
    /// Links are started in input order as permits free up. A failing link is logged and
    /// counted; it never cancels its siblings. Dropping the returned [`PendingResults`]
    /// stops the run: no further link is started and links in flight are aborted.
    /// Must be called within a tokio runtime.
    pub fn spawn(&self, links: Vec<MagnetLink>) -> PendingResults {
        let (tx, rx) = mpsc::channel(self.result_buffer);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let resolver = Arc::clone(&self.resolver);
        let events = self.events.clone();
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        let summary = tokio::spawn(async move {
            let mut summary = RunSummary {
                total: links.len(),
                ..Default::default()
            };
            let mut tasks = JoinSet::new();
            let mut started = 0usize;

            for link in links {
                // Blocks while max_concurrent links are in flight
                let permit = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let resolver = Arc::clone(&resolver);
                let tx = tx.clone();
                let events = events.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    resolve_one(resolver.as_ref(), &link, &tx, events.as_ref()).await
                });
                started += 1;
            }

            // The stream closes once the last task drops its sender
            drop(tx);

            let mut aborted = false;
            loop {
                let joined = tokio::select! {
                    biased;
                    _ = stop.cancelled(), if !aborted => {
                        tasks.abort_all();
                        aborted = true;
                        continue;
                    }
                    joined = tasks.join_next() => joined,
                };
                let Some(joined) = joined else {
                    break;
                };

                match joined {
                    Ok(Some(LinkOutcome::Resolved { emitted, .. })) => {
                        summary.resolved += 1;
                        summary.emitted += emitted;
                    }
                    Ok(Some(LinkOutcome::Skipped { .. })) => summary.skipped += 1,
                    Ok(None) => summary.failed += 1,
                    Err(e) if e.is_cancelled() => summary.failed += 1,
                    Err(e) => {
                        error!(error = %e, "Link task panicked");
                        summary.failed += 1;
                    }
                }
            }

            // Links never started because the consumer went away count as failed
            let not_started = summary.total - started;
            if not_started > 0 {
                warn!(
                    not_started,
                    "Result consumer dropped, remaining links were not started"
                );
                summary.failed += not_started;
            }

            info!(
                total = summary.total,
                resolved = summary.resolved,
                skipped = summary.skipped,
                failed = summary.failed,
                emitted = summary.emitted,
                "Scheduler run finished"
            );
            if let Some(events) = &events {
                events.send(Event::RunFinished { summary }).ok();
            }
            summary
        });

        PendingResults {
            results: rx,
            summary,
            _stop_on_drop: cancel.drop_guard(),
        }
    }
}

/// Resolve one link, logging and publishing its outcome; `None` means it failed
async fn resolve_one<R: LinkResolver>(
    resolver: &R,
    link: &MagnetLink,
    results: &mpsc::Sender<PendingResult>,
    events: Option<&broadcast::Sender<Event>>,
) -> Option<LinkOutcome> {
    let publish = |event: Event| {
        if let Some(events) = events {
            events.send(event).ok();
        }
    };

    debug!(magnet = %link, "Resolving link");
    publish(Event::LinkStarted {
        magnet: link.to_string(),
    });

    match resolver.resolve(link, results).await {
        Ok(outcome) => {
            match &outcome {
                LinkOutcome::Resolved {
                    torrent_id,
                    emitted,
                } => publish(Event::LinkResolved {
                    magnet: link.to_string(),
                    torrent_id: torrent_id.clone(),
                    emitted: *emitted,
                }),
                LinkOutcome::Skipped { reason, .. } => publish(Event::LinkSkipped {
                    magnet: link.to_string(),
                    reason: *reason,
                }),
            }
            Some(outcome)
        }
        Err(e) => {
            if e.is_fatal() {
                error!(magnet = %link.label(), error = %e, "Link failed");
            } else {
                warn!(magnet = %link.label(), error = %e, "Link failed");
            }
            publish(Event::LinkFailed {
                magnet: link.to_string(),
                error: e.to_string(),
            });
            None
        }
    }
}

/// Stream of resolved downloads from one scheduler run
///
/// Yields each [`PendingResult`] as soon as it is produced and ends once every link has
/// reached a terminal state.
pub struct PendingResults {
    results: mpsc::Receiver<PendingResult>,
    summary: JoinHandle<RunSummary>,
    _stop_on_drop: DropGuard,
}

impl PendingResults {
    /// Receive the next result, or `None` once the run is complete
    pub async fn recv(&mut self) -> Option<PendingResult> {
        self.results.recv().await
    }

    /// Wait for the run to end and return its counters
    ///
    /// Call after [`recv`](Self::recv) returned `None`. Called earlier, it discards the
    /// results not received yet and aborts the links still in flight.
    pub async fn finish(self) -> Result<RunSummary> {
        let PendingResults {
            results,
            summary,
            _stop_on_drop: stop_on_drop,
        } = self;
        drop(results);
        drop(stop_on_drop);
        summary
            .await
            .map_err(|e| Error::Other(format!("scheduler task failed: {e}")))
    }
}

impl Stream for PendingResults {
    type Item = PendingResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.results.poll_recv(cx)
    }
}
