use super::compiler::{compile, CompileError, CompiledRuleSet};
use super::fetcher::{FetchError, RuleSource, SourceFetcher};
use super::traits::RuleEngine;
use arc_swap::ArcSwap;
use hickory_proto::op::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Pieces shared between the lookup path, the reload path and the
/// background scheduler tasks.
struct Shared {
    source: RuleSource,
    fetcher: SourceFetcher,
    current: ArcSwap<CompiledRuleSet>,
    generations: AtomicU64,
}

impl Shared {
    /// Fetch (remote sources re-fetch unconditionally), compile, and publish.
    ///
    /// The swap is a single pointer store: every concurrent lookup observes
    /// either the previous set or the new one in full. On any failure the
    /// previous set stays current. The superseded set's storage is released
    /// once the last in-flight lookup drops its guard.
    async fn reload(&self) -> Result<(), EngineError> {
        let path = self.fetcher.acquire(&self.source).await?;
        self.compile_and_swap(&path).await
    }

    async fn compile_and_swap(&self, path: &std::path::Path) -> Result<(), EngineError> {
        let paths = vec![path.to_path_buf()];
        let (matcher, storage) = compile(&paths).await?;
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let next = CompiledRuleSet::new(matcher, storage, generation);

        info!(
            origin = %self.source.origin(),
            generation,
            rules = next.matcher().len(),
            "ruleset swapped in"
        );
        self.current.store(Arc::new(next));
        Ok(())
    }
}

/// Owns the currently active compiled ruleset and its refresh lifecycle.
///
/// Between successful construction and shutdown there is always a valid,
/// fully formed current ruleset; lookups never observe a partial one.
pub struct FilterEngine {
    shared: Arc<Shared>,
    cancel: CancellationToken,
    refresh_period: Duration,
    refresh_tx: mpsc::Sender<()>,
    // Parked until run() hands it to the consumer task.
    refresh_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl FilterEngine {
    /// Builds an engine and compiles its initial ruleset.
    ///
    /// If the cache file already exists on disk the network fetch is skipped
    /// and the cached copy is compiled directly (availability over
    /// freshness at boot); the first scheduled or manual refresh afterwards
    /// re-fetches regardless. Any failure here is fatal: the hosting
    /// resolver must not start with this filter enabled but no ruleset.
    pub async fn new(
        source: RuleSource,
        refresh_period: Duration,
    ) -> Result<Arc<Self>, EngineError> {
        let fetcher = SourceFetcher::new();
        let cache_path = source.cache_path().to_path_buf();

        let initial_path =
            if source.is_remote() && tokio::fs::try_exists(&cache_path).await.unwrap_or(false) {
                info!(path = %cache_path.display(), "using cached ruleset at startup");
                cache_path
            } else {
                fetcher.acquire(&source).await?
            };

        let paths = vec![initial_path];
        let (matcher, storage) = compile(&paths).await?;
        let initial = CompiledRuleSet::new(matcher, storage, 1);

        let shared = Arc::new(Shared {
            source,
            fetcher,
            current: ArcSwap::from_pointee(initial),
            generations: AtomicU64::new(1),
        });

        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        info!(
            origin = %shared.source.origin(),
            period = ?refresh_period,
            "filter engine ready"
        );

        Ok(Arc::new(Self {
            shared,
            cancel: CancellationToken::new(),
            refresh_period,
            refresh_tx,
            refresh_rx: Mutex::new(Some(refresh_rx)),
        }))
    }

    /// Generation id of the current ruleset. Increases by one per
    /// successful reload; stable across failed ones.
    pub fn generation(&self) -> u64 {
        self.shared.current.load().generation()
    }

    fn lookup_host(&self, hostname: &str) -> bool {
        let host = hostname.trim_end_matches('.').to_lowercase();
        self.shared.current.load().matcher().is_match(&host)
    }

    /// Requests an out-of-band refresh. Coalesces with an already pending
    /// signal; the consumer serializes the actual work.
    pub fn trigger_refresh(&self) {
        if self.refresh_tx.try_send(()).is_err() {
            debug!("refresh already pending, trigger coalesced");
        }
    }
}

#[async_trait::async_trait]
impl RuleEngine for FilterEngine {
    /// Membership test for the query's hostname against the current ruleset.
    ///
    /// Returns false (unfiltered) after shutdown and for questionless
    /// messages. The read is a wait-free pointer load; lookups proceed fully
    /// in parallel and are never blocked by a reload in progress.
    fn lookup(&self, msg: &Message) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        let Some(query) = msg.queries().first() else {
            return false;
        };
        self.lookup_host(&query.name().to_string())
    }

    /// Starts the refresh scheduler: a ticker emitting a signal every
    /// `refresh_period`, and a consumer performing fetch + compile + swap
    /// per signal. No-op when the period is zero or on repeated calls.
    fn run(&self) {
        if self.refresh_period.is_zero() {
            return;
        }
        let Some(mut refresh_rx) = self.refresh_rx.lock().expect("rx mutex").take() else {
            return;
        };

        let shared = self.shared.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    signal = refresh_rx.recv() => {
                        if signal.is_none() {
                            return;
                        }
                        if let Err(err) = shared.reload().await {
                            warn!(origin = %shared.source.origin(), %err, "scheduled reload failed, keeping previous ruleset");
                        }
                    }
                }
            }
        });

        let period = self.refresh_period;
        let refresh_tx = self.refresh_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; the initial ruleset was just
            // compiled, so swallow it.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = interval.tick() => {
                        // Capacity-1 channel: a long reload makes this send
                        // wait, serializing back-to-back ticks instead of
                        // piling them up.
                        if refresh_tx.send(()).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });
    }

    /// Manual refresh: fetch, compile, swap. On error the previous ruleset
    /// remains authoritative and keeps serving lookups.
    async fn reload(&self) -> anyhow::Result<()> {
        self.shared.reload().await?;
        Ok(())
    }

    /// Cancels the lifecycle token. Background tasks exit at their next
    /// suspension point; an in-flight fetch or compile is not interrupted
    /// but no further swap is published to lookups that already fail open.
    fn shutdown(&self) {
        info!(origin = %self.shared.source.origin(), "filter engine shutting down");
        self.cancel.cancel();
    }
}
