use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::Settings;
use crate::error::ApiError;
use crate::models::ResolvedHost;
use crate::services::external::{DnsResolver, MassdnsResolver};

/// Resolution strategy interface. The pipeline depends only on this; the
/// engine below picks between the batch and per-name paths per invocation.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Name of the strategy that would handle a workload of this size.
    fn strategy(&self, candidate_count: usize) -> &'static str;

    /// Resolve all candidates, streaming results into `out`. Per-name
    /// failures are dropped, not surfaced.
    async fn resolve(
        &self,
        candidates: Vec<String>,
        out: mpsc::Sender<ResolvedHost>,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl Resolver for DnsResolver {
    fn strategy(&self, _candidate_count: usize) -> &'static str {
        "trust-dns"
    }

    async fn resolve(
        &self,
        candidates: Vec<String>,
        out: mpsc::Sender<ResolvedHost>,
    ) -> Result<(), ApiError> {
        self.resolve_all(candidates, out).await
    }
}

/// Selects the batch resolver when it is installed and the candidate set
/// is large enough to amortize the process spawn, falling back to the
/// bounded per-name resolver otherwise, or for the entire set when the
/// batch path fails mid-flight.
pub struct ResolutionEngine {
    massdns: Option<MassdnsResolver>,
    massdns_available: AtomicBool,
    min_batch_candidates: usize,
    fallback: Arc<dyn Resolver>,
}

impl ResolutionEngine {
    pub fn new(settings: &Settings, fallback: Arc<dyn Resolver>) -> Self {
        let massdns = settings
            .massdns_path()
            .map(|bin| MassdnsResolver::new(bin, settings));
        if let Some(ref resolver) = massdns {
            tracing::info!(binary = %resolver.binary().display(), "massdns batch resolver available");
        } else {
            tracing::info!("massdns not found, using per-name resolver only");
        }

        Self {
            massdns_available: AtomicBool::new(massdns.is_some()),
            massdns,
            min_batch_candidates: settings.massdns_min_candidates,
            fallback,
        }
    }

    fn batch_eligible(&self, candidate_count: usize) -> bool {
        self.massdns.is_some()
            && self.massdns_available.load(Ordering::Relaxed)
            && candidate_count >= self.min_batch_candidates
    }
}

#[async_trait]
impl Resolver for ResolutionEngine {
    fn strategy(&self, candidate_count: usize) -> &'static str {
        if self.batch_eligible(candidate_count) {
            "massdns"
        } else {
            self.fallback.strategy(candidate_count)
        }
    }

    async fn resolve(
        &self,
        candidates: Vec<String>,
        out: mpsc::Sender<ResolvedHost>,
    ) -> Result<(), ApiError> {
        if let Some(massdns) = self
            .massdns
            .as_ref()
            .filter(|_| self.batch_eligible(candidates.len()))
        {
            match massdns.resolve_all(&candidates, &out).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "massdns failed, retrying entire candidate set on per-name resolver"
                    );
                    // Re-probe availability so later scans skip the batch
                    // path when the binary disappeared.
                    if !massdns.binary().is_file() {
                        self.massdns_available.store(false, Ordering::Relaxed);
                    }
                }
            }
        }

        self.fallback.resolve(candidates, out).await
    }
}
