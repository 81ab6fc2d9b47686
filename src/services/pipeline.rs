use chrono::{SecondsFormat, Utc};
use futures::stream::StreamExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::Settings;
use crate::error::ApiError;
use crate::models::{SearchEvent, SubdomainEntry};
use crate::repositories::RunRepository;
use crate::services::external::{PassiveSource, Prober};
use crate::services::resolution::Resolver;
use crate::services::wordlist::WordlistGenerator;
use crate::utils::{is_subdomain, sanitize_domain, unique_everseen};

/// Drives one domain scan end to end: cache check, candidate collection,
/// streaming resolve-and-probe, aggregation, persistence. Events are
/// pushed into the provided channel; a closed channel means the client is
/// gone and outstanding work is cancelled, but whatever was already
/// aggregated is still persisted.
pub struct SearchPipeline {
    settings: Arc<Settings>,
    runs: Arc<dyn RunRepository>,
    passive: Arc<dyn PassiveSource>,
    resolver: Arc<dyn Resolver>,
    prober: Arc<dyn Prober>,
    wordlist: WordlistGenerator,
}

impl SearchPipeline {
    pub fn new(
        settings: Arc<Settings>,
        runs: Arc<dyn RunRepository>,
        passive: Arc<dyn PassiveSource>,
        resolver: Arc<dyn Resolver>,
        prober: Arc<dyn Prober>,
    ) -> Self {
        let wordlist = WordlistGenerator::new(&settings);
        Self {
            settings,
            runs,
            passive,
            resolver,
            prober,
            wordlist,
        }
    }

    pub async fn search(
        &self,
        domain: &str,
        refresh: bool,
        tx: mpsc::Sender<SearchEvent>,
    ) -> Result<(), ApiError> {
        let normalized = sanitize_domain(domain)
            .ok_or_else(|| ApiError::validation("invalid domain"))?;

        if tx.send(SearchEvent::started(&normalized)).await.is_err() {
            return Ok(());
        }

        let (cached, cached_meta) = self.runs.load_snapshot(&normalized).await?;

        if !refresh {
            if let Some(ref meta) = cached_meta {
                let age = Utc::now() - meta.cached_at;
                if !cached.is_empty() && age.num_seconds() <= self.settings.cache_ttl_seconds {
                    return self.replay_cached(&normalized, &cached, meta, tx).await;
                }
            }
        }

        let run_id = self.runs.start_run(&normalized).await?;
        let started_at = Instant::now();

        let (crt_names, wordlist_names) = tokio::join!(
            self.passive.lookup(&normalized),
            async { self.wordlist.generate(&normalized, true) },
        );

        if tx
            .send(SearchEvent::crt_sh_found(&normalized, crt_names.len()))
            .await
            .is_err()
        {
            return self.finalize(&normalized, run_id, BTreeMap::new(), started_at, None).await;
        }

        let candidates =
            self.collect_candidates(&normalized, crt_names, wordlist_names, refresh, &cached);

        let resolver_name = self.resolver.strategy(candidates.len());
        if tx
            .send(SearchEvent::resolving(
                &normalized,
                resolver_name,
                candidates.len(),
            ))
            .await
            .is_err()
        {
            return self.finalize(&normalized, run_id, BTreeMap::new(), started_at, None).await;
        }

        let entries = self.resolve_and_probe(candidates, &tx).await;

        self.finalize(&normalized, run_id, entries, started_at, Some(tx))
            .await
    }

    /// Cache path: replay the stored result set without any network I/O.
    async fn replay_cached(
        &self,
        domain: &str,
        cached: &[SubdomainEntry],
        meta: &crate::models::SnapshotMeta,
        tx: mpsc::Sender<SearchEvent>,
    ) -> Result<(), ApiError> {
        if tx
            .send(SearchEvent::cache_hit(domain, cached.len()))
            .await
            .is_err()
        {
            return Ok(());
        }
        for entry in cached {
            if tx.send(SearchEvent::entry(entry.clone())).await.is_err() {
                return Ok(());
            }
        }
        let _ = tx
            .send(SearchEvent::done(
                domain,
                cached.len(),
                meta.cached_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                meta.duration_ms.unwrap_or(0) as i64,
            ))
            .await;
        Ok(())
    }

    /// Merge passive and wordlist candidates, seed a refresh with the
    /// previously cached names, and dedup. Hostnames are already
    /// normalized to lowercase, so the dedup key is case-insensitive.
    fn collect_candidates(
        &self,
        domain: &str,
        crt_names: Vec<String>,
        wordlist_names: Vec<String>,
        refresh: bool,
        cached: &[SubdomainEntry],
    ) -> Vec<String> {
        let mut candidates = crt_names;
        candidates.push(domain.to_string());
        candidates.extend(wordlist_names);

        if refresh {
            let known: HashSet<&str> = candidates.iter().map(String::as_str).collect();
            let seeds: Vec<String> = cached
                .iter()
                .filter(|entry| !known.contains(entry.name.as_str()))
                .map(|entry| entry.name.clone())
                .collect();
            candidates.extend(seeds);
        }

        candidates.retain(|name| is_subdomain(name, domain));
        unique_everseen(candidates)
    }

    /// Streaming resolve-and-probe: resolved hosts are dispatched to the
    /// probe pool as they arrive, and finished entries go out on the wire
    /// in completion order. Hosts without any address are discarded before
    /// probing, so every emitted and persisted entry has a non-empty ip
    /// set. The BTreeMap gives the persisted set its lexicographic order.
    async fn resolve_and_probe(
        &self,
        candidates: Vec<String>,
        tx: &mpsc::Sender<SearchEvent>,
    ) -> BTreeMap<String, SubdomainEntry> {
        let (host_tx, host_rx) = mpsc::channel(64);
        let resolver = self.resolver.clone();
        let resolve_task = tokio::spawn(async move {
            if let Err(err) = resolver.resolve(candidates, host_tx).await {
                tracing::warn!(error = %err, "resolution ended with error");
            }
        });

        let prober = self.prober.clone();
        let mut probed = ReceiverStream::new(host_rx)
            .filter(|host| futures::future::ready(!host.ips.is_empty()))
            .map(|host| {
                let prober = prober.clone();
                async move { prober.probe(&host).await }
            })
            .buffer_unordered(self.settings.probe_concurrency.max(1));

        let mut entries: BTreeMap<String, SubdomainEntry> = BTreeMap::new();
        let mut client_gone = false;

        while let Some(entry) = probed.next().await {
            entries.insert(entry.name.clone(), entry.clone());
            if !client_gone && tx.send(SearchEvent::entry(entry)).await.is_err() {
                client_gone = true;
                break;
            }
        }

        drop(probed);
        if client_gone {
            resolve_task.abort();
        }
        let _ = resolve_task.await;

        entries
    }

    /// Persist the run and, when the client is still connected, close the
    /// stream with a `done` event. Runs are finalized even for a
    /// disconnected client: best-effort delivery, reliable persistence.
    async fn finalize(
        &self,
        domain: &str,
        run_id: i64,
        entries: BTreeMap<String, SubdomainEntry>,
        started_at: Instant,
        tx: Option<mpsc::Sender<SearchEvent>>,
    ) -> Result<(), ApiError> {
        let ordered: Vec<SubdomainEntry> = entries.into_values().collect();
        let duration_ms = started_at.elapsed().as_millis() as i64;

        self.runs.insert_results(run_id, &ordered).await?;
        self.runs
            .complete_run(run_id, ordered.len() as i32, duration_ms as i32)
            .await?;

        tracing::info!(
            domain = %domain,
            run_id,
            total = ordered.len(),
            duration_ms,
            "scan completed"
        );

        if let Some(tx) = tx {
            let _ = tx
                .send(SearchEvent::done(
                    domain,
                    ordered.len(),
                    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                    duration_ms,
                ))
                .await;
        }
        Ok(())
    }
}
