use async_trait::async_trait;
use futures::stream::StreamExt;
use rand::Rng;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use trust_dns_resolver::config::{LookupIpStrategy, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::rr::RecordType;
use trust_dns_resolver::TokioAsyncResolver;

use crate::error::ApiError;
use crate::models::ResolvedHost;
use crate::utils::normalize_hostname;

/// CNAME chains longer than this are truncated at the last hop reached.
pub const MAX_CNAME_HOPS: usize = 6;

/// DNS resolution configuration
#[derive(Debug, Clone)]
pub struct DnsConfig {
    /// Timeout for individual DNS queries
    pub query_timeout: Duration,
    /// Maximum concurrent DNS queries
    pub max_concurrent: usize,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(5),
            max_concurrent: 50,
        }
    }
}

/// Minimal lookup surface needed to walk a CNAME chain. Split out so chain
/// truncation behavior is testable without a live resolver.
#[async_trait]
pub trait CnameLookup: Send + Sync {
    async fn cname_target(&self, name: &str) -> Option<String>;
}

/// Follow the CNAME chain starting at `name`. Stops at the hop limit or
/// when a name repeats; the last target reached is returned.
pub async fn chase_cname(
    lookup: &dyn CnameLookup,
    name: &str,
    max_hops: usize,
) -> Option<String> {
    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(name.to_lowercase());
    let mut current = name.to_string();
    let mut target: Option<String> = None;

    for _ in 0..max_hops {
        let Some(next) = lookup.cname_target(&current).await else {
            break;
        };
        let next = next.trim_end_matches('.').to_lowercase();
        if !seen.insert(next.clone()) {
            break;
        }
        current = next.clone();
        target = Some(next);
    }

    target
}

/// Concurrency-bounded asynchronous resolver. This is the fallback path
/// when the batch resolver is unavailable, and the only path for
/// single-host probes.
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
    config: DnsConfig,
}

#[async_trait]
impl CnameLookup for DnsResolver {
    async fn cname_target(&self, name: &str) -> Option<String> {
        let lookup = timeout(
            self.config.query_timeout,
            self.resolver.lookup(name, RecordType::CNAME),
        )
        .await
        .ok()?
        .ok()?;

        lookup.record_iter().find_map(|record| {
            record
                .data()
                .and_then(|data| data.as_cname())
                .map(|cname| cname.0.to_utf8())
        })
    }
}

impl DnsResolver {
    pub fn new() -> Self {
        Self::with_config(DnsConfig::default())
    }

    pub fn with_config(config: DnsConfig) -> Self {
        let mut resolver_opts = ResolverOpts::default();
        resolver_opts.timeout = config.query_timeout;
        resolver_opts.attempts = 1;
        resolver_opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;

        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), resolver_opts);

        Self { resolver, config }
    }

    /// Resolve one candidate. Returns `None` when the name yields neither
    /// an address nor a CNAME. A CNAME-only answer is still returned here
    /// so the single-host probe can report the alias target; the scan
    /// pipeline filters such hosts out in `resolve_all`.
    pub async fn resolve_host(&self, candidate: &str) -> Option<ResolvedHost> {
        let name = normalize_hostname(candidate)?;

        let ips = match self.lookup_ips_with_retry(&name).await {
            Ok(ips) => ips,
            Err(err) => {
                tracing::debug!(name = %name, error = %err, "DNS lookup failed");
                Vec::new()
            }
        };

        let cname = chase_cname(self, &name, MAX_CNAME_HOPS).await;

        if ips.is_empty() && cname.is_none() {
            return None;
        }

        Some(ResolvedHost { name, ips, cname })
    }

    /// Resolve a full candidate set, streaming results into `out` as they
    /// become available. Names that yield no address are dropped, CNAME or
    /// not. Closing the receiver cancels remaining work.
    pub async fn resolve_all(
        &self,
        candidates: Vec<String>,
        out: mpsc::Sender<ResolvedHost>,
    ) -> Result<(), ApiError> {
        let limit = self.config.max_concurrent.max(1);
        futures::stream::iter(candidates)
            .for_each_concurrent(limit, |candidate| {
                let out = out.clone();
                async move {
                    if let Some(host) = self.resolve_host(&candidate).await {
                        if host.ips.is_empty() {
                            return;
                        }
                        // Receiver gone means the scan was cancelled.
                        let _ = out.send(host).await;
                    }
                }
            })
            .await;

        Ok(())
    }

    async fn lookup_ips_with_retry(&self, name: &str) -> Result<Vec<String>, ResolveError> {
        match self.lookup_ips(name).await {
            Ok(ips) => Ok(ips),
            Err(err) if is_transient(&err) => {
                let backoff = Duration::from_millis(rand::thread_rng().gen_range(100..400));
                tokio::time::sleep(backoff).await;
                self.lookup_ips(name).await
            }
            Err(err) => Err(err),
        }
    }

    async fn lookup_ips(&self, name: &str) -> Result<Vec<String>, ResolveError> {
        let lookup = timeout(self.config.query_timeout, self.resolver.lookup_ip(name))
            .await
            .map_err(|_| {
                ResolveError::from(ResolveErrorKind::Timeout)
            })??;

        let mut ips: Vec<String> =
            lookup.iter().map(|ip| ip.to_string()).collect();
        ips.sort();
        ips.dedup();
        Ok(ips)
    }
}

/// Timeouts and server failures are worth one retry; NXDOMAIN and other
/// definitive answers are not.
fn is_transient(err: &ResolveError) -> bool {
    match err.kind() {
        ResolveErrorKind::Timeout => true,
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            *response_code == trust_dns_resolver::proto::op::ResponseCode::ServFail
        }
        ResolveErrorKind::Io(_) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapLookup {
        chain: HashMap<String, String>,
    }

    #[async_trait]
    impl CnameLookup for MapLookup {
        async fn cname_target(&self, name: &str) -> Option<String> {
            self.chain.get(name).cloned()
        }
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> MapLookup {
        MapLookup {
            chain: pairs
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn chase_cname_follows_simple_chain() {
        let lookup = lookup_from(&[
            ("a.example.com", "b.example.net."),
            ("b.example.net", "c.example.org"),
        ]);
        assert_eq!(
            chase_cname(&lookup, "a.example.com", MAX_CNAME_HOPS).await,
            Some("c.example.org".to_string())
        );
    }

    #[tokio::test]
    async fn chase_cname_returns_none_without_records() {
        let lookup = lookup_from(&[]);
        assert_eq!(chase_cname(&lookup, "a.example.com", MAX_CNAME_HOPS).await, None);
    }

    #[tokio::test]
    async fn chase_cname_truncates_cycles() {
        let lookup = lookup_from(&[
            ("a.example.com", "b.example.com"),
            ("b.example.com", "a.example.com"),
        ]);
        // The cycle is broken as soon as a name repeats; the last new
        // target wins.
        assert_eq!(
            chase_cname(&lookup, "a.example.com", MAX_CNAME_HOPS).await,
            Some("b.example.com".to_string())
        );
    }

    #[tokio::test]
    async fn chase_cname_respects_hop_limit() {
        let pairs: Vec<(String, String)> = (0..20)
            .map(|i| (format!("h{i}.example.com"), format!("h{}.example.com", i + 1)))
            .collect();
        let lookup = MapLookup {
            chain: pairs.into_iter().collect(),
        };
        assert_eq!(
            chase_cname(&lookup, "h0.example.com", 3).await,
            Some("h3.example.com".to_string())
        );
    }
}
