use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, Method};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::config::Settings;
use crate::error::ApiError;
use crate::models::{ResolvedHost, SubdomainEntry};

/// HTTP probing configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Timeout for a single HTTP request
    pub request_timeout: Duration,
    /// Timeout for the raw TLS reachability handshake
    pub tls_timeout: Duration,
    /// Maximum number of redirects to follow
    pub max_redirects: usize,
    /// User agent string to use
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            tls_timeout: Duration::from_secs(5),
            max_redirects: 5,
            user_agent: "subscope/0.1".to_string(),
        }
    }
}

impl ProbeConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            request_timeout: Duration::from_secs_f64(settings.probe_timeout_seconds),
            tls_timeout: Duration::from_secs_f64(settings.http_timeout_seconds.min(5.0)),
            max_redirects: 5,
            user_agent: ProbeConfig::default().user_agent,
        }
    }
}

/// Enriches a resolved host with HTTP status, server banner and TLS
/// reachability. A probe never fails: a host that answers nothing yields
/// an entry with no status and `tls = false`.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, host: &ResolvedHost) -> SubdomainEntry;
}

pub struct HostProber {
    client: Client,
    config: ProbeConfig,
    tls: TlsConnector,
}

impl HostProber {
    pub fn new(config: ProbeConfig) -> Result<Self, ApiError> {
        let client = ClientBuilder::new()
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(&config.user_agent)
            .build()?;

        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();
        let tls = TlsConnector::from(Arc::new(tls_config));

        Ok(Self {
            client,
            config,
            tls,
        })
    }

    /// HEAD first, then GET when the server rejects HEAD outright or the
    /// connection fails. Returns the first response seen.
    async fn attempt_request(&self, url: &str) -> (Option<i32>, String) {
        for method in [Method::HEAD, Method::GET] {
            match self.client.request(method.clone(), url).send().await {
                Ok(response) => {
                    let status = response.status().as_u16() as i32;
                    if method == Method::HEAD && matches!(status, 403 | 405) {
                        continue;
                    }
                    let server = response
                        .headers()
                        .get("server")
                        .and_then(|value| value.to_str().ok())
                        .map(|value| value.trim().to_string())
                        .unwrap_or_default();
                    return (Some(status), server);
                }
                Err(err) => {
                    tracing::trace!(url = %url, error = %err, "probe request failed");
                }
            }
        }
        (None, String::new())
    }

    /// Raw TLS handshake on :443, used when the HTTPS request itself did
    /// not go through but the host may still terminate TLS.
    async fn check_tls(&self, host: &str) -> bool {
        let Ok(server_name) = ServerName::try_from(host.to_string()) else {
            return false;
        };

        let handshake = async {
            let stream = TcpStream::connect((host, 443u16)).await.ok()?;
            self.tls.connect(server_name, stream).await.ok()
        };

        matches!(timeout(self.config.tls_timeout, handshake).await, Ok(Some(_)))
    }
}

#[async_trait]
impl Prober for HostProber {
    async fn probe(&self, host: &ResolvedHost) -> SubdomainEntry {
        let mut entry = SubdomainEntry::unprobed(host);

        let (https_status, https_server) =
            self.attempt_request(&format!("https://{}", host.name)).await;

        if let Some(status) = https_status {
            entry.http_status = Some(status);
            entry.server = https_server;
            entry.tls = true;
        } else {
            let (http_status, http_server) =
                self.attempt_request(&format!("http://{}", host.name)).await;
            if let Some(status) = http_status {
                entry.http_status = Some(status);
                entry.server = http_server;
            }
        }

        if !entry.tls {
            entry.tls = self.check_tls(&host.name).await;
        }

        entry
    }
}
