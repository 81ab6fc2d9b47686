use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::Settings;
use crate::error::ApiError;
use crate::utils::{is_subdomain, iter_crtsh_names, normalize_hostname, unique_everseen};

/// A passive candidate source: yields hostnames without touching the
/// target. Failures degrade to an empty list, never to a scan abort.
#[async_trait]
pub trait PassiveSource: Send + Sync {
    async fn lookup(&self, domain: &str) -> Vec<String>;
}

#[derive(Debug, Deserialize)]
struct CrtShEntry {
    name_value: Option<String>,
}

/// Certificate Transparency log client for subdomain enumeration.
pub struct CrtShClient {
    client: reqwest::Client,
    base_url: String,
}

impl CrtShClient {
    pub fn new(settings: &Settings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(settings.crtsh_timeout_seconds))
            .user_agent(&settings.crtsh_user_agent)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.crtsh_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, domain: &str) -> Result<Vec<CrtShEntry>, ApiError> {
        let url = format!(
            "{}/?q=%25.{}&output=json",
            self.base_url,
            urlencoding::encode(domain)
        );
        tracing::debug!(url = %url, "querying crt.sh");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ApiError::external_service(format!(
                "crt.sh returned status {} for {}",
                response.status(),
                domain
            )));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<CrtShEntry> = serde_json::from_str(&text).map_err(|e| {
            ApiError::external_service(format!("failed to parse crt.sh response: {e}"))
        })?;
        Ok(entries)
    }
}

/// Extract normalized subdomains of `domain` from crt.sh entries,
/// first-seen order, deduplicated.
fn extract_names(entries: Vec<CrtShEntry>, domain: &str) -> Vec<String> {
    let mut names = Vec::new();
    for entry in entries {
        let Some(name_value) = entry.name_value else {
            continue;
        };
        for raw in iter_crtsh_names(&name_value) {
            let Some(normalized) = normalize_hostname(raw) else {
                continue;
            };
            if is_subdomain(&normalized, domain) {
                names.push(normalized);
            }
        }
    }
    unique_everseen(names)
}

#[async_trait]
impl PassiveSource for CrtShClient {
    async fn lookup(&self, domain: &str) -> Vec<String> {
        match self.fetch(domain).await {
            Ok(entries) => {
                let names = extract_names(entries, domain);
                tracing::info!(
                    domain = %domain,
                    count = names.len(),
                    "crt.sh lookup completed"
                );
                names
            }
            Err(err) => {
                tracing::warn!(domain = %domain, error = %err, "crt.sh lookup failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_settings(base_url: &str) -> Settings {
        let mut settings = Settings::new_with_env_file(false).unwrap();
        settings.crtsh_base_url = base_url.to_string();
        settings.crtsh_timeout_seconds = 2.0;
        settings
    }

    #[test]
    fn extract_names_filters_and_dedups() {
        let entries = vec![
            CrtShEntry {
                name_value: Some("www.example.com\n*.api.example.com".to_string()),
            },
            CrtShEntry {
                name_value: Some("WWW.Example.com".to_string()),
            },
            CrtShEntry {
                name_value: Some("unrelated.net".to_string()),
            },
            CrtShEntry { name_value: None },
        ];
        assert_eq!(
            extract_names(entries, "example.com"),
            vec!["www.example.com", "api.example.com"]
        );
    }

    #[tokio::test]
    async fn lookup_parses_mock_response() {
        let server = MockServer::start().await;
        let body = r#"[
            {"name_value": "a.example.com"},
            {"name_value": "*.b.example.com\na.example.com"},
            {"name_value": "other.org"}
        ]"#;
        Mock::given(method("GET"))
            .and(query_param("output", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let client = CrtShClient::new(&test_settings(&server.uri())).unwrap();
        let names = client.lookup("example.com").await;
        assert_eq!(names, vec!["a.example.com", "b.example.com"]);
    }

    #[tokio::test]
    async fn lookup_degrades_to_empty_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let client = CrtShClient::new(&test_settings(&server.uri())).unwrap();
        assert!(client.lookup("example.com").await.is_empty());
    }

    #[tokio::test]
    async fn lookup_degrades_to_empty_on_malformed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
            .mount(&server)
            .await;

        let client = CrtShClient::new(&test_settings(&server.uri())).unwrap();
        assert!(client.lookup("example.com").await.is_empty());
    }

    #[tokio::test]
    async fn lookup_degrades_to_empty_on_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("[]")
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let mut settings = test_settings(&server.uri());
        settings.crtsh_timeout_seconds = 0.2;
        let client = CrtShClient::new(&settings).unwrap();
        assert!(client.lookup("example.com").await.is_empty());
    }

    #[tokio::test]
    async fn empty_body_yields_no_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(""))
            .mount(&server)
            .await;

        let client = CrtShClient::new(&test_settings(&server.uri())).unwrap();
        assert!(client.lookup("example.com").await.is_empty());
    }
}
