use serde::{Deserialize, Serialize};

/// A candidate hostname that resolved to something. Names that resolve to
/// neither an address nor a CNAME never become one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedHost {
    pub name: String,
    pub ips: Vec<String>,
    pub cname: Option<String>,
}

/// One finalized result row: a resolved host plus HTTP/TLS enrichment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainEntry {
    pub name: String,
    pub ips: Vec<String>,
    pub cname: String,
    pub http_status: Option<i32>,
    pub tls: bool,
    pub server: String,
}

impl SubdomainEntry {
    /// Entry for a host that resolved but never answered a probe.
    pub fn unprobed(host: &ResolvedHost) -> Self {
        Self {
            name: host.name.clone(),
            ips: host.ips.clone(),
            cname: host.cname.clone().unwrap_or_default(),
            http_status: None,
            tls: false,
            server: String::new(),
        }
    }
}

/// Response payload of the single-host probe endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResponse {
    #[serde(flatten)]
    pub entry: SubdomainEntry,
    pub last_probe: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprobed_entry_keeps_resolution_data() {
        let host = ResolvedHost {
            name: "api.example.com".to_string(),
            ips: vec!["192.0.2.10".to_string()],
            cname: Some("edge.example.net".to_string()),
        };
        let entry = SubdomainEntry::unprobed(&host);
        assert_eq!(entry.name, "api.example.com");
        assert_eq!(entry.ips, vec!["192.0.2.10"]);
        assert_eq!(entry.cname, "edge.example.net");
        assert_eq!(entry.http_status, None);
        assert!(!entry.tls);
        assert!(entry.server.is_empty());
    }
}
