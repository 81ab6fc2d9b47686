use serde::Serialize;

use super::SubdomainEntry;

/// One message on the search stream: either a pipeline stage transition or
/// a discovered entry. Serialized as a flat JSON object in both cases.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SearchEvent {
    Stage(StageEvent),
    Entry(EntryEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Started,
    CacheHit,
    CrtShFound,
    Resolving,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageEvent {
    pub stage: Stage,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolver: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_unique: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(flatten)]
    pub entry: SubdomainEntry,
}

impl SearchEvent {
    fn stage(stage: Stage, domain: &str) -> StageEvent {
        StageEvent {
            stage,
            domain: domain.to_string(),
            count: None,
            resolver: None,
            total_unique: None,
            cached_at: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn started(domain: &str) -> Self {
        Self::Stage(Self::stage(Stage::Started, domain))
    }

    pub fn cache_hit(domain: &str, count: usize) -> Self {
        let mut event = Self::stage(Stage::CacheHit, domain);
        event.count = Some(count);
        Self::Stage(event)
    }

    pub fn crt_sh_found(domain: &str, count: usize) -> Self {
        let mut event = Self::stage(Stage::CrtShFound, domain);
        event.count = Some(count);
        Self::Stage(event)
    }

    pub fn resolving(domain: &str, resolver: &'static str, count: usize) -> Self {
        let mut event = Self::stage(Stage::Resolving, domain);
        event.resolver = Some(resolver);
        event.count = Some(count);
        Self::Stage(event)
    }

    pub fn done(domain: &str, total_unique: usize, cached_at: String, duration_ms: i64) -> Self {
        let mut event = Self::stage(Stage::Done, domain);
        event.total_unique = Some(total_unique);
        event.cached_at = Some(cached_at);
        event.duration_ms = Some(duration_ms);
        Self::Stage(event)
    }

    pub fn error(domain: &str, message: String) -> Self {
        let mut event = Self::stage(Stage::Error, domain);
        event.error = Some(message);
        Self::Stage(event)
    }

    pub fn entry(entry: SubdomainEntry) -> Self {
        Self::Entry(EntryEvent {
            kind: "entry",
            entry,
        })
    }
}
