use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn host_regex() -> &'static Regex {
    static HOST_REGEX: OnceLock<Regex> = OnceLock::new();
    HOST_REGEX.get_or_init(|| {
        Regex::new(r"^[a-z0-9]([a-z0-9\-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9\-]{0,61}[a-z0-9])?)*$")
            .expect("hostname regex is valid")
    })
}

/// Normalize a raw hostname: lowercase, strip wildcard prefixes and
/// surrounding dots, punycode-encode, and validate against RFC 1123 label
/// rules. Returns `None` for anything that cannot be a hostname.
pub fn normalize_hostname(value: &str) -> Option<String> {
    let trimmed = value.trim().to_lowercase();
    if trimmed.is_empty() {
        return None;
    }
    let trimmed = trimmed.replace("*.", "");
    let trimmed = trimmed.trim_matches('.').replace('\0', "");
    if trimmed.is_empty() || trimmed.contains(' ') {
        return None;
    }
    let ascii = idna::domain_to_ascii(&trimmed).ok()?;
    if ascii.len() > 253 {
        return None;
    }
    let ascii = ascii.trim_end_matches('.').to_string();
    if !host_regex().is_match(&ascii) {
        return None;
    }
    Some(ascii)
}

/// Normalize a user-supplied scan target. Requires at least one dot so bare
/// labels like `localhost` are rejected.
pub fn sanitize_domain(value: &str) -> Option<String> {
    let normalized = normalize_hostname(value)?;
    if !normalized.contains('.') {
        return None;
    }
    Some(normalized)
}

/// True when `candidate` equals `root` or ends with `.{root}`.
pub fn is_subdomain(candidate: &str, root: &str) -> bool {
    let candidate = candidate.trim_end_matches('.').to_lowercase();
    let root = root.trim_end_matches('.').to_lowercase();
    candidate == root || candidate.ends_with(&format!(".{root}"))
}

/// crt.sh packs several hostnames into one `name_value`, newline separated
/// and sometimes wildcarded.
pub fn iter_crtsh_names(value: &str) -> impl Iterator<Item = &str> {
    value.lines().filter_map(|token| {
        let cleaned = token.trim();
        if cleaned.is_empty() {
            return None;
        }
        Some(cleaned.strip_prefix("*.").unwrap_or(cleaned))
    })
}

/// Deduplicate while preserving first-seen order.
pub fn unique_everseen<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut output = Vec::new();
    for item in items {
        if seen.insert(item.clone()) {
            output.push(item);
        }
    }
    output
}
