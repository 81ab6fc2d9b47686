pub mod hostname;

pub use hostname::*;

use chrono::{SecondsFormat, Utc};

/// Current UTC timestamp in RFC3339 with second precision.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
