//! Normalized result shapes handed back to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response headers worth surfacing to callers. Everything else is dropped.
pub const FORWARDED_HEADERS: [&str; 2] = ["X-Total-Count", "X-Ratelimit-Remaining"];

/// Message used whenever the service gives us nothing better.
pub const FALLBACK_MESSAGE: &str = "Something bad happened with Assets service";

/// Status reported when the service could not be reached at all.
pub const NO_CONTENT: u16 = 204;

/// Outcome of a completed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Decoded JSON body, `Null` when the body was empty or not JSON.
    pub body: Value,
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

impl Envelope {
    /// Synthetic result for a connection failure: empty body, no headers, 204.
    pub fn no_content() -> Self {
        Self {
            body: Value::Array(Vec::new()),
            headers: BTreeMap::new(),
            status_code: NO_CONTENT,
        }
    }

    /// First value of a forwarded header, if the service sent one.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// `X-Total-Count` parsed as a number.
    pub fn total_count(&self) -> Option<u64> {
        self.header("X-Total-Count")?.trim().parse().ok()
    }

    /// `X-Ratelimit-Remaining` parsed as a number.
    pub fn ratelimit_remaining(&self) -> Option<u64> {
        self.header("X-Ratelimit-Remaining")?.trim().parse().ok()
    }
}

/// Diagnostic bundle serialized into the message of a server-range error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub message: String,
    pub request: RequestSnapshot,
    pub response: ResponseSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
    /// 0 when no response was received.
    pub status: u16,
}

/// Group `(name, value)` pairs into a name -> values map.
pub(crate) fn group_headers(pairs: &[(String, String)]) -> BTreeMap<String, Vec<String>> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in pairs {
        grouped.entry(name.clone()).or_default().push(value.clone());
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_content_serializes_with_camel_case_status() {
        let json = serde_json::to_value(Envelope::no_content()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"body": [], "headers": {}, "statusCode": 204})
        );
    }

    #[test]
    fn numeric_header_accessors() {
        let mut envelope = Envelope::no_content();
        envelope
            .headers
            .insert("X-Total-Count".to_string(), vec!["42".to_string()]);
        envelope
            .headers
            .insert("X-Ratelimit-Remaining".to_string(), vec!["abc".to_string()]);
        assert_eq!(envelope.total_count(), Some(42));
        assert_eq!(envelope.ratelimit_remaining(), None);
    }

    #[test]
    fn group_headers_collects_repeated_names() {
        let grouped = group_headers(&[
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "3".to_string()),
        ]);
        assert_eq!(grouped["a"], vec!["1", "3"]);
        assert_eq!(grouped["b"], vec!["2"]);
    }
}
