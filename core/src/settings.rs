//! Client configuration read from the environment.

use crate::client::ClientOptions;

pub const ENDPOINT_VAR: &str = "ASSETS_MCS_ENDPOINT";
pub const LOCATION_GROUP_VAR: &str = "ASSETS_MCS_LOCATION_GROUP";

/// Values the provider needs to build a client. A missing endpoint is kept
/// as `None` and only rejected when the client is constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub endpoint: Option<String>,
    pub include_location_group: bool,
}

impl Settings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            include_location_group: false,
        }
    }

    pub fn with_location_group(mut self, include: bool) -> Self {
        self.include_location_group = include;
        self
    }

    /// Read settings from the process environment, loading `.env` first if
    /// one exists.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            endpoint: lookup(ENDPOINT_VAR).filter(|v| !v.trim().is_empty()),
            include_location_group: lookup(LOCATION_GROUP_VAR)
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            include_location_group: self.include_location_group,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn reads_endpoint_and_flag() {
        let settings = Settings::from_lookup(lookup(&[
            (ENDPOINT_VAR, "http://assets:8080"),
            (LOCATION_GROUP_VAR, "TRUE"),
        ]));
        assert_eq!(settings.endpoint.as_deref(), Some("http://assets:8080"));
        assert!(settings.include_location_group);
        assert!(settings.client_options().include_location_group);
    }

    #[test]
    fn blank_endpoint_is_missing() {
        let settings = Settings::from_lookup(lookup(&[(ENDPOINT_VAR, "  ")]));
        assert_eq!(settings.endpoint, None);
        assert!(!settings.include_location_group);
    }

    #[test]
    fn unknown_flag_values_are_false() {
        let settings = Settings::from_lookup(lookup(&[(LOCATION_GROUP_VAR, "maybe")]));
        assert!(!settings.include_location_group);
    }
}
