//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::params::Parameters;

pub const DEFAULT_URL: &str = "https://api.github.com";
pub const DEFAULT_ACCEPT: &str = "application/vnd.github.v3+json";

/// Settings applied by `Api` to every request it builds or sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL; relative paths are resolved against it.
    pub url: String,
    /// Default `Accept` header.
    pub default_accept: String,
    /// `User-Agent` header.
    pub user_agent: String,
    /// `Time-Zone` header.
    pub time_zone: String,
    /// Parameters merged under the explicit ones of every call.
    pub default_parameters: Parameters,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            default_accept: DEFAULT_ACCEPT.to_string(),
            user_agent: format!("ghapi-core/{}", env!("CARGO_PKG_VERSION")),
            time_zone: "UTC".to_string(),
            default_parameters: Parameters::new(),
        }
    }
}

impl ApiConfig {
    /// Defaults overlaid with `GHAPI_URL`, `GHAPI_ACCEPT`,
    /// `GHAPI_USER_AGENT` and `TZ`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = lookup("GHAPI_URL") {
            config.url = url;
        }
        if let Some(accept) = lookup("GHAPI_ACCEPT") {
            config.default_accept = accept;
        }
        if let Some(user_agent) = lookup("GHAPI_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Some(time_zone) = lookup("TZ").filter(|tz| !tz.is_empty()) {
            config.time_zone = time_zone;
        }
        config
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_default_accept(mut self, accept: impl Into<String>) -> Self {
        self.default_accept = accept.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn with_default_parameters(mut self, parameters: Parameters) -> Self {
        self.default_parameters = parameters;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.url, "https://api.github.com");
        assert_eq!(config.default_accept, "application/vnd.github.v3+json");
        assert!(config.user_agent.starts_with("ghapi-core/"));
        assert_eq!(config.time_zone, "UTC");
        assert!(config.default_parameters.is_empty());
    }

    #[test]
    fn environment_overrides_defaults() {
        let config = ApiConfig::from_lookup(|name| match name {
            "GHAPI_URL" => Some("https://ghe.example.com/api/v3".to_string()),
            "TZ" => Some("Europe/Prague".to_string()),
            _ => None,
        });
        assert_eq!(config.url, "https://ghe.example.com/api/v3");
        assert_eq!(config.time_zone, "Europe/Prague");
        assert_eq!(config.default_accept, DEFAULT_ACCEPT);
    }

    #[test]
    fn deserializes_partial_config() {
        let config: ApiConfig = serde_json::from_value(json!({
            "url": "http://localhost:3000",
            "default_parameters": {"per_page": 100}
        }))
        .unwrap();
        assert_eq!(config.url, "http://localhost:3000");
        assert_eq!(config.time_zone, "UTC");
        assert_eq!(
            config.default_parameters.get("per_page").and_then(|p| p.as_scalar()),
            Some("100")
        );
    }
}
