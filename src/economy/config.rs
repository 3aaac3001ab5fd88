use std::{env, fmt, time::Duration};

use reqwest::Url;

const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Remote economy endpoint configuration sourced from the environment.
#[derive(Debug, Clone)]
pub struct HttpEconomyConfig {
    pub base_url: Url,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl HttpEconomyConfig {
    pub fn from_env() -> Result<Self, HttpEconomyConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, HttpEconomyConfigError> {
        let raw_url = lookup("JOBS_ECONOMY_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(HttpEconomyConfigError::MissingUrl)?;
        let base_url = Url::parse(&raw_url)
            .map_err(|err| HttpEconomyConfigError::InvalidUrl(format!("{raw_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(HttpEconomyConfigError::InvalidUrl(raw_url));
        }

        let api_token = lookup("JOBS_ECONOMY_TOKEN")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let timeout = lookup("JOBS_ECONOMY_TIMEOUT_SECS")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Ok(Self {
            base_url,
            api_token,
            timeout,
        })
    }

    /// `<base>/accounts/<player>[/<suffix>]` with each segment percent-encoded.
    pub fn account_url(&self, player: &str, suffix: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("accounts").push(player);
            if let Some(suffix) = suffix {
                segments.push(suffix);
            }
        }
        url
    }
}

#[derive(Debug)]
pub enum HttpEconomyConfigError {
    MissingUrl,
    InvalidUrl(String),
    ClientBuild(String),
}

impl fmt::Display for HttpEconomyConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingUrl => write!(f, "missing JOBS_ECONOMY_URL"),
            Self::InvalidUrl(url) => write!(f, "invalid economy url {}", url),
            Self::ClientBuild(message) => write!(f, "client build failure: {}", message),
        }
    }
}

impl std::error::Error for HttpEconomyConfigError {}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_values_with_defaults() {
        let config = HttpEconomyConfig::from_lookup(lookup(&[
            ("JOBS_ECONOMY_URL", "http://economy.local:8080/api/"),
            ("JOBS_ECONOMY_TIMEOUT_SECS", "0"),
        ]))
        .expect("url is present");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.api_token.is_none());
        assert_eq!(
            config.account_url("a b", Some("deposits")).as_str(),
            "http://economy.local:8080/api/accounts/a%20b/deposits"
        );
    }

    #[test]
    fn missing_or_invalid_url_is_rejected() {
        assert!(matches!(
            HttpEconomyConfig::from_lookup(lookup(&[])),
            Err(HttpEconomyConfigError::MissingUrl)
        ));
        assert!(matches!(
            HttpEconomyConfig::from_lookup(lookup(&[("JOBS_ECONOMY_URL", "not a url")])),
            Err(HttpEconomyConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            HttpEconomyConfig::from_lookup(lookup(&[("JOBS_ECONOMY_URL", "mailto:bank@example.com")])),
            Err(HttpEconomyConfigError::InvalidUrl(_))
        ));
    }
}
