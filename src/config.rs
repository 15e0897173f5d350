//! Runtime settings
//!
//! Everything is read from the process environment (a `.env` file is loaded
//! first when present). Unset or blank variables fall back to defaults.

use crate::error::OrchestrationError;
use crate::models::Capability;
use crate::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_CAPABILITY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Market-data HTTP backend
    pub financial_api_base_url: Option<String>,
    /// JSON snapshot served when no HTTP backend is configured
    pub market_fixture_path: Option<PathBuf>,
    pub dart_api_key: Option<String>,
    pub corp_code_path: Option<PathBuf>,
    pub gemini_api_key: Option<String>,
    pub capability_timeout: Duration,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Capabilities run next to price-lookup for price inquiries
    pub price_inquiry_enrichment: Vec<Capability>,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            financial_api_base_url: None,
            market_fixture_path: None,
            dart_api_key: None,
            corp_code_path: None,
            gemini_api_key: None,
            capability_timeout: Duration::from_millis(DEFAULT_CAPABILITY_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            price_inquiry_enrichment: Vec::new(),
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let price_inquiry_enrichment = match get("PRICE_INQUIRY_ENRICHMENT") {
            Some(list) => list
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(Capability::from_str)
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self {
            financial_api_base_url: get("FINANCIAL_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            market_fixture_path: get("MARKET_FIXTURE_PATH").map(PathBuf::from),
            dart_api_key: get("DART_API_KEY"),
            corp_code_path: get("CORP_CODE_PATH").map(PathBuf::from),
            gemini_api_key: get("GEMINI_API_KEY"),
            capability_timeout: parse_millis(
                "CAPABILITY_TIMEOUT_MS",
                get("CAPABILITY_TIMEOUT_MS"),
                defaults.capability_timeout,
            )?,
            request_timeout: parse_millis(
                "REQUEST_TIMEOUT_MS",
                get("REQUEST_TIMEOUT_MS"),
                defaults.request_timeout,
            )?,
            max_retries: parse_or(
                "COLLABORATOR_MAX_RETRIES",
                get("COLLABORATOR_MAX_RETRIES"),
                defaults.max_retries,
            )?,
            retry_delay: parse_millis(
                "COLLABORATOR_RETRY_DELAY_MS",
                get("COLLABORATOR_RETRY_DELAY_MS"),
                defaults.retry_delay,
            )?,
            price_inquiry_enrichment,
            port: parse_or("PORT", get("PORT").or_else(|| get("API_PORT")), defaults.port)?,
        })
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        Some(raw) => raw.parse::<T>().map_err(|_| {
            OrchestrationError::ConfigError(format!("{} has an invalid value: {}", key, raw))
        }),
        None => Ok(default),
    }
}

fn parse_millis(key: &str, value: Option<String>, default: Duration) -> Result<Duration> {
    parse_or(key, value, default.as_millis() as u64).map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.capability_timeout, Duration::from_secs(10));
        assert_eq!(s.request_timeout, Duration::from_secs(30));
        assert_eq!(s.max_retries, 2);
        assert_eq!(s.port, 8080);
        assert!(s.financial_api_base_url.is_none());
        assert!(s.price_inquiry_enrichment.is_empty());
    }

    #[test]
    fn test_values_are_parsed() {
        let s = settings(&[
            ("FINANCIAL_API_BASE_URL", "http://localhost:9000/"),
            ("CAPABILITY_TIMEOUT_MS", "250"),
            ("API_PORT", "3000"),
            ("PRICE_INQUIRY_ENRICHMENT", "filing-lookup, listing-lookup"),
            ("GEMINI_API_KEY", "   "),
        ])
        .unwrap();

        assert_eq!(s.financial_api_base_url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(s.capability_timeout, Duration::from_millis(250));
        assert_eq!(s.port, 3000);
        assert_eq!(
            s.price_inquiry_enrichment,
            vec![Capability::FilingLookup, Capability::ListingLookup]
        );
        assert!(s.gemini_api_key.is_none());
    }

    #[test]
    fn test_malformed_values_are_config_errors() {
        let err = settings(&[("REQUEST_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(matches!(err, OrchestrationError::ConfigError(_)));

        let err = settings(&[("PRICE_INQUIRY_ENRICHMENT", "weather-lookup")]).unwrap_err();
        assert!(matches!(err, OrchestrationError::ConfigError(_)));
    }
}
