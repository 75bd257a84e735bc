use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::Url;

const DEFAULT_API_URL: &str = "http://localhost:8000/api/";
const DEFAULT_TOKEN_FILE: &str = ".applicant-client/session.json";

/// Client configuration loaded from environment variables (and `.env` if present).
/// Every variable has a default; only a malformed `API_URL` is fatal.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend API root, always ending in `/` so endpoints join beneath it.
    pub api_url: Url,
    pub token_file: PathBuf,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw_url = lookup("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_api_url(&raw_url)
            .with_context(|| format!("API_URL '{raw_url}' is not a valid URL"))?;

        Ok(Config {
            api_url,
            token_file: lookup("TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TOKEN_FILE)),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }
}

fn parse_api_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)?;
    if url.cannot_be_a_base() {
        anyhow::bail!("URL cannot be used as a base");
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.api_url.as_str(), "http://localhost:8000/api/");
        assert_eq!(config.token_file, PathBuf::from(".applicant-client/session.json"));
        assert_eq!(config.rust_log, "info");
    }

    #[test]
    fn test_api_url_gets_trailing_slash() {
        let config = config_from(&[("API_URL", "https://hr.example.com/api")]).unwrap();
        assert_eq!(config.api_url.as_str(), "https://hr.example.com/api/");
        assert_eq!(
            config.api_url.join("token/").unwrap().as_str(),
            "https://hr.example.com/api/token/"
        );
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("TOKEN_FILE", "/tmp/session.json"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(config.token_file, PathBuf::from("/tmp/session.json"));
        assert_eq!(config.rust_log, "debug");
    }

    #[test]
    fn test_invalid_api_url_is_an_error() {
        let err = config_from(&[("API_URL", "not a url")]).unwrap_err();
        assert!(err.to_string().contains("API_URL"));

        assert!(config_from(&[("API_URL", "mailto:hr@example.com")]).is_err());
    }
}
