use std::{collections::HashMap, env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    InvalidValue { key: String, value: String, reason: String },

    #[error("Malformed auth token entry {0:?}, expected token:user_id")]
    MalformedToken(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    OpenAi,
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" => Ok(LlmProvider::Anthropic),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(format!("unknown provider {other}")),
        }
    }
}

const DEFAULT_LOG_DIR: &str = "logs";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub log_dir: PathBuf,
    pub llm_provider: LlmProvider,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub llm_timeout: Duration,
    pub llm_max_retries: u32,
    pub auth_tokens: HashMap<String, String>, // bearer token -> user id
}

impl Config {
    /// Read the process environment, after loading `.env` if present
    pub fn load() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_ok() {
            info!("Loaded .env file");
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Only the log directory, read without logging so the subscriber can be
    /// installed before `load` reports anything
    pub fn log_dir_from_env() -> PathBuf {
        let _ = dotenvy::dotenv();
        log_dir_from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            port: try_load(&lookup, "NOVA_PORT", "8080")?,
            database_path: try_load(&lookup, "NOVA_DATABASE_PATH", "nova.db")?,
            log_dir: try_load(&lookup, "NOVA_LOG_DIR", DEFAULT_LOG_DIR)?,
            llm_provider: try_load(&lookup, "LLM_PROVIDER", "anthropic")?,
            anthropic_api_key: secret(&lookup, "ANTHROPIC_API_KEY"),
            openai_api_key: secret(&lookup, "OPENAI_API_KEY"),
            llm_timeout: Duration::from_secs(try_load(&lookup, "LLM_TIMEOUT_SECS", "60")?),
            llm_max_retries: try_load(&lookup, "LLM_MAX_RETRIES", "2")?,
            auth_tokens: parse_auth_tokens(&lookup("NOVA_AUTH_TOKENS").unwrap_or_default())?,
        })
    }

    /// API key for the configured provider, if one is set
    pub fn llm_api_key(&self) -> Option<&str> {
        match self.llm_provider {
            LlmProvider::Anthropic => self.anthropic_api_key.as_deref(),
            LlmProvider::OpenAi => self.openai_api_key.as_deref(),
        }
    }
}

fn log_dir_from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> PathBuf {
    lookup("NOVA_LOG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR))
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.clone(),
            reason: e.to_string(),
        }
    })
}

fn secret<F: Fn(&str) -> Option<String>>(lookup: &F, key: &str) -> Option<String> {
    let value = lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    if value.is_none() {
        warn!("{key} not set, content generation will use fallbacks");
    }
    value
}

/// "tok1:user-a, tok2:user-b" -> {tok1: user-a, tok2: user-b}
pub fn parse_auth_tokens(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut tokens = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once(':') {
            Some((token, user)) if !token.trim().is_empty() && !user.trim().is_empty() => {
                tokens.insert(token.trim().to_string(), user.trim().to_string());
            }
            _ => return Err(ConfigError::MalformedToken(entry.to_string())),
        }
    }
    if tokens.is_empty() {
        warn!("NOVA_AUTH_TOKENS is empty, every API request will be rejected");
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path, PathBuf::from("nova.db"));
        assert_eq!(config.llm_provider, LlmProvider::Anthropic);
        assert_eq!(config.llm_timeout, Duration::from_secs(60));
        assert_eq!(config.llm_max_retries, 2);
        assert!(config.auth_tokens.is_empty());
        assert_eq!(config.llm_api_key(), None);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("NOVA_PORT", "9000"),
            ("LLM_PROVIDER", "OpenAI"),
            ("OPENAI_API_KEY", " sk-test "),
            ("NOVA_AUTH_TOKENS", "abc:user-1, def:user-2"),
        ]))
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.llm_provider, LlmProvider::OpenAi);
        assert_eq!(config.llm_api_key(), Some("sk-test"));
        assert_eq!(config.auth_tokens.get("def").map(String::as_str), Some("user-2"));
    }

    #[test]
    fn test_early_log_dir_matches_full_config() {
        for pairs in [&[][..], &[("NOVA_LOG_DIR", "/var/log/nova")][..]] {
            let early = log_dir_from_lookup(lookup_from(pairs));
            let config = Config::from_lookup(lookup_from(pairs)).unwrap();
            assert_eq!(early, config.log_dir);
        }
        assert_eq!(log_dir_from_lookup(lookup_from(&[])), PathBuf::from("logs"));
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        let err = Config::from_lookup(lookup_from(&[("NOVA_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "NOVA_PORT"));
    }

    #[test]
    fn test_malformed_token_entry() {
        assert_eq!(
            parse_auth_tokens("abc:user-1,broken"),
            Err(ConfigError::MalformedToken("broken".to_string()))
        );
    }
}
