//! Environment-driven configuration helpers

use std::{fmt::Display, str::FromStr};

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(key: &str, value: &str, reason: impl Display) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Where configuration variables are read from
pub trait VarSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// The process environment; blank values count as unset
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl VarSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl<F> VarSource for F
where
    F: Fn(&str) -> Option<String>,
{
    fn var(&self, key: &str) -> Option<String> {
        self(key)
    }
}

/// Parse `key` if set, else return `default`
pub fn parse_or<T>(source: &impl VarSource, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match source.var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::invalid(key, &raw, e)),
        None => Ok(default),
    }
}

/// Comma-separated list, trimmed, empty items dropped
pub fn list(source: &impl VarSource, key: &str) -> Vec<String> {
    source
        .var(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_default_and_error() {
        let env = |key: &str| match key {
            "PORT" => Some("8080".to_string()),
            "BROKEN" => Some("eight".to_string()),
            "URLS" => Some(" a , ,b".to_string()),
            _ => None,
        };
        assert_eq!(parse_or(&env, "PORT", 1u16).unwrap(), 8080);
        assert_eq!(parse_or(&env, "MISSING", 7u16).unwrap(), 7);
        assert!(matches!(
            parse_or(&env, "BROKEN", 1u16),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(list(&env, "URLS"), vec!["a", "b"]);
        assert!(list(&env, "MISSING").is_empty());
    }
}
