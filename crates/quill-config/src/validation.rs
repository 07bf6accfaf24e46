// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation.
//!
//! Collects every problem instead of stopping at the first one.

use crate::diagnostic::ConfigError;
use crate::model::QuillConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &QuillConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "agent.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.agent.log_level
        )));
    }

    if config.anthropic.default_model.trim().is_empty() {
        errors.push(ConfigError::validation(
            "anthropic.default_model must not be empty",
        ));
    }

    if config.anthropic.max_tokens == 0 {
        errors.push(ConfigError::validation(
            "anthropic.max_tokens must be greater than 0",
        ));
    }

    if !config.anthropic.base_url.starts_with("http://")
        && !config.anthropic.base_url.starts_with("https://")
    {
        errors.push(ConfigError::validation(format!(
            "anthropic.base_url must be an http(s) URL, got `{}`",
            config.anthropic.base_url
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.gateway.enabled && config.gateway.port == 0 {
        errors.push(ConfigError::validation(
            "gateway.port must be non-zero when the gateway is enabled",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&QuillConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = QuillConfig::default();
        config.storage.database_path = "  ".to_string();
        config.anthropic.max_tokens = 0;
        config.agent.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(has_message(&errors, "database_path"));
        assert!(has_message(&errors, "max_tokens"));
        assert!(has_message(&errors, "log_level"));
    }

    #[test]
    fn port_zero_only_matters_when_enabled() {
        let mut config = QuillConfig::default();
        config.gateway.port = 0;
        assert!(has_message(&validate_config(&config).unwrap_err(), "gateway.port"));

        config.gateway.enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
