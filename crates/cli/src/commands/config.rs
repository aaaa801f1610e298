use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use opsdesk_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{CommandResult, EXIT_CONFIG};

/// Effective configuration, one line per key with where the value came from. Secrets are redacted.
pub fn run(options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult {
                exit_code: EXIT_CONFIG,
                output: format!("config validation failed: {error}"),
            }
        }
    };

    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let overrides = &options.overrides;

    let token = match &config.api.token {
        Some(token) => redact_token(token.expose_secret()),
        None => "<unset>".to_string(),
    };
    let entries = [
        (
            "api.base_url",
            config.api.base_url.clone(),
            &["OPSDESK_API_BASE_URL"][..],
            overrides.api_base_url.is_some(),
        ),
        (
            "api.timeout_secs",
            config.api.timeout_secs.to_string(),
            &["OPSDESK_API_TIMEOUT_SECS"][..],
            overrides.api_timeout_secs.is_some(),
        ),
        ("api.token", token, &["OPSDESK_API_TOKEN"][..], overrides.api_token.is_some()),
        (
            "session.path",
            config.session.path.display().to_string(),
            &["OPSDESK_SESSION_PATH"][..],
            overrides.session_path.is_some(),
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["OPSDESK_LOGGING_LEVEL", "OPSDESK_LOG_LEVEL"][..],
            overrides.log_level.is_some(),
        ),
        (
            "logging.format",
            config.logging.format.as_str().to_string(),
            &["OPSDESK_LOGGING_FORMAT", "OPSDESK_LOG_FORMAT"][..],
            overrides.log_format.is_some(),
        ),
    ];

    let mut lines =
        vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    for (key, value, env_keys, overridden) in entries {
        let source = if overridden {
            "flag".to_string()
        } else {
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
        };
        lines.push(render_line(key, &value, source));
    }

    CommandResult { exit_code: 0, output: lines.join("\n") }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    // Blank values are skipped by the loader.
    let env_key = env_keys
        .iter()
        .find(|key| env::var(key).is_ok_and(|value| !value.trim().is_empty()));
    if let Some(env_key) = env_key {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let visible: String = trimmed.chars().take(4).collect();
    if trimmed.chars().count() > 8 {
        return format!("{visible}***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_a_short_prefix() {
        assert_eq!(redact_token("abcd1234efgh"), "abcd***");
        assert_eq!(redact_token("short"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_the_file_document() {
        let doc: Value = "[api]\nbase_url = \"http://x\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "api.base_url"));
        assert!(!contains_path(&doc, "api.timeout_secs"));
        assert!(!contains_path(&doc, "logging.level"));
    }
}
