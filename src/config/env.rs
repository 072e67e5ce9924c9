use crate::error::{OsintError, Result};

/// Helpers for values read from the environment.
pub struct EnvConfig;

impl EnvConfig {
    /// Resolves an API key setting.
    ///
    /// A literal value wins. `${VAR_NAME}` reads that variable instead, and an
    /// empty or `your_...` placeholder falls back to `default_env_var`.
    pub fn resolve_api_key<F>(api_key: &str, default_env_var: &str, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = api_key.trim();
        let var = if key.starts_with("${") && key.ends_with('}') {
            &key[2..key.len() - 1]
        } else if key.is_empty() || key.starts_with("your_") {
            default_env_var
        } else {
            return Ok(key.to_string());
        };
        lookup(var)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| OsintError::Config(format!("environment variable `{var}` is not set")))
    }

    /// Comma-separated list with blanks dropped.
    pub fn split_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}
