//! Credential loading from `.env` files and the process environment.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use tracing::debug;

/// Environment variable holding the Anthropic API key.
pub const ANTHROPIC_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Runtime credentials resolved at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    vars: BTreeMap<String, String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.vars.keys().collect::<Vec<_>>())
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl Credentials {
    /// Capture the named variables from a resolver (usually `std::env::var`).
    ///
    /// Empty and whitespace-only values are treated as absent.
    pub fn from_resolver(keys: &[&str], env: impl Fn(&str) -> Option<String>) -> Self {
        let vars = keys
            .iter()
            .filter_map(|key| {
                env(key)
                    .filter(|value| !value.trim().is_empty())
                    .map(|value| ((*key).to_owned(), value))
            })
            .collect();
        Self { vars }
    }

    /// Returns a credential value for a key, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Anthropic API key, sent as the `x-api-key` header.
#[derive(Clone, PartialEq, Eq)]
pub struct AnthropicAuth(String);

impl std::fmt::Debug for AnthropicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AnthropicAuth").field(&"[REDACTED]").finish()
    }
}

impl AnthropicAuth {
    /// Wrap a raw API key.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for building request headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

/// Resolve the Anthropic API key from loaded credentials.
///
/// Returns `None` if the key is missing or blank.
pub fn resolve_anthropic_auth(credentials: &Credentials) -> Option<AnthropicAuth> {
    let key = credentials.get(ANTHROPIC_API_KEY_VAR)?;
    if key.trim().is_empty() {
        return None;
    }
    debug!("using {ANTHROPIC_API_KEY_VAR} from environment");
    Some(AnthropicAuth::api_key(key.trim()))
}

/// Load a `.env` file into the process environment.
///
/// Variables already set in the environment win over the file.
///
/// # Errors
///
/// Returns an error if the file does not exist or cannot be parsed.
pub fn load_env_file(path: &Path) -> anyhow::Result<()> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "env file does not exist: {}",
            path.display()
        ));
    }
    dotenvy::from_path(path)
        .with_context(|| format!("failed to load env file {}", path.display()))?;
    debug!(path = %path.display(), "loaded env file");
    Ok(())
}

/// Load `./.env` if one exists; a missing file is not an error.
///
/// # Errors
///
/// Returns an error if a `.env` file exists but cannot be parsed.
pub fn load_default_env_file() -> anyhow::Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "loaded default env file");
            Ok(())
        }
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(anyhow::anyhow!("failed to load .env: {e}")),
    }
}
