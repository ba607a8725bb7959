//! Configuration loading and validation.
//!
//! Precedence: env vars > TOML file > defaults. The file is
//! `$BABUSHKA_CONFIG_PATH` or `./babushka.toml`; a missing file means
//! defaults. The Anthropic API key is a credential and is only ever read
//! from the environment.
//!
//! [`Settings`] is the raw, overridable view. [`Config::resolve`] validates
//! it once at startup into the values the server actually runs with.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::Deserialize;
use url::Url;

use crate::advice::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use crate::credentials::{resolve_anthropic_auth, AnthropicAuth, Credentials, ANTHROPIC_API_KEY_VAR};
use crate::identity::VerifierSettings;

/// Environment variable naming the JWKS discovery URL.
pub const JWKS_URL_VAR: &str = "CLERK_JWKS_URL";

/// Environment variable overriding the config file path.
pub const CONFIG_PATH_VAR: &str = "BABUSHKA_CONFIG_PATH";

const DEFAULT_CONFIG_FILE: &str = "babushka.toml";

/// Startup configuration errors. Any of these is fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required credential is not set.
    #[error("{0} not found in environment")]
    MissingCredential(&'static str),
    /// The JWKS URL does not parse.
    #[error("invalid JWKS URL {url:?}: {reason}")]
    InvalidJwksUrl {
        /// The configured value.
        url: String,
        /// Parser message.
        reason: String,
    },
    /// An allowed-algorithm name is not a known JWT algorithm.
    #[error("unknown JWT algorithm {0:?}")]
    UnknownAlgorithm(String),
    /// The config file exists but cannot be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The config file is not valid TOML for [`Settings`].
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },
}

// ── Raw settings ────────────────────────────────────────────────

/// Overridable settings, as read from TOML and the environment.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Text generation (`[generation]`).
    pub generation: GenerationSettings,
    /// Bearer-token verification (`[auth]`).
    pub auth: AuthSettings,
    /// Listener (`[server]`).
    pub server: ServerSettings,
}

/// `[generation]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Model identifier sent to the messages API.
    pub model: String,
    /// Output token budget per advice call.
    pub max_tokens: u32,
    /// Request timeout for the generation call, in seconds.
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: 60,
        }
    }
}

/// `[auth]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// JWKS discovery URL. Unset disables authentication.
    pub jwks_url: Option<String>,
    /// Seconds a fetched key set stays trusted.
    pub cache_ttl_secs: u64,
    /// Request timeout for key fetches, in seconds.
    pub timeout_secs: u64,
    /// Clock skew tolerance, in seconds.
    pub leeway_secs: u64,
    /// Accepted token signature algorithms.
    pub algorithms: Vec<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwks_url: None,
            cache_ttl_secs: 300,
            timeout_secs: 10,
            leeway_secs: 60,
            algorithms: vec!["RS256".to_owned()],
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8000,
        }
    }
}

impl Settings {
    /// Load settings from the config file and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an existing config file cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an existing config file cannot be read or parsed.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = env(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut settings = Self::load_from_file(&path)?;
        settings.apply_overrides(env);
        Ok(settings)
    }

    /// Load from a TOML file only; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.to_owned(),
                    source,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_owned(),
                source,
            }),
        }
    }

    /// Apply environment variable overrides. Unparseable numbers are logged and ignored.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("BABUSHKA_MODEL").filter(|v| !v.trim().is_empty()) {
            self.generation.model = v;
        }
        override_number(&env, "BABUSHKA_MAX_TOKENS", &mut self.generation.max_tokens);
        override_number(
            &env,
            "BABUSHKA_GENERATION_TIMEOUT_SECS",
            &mut self.generation.timeout_secs,
        );

        if let Some(v) = env(JWKS_URL_VAR) {
            self.auth.jwks_url = Some(v).filter(|v| !v.trim().is_empty());
        }
        override_number(&env, "BABUSHKA_JWKS_CACHE_SECS", &mut self.auth.cache_ttl_secs);
        override_number(&env, "BABUSHKA_JWKS_TIMEOUT_SECS", &mut self.auth.timeout_secs);

        if let Some(v) = env("HOST").filter(|v| !v.trim().is_empty()) {
            self.server.host = v;
        }
        override_number(&env, "PORT", &mut self.server.port);
    }
}

fn override_number<T: FromStr>(env: &impl Fn(&str) -> Option<String>, var: &str, slot: &mut T) {
    if let Some(v) = env(var) {
        match v.trim().parse() {
            Ok(n) => *slot = n,
            Err(_) => tracing::warn!(var, value = %v, "ignoring invalid env override"),
        }
    }
}

// ── Validated config ────────────────────────────────────────────

/// Validated configuration the server runs with.
#[derive(Debug, Clone)]
pub struct Config {
    /// Anthropic credential.
    pub anthropic: AnthropicAuth,
    /// Model identifier.
    pub model: String,
    /// Output token budget per advice call.
    pub max_tokens: u32,
    /// Generation request timeout.
    pub generation_timeout: Duration,
    /// JWKS discovery URL; `None` disables authentication.
    pub jwks_url: Option<Url>,
    /// Key fetch timeout.
    pub jwks_timeout: Duration,
    /// Token validation settings.
    pub verifier: VerifierSettings,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Config {
    /// Load settings and credentials from the environment and validate them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the API key is missing or a value is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Settings::load()?;
        let credentials =
            Credentials::from_resolver(&[ANTHROPIC_API_KEY_VAR], |key| std::env::var(key).ok());
        Self::resolve(settings, &credentials)
    }

    /// Validate `settings` against loaded `credentials`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the API key is missing, the JWKS URL does
    /// not parse, or an algorithm name is unknown.
    pub fn resolve(settings: Settings, credentials: &Credentials) -> Result<Self, ConfigError> {
        let anthropic = resolve_anthropic_auth(credentials)
            .ok_or(ConfigError::MissingCredential(ANTHROPIC_API_KEY_VAR))?;

        let jwks_url = settings
            .auth
            .jwks_url
            .as_deref()
            .map(|raw| {
                Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidJwksUrl {
                    url: raw.to_owned(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        let algorithms = settings
            .auth
            .algorithms
            .iter()
            .map(|name| {
                Algorithm::from_str(name.trim())
                    .map_err(|_| ConfigError::UnknownAlgorithm(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            anthropic,
            model: settings.generation.model,
            max_tokens: settings.generation.max_tokens,
            generation_timeout: Duration::from_secs(settings.generation.timeout_secs),
            jwks_url,
            jwks_timeout: Duration::from_secs(settings.auth.timeout_secs),
            verifier: VerifierSettings {
                algorithms,
                leeway_secs: settings.auth.leeway_secs,
                cache_ttl: Duration::from_secs(settings.auth.cache_ttl_secs),
            },
            host: settings.server.host,
            port: settings.server.port,
        })
    }
}
