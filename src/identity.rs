//! Optional bearer-token identity.
//!
//! Tokens are JWTs signed by an external identity provider whose public keys
//! are published as a JWK set. Verification never fails a request: every
//! problem (no token, auth disabled, key fetch error, bad signature, expiry)
//! collapses to "no identity" and the request proceeds anonymously.
//!
//! Audience and issuer are not checked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Claims of a verified token.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityClaims(Map<String, Value>);

impl IdentityClaims {
    /// Wrap an already-verified claim map.
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    /// The `sub` claim, when it is a string.
    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }
}

/// Why a token did not produce an identity.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// The request carried no bearer token.
    #[error("no bearer token")]
    MissingToken,
    /// No JWKS URL is configured.
    #[error("authentication disabled")]
    Disabled,
    /// The signing keys could not be fetched or parsed.
    #[error("signing key fetch failed: {0}")]
    KeyFetch(String),
    /// The token could not be decoded.
    #[error("malformed token: {0}")]
    Malformed(String),
    /// No trusted key matches the token's key id.
    #[error("no signing key for kid {0:?}")]
    UnknownKey(Option<String>),
    /// The token is signed with an algorithm outside the allowed list.
    #[error("algorithm {0} not allowed")]
    DisallowedAlgorithm(String),
    /// Signature does not verify against the selected key.
    #[error("signature verification failed")]
    BadSignature,
    /// `exp` is in the past.
    #[error("token expired")]
    Expired,
    /// `iat` is in the future.
    #[error("token issued in the future")]
    IssuedInFuture,
    /// Any other validation failure.
    #[error("token rejected: {0}")]
    Invalid(String),
}

/// Outcome of checking one token.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    /// Signature and timestamps validated.
    Verified(IdentityClaims),
    /// The token was absent or failed a check.
    Rejected(AuthFailure),
}

/// Where trusted signing keys come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the current key set.
    ///
    /// # Errors
    ///
    /// Returns [`AuthFailure::KeyFetch`] when the keys cannot be obtained.
    async fn fetch(&self) -> Result<JwkSet, AuthFailure>;
}

/// Fetches a JWK set over HTTP.
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    url: Url,
    client: reqwest::Client,
}

impl HttpKeySource {
    /// Create a source for `url` whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, client })
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    async fn fetch(&self) -> Result<JwkSet, AuthFailure> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| AuthFailure::KeyFetch(e.to_string()))?;
        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthFailure::KeyFetch(e.to_string()))
    }
}

/// Tunables for token validation and key caching.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifierSettings {
    /// Signature algorithms a token may use.
    pub algorithms: Vec<Algorithm>,
    /// Clock skew tolerance for `exp` and `iat`, in seconds.
    pub leeway_secs: u64,
    /// How long a fetched key set is trusted before refetching.
    pub cache_ttl: Duration,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            algorithms: vec![Algorithm::RS256],
            leeway_secs: 60,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

struct CachedKeys {
    keys: Arc<JwkSet>,
    fetched_at: Instant,
}

/// Verifies bearer tokens against a cached JWK set.
pub struct IdentityVerifier {
    source: Option<Arc<dyn KeySource>>,
    settings: VerifierSettings,
    cache: RwLock<Option<CachedKeys>>,
}

impl std::fmt::Debug for IdentityVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityVerifier")
            .field("enabled", &self.is_enabled())
            .field("settings", &self.settings)
            .finish()
    }
}

impl IdentityVerifier {
    /// A verifier that treats every request as anonymous.
    pub fn disabled() -> Self {
        Self {
            source: None,
            settings: VerifierSettings::default(),
            cache: RwLock::new(None),
        }
    }

    /// A verifier trusting keys from `source`.
    pub fn new(source: Arc<dyn KeySource>, settings: VerifierSettings) -> Self {
        Self {
            source: Some(source),
            settings,
            cache: RwLock::new(None),
        }
    }

    /// Whether a key source is configured.
    pub fn is_enabled(&self) -> bool {
        self.source.is_some()
    }

    /// Verify `token`, discarding the failure reason.
    pub async fn verify(&self, token: Option<&str>) -> Option<IdentityClaims> {
        match self.check(token).await {
            Verification::Verified(claims) => Some(claims),
            Verification::Rejected(AuthFailure::MissingToken | AuthFailure::Disabled) => None,
            Verification::Rejected(reason) => {
                debug!(%reason, "bearer token rejected, continuing anonymously");
                None
            }
        }
    }

    /// Verify `token`, keeping the failure reason.
    pub async fn check(&self, token: Option<&str>) -> Verification {
        match self.verify_token(token).await {
            Ok(claims) => Verification::Verified(claims),
            Err(reason) => Verification::Rejected(reason),
        }
    }

    async fn verify_token(&self, token: Option<&str>) -> Result<IdentityClaims, AuthFailure> {
        let source = self.source.as_ref().ok_or(AuthFailure::Disabled)?;
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthFailure::MissingToken)?;

        let header = decode_header(token).map_err(|e| AuthFailure::Malformed(e.to_string()))?;
        if !self.settings.algorithms.contains(&header.alg) {
            return Err(AuthFailure::DisallowedAlgorithm(format!("{:?}", header.alg)));
        }

        let kid = header.kid.as_deref();
        let (keys, fresh) = self.keys(source.as_ref(), false).await?;
        let jwk = match find_key(&keys, kid) {
            Some(jwk) => jwk,
            // Unknown kid on a cached set: the provider may have rotated keys.
            None if !fresh => {
                let (keys, _) = self.keys(source.as_ref(), true).await?;
                find_key(&keys, kid).ok_or_else(|| AuthFailure::UnknownKey(kid.map(str::to_owned)))?
            }
            None => return Err(AuthFailure::UnknownKey(kid.map(str::to_owned))),
        };

        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| AuthFailure::Invalid(format!("unusable signing key: {e}")))?;

        let mut validation = Validation::new(header.alg);
        validation.validate_aud = false;
        validation.leeway = self.settings.leeway_secs;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Map<String, Value>>(token, &key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthFailure::Expired,
                ErrorKind::InvalidSignature => AuthFailure::BadSignature,
                ErrorKind::InvalidToken
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthFailure::Malformed(e.to_string()),
                _ => AuthFailure::Invalid(e.to_string()),
            }
        })?;

        check_issued_at(&data.claims, self.settings.leeway_secs)?;
        Ok(IdentityClaims(data.claims))
    }

    /// Cached keys, fetching when stale, empty, or `force_refresh` is set.
    ///
    /// The flag in the result is `true` when the keys were fetched by this call.
    async fn keys(
        &self,
        source: &dyn KeySource,
        force_refresh: bool,
    ) -> Result<(Arc<JwkSet>, bool), AuthFailure> {
        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.settings.cache_ttl {
                    return Ok((Arc::clone(&cached.keys), false));
                }
            }
        }

        let keys = match source.fetch().await {
            Ok(keys) => Arc::new(keys),
            Err(e) => {
                warn!(error = %e, "failed to fetch signing keys");
                return Err(e);
            }
        };
        debug!(count = keys.keys.len(), "signing keys refreshed");
        *self.cache.write().await = Some(CachedKeys {
            keys: Arc::clone(&keys),
            fetched_at: Instant::now(),
        });
        Ok((keys, true))
    }
}

/// Pick the key for `kid`; a token without `kid` only matches a single-key set.
fn find_key(keys: &JwkSet, kid: Option<&str>) -> Option<Jwk> {
    match kid {
        Some(kid) => keys.find(kid).cloned(),
        None if keys.keys.len() == 1 => keys.keys.first().cloned(),
        None => None,
    }
}

fn check_issued_at(claims: &Map<String, Value>, leeway_secs: u64) -> Result<(), AuthFailure> {
    let Some(iat) = claims.get("iat") else {
        return Ok(());
    };
    let latest = i64::try_from(leeway_secs)
        .ok()
        .and_then(|leeway| chrono::Utc::now().timestamp().checked_add(leeway))
        .unwrap_or(i64::MAX);

    let in_future = match (iat.as_i64(), iat.as_f64()) {
        (Some(secs), _) => secs > latest,
        // Fractional or out-of-range NumericDate.
        #[allow(clippy::cast_precision_loss)]
        (None, Some(secs)) => secs > latest as f64,
        (None, None) => return Err(AuthFailure::Invalid("iat is not a number".to_owned())),
    };
    if in_future {
        return Err(AuthFailure::IssuedInFuture);
    }
    Ok(())
}

/// Extract the token from an `Authorization` header value.
///
/// Accepts `Bearer <token>` with any scheme casing; a value without the
/// scheme is taken as the raw token.
pub fn bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    let token = match header.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => header,
    };
    (!token.is_empty()).then_some(token)
}
