//! Signing helpers: an HS256 JWK set and tokens signed against it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

use babushka::identity::{AuthFailure, KeySource, VerifierSettings};

pub const KID: &str = "test-key";
pub const SECRET: &[u8] = b"babushka-test-signing-secret-0123456789";
pub const OTHER_SECRET: &[u8] = b"some-other-signing-secret-9876543210";

pub const RSA_KID: &str = "rsa-test-key";
/// PKCS#1 private key matching [`RSA_MODULUS`].
pub const RSA_PRIVATE_PEM: &str = include_str!("rsa_test_key.pem");
/// Base64url modulus of the test RSA key (exponent 65537).
pub const RSA_MODULUS: &str = "r6TkHs7QAcUq27DTQX0A9aj4yAFRu1mYN1BFIBAETtyLddfLXO7nLJD8bHMjPtKuqzQLOkgZ1rWpYR5AwmeQTLEhmwE_Klc0RwRT0GgoXgovWt5hbh1B9TWi_U4P-aVOstwMhEB_OpFVMGTwpW3LjtSnRQ9wzpQuaFIiuV4oQbTJNQIZhkArsQMXc1k-Ohd_Ogf9Tx-DdWpU1_nt-WoKjOxZ56Cgi0q-lT25teoLiYRkNR4qxhlPfNL3XUVYzmgxASZjQAPQueHFt5CC3JxxAr-vPmXolLdhAo8J0kCH5oQs0Ps5ZHO_9f28YfpoyRtllBTCIGApXpKh-xnrIecEJw";

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Unix time `secs` from now.
pub fn now_plus(secs: i64) -> i64 {
    now().saturating_add(secs)
}

/// A JWK set holding one symmetric key.
pub fn jwks(kid: &str, secret: &[u8]) -> JwkSet {
    let raw = json!({
        "keys": [{
            "kty": "oct",
            "kid": kid,
            "k": URL_SAFE_NO_PAD.encode(secret),
        }]
    });
    match serde_json::from_value(raw) {
        Ok(set) => set,
        Err(err) => panic!("test JWK set should parse: {err}"),
    }
}

/// A JWK set holding the public half of the test RSA key, as an identity
/// provider would publish it.
pub fn rsa_jwks() -> JwkSet {
    let raw = json!({
        "keys": [{
            "kty": "RSA",
            "kid": RSA_KID,
            "use": "sig",
            "alg": "RS256",
            "n": RSA_MODULUS,
            "e": "AQAB",
        }]
    });
    match serde_json::from_value(raw) {
        Ok(set) => set,
        Err(err) => panic!("test RSA JWK set should parse: {err}"),
    }
}

/// An RS256 token signed with the test RSA key.
pub fn sign_rs256(claims: &Value, kid: Option<&str>) -> String {
    let key = match EncodingKey::from_rsa_pem(RSA_PRIVATE_PEM.as_bytes()) {
        Ok(key) => key,
        Err(err) => panic!("test RSA key should load: {err}"),
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_owned);
    match encode(&header, claims, &key) {
        Ok(token) => token,
        Err(err) => panic!("test token should sign: {err}"),
    }
}

pub fn sign(claims: &Value, kid: Option<&str>, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = kid.map(str::to_owned);
    match encode(&header, claims, &EncodingKey::from_secret(secret)) {
        Ok(token) => token,
        Err(err) => panic!("test token should sign: {err}"),
    }
}

pub fn claims_for(sub: &str) -> Value {
    json!({ "sub": sub, "iat": now(), "exp": now_plus(3_600) })
}

/// A valid token for `sub`, signed with the default test key.
pub fn token_for(sub: &str) -> String {
    sign(&claims_for(sub), Some(KID), SECRET)
}

pub fn settings() -> VerifierSettings {
    VerifierSettings {
        algorithms: vec![Algorithm::HS256],
        ..VerifierSettings::default()
    }
}

/// In-memory key source that counts fetches and can be swapped or broken.
#[derive(Clone)]
pub struct StaticKeys {
    keys: Arc<Mutex<Result<JwkSet, String>>>,
    fetches: Arc<AtomicUsize>,
}

impl StaticKeys {
    pub fn new(keys: JwkSet) -> Self {
        Self {
            keys: Arc::new(Mutex::new(Ok(keys))),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn standard() -> Self {
        Self::new(jwks(KID, SECRET))
    }

    /// The RSA key set used with the production verifier defaults.
    pub fn rsa() -> Self {
        Self::new(rsa_jwks())
    }

    pub fn failing(reason: &str) -> Self {
        let source = Self::standard();
        source.set(Err(reason.to_owned()));
        source
    }

    pub fn set(&self, keys: Result<JwkSet, String>) {
        if let Ok(mut slot) = self.keys.lock() {
            *slot = keys;
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySource for StaticKeys {
    async fn fetch(&self) -> Result<JwkSet, AuthFailure> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.keys.lock() {
            Ok(slot) => slot.clone().map_err(AuthFailure::KeyFetch),
            Err(_) => Err(AuthFailure::KeyFetch("lock poisoned".to_owned())),
        }
    }
}
