//! Session credential resolution.
//!
//! Credentials are issued by an external cookie-encryption convention:
//!
//! ```text
//! percent-encode(base64(b"v10" || nonce[12] || AES-256-GCM(key, nonce, json) || tag[16]))
//! ```
//!
//! The key is `scrypt(SECRET_KEY, SALT, N=16384, r=8, p=1, len=32)`, matching the
//! issuing side's defaults. The plaintext is a JSON object carrying at least `token`.

use std::sync::Arc;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::metrics::ConnectionMetrics;

use super::identity::{IdentityAuthority, IdentityError};

/// Version prefix written by the issuer
pub const VERSION_PREFIX: &[u8; 3] = b"v10";

const PREFIX_LEN: usize = 3;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const KEY_LEN: usize = 32;

/// Opaque rejection. The cause is logged, never returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unauthenticated")]
pub struct AuthFailure;

#[derive(Debug, Error)]
pub enum SessionKeyError {
    #[error("Invalid scrypt parameters: {0}")]
    Params(String),

    #[error("Key derivation failed: {0}")]
    Derive(String),
}

/// Why a credential was rejected.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("credential is not valid percent-encoding")]
    PercentEncoding,

    #[error("credential is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("credential too short ({0} bytes)")]
    TooShort(usize),

    #[error("decryption failed")]
    Decrypt,

    #[error("encryption failed")]
    Encrypt,

    #[error("malformed session payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("session token is empty")]
    EmptyToken,

    #[error("session token not found")]
    UnknownToken,

    #[error("session token does not match the authority")]
    TokenMismatch,

    #[error("identity authority unavailable: {0}")]
    Authority(#[from] IdentityError),
}

#[derive(Debug, Deserialize)]
struct SessionClaims {
    #[serde(default)]
    token: String,
}

/// AES-256-GCM key derived from the configured secret and salt.
///
/// Derivation is slow; build one at startup and share it.
#[derive(Clone)]
pub struct SessionKey {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl SessionKey {
    pub fn derive(secret: &[u8], salt: &[u8]) -> Result<Self, SessionKeyError> {
        let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, KEY_LEN)
            .map_err(|e| SessionKeyError::Params(e.to_string()))?;

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        scrypt::scrypt(secret, salt, &params, &mut key[..])
            .map_err(|e| SessionKeyError::Derive(e.to_string()))?;

        Ok(Self { key })
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(self.key.as_ref().into())
    }

    /// Decode and decrypt a credential, returning the plaintext.
    pub fn open(&self, credential: &str) -> Result<Vec<u8>, CredentialError> {
        let decoded =
            urlencoding::decode(credential).map_err(|_| CredentialError::PercentEncoding)?;
        let data = BASE64.decode(decoded.as_bytes())?;

        if data.len() < PREFIX_LEN + NONCE_LEN + TAG_LEN {
            return Err(CredentialError::TooShort(data.len()));
        }

        let nonce = Nonce::from_slice(&data[PREFIX_LEN..PREFIX_LEN + NONCE_LEN]);
        let ciphertext = &data[PREFIX_LEN + NONCE_LEN..];

        self.cipher()
            .decrypt(nonce, ciphertext)
            .map_err(|_| CredentialError::Decrypt)
    }

    /// Produce a credential in the issuer's layout (base64, not yet percent-encoded).
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, CredentialError> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::rng().random();
        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CredentialError::Encrypt)?;

        let mut data = Vec::with_capacity(PREFIX_LEN + NONCE_LEN + ciphertext.len());
        data.extend_from_slice(VERSION_PREFIX);
        data.extend_from_slice(&nonce_bytes);
        data.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(data))
    }
}

/// Binds a client credential to a verified user identity.
pub struct SessionResolver {
    key: SessionKey,
    authority: Arc<dyn IdentityAuthority>,
}

impl SessionResolver {
    pub fn new(key: SessionKey, authority: Arc<dyn IdentityAuthority>) -> Self {
        Self { key, authority }
    }

    /// Resolve a raw credential into the user identity it proves.
    pub async fn resolve(&self, raw: &[u8]) -> Result<String, AuthFailure> {
        match self.try_resolve(raw).await {
            Ok(identity) => Ok(identity),
            Err(e) => {
                ConnectionMetrics::record_auth_failure();
                tracing::warn!(reason = %e, "Session resolution failed");
                Err(AuthFailure)
            }
        }
    }

    async fn try_resolve(&self, raw: &[u8]) -> Result<String, CredentialError> {
        let credential = std::str::from_utf8(raw).map_err(|_| CredentialError::PercentEncoding)?;
        let plaintext = self.key.open(credential)?;

        let claims: SessionClaims = serde_json::from_slice(&plaintext)?;
        if claims.token.is_empty() {
            return Err(CredentialError::EmptyToken);
        }

        let record = self
            .authority
            .verify(&claims.token)
            .await?
            .ok_or(CredentialError::UnknownToken)?;

        if record.token != claims.token {
            return Err(CredentialError::TokenMismatch);
        }

        Ok(record.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::identity::{MemoryIdentityAuthority, SessionRecord};
    use std::sync::OnceLock;

    // scrypt at N=16384 is slow in debug builds; derive once for the module
    fn test_key() -> &'static SessionKey {
        static KEY: OnceLock<SessionKey> = OnceLock::new();
        KEY.get_or_init(|| SessionKey::derive(b"test-secret", b"test-salt").unwrap())
    }

    fn resolver_with(authority: MemoryIdentityAuthority) -> SessionResolver {
        let key = SessionKey {
            key: test_key().key.clone(),
        };
        SessionResolver::new(key, Arc::new(authority))
    }

    fn seal_token(token: &str) -> String {
        let plaintext = serde_json::json!({ "token": token, "role": "user" }).to_string();
        test_key().seal(plaintext.as_bytes()).unwrap()
    }

    #[test]
    fn test_seal_layout() {
        let sealed = seal_token("alice");
        let data = BASE64.decode(&sealed).unwrap();
        assert_eq!(&data[..3], VERSION_PREFIX);

        let plaintext = r#"{"token":"alice","role":"user"}"#;
        assert_eq!(data.len(), PREFIX_LEN + NONCE_LEN + plaintext.len() + TAG_LEN);
    }

    #[test]
    fn test_open_roundtrip() {
        let sealed = test_key().seal(b"{\"token\":\"t\"}").unwrap();
        assert_eq!(test_key().open(&sealed).unwrap(), b"{\"token\":\"t\"}");
    }

    #[test]
    fn test_same_secret_derives_same_key() {
        let other = SessionKey::derive(b"test-secret", b"test-salt").unwrap();
        let sealed = test_key().seal(b"payload").unwrap();
        assert_eq!(other.open(&sealed).unwrap(), b"payload");
    }

    #[test]
    fn test_different_salt_rejects() {
        let other = SessionKey::derive(b"test-secret", b"other-salt").unwrap();
        let sealed = test_key().seal(b"payload").unwrap();
        assert!(matches!(other.open(&sealed), Err(CredentialError::Decrypt)));
    }

    #[test]
    fn test_single_byte_corruption_rejected() {
        let sealed = test_key().seal(b"{\"token\":\"alice\"}").unwrap();
        let data = BASE64.decode(&sealed).unwrap();

        // nonce, ciphertext and tag bytes all participate in authentication
        for i in PREFIX_LEN..data.len() {
            let mut corrupted = data.clone();
            corrupted[i] ^= 0x01;
            let encoded = BASE64.encode(&corrupted);
            assert!(
                matches!(test_key().open(&encoded), Err(CredentialError::Decrypt)),
                "byte {} corruption was accepted",
                i
            );
        }
    }

    #[test]
    fn test_version_prefix_is_not_authenticated() {
        let sealed = test_key().seal(b"payload").unwrap();
        let mut data = BASE64.decode(&sealed).unwrap();
        data[0] = b'x';
        assert_eq!(test_key().open(&BASE64.encode(&data)).unwrap(), b"payload");
    }

    #[test]
    fn test_percent_encoded_credential() {
        let sealed = test_key().seal(b"payload").unwrap();
        let encoded = urlencoding::encode(&sealed).into_owned();
        assert_eq!(test_key().open(&encoded).unwrap(), b"payload");
    }

    #[test]
    fn test_short_and_malformed_input() {
        let short = BASE64.encode(b"v10short");
        assert!(matches!(test_key().open(&short), Err(CredentialError::TooShort(8))));
        assert!(matches!(test_key().open("not base64!"), Err(CredentialError::Base64(_))));
    }

    #[tokio::test]
    async fn test_resolve_known_token() {
        let authority = MemoryIdentityAuthority::new();
        authority.issue("alice", "user");
        let resolver = resolver_with(authority);

        let identity = resolver.resolve(seal_token("alice").as_bytes()).await;
        assert_eq!(identity, Ok("alice".to_string()));
    }

    #[tokio::test]
    async fn test_resolve_unknown_token() {
        let resolver = resolver_with(MemoryIdentityAuthority::new());
        let result = resolver.resolve(seal_token("mallory").as_bytes()).await;
        assert_eq!(result, Err(AuthFailure));
    }

    #[tokio::test]
    async fn test_resolve_token_mismatch() {
        let authority = MemoryIdentityAuthority::new();
        authority.insert(
            "alice",
            SessionRecord {
                token: "someone-else".to_string(),
                role: "user".to_string(),
            },
        );
        let resolver = resolver_with(authority);

        let result = resolver.resolve(seal_token("alice").as_bytes()).await;
        assert_eq!(result, Err(AuthFailure));
    }

    #[tokio::test]
    async fn test_resolve_empty_token() {
        let authority = MemoryIdentityAuthority::new();
        authority.issue("", "user");
        let resolver = resolver_with(authority);

        let result = resolver.resolve(seal_token("").as_bytes()).await;
        assert_eq!(result, Err(AuthFailure));
    }

    #[tokio::test]
    async fn test_resolve_non_json_plaintext() {
        let authority = MemoryIdentityAuthority::new();
        authority.issue("alice", "user");
        let resolver = resolver_with(authority);

        let sealed = test_key().seal(b"alice").unwrap();
        assert_eq!(resolver.resolve(sealed.as_bytes()).await, Err(AuthFailure));
    }

    #[tokio::test]
    async fn test_resolve_corrupted_credential() {
        let authority = MemoryIdentityAuthority::new();
        authority.issue("alice", "user");
        let resolver = resolver_with(authority);

        let sealed = seal_token("alice");
        let mut data = BASE64.decode(&sealed).unwrap();
        let last = data.len() - 1;
        data[last] ^= 0xff;

        let result = resolver.resolve(BASE64.encode(&data).as_bytes()).await;
        assert_eq!(result, Err(AuthFailure));
    }
}
