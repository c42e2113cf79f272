//! `OPA-Auth` request signing.
//!
//! Every request carries an `Authorization` header of the form
//!
//! ```text
//! hmac OPA-Auth:{apiKey}:{signature}:{nonce}:{epoch}:{contentHash}
//! ```
//!
//! where `contentHash` is `base64(md5(contentType ‖ body))` (or `empty` for
//! requests without a body) and `signature` is the base64 HMAC-SHA256 of
//! `path, method, nonce, epoch, contentType, contentHash` joined by newlines.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Content type sent with JSON bodies (part of the signed string).
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

const EMPTY: &str = "empty";
const NONCE_LENGTH: usize = 8;

/// Signs requests for one API key.
#[derive(Clone)]
pub struct RequestSigner {
    api_key: String,
    api_secret: SecretString,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

impl RequestSigner {
    #[must_use]
    pub const fn new(api_key: String, api_secret: SecretString) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Authorization header for a request, using a fresh nonce and the current time.
    #[must_use]
    pub fn authorization(&self, method: &str, path: &str, body: Option<&[u8]>) -> String {
        let nonce: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LENGTH)
            .map(char::from)
            .collect();
        let epoch = chrono::Utc::now().timestamp();
        self.authorization_with(method, path, body, &nonce, epoch)
    }

    /// Authorization header with an explicit nonce and epoch.
    #[must_use]
    pub fn authorization_with(
        &self,
        method: &str,
        path: &str,
        body: Option<&[u8]>,
        nonce: &str,
        epoch: i64,
    ) -> String {
        let (content_type, content_hash) = match body {
            Some(body) => (JSON_CONTENT_TYPE, content_hash(JSON_CONTENT_TYPE, body)),
            None => (EMPTY, EMPTY.to_owned()),
        };

        let message = [
            path,
            method,
            nonce,
            &epoch.to_string(),
            content_type,
            &content_hash,
        ]
        .join("\n");

        let signature = self.sign(message.as_bytes());
        format!(
            "hmac OPA-Auth:{}:{signature}:{nonce}:{epoch}:{content_hash}",
            self.api_key
        )
    }

    fn sign(&self, message: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.expose_secret().as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(message);
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

/// `base64(md5(content_type ‖ body))`.
fn content_hash(content_type: &str, body: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(content_type.as_bytes());
    hasher.update(body);
    STANDARD.encode(hasher.finalize())
}
