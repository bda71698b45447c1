//! HMAC-SHA256 request signing for the 3Commas API.
//!
//! Every private endpoint expects two headers: `APIKEY` with the key id and
//! `Signature` with the hex HMAC-SHA256 of the signed payload under the API
//! secret. The payload is the request path (including `/public/api` and any
//! query string) followed by the request body, if any.
//!
//! # Security
//!
//! - Credentials are held in [`SecretString`] and never logged

use crate::error::{Result, ThreeCommasError};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the API key id.
pub const API_KEY_HEADER: &str = "APIKEY";

/// Header carrying the request signature.
pub const SIGNATURE_HEADER: &str = "Signature";

/// Headers required for authenticated 3Commas requests.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// APIKEY header.
    pub api_key: String,

    /// Signature header (lowercase hex).
    pub signature: String,
}

impl SignedHeaders {
    /// Returns headers as tuples for reqwest.
    #[must_use]
    pub fn as_tuples(&self) -> [(&'static str, &str); 2] {
        [
            (API_KEY_HEADER, &self.api_key),
            (SIGNATURE_HEADER, &self.signature),
        ]
    }
}

/// Request signer for the 3Commas API.
pub struct ThreeCommasAuth {
    api_key: SecretString,
    api_secret: SecretString,
}

impl std::fmt::Debug for ThreeCommasAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreeCommasAuth")
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .finish()
    }
}

impl ThreeCommasAuth {
    /// Creates a signer from an API key and secret.
    ///
    /// # Errors
    /// Returns error if either credential is empty.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        let api_secret = api_secret.into();

        if api_key.trim().is_empty() {
            return Err(ThreeCommasError::Authentication(
                "API key is empty".to_string(),
            ));
        }
        if api_secret.trim().is_empty() {
            return Err(ThreeCommasError::Authentication(
                "API secret is empty".to_string(),
            ));
        }

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_secret: SecretString::from(api_secret),
        })
    }

    /// Computes the hex HMAC-SHA256 of `payload`.
    ///
    /// # Errors
    /// Returns error if the HMAC cannot be keyed.
    pub fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.expose_secret().as_bytes())
            .map_err(|e| ThreeCommasError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Signs a request for `path` with an optional body.
    ///
    /// # Errors
    /// Returns error if signing fails.
    pub fn sign_request(&self, path: &str, body: &str) -> Result<SignedHeaders> {
        let signature = self.sign(&format!("{path}{body}"))?;
        Ok(SignedHeaders {
            api_key: self.api_key.expose_secret().to_string(),
            signature,
        })
    }
}
