//! Auth-token exchange with the remote metadata service.
//!
//! The service hands out short-lived bearer tokens to callers that prove
//! possession of the device seed: the client signs a millisecond timestamp
//! with a key derived from the seed and posts both. Token acquisition is
//! best-effort — any failure is logged and reported as `None` so callers can
//! retry on their own schedule.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, error, warn};
use zeroize::Zeroizing;

use crate::error::RecoveryResult;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_KEY_SALT: &[u8] = b"chunkbd/auth/v1";
const TOKEN_KEY_INFO: &[u8] = b"token signing key";

/// Client for the metadata service's token endpoint.
pub struct TokenService {
    endpoint: String,
    client: reqwest::blocking::Client,
    signing_key: Zeroizing<[u8; 32]>,
}

impl TokenService {
    /// Build a token service for the given endpoint, deriving the signing
    /// key from the device's encryption seed.
    pub fn new(
        endpoint: impl Into<String>,
        seed: &str,
        request_timeout: Duration,
    ) -> RecoveryResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
            signing_key: derive_signing_key(seed),
        })
    }

    /// Request a bearer token.
    ///
    /// Returns `None` when the service rejects the signature or is
    /// unreachable; the failure is logged, never fatal.
    pub fn token(&self) -> Option<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let signature = self.sign(&timestamp.to_string());
        let url = format!("{}/auth/token", self.endpoint);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("timestamp", timestamp.to_string()),
                ("signature", signature),
            ])
            .send();

        match response {
            Ok(resp) if resp.status().is_success() => match resp.text() {
                Ok(body) => {
                    debug!("obtained auth token from metadata service");
                    Some(body)
                }
                Err(e) => {
                    error!(error = %e, "failed to read token response body");
                    None
                }
            },
            Ok(resp) => {
                warn!(status = %resp.status(), "token request rejected");
                None
            }
            Err(e) => {
                error!(error = %e, "token request failed");
                None
            }
        }
    }

    /// HMAC-SHA256 signature of `message` under the derived key, hex encoded.
    fn sign(&self, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.signing_key.as_ref())
            .expect("HMAC-SHA256 accepts keys of any length");
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Derive the token signing key from the device seed.
///
/// One-way: the remote side stores the same derived key, never the seed.
fn derive_signing_key(seed: &str) -> Zeroizing<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(Some(TOKEN_KEY_SALT), seed.as_bytes());
    let mut okm = Zeroizing::new([0u8; 32]);
    hk.expand(TOKEN_KEY_INFO, okm.as_mut())
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    okm
}
