//! Signed session credentials
//!
//! The server keeps the session row; the client only ever sees
//! `<token>.<hex hmac>` so a forged or truncated credential is rejected
//! before the database is touched.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::core::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "ladybug_session";

#[derive(Clone)]
pub struct SessionSigner {
    secret: Vec<u8>,
}

impl SessionSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Internal(format!("session signing key: {}", e)))
    }

    /// Produce the client-facing credential for a session token
    pub fn sign(&self, token: &str) -> Result<String> {
        let mut mac = self.mac()?;
        mac.update(token.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{}.{}", token, signature))
    }

    /// Return the session token if the credential carries a valid signature
    pub fn verify<'a>(&self, credential: &'a str) -> Option<&'a str> {
        let (token, signature) = credential.rsplit_once('.')?;
        let signature = hex::decode(signature).ok()?;

        let mut mac = self.mac().ok()?;
        mac.update(token.as_bytes());
        mac.verify_slice(&signature).ok()?;

        Some(token)
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner").finish_non_exhaustive()
    }
}
