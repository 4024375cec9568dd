//! PKCE and random value helpers.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// PKCE code verifier and challenge pair.
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Challenge method sent with the authorize request.
    pub const METHOD: &'static str = "S256";

    /// Generate a new PKCE challenge pair.
    pub fn generate() -> Self {
        let verifier = random_token();

        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

        Self {
            verifier,
            challenge,
        }
    }
}

/// 32 random bytes, base64url without padding.
fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a random state string for CSRF protection.
pub fn generate_state() -> String {
    random_token()
}

/// Generate a random nonce for the identity token.
pub fn generate_nonce() -> String {
    random_token()
}
