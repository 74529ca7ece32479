//! PKCE verifier/challenge and state generation (RFC 7636, S256).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

/// Generate a fresh verifier and its S256 challenge.
pub fn generate_pkce_pair() -> PkcePair {
    let mut random = [0_u8; 32];
    rand::thread_rng().fill_bytes(&mut random);
    let verifier = URL_SAFE_NO_PAD.encode(random);
    let challenge = challenge_for(&verifier);

    PkcePair {
        verifier,
        challenge,
    }
}

/// S256 challenge for a verifier.
pub fn challenge_for(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Opaque anti-forgery value carried through the redirect.
pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc7636_appendix_b_vector() {
        assert_eq!(
            challenge_for("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_generated_pair_is_consistent() {
        let pair = generate_pkce_pair();
        assert_eq!(pair.verifier.len(), 43);
        assert_eq!(challenge_for(&pair.verifier), pair.challenge);
        assert_ne!(generate_pkce_pair().verifier, pair.verifier);
    }

    #[test]
    fn test_state_uniqueness() {
        assert_ne!(generate_state(), generate_state());
    }
}
