//! P256 ECDSA image authentication.
use super::Verifier;
use crate::error::Error;
use ecdsa::signature::Signature as EcdsaSignature;
use p256::ecdsa::{signature::DigestVerifier, Signature, VerifyingKey};
use sha2::Digest;

/// Size of a raw (r, s) P256 signature.
pub const SIGNATURE_SIZE: usize = 64;

/// Checks image signatures against a public key fixed at build time.
pub struct EcdsaVerifier {
    key: VerifyingKey,
}

impl EcdsaVerifier {
    /// Builds the verifier from an SEC1 encoded public key.
    pub fn new(key: &[u8]) -> Result<Self, Error> {
        VerifyingKey::from_sec1_bytes(key)
            .map(|key| Self { key })
            .map_err(|_| Error::ConfigurationError("Invalid P256 verifying key"))
    }
}

impl Verifier for EcdsaVerifier {
    fn check_authenticity<I: Iterator<Item = u8>>(&self, image: I, proof: &[u8]) -> bool {
        if proof.len() != SIGNATURE_SIZE {
            return false;
        }
        let signature = match Signature::from_bytes(proof) {
            Ok(signature) => signature,
            Err(_) => return false,
        };
        let digest = image.fold(sha2::Sha256::default(), |mut digest, byte| {
            digest.update(&[byte]);
            digest
        });
        self.key.verify_digest(digest, &signature).is_ok()
    }
}
