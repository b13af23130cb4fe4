//! Frame integrity and image authenticity checks.
//!
//! Every frame carries a CRC32 of its payload, checked before the frame
//! is decoded. The complete image is then authenticated against the
//! proof sent with `Start`: its CRC32 by default, or a P256 ECDSA
//! signature over its SHA256 digest with the `ecdsa-verify` feature.
use crate::{devices::protocol::Frame, error::Error};
use crc::{crc32, Hasher32};

#[cfg(feature = "ecdsa-verify")]
pub mod p256_ecdsa;

/// Verification service consumed by the update state machine. Only the
/// pass/fail outcome is relevant to the caller.
pub trait Verifier {
    /// Whether the frame payload matches its integrity tag.
    fn check_integrity(&self, frame: &Frame) -> bool {
        crc32::checksum_ieee(frame.payload()) == frame.integrity_tag()
    }

    /// Whether `image` is authenticated by `proof`.
    fn check_authenticity<I: Iterator<Item = u8>>(&self, image: I, proof: &[u8]) -> bool;
}

/// Authenticates images by their CRC32, sent little endian as the proof.
#[derive(Clone, Copy, Debug, Default)]
pub struct CrcVerifier;

pub const CRC_PROOF_SIZE: usize = 4;

/// CRC32 (IEEE) over an arbitrary byte stream.
pub fn image_crc<I: Iterator<Item = u8>>(image: I) -> u32 {
    let mut digest = crc32::Digest::new(crc32::IEEE);
    image.for_each(|byte| digest.write(&[byte]));
    digest.sum32()
}

impl Verifier for CrcVerifier {
    fn check_authenticity<I: Iterator<Item = u8>>(&self, image: I, proof: &[u8]) -> bool {
        match proof {
            &[a, b, c, d] => image_crc(image) == u32::from_le_bytes([a, b, c, d]),
            _ => false,
        }
    }
}

/// Builds the verifier selected at compile time.
#[cfg(not(feature = "ecdsa-verify"))]
pub fn configured() -> Result<CrcVerifier, Error> { Ok(CrcVerifier) }

/// Builds the verifier selected at compile time, from the key embedded
/// by the build configuration.
#[cfg(feature = "ecdsa-verify")]
pub fn configured() -> Result<p256_ecdsa::EcdsaVerifier, Error> {
    p256_ecdsa::EcdsaVerifier::new(crate::configuration::VERIFYING_KEY)
}
