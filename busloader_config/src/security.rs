use anyhow::{anyhow, Result};
use p256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityMode {
    Crc,
    P256ECDSA,
}

impl Default for SecurityMode {
    fn default() -> Self { SecurityMode::Crc }
}

#[derive(Default, Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct SecurityConfiguration {
    pub security_mode: SecurityMode,
    /// PEM encoded P256 public key. Ignored in CRC mode.
    pub verifying_key_raw: String,
}

impl SecurityConfiguration {
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        p256::PublicKey::from_str(self.verifying_key_raw.trim())
            .map(|key| VerifyingKey::from(&key))
            .map_err(|_| anyhow!("Failed to parse the supplied P256 public key"))
    }

    /// Uncompressed SEC1 encoding of the verifying key, as embedded in the
    /// bootloader binary. Empty in CRC mode.
    pub fn verifying_key_sec1(&self) -> Result<Vec<u8>> {
        match self.security_mode {
            SecurityMode::Crc => Ok(Vec::new()),
            SecurityMode::P256ECDSA => {
                Ok(self.verifying_key()?.to_encoded_point(false).as_bytes().to_vec())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc_mode_embeds_no_key() {
        let security = SecurityConfiguration::default();
        assert_eq!(security.security_mode, SecurityMode::Crc);
        assert!(security.verifying_key_sec1().unwrap().is_empty());
    }

    #[test]
    fn garbage_key_fails_to_parse() {
        let security = SecurityConfiguration {
            security_mode: SecurityMode::P256ECDSA,
            verifying_key_raw: "-----BEGIN PUBLIC KEY-----\nnope\n-----END PUBLIC KEY-----".into(),
        };
        assert!(security.verifying_key().is_err());
        assert!(security.verifying_key_sec1().is_err());
    }

    #[test]
    fn pem_key_is_embedded_as_uncompressed_sec1() {
        // Given
        let security = SecurityConfiguration {
            security_mode: SecurityMode::P256ECDSA,
            verifying_key_raw: "
                -----BEGIN PUBLIC KEY-----
MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAE4DqEaMD6pb1KG/Oou1pi7Ga4KuZe
5MYKr+HRIaQ/PIjA7fmFDp1ad7s8qhVWSdfefwpYd/5Cl3Xpa2cc23YWrQ==
-----END PUBLIC KEY-----
            "
            .into(),
        };

        // When
        let sec1 = security.verifying_key_sec1().unwrap();

        // Then
        assert_eq!(sec1.len(), 65);
        assert_eq!(&sec1[..5], &[0x04, 0xe0, 0x3a, 0x84, 0x68]);
        assert_eq!(&sec1[61..], &[0xdb, 0x76, 0x16, 0xad]);
    }
}
