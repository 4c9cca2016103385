use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use once_cell::sync::OnceCell;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, error};

use super::identity::MachineIdentity;
use crate::constants::{KEY_DERIVATION_SALT, NONCE_LEN};
use crate::utils::{AnalyzerError, Result};

const TAG_LEN: usize = 16;

/// Symmetric encryption of secret configuration fields
pub trait SecretCipher: Send + Sync {
    /// Base64 of `nonce || ciphertext`; a fresh nonce per call
    fn encrypt(&self, plaintext: &str) -> Result<String>;

    /// Fails with [`AnalyzerError::Decryption`] on malformed or foreign input
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// AES-256-GCM keyed by SHA-256 of a constant salt and the machine identifier
///
/// The key is derived on first use and kept in memory only. Ciphertext is
/// therefore bound to the machine that produced it.
pub struct MachineCipher {
    identity: Arc<dyn MachineIdentity>,
    key: OnceCell<[u8; 32]>,
}

impl MachineCipher {
    pub fn new(identity: Arc<dyn MachineIdentity>) -> Self {
        Self {
            identity,
            key: OnceCell::new(),
        }
    }

    fn cipher(&self) -> Result<Aes256Gcm> {
        let key = self
            .key
            .get_or_try_init(|| derive_key(self.identity.as_ref()))?;
        Ok(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)))
    }
}

fn derive_key(identity: &dyn MachineIdentity) -> Result<[u8; 32]> {
    let machine_id = identity.machine_id().map_err(|e| match e {
        AnalyzerError::MachineIdentity(_) => e,
        other => AnalyzerError::MachineIdentity(other.to_string()),
    })?;

    let machine_id = machine_id.trim();
    if machine_id.is_empty() {
        error!("Failed to retrieve machine identifier, secrets cannot be protected");
        return Err(AnalyzerError::MachineIdentity(
            "no machine identifier available".to_string(),
        ));
    }

    let mut hasher = Sha256::new();
    hasher.update(KEY_DERIVATION_SALT.as_bytes());
    hasher.update(machine_id.as_bytes());
    debug!("Derived secret key from machine identity");
    Ok(hasher.finalize().into())
}

impl SecretCipher for MachineCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let cipher = self.cipher()?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| {
                AnalyzerError::Encryption("AES-GCM seal failed".to_string())
            })?;

        let mut output = Vec::with_capacity(NONCE_LEN + sealed.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&sealed);
        Ok(STANDARD.encode(output))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let cipher = self.cipher()?;

        let raw = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| AnalyzerError::Decryption(format!("bad base64: {e}")))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(AnalyzerError::Decryption(
                "ciphertext is too short".to_string(),
            ));
        }

        let (nonce, sealed) = raw.split_at(NONCE_LEN);
        let plaintext = cipher.decrypt(Nonce::from_slice(nonce), sealed).map_err(|_| {
            AnalyzerError::Decryption("wrong key or corrupted data".to_string())
        })?;

        String::from_utf8(plaintext).map_err(|_| {
            AnalyzerError::Decryption("plaintext is not UTF-8".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::identity::MockMachineIdentity;

    fn cipher_for(machine_id: &'static str) -> MachineCipher {
        let mut identity = MockMachineIdentity::new();
        identity
            .expect_machine_id()
            .returning(move || Ok(machine_id.to_string()));
        MachineCipher::new(Arc::new(identity))
    }

    #[test]
    fn test_decrypt_returns_plaintext() {
        let cipher = cipher_for("test-guid");
        for plaintext in ["test-data", "", "sk-ünïcødé-🔑"] {
            let encrypted = cipher.encrypt(plaintext).unwrap();
            assert!(!encrypted.is_empty());
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_encrypt_uses_fresh_nonce() {
        let cipher = cipher_for("test-guid");
        let first = cipher.encrypt("same").unwrap();
        let second = cipher.encrypt("same").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_decrypt_rejects_garbage() {
        let cipher = cipher_for("test-guid");
        for input in ["invalid-encrypted-text", "", "AAAA"] {
            assert!(matches!(
                cipher.decrypt(input),
                Err(AnalyzerError::Decryption(_))
            ));
        }
    }

    #[test]
    fn test_decrypt_on_other_machine_fails() {
        let encrypted = cipher_for("machine-a").encrypt("secret").unwrap();
        assert!(matches!(
            cipher_for("machine-b").decrypt(&encrypted),
            Err(AnalyzerError::Decryption(_))
        ));
    }

    #[test]
    fn test_missing_machine_id_is_an_error() {
        let cipher = cipher_for("   ");
        assert!(matches!(
            cipher.encrypt("test"),
            Err(AnalyzerError::MachineIdentity(_))
        ));
    }

    #[test]
    fn test_identity_failure_propagates() {
        let mut identity = MockMachineIdentity::new();
        identity.expect_machine_id().returning(|| {
            Err(AnalyzerError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "registry access denied",
            )))
        });
        let cipher = MachineCipher::new(Arc::new(identity));

        match cipher.decrypt("anything") {
            Err(AnalyzerError::MachineIdentity(message)) => {
                assert!(message.contains("registry access denied"))
            }
            other => panic!("Expected machine identity error, got {:?}", other),
        }
    }

    #[test]
    fn test_key_is_derived_once() {
        let mut identity = MockMachineIdentity::new();
        identity
            .expect_machine_id()
            .times(1)
            .returning(|| Ok("test-guid".to_string()));
        let cipher = MachineCipher::new(Arc::new(identity));

        let encrypted = cipher.encrypt("a").unwrap();
        cipher.encrypt("b").unwrap();
        cipher.decrypt(&encrypted).unwrap();
    }
}
