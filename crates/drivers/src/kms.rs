// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key-management provider abstraction (C11). A real deployment backs this
//! with a cloud KMS; `MockKms` exists for tests and for clusters that run
//! with encryption disabled at the policy level.

use async_trait::async_trait;

use crate::error::DriverError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub key_id: String,
    pub ciphertext: Vec<u8>,
}

#[async_trait]
pub trait KmsProvider: Send + Sync {
    /// Creates a new key version and returns its id. The previous key id
    /// remains valid for decrypt until every payload has been re-encrypted.
    async fn rotate_key(&self, key_id: &str) -> Result<String, DriverError>;

    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<EncryptedPayload, DriverError>;

    async fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, DriverError>;
}

/// XORs with a key derived from the key id. Reversible and deterministic,
/// which is all the rotation loop's tests need; not cryptographically
/// meaningful.
#[derive(Debug, Default)]
pub struct MockKms {
    rotations: parking_lot::Mutex<std::collections::HashMap<String, u32>>,
}

impl MockKms {
    pub fn new() -> Self {
        Self::default()
    }

    fn keystream(key_id: &str, len: usize) -> Vec<u8> {
        use sha2::{Digest, Sha256};
        let mut out = Vec::with_capacity(len);
        let mut counter: u32 = 0;
        while out.len() < len {
            let mut hasher = Sha256::new();
            hasher.update(key_id.as_bytes());
            hasher.update(counter.to_le_bytes());
            out.extend_from_slice(&hasher.finalize());
            counter += 1;
        }
        out.truncate(len);
        out
    }
}

#[async_trait]
impl KmsProvider for MockKms {
    async fn rotate_key(&self, key_id: &str) -> Result<String, DriverError> {
        let mut rotations = self.rotations.lock();
        let generation = rotations.entry(key_id.to_string()).or_insert(0);
        *generation += 1;
        Ok(format!("{key_id}-v{generation}"))
    }

    async fn encrypt(&self, key_id: &str, plaintext: &[u8]) -> Result<EncryptedPayload, DriverError> {
        let stream = Self::keystream(key_id, plaintext.len());
        let ciphertext = plaintext.iter().zip(stream).map(|(b, k)| b ^ k).collect();
        Ok(EncryptedPayload { key_id: key_id.to_string(), ciphertext })
    }

    async fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, DriverError> {
        let stream = Self::keystream(&payload.key_id, payload.ciphertext.len());
        Ok(payload.ciphertext.iter().zip(stream).map(|(b, k)| b ^ k).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn encrypt_then_decrypt_round_trips() {
        let kms = MockKms::new();
        let payload = kms.encrypt("key-a", b"secret data").await.unwrap();
        assert_ne!(payload.ciphertext, b"secret data");
        let plaintext = kms.decrypt(&payload).await.unwrap();
        assert_eq!(plaintext, b"secret data");
    }

    #[tokio::test]
    async fn rotate_key_produces_increasing_generations() {
        let kms = MockKms::new();
        assert_eq!(kms.rotate_key("k").await.unwrap(), "k-v1");
        assert_eq!(kms.rotate_key("k").await.unwrap(), "k-v2");
    }

    #[tokio::test]
    async fn decrypt_with_wrong_key_id_does_not_round_trip() {
        let kms = MockKms::new();
        let mut payload = kms.encrypt("key-a", b"secret data").await.unwrap();
        payload.key_id = "key-b".to_string();
        let plaintext = kms.decrypt(&payload).await.unwrap();
        assert_ne!(plaintext, b"secret data");
    }
}
