use crate::encryption::{DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, KeyManagementService};
use crate::error::app_error::AppError;
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, OsRng, Payload, rand_core::RngCore},
};

const NONCE_LEN: usize = 12;

/// In-process AES-256-GCM key for development and tests. Ciphertext layout is
/// `nonce || sealed`, with the key name bound as associated data. Checksums
/// are checked and reported the same way the cloud service does.
pub struct LocalKms {
    cipher: Aes256Gcm,
}

impl LocalKms {
    pub fn new(key: [u8; 32]) -> Self {
        Self {
            cipher: Aes256Gcm::new((&key).into()),
        }
    }
}

#[async_trait::async_trait]
impl KeyManagementService for LocalKms {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, AppError> {
        if crc32c::crc32c(&request.plaintext) != request.plaintext_crc32c {
            return Err(AppError::integrity("Local key: plaintext checksum mismatch"));
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let sealed = self
            .cipher
            .encrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &request.plaintext,
                    aad: request.name.as_bytes(),
                },
            )
            .map_err(|_| AppError::integrity("Local key: encryption failed"))?;

        let mut ciphertext = Vec::with_capacity(NONCE_LEN + sealed.len());
        ciphertext.extend_from_slice(&nonce_bytes);
        ciphertext.extend_from_slice(&sealed);
        let ciphertext_crc32c = crc32c::crc32c(&ciphertext);

        Ok(EncryptResponse {
            ciphertext,
            ciphertext_crc32c: Some(ciphertext_crc32c),
            verified_plaintext_crc32c: true,
        })
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<DecryptResponse, AppError> {
        if crc32c::crc32c(&request.ciphertext) != request.ciphertext_crc32c {
            return Err(AppError::integrity("Local key: ciphertext checksum mismatch"));
        }
        if request.ciphertext.len() < NONCE_LEN {
            return Err(AppError::integrity("Local key: ciphertext too short"));
        }

        let (nonce, sealed) = request.ciphertext.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: sealed,
                    aad: request.name.as_bytes(),
                },
            )
            .map_err(|_| AppError::integrity("Local key: decryption failed"))?;
        let plaintext_crc32c = crc32c::crc32c(&plaintext);

        Ok(DecryptResponse {
            plaintext,
            plaintext_crc32c: Some(plaintext_crc32c),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encrypt_request(name: &str, plaintext: &[u8]) -> EncryptRequest {
        EncryptRequest {
            name: name.to_string(),
            plaintext: plaintext.to_vec(),
            plaintext_crc32c: crc32c::crc32c(plaintext),
        }
    }

    #[tokio::test]
    async fn rejects_request_with_wrong_checksum() {
        let kms = LocalKms::new([3u8; 32]);
        let mut request = encrypt_request("key", b"R-77");
        request.plaintext_crc32c ^= 1;
        assert!(kms.encrypt(request).await.is_err());
    }

    #[tokio::test]
    async fn nonces_differ_between_calls() {
        let kms = LocalKms::new([3u8; 32]);
        let first = kms.encrypt(encrypt_request("key", b"R-77")).await.unwrap();
        let second = kms.encrypt(encrypt_request("key", b"R-77")).await.unwrap();
        assert_ne!(first.ciphertext, second.ciphertext);
    }

    #[tokio::test]
    async fn ciphertext_is_bound_to_key_name() {
        let kms = LocalKms::new([3u8; 32]);
        let sealed = kms.encrypt(encrypt_request("key-a", b"R-77")).await.unwrap().ciphertext;
        let request = DecryptRequest {
            name: "key-b".to_string(),
            ciphertext_crc32c: crc32c::crc32c(&sealed),
            ciphertext: sealed,
        };
        assert!(kms.decrypt(request).await.is_err());
    }
}
