//! Field-level encryption for patient identifiers.
//!
//! Every sensitive value is sealed by a key-management service under a single
//! symmetric key. Both directions carry CRC32C checksums: the service has to
//! confirm the checksum of what it received, and the payload it sends back has
//! to match the checksum it reports. Nothing that fails either check is ever
//! returned to a caller.

pub mod cloud_kms;
pub mod local;

use crate::config::{EncryptionConfig, KeyBackend};
use crate::encryption::cloud_kms::{CloudKms, TokenSource};
use crate::encryption::local::LocalKms;
use crate::error::app_error::AppError;
use crate::models::patient::normalize_registration_number;
use base64::{Engine as _, engine::general_purpose};
use hmac::{Hmac, Mac};
use rocket::fairing::AdHoc;
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Key name used by the local backend when no cloud key path is configured.
pub const LOCAL_KEY_NAME: &str = "local/registry-field-key";

#[derive(Debug, Clone)]
pub struct EncryptRequest {
    pub name: String,
    pub plaintext: Vec<u8>,
    pub plaintext_crc32c: u32,
}

#[derive(Debug, Clone)]
pub struct EncryptResponse {
    pub ciphertext: Vec<u8>,
    pub ciphertext_crc32c: Option<u32>,
    pub verified_plaintext_crc32c: bool,
}

#[derive(Debug, Clone)]
pub struct DecryptRequest {
    pub name: String,
    pub ciphertext: Vec<u8>,
    pub ciphertext_crc32c: u32,
}

#[derive(Debug, Clone)]
pub struct DecryptResponse {
    pub plaintext: Vec<u8>,
    pub plaintext_crc32c: Option<u32>,
}

#[async_trait::async_trait]
pub trait KeyManagementService: Send + Sync {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, AppError>;
    async fn decrypt(&self, request: DecryptRequest) -> Result<DecryptResponse, AppError>;
}

/// Encrypts and decrypts individual field values and derives the keyed
/// digest used to find duplicate registration numbers.
#[derive(Clone)]
pub struct FieldCipher {
    service: Arc<dyn KeyManagementService>,
    key_name: String,
    index_key: Vec<u8>,
}

impl FieldCipher {
    pub fn new(service: Arc<dyn KeyManagementService>, key_name: impl Into<String>, index_key: Vec<u8>) -> Self {
        Self {
            service,
            key_name: key_name.into(),
            index_key,
        }
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub async fn encrypt(&self, plaintext: &str) -> Result<Vec<u8>, AppError> {
        let plaintext = plaintext.as_bytes().to_vec();
        let plaintext_crc32c = crc32c::crc32c(&plaintext);

        let response = self
            .service
            .encrypt(EncryptRequest {
                name: self.key_name.clone(),
                plaintext,
                plaintext_crc32c,
            })
            .await?;

        if !response.verified_plaintext_crc32c {
            return Err(AppError::integrity("Encrypt: request corrupted in transit"));
        }
        match response.ciphertext_crc32c {
            Some(expected) if crc32c::crc32c(&response.ciphertext) == expected => Ok(response.ciphertext),
            _ => Err(AppError::integrity("Encrypt: response corrupted in transit")),
        }
    }

    pub async fn decrypt(&self, ciphertext: &[u8]) -> Result<String, AppError> {
        let response = self
            .service
            .decrypt(DecryptRequest {
                name: self.key_name.clone(),
                ciphertext: ciphertext.to_vec(),
                ciphertext_crc32c: crc32c::crc32c(ciphertext),
            })
            .await?;

        match response.plaintext_crc32c {
            Some(expected) if crc32c::crc32c(&response.plaintext) == expected => {}
            _ => return Err(AppError::integrity("Decrypt: response corrupted in transit")),
        }

        String::from_utf8(response.plaintext).map_err(|_| AppError::integrity("Decrypt: plaintext is not valid UTF-8"))
    }

    /// HMAC-SHA256 of the normalized registration number.
    pub fn registration_digest(&self, registration_number: &str) -> Result<Vec<u8>, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.index_key).map_err(|_| AppError::integrity("Invalid registration index key"))?;
        mac.update(normalize_registration_number(registration_number).as_bytes());
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

fn decode_index_key(raw: &str) -> Vec<u8> {
    hex::decode(raw.trim()).unwrap_or_else(|_| raw.as_bytes().to_vec())
}

fn decode_local_key(raw: Option<&str>) -> Result<[u8; 32], String> {
    let raw = raw.ok_or_else(|| "encryption.local_key must be set for the local backend".to_string())?;
    let bytes = general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|e| format!("encryption.local_key is not valid base64: {}", e))?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| format!("encryption.local_key must decode to 32 bytes, got {}", bytes.len()))
}

pub fn build_field_cipher(config: &EncryptionConfig, http: reqwest::Client) -> Result<FieldCipher, String> {
    if config.index_key.trim().is_empty() {
        return Err("encryption.index_key must be set".to_string());
    }
    let index_key = decode_index_key(&config.index_key);

    match config.backend {
        KeyBackend::Cloud => {
            let key_name = config.key_name()?;
            let tokens = match &config.access_token {
                Some(token) if !token.trim().is_empty() => TokenSource::fixed(token.trim()),
                _ => TokenSource::metadata(&config.metadata_token_url),
            };
            let service = CloudKms::new(http, &config.endpoint, tokens);
            Ok(FieldCipher::new(Arc::new(service), key_name, index_key))
        }
        KeyBackend::Local => {
            let key = decode_local_key(config.local_key.as_deref())?;
            let key_name = config.key_name().unwrap_or_else(|_| LOCAL_KEY_NAME.to_string());
            Ok(FieldCipher::new(Arc::new(LocalKms::new(key)), key_name, index_key))
        }
    }
}

pub fn stage_encryption(config: EncryptionConfig, http: reqwest::Client) -> AdHoc {
    AdHoc::try_on_ignite("Field encryption", |rocket| async move {
        match build_field_cipher(&config, http) {
            Ok(cipher) => {
                tracing::info!(backend = ?config.backend, key = %cipher.key_name(), "Field encryption initialized");
                Ok(rocket.manage(cipher))
            }
            Err(e) => {
                tracing::error!("Failed to initialize field encryption: {}", e);
                Err(rocket)
            }
        }
    })
}
