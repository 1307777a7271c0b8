use crate::encryption::FieldCipher;
use crate::error::app_error::AppError;
use std::str::FromStr;

/// A patient field that is either stored in a legacy clear-text column or as a
/// ciphertext produced by the field cipher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensitiveField<T> {
    Plaintext(T),
    Encrypted(Vec<u8>),
}

impl<T> SensitiveField<T> {
    /// Builds the field from its two storage columns. The encrypted column wins
    /// when both happen to be populated; `None` means neither is.
    pub fn from_columns(plaintext: Option<T>, encrypted: Option<Vec<u8>>) -> Option<Self> {
        match (encrypted, plaintext) {
            (Some(bytes), _) => Some(SensitiveField::Encrypted(bytes)),
            (None, Some(value)) => Some(SensitiveField::Plaintext(value)),
            (None, None) => None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, SensitiveField::Encrypted(_))
    }
}

impl<T> SensitiveField<T>
where
    T: FromStr,
{
    /// Returns the clear value, decrypting through `cipher` when needed.
    pub async fn reveal(self, cipher: &FieldCipher) -> Result<T, AppError> {
        match self {
            SensitiveField::Plaintext(value) => Ok(value),
            SensitiveField::Encrypted(bytes) => {
                let text = cipher.decrypt(&bytes).await?;
                text.parse::<T>()
                    .map_err(|_| AppError::integrity("Decrypted value has an unexpected format"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encryption::local::LocalKms;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn cipher() -> FieldCipher {
        FieldCipher::new(Arc::new(LocalKms::new([7u8; 32])), "projects/p/locations/l/keyRings/r/cryptoKeys/k", b"index-key".to_vec())
    }

    #[test]
    fn encrypted_column_takes_precedence() {
        let field = SensitiveField::from_columns(Some("R-1".to_string()), Some(vec![1, 2, 3])).unwrap();
        assert!(field.is_encrypted());
        assert_eq!(SensitiveField::<String>::from_columns(None, None), None);
        assert_eq!(
            SensitiveField::from_columns(Some("R-1".to_string()), None),
            Some(SensitiveField::Plaintext("R-1".to_string()))
        );
    }

    #[tokio::test]
    async fn plaintext_and_encrypted_reveal_the_same_value() {
        let cipher = cipher();
        let date = NaiveDate::from_ymd_opt(2015, 3, 9).unwrap();

        let legacy = SensitiveField::Plaintext(date);
        assert_eq!(legacy.reveal(&cipher).await.unwrap(), date);

        let bytes = cipher.encrypt("2015-03-09").await.unwrap();
        let stored: SensitiveField<NaiveDate> = SensitiveField::Encrypted(bytes);
        assert_eq!(stored.reveal(&cipher).await.unwrap(), date);
    }

    #[tokio::test]
    async fn malformed_decrypted_value_is_an_integrity_error() {
        let cipher = cipher();
        let bytes = cipher.encrypt("not a date").await.unwrap();
        let stored: SensitiveField<NaiveDate> = SensitiveField::Encrypted(bytes);
        assert!(matches!(stored.reveal(&cipher).await, Err(AppError::Integrity(_))));
    }
}
