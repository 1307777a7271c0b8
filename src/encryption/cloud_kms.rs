use crate::encryption::{DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, KeyManagementService};
use crate::error::app_error::AppError;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;

/// Refresh metadata tokens this long before they expire.
const TOKEN_EXPIRY_MARGIN_SECONDS: i64 = 60;

pub struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Where the OAuth2 bearer token for the KMS REST API comes from.
pub enum TokenSource {
    Fixed(String),
    Metadata { url: String, cached: Mutex<Option<CachedToken>> },
}

impl TokenSource {
    pub fn fixed(token: &str) -> Self {
        TokenSource::Fixed(token.to_string())
    }

    pub fn metadata(url: &str) -> Self {
        TokenSource::Metadata {
            url: url.to_string(),
            cached: Mutex::new(None),
        }
    }

    async fn token(&self, http: &reqwest::Client) -> Result<String, AppError> {
        match self {
            TokenSource::Fixed(token) => Ok(token.clone()),
            TokenSource::Metadata { url, cached } => {
                let mut cached = cached.lock().await;
                if let Some(token) = cached.as_ref()
                    && token.expires_at > Utc::now()
                {
                    return Ok(token.value.clone());
                }

                let response = http.get(url).header("Metadata-Flavor", "Google").send().await?;
                if !response.status().is_success() {
                    return Err(AppError::dependency(
                        format!("Metadata server returned {}", response.status()),
                        None,
                    ));
                }
                let token: MetadataToken = response.json().await?;
                let lifetime = (token.expires_in - TOKEN_EXPIRY_MARGIN_SECONDS).max(0);
                let value = token.access_token.clone();
                *cached = Some(CachedToken {
                    value: token.access_token,
                    expires_at: Utc::now() + Duration::seconds(lifetime),
                });
                Ok(value)
            }
        }
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: i64,
}

/// Google Cloud KMS over its REST API.
pub struct CloudKms {
    http: reqwest::Client,
    endpoint: String,
    tokens: TokenSource,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptBody {
    plaintext: String,
    plaintext_crc32c: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncryptReply {
    ciphertext: String,
    #[serde(default, deserialize_with = "deserialize_int64")]
    ciphertext_crc32c: Option<u32>,
    #[serde(default)]
    verified_plaintext_crc32c: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecryptBody {
    ciphertext: String,
    ciphertext_crc32c: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecryptReply {
    #[serde(default)]
    plaintext: String,
    #[serde(default, deserialize_with = "deserialize_int64")]
    plaintext_crc32c: Option<u32>,
}

/// Protobuf JSON renders int64 as a string, but numbers are accepted too.
fn deserialize_int64<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Int64 {
        Text(String),
        Number(u64),
    }

    let value = Option::<Int64>::deserialize(deserializer)?;
    let number = match value {
        None => return Ok(None),
        Some(Int64::Number(n)) => n,
        Some(Int64::Text(s)) => s.parse::<u64>().map_err(serde::de::Error::custom)?,
    };
    u32::try_from(number).map(Some).map_err(serde::de::Error::custom)
}

impl CloudKms {
    pub fn new(http: reqwest::Client, endpoint: &str, tokens: TokenSource) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn url(&self, key_name: &str, action: &str) -> String {
        format!("{}/v1/{}:{}", self.endpoint, key_name, action)
    }

    async fn call<B, R>(&self, key_name: &str, action: &str, body: &B) -> Result<R, AppError>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let token = self.tokens.token(&self.http).await?;
        let response = self.http.post(self.url(key_name, action)).bearer_auth(token).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, action = action, detail = %detail, "KMS call rejected");
            return Err(AppError::dependency(format!("KMS {} returned {}", action, status), None));
        }

        Ok(response.json::<R>().await?)
    }
}

fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>, AppError> {
    general_purpose::STANDARD
        .decode(value)
        .map_err(|_| AppError::integrity(format!("KMS returned malformed {}", field)))
}

#[async_trait::async_trait]
impl KeyManagementService for CloudKms {
    async fn encrypt(&self, request: EncryptRequest) -> Result<EncryptResponse, AppError> {
        let body = EncryptBody {
            plaintext: general_purpose::STANDARD.encode(&request.plaintext),
            plaintext_crc32c: request.plaintext_crc32c.to_string(),
        };
        let reply: EncryptReply = self.call(&request.name, "encrypt", &body).await?;

        Ok(EncryptResponse {
            ciphertext: decode_base64("ciphertext", &reply.ciphertext)?,
            ciphertext_crc32c: reply.ciphertext_crc32c,
            verified_plaintext_crc32c: reply.verified_plaintext_crc32c,
        })
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<DecryptResponse, AppError> {
        let body = DecryptBody {
            ciphertext: general_purpose::STANDARD.encode(&request.ciphertext),
            ciphertext_crc32c: request.ciphertext_crc32c.to_string(),
        };
        let reply: DecryptReply = self.call(&request.name, "decrypt", &body).await?;

        Ok(DecryptResponse {
            plaintext: decode_base64("plaintext", &reply.plaintext)?,
            plaintext_crc32c: reply.plaintext_crc32c,
        })
    }
}
