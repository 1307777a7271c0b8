use rocket::figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_PATH: &str = "/api";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub api: ApiConfig,
    pub rate_limit: RateLimitConfig,
    pub session: SessionConfig,
    pub encryption: EncryptionConfig,
    pub oauth: OAuthConfig,
    pub news: NewsConfig,
    pub tracking: TrackingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: u64,
    pub acquire_timeout: u64,
    /// Apply the embedded schema migrations when the pool comes up.
    pub run_migrations: bool,
    /// Open connections on first use instead of at ignite.
    pub lazy_connect: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
    pub enable_swagger: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    pub read_limit: u32,
    pub mutation_limit: u32,
    pub auth_limit: u32,
    pub window_seconds: u64,
    pub cleanup_interval_seconds: u64,
    pub require_client_ip: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    /// Sliding lifetime of a bearer session; every authenticated request pushes it forward.
    pub ttl_seconds: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyBackend {
    Cloud,
    Local,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EncryptionConfig {
    pub backend: KeyBackend,
    pub project_id: String,
    pub location_id: String,
    pub key_ring_id: String,
    pub crypto_key_id: String,
    pub endpoint: String,
    /// Static OAuth2 access token for the key-management API. When absent the
    /// GCE metadata server is asked for one.
    pub access_token: Option<String>,
    pub metadata_token_url: String,
    /// Base64 AES-256 key used by the local backend.
    pub local_key: Option<String>,
    /// Secret for the registration-number blind index (hex or plain text).
    pub index_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OAuthConfig {
    pub provider: String,
    pub client_id: Option<String>,
    pub token_info_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NewsConfig {
    pub enabled: bool,
    pub base_url: String,
    pub search_term: String,
    pub reldate_days: u32,
    pub max_results: u32,
    pub refresh_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TrackingConfig {
    pub visitor_salt: String,
    /// IANA timezone whose local midnight starts the "daily" visit window.
    pub timezone: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/registry_db".to_string(),
            max_connections: 16,
            min_connections: 4,
            connection_timeout: 5,
            acquire_timeout: 5,
            run_migrations: false,
            lazy_connect: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            address: "127.0.0.1".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
            enable_swagger: true,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            read_limit: 300,
            mutation_limit: 120,
            auth_limit: 10,
            window_seconds: 60,
            cleanup_interval_seconds: 300,
            require_client_ip: false,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { ttl_seconds: 60 * 60 * 3 }
    }
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            backend: KeyBackend::Local,
            project_id: String::new(),
            location_id: String::new(),
            key_ring_id: String::new(),
            crypto_key_id: String::new(),
            endpoint: "https://cloudkms.googleapis.com".to_string(),
            access_token: None,
            metadata_token_url: "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token".to_string(),
            local_key: None,
            index_key: "change-me".to_string(),
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            provider: "google".to_string(),
            client_id: None,
            token_info_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
        }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            search_term: "myopia[Title] AND (control[Title] OR management[Title] OR treatment[Title])".to_string(),
            reldate_days: 180,
            max_results: 10,
            refresh_interval_seconds: 60 * 60,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            visitor_salt: "change-me".to_string(),
            timezone: "Asia/Seoul".to_string(),
        }
    }
}

impl EncryptionConfig {
    /// Fully qualified name of the symmetric key every patient field is sealed with.
    pub fn key_name(&self) -> Result<String, String> {
        let parts = [
            ("project_id", &self.project_id),
            ("location_id", &self.location_id),
            ("key_ring_id", &self.key_ring_id),
            ("crypto_key_id", &self.crypto_key_id),
        ];
        if let Some((name, _)) = parts.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(format!("encryption.{} must be set", name));
        }

        Ok(format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            self.project_id, self.location_id, self.key_ring_id, self.crypto_key_id
        ))
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Registry.toml (base configuration file)
    /// 2. Environment variables (prefixed with REGISTRY_)
    /// 3. Legacy variable names (DATABASE_URL, GOOGLE_CLOUD_*, VISITOR_SALT, GOOGLE_CLIENT_ID)
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file("Registry.toml").nested())
            // REGISTRY_DATABASE__URL style keys; single underscores stay inside field names.
            .merge(Env::prefixed("REGISTRY_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL"]).map(|_| "database.url".into()))
            .merge(Env::raw().only(&["GOOGLE_CLOUD_PROJECT_ID"]).map(|_| "encryption.project_id".into()))
            .merge(Env::raw().only(&["GOOGLE_CLOUD_LOCATION_ID"]).map(|_| "encryption.location_id".into()))
            .merge(Env::raw().only(&["GOOGLE_CLOUD_KEY_RING_ID"]).map(|_| "encryption.key_ring_id".into()))
            .merge(Env::raw().only(&["GOOGLE_CLOUD_CRYPTO_KEY_ID"]).map(|_| "encryption.crypto_key_id".into()))
            .merge(Env::raw().only(&["VISITOR_SALT"]).map(|_| "tracking.visitor_salt".into()))
            .merge(Env::raw().only(&["GOOGLE_CLIENT_ID"]).map(|_| "oauth.client_id".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encryption_config() -> EncryptionConfig {
        EncryptionConfig {
            project_id: "clinic".to_string(),
            location_id: "asia-northeast3".to_string(),
            key_ring_id: "patients".to_string(),
            crypto_key_id: "identifiers".to_string(),
            ..EncryptionConfig::default()
        }
    }

    #[test]
    fn key_name_joins_all_four_parts() {
        assert_eq!(
            encryption_config().key_name().unwrap(),
            "projects/clinic/locations/asia-northeast3/keyRings/patients/cryptoKeys/identifiers"
        );
    }

    #[test]
    fn key_name_requires_every_part() {
        let mut config = encryption_config();
        config.key_ring_id = " ".to_string();
        let err = config.key_name().unwrap_err();
        assert!(err.contains("key_ring_id"));
    }

    #[test]
    fn defaults_extract_cleanly() {
        let config: Config = Figment::new().merge(Serialized::defaults(Config::default())).extract().unwrap();
        assert_eq!(config.session.ttl_seconds, 10_800);
        assert_eq!(config.tracking.timezone, "Asia/Seoul");
        assert_eq!(config.encryption.backend, KeyBackend::Local);
    }
}
