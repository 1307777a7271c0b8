use crate::config::OAuthConfig;
use crate::error::app_error::AppError;
use crate::models::user::FederatedIdentity;
use serde::Deserialize;
use tracing::warn;

/// Claims returned by Google's tokeninfo endpoint.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Verifies federated ID tokens against the provider's tokeninfo endpoint.
pub struct IdentityVerifier<'a> {
    http: &'a reqwest::Client,
    config: &'a OAuthConfig,
}

impl<'a> IdentityVerifier<'a> {
    pub fn new(http: &'a reqwest::Client, config: &'a OAuthConfig) -> Self {
        IdentityVerifier { http, config }
    }

    pub async fn verify(&self, id_token: &str) -> Result<FederatedIdentity, AppError> {
        let client_id = self
            .config
            .client_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::dependency("Federated login is not configured (oauth.client_id)", None))?;

        let response = self.http.get(&self.config.token_info_url).query(&[("id_token", id_token)]).send().await?;
        let status = response.status();
        if status.is_client_error() {
            warn!(status = %status, "identity provider rejected token");
            return Err(AppError::Unauthorized);
        }
        if !status.is_success() {
            return Err(AppError::dependency(format!("Identity provider returned {}", status), None));
        }

        let info: TokenInfo = response.json().await?;
        identity_from_claims(&self.config.provider, client_id, info)
    }
}

fn identity_from_claims(provider: &str, client_id: &str, info: TokenInfo) -> Result<FederatedIdentity, AppError> {
    if info.aud != client_id {
        warn!(aud = %info.aud, "ID token issued for another audience");
        return Err(AppError::Unauthorized);
    }
    if info.sub.is_empty() {
        return Err(AppError::Unauthorized);
    }

    Ok(FederatedIdentity {
        provider: provider.to_string(),
        subject: info.sub,
        email: info.email,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claims(aud: &str, sub: &str) -> TokenInfo {
        serde_json::from_value(json!({"aud": aud, "sub": sub, "email": "dr@example.org", "exp": "1700000000"})).unwrap()
    }

    #[test]
    fn matching_audience_yields_identity() {
        let identity = identity_from_claims("google", "client-1", claims("client-1", "1234")).unwrap();
        assert_eq!(identity.provider, "google");
        assert_eq!(identity.subject, "1234");
        assert_eq!(identity.email.as_deref(), Some("dr@example.org"));
    }

    #[test]
    fn foreign_audience_or_blank_subject_is_unauthorized() {
        assert!(matches!(identity_from_claims("google", "client-1", claims("client-2", "1234")), Err(AppError::Unauthorized)));
        assert!(matches!(identity_from_claims("google", "client-1", claims("client-1", "")), Err(AppError::Unauthorized)));
    }

    #[rocket::async_test]
    async fn missing_client_id_is_a_configuration_failure() {
        let http = reqwest::Client::new();
        let config = OAuthConfig::default();
        let err = IdentityVerifier::new(&http, &config).verify("token").await.unwrap_err();
        assert!(matches!(err, AppError::Dependency { .. }));
    }
}
