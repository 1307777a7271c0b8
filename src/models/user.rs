use chrono::{DateTime, Utc};
use rocket::serde::Deserialize;
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub is_site_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct PasswordAuth {
    pub user_id: Uuid,
    pub username: String,
    pub hash: String,
}

/// Which credentials a user currently holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct CredentialSummary {
    pub has_password: bool,
    pub has_oauth: bool,
}

impl CredentialSummary {
    pub fn count(&self) -> usize {
        usize::from(self.has_password) + usize::from(self.has_oauth)
    }
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct PasswordLoginRequest {
    pub username: String,
    pub password: String,
}

impl PasswordLoginRequest {
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct PasswordAuthRequest {
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[validate(length(min = 8, max = 256))]
    pub password: String,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct PasswordUpdateRequest {
    #[validate(length(min = 8, max = 256))]
    pub password: String,
}

/// A federated identity token (an OpenID Connect ID token).
#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct OAuthTokenRequest {
    #[validate(length(min = 1))]
    pub id_token: String,
}

/// The verified claims taken from a federated identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    pub provider: String,
    pub subject: String,
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_request_requires_both_fields() {
        let request = PasswordLoginRequest {
            username: "doctor".to_string(),
            password: String::new(),
        };
        assert!(!request.is_complete());

        let request = PasswordLoginRequest {
            username: "doctor".to_string(),
            password: "secret".to_string(),
        };
        assert!(request.is_complete());
    }

    #[test]
    fn credential_count() {
        assert_eq!(CredentialSummary::default().count(), 0);
        assert_eq!(
            CredentialSummary {
                has_password: true,
                has_oauth: true
            }
            .count(),
            2
        );
    }

    #[test]
    fn short_passwords_are_rejected() {
        let request = PasswordAuthRequest {
            username: "doctor".to_string(),
            password: "short".to_string(),
        };
        assert!(request.validate().is_err());
    }
}
