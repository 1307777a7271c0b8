use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::user::{CredentialSummary, FederatedIdentity, PasswordAuth, User};
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::sync::LazyLock;
use uuid::Uuid;

/// A real Argon2 hash computed once, verified against when the username is
/// unknown so both login failures cost the same.
static DUMMY_HASH: LazyLock<Option<String>> = LazyLock::new(|| hash_password("dummy-never-matches").ok());

pub(crate) fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

impl PostgresRepository {
    pub async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, is_site_admin, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_password_auth(&self, username: &str) -> Result<Option<PasswordAuth>, AppError> {
        let auth = sqlx::query_as::<_, PasswordAuth>(
            r#"
            SELECT user_id, username, hash
            FROM password_auth
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(auth)
    }

    pub fn verify_password(auth: &PasswordAuth, password: &str) -> Result<(), AppError> {
        let stored = PasswordHash::new(&auth.hash).map_err(|e| AppError::password_hash("Failed to parse stored password hash", e))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored)
            .map_err(|_| AppError::InvalidCredentials)
    }

    pub fn dummy_verify(password: &str) {
        if let Some(hash) = DUMMY_HASH.as_deref()
            && let Ok(hash) = PasswordHash::new(hash)
        {
            let _ = Argon2::default().verify_password(password.as_bytes(), &hash);
        }
    }

    /// Creates a user together with its password credential.
    pub async fn create_password_user(&self, username: &str, password: &str) -> Result<User, AppError> {
        let hash = hash_password(password)?;
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>("INSERT INTO users DEFAULT VALUES RETURNING id, is_site_admin, created_at")
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO password_auth (user_id, username, hash) VALUES ($1, $2, $3)")
            .bind(user.id)
            .bind(username)
            .bind(&hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn update_password(&self, user_id: &Uuid, password: &str) -> Result<(), AppError> {
        let hash = hash_password(password)?;
        let result = sqlx::query("UPDATE password_auth SET hash = $1 WHERE user_id = $2")
            .bind(&hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Password credential not found".to_string()));
        }
        Ok(())
    }

    pub async fn get_credential_summary(&self, user_id: &Uuid) -> Result<CredentialSummary, AppError> {
        let summary = sqlx::query_as::<_, CredentialSummary>(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM password_auth WHERE user_id = $1) AS has_password,
                EXISTS (SELECT 1 FROM oauth_auth WHERE user_id = $1) AS has_oauth
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    pub async fn find_user_by_identity(&self, identity: &FederatedIdentity) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.is_site_admin, u.created_at
            FROM oauth_auth o
            JOIN users u ON u.id = o.user_id
            WHERE o.provider = $1 AND o.subject = $2
            "#,
        )
        .bind(&identity.provider)
        .bind(&identity.subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Creates a user whose only credential is the federated identity.
    pub async fn create_oauth_user(&self, identity: &FederatedIdentity) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>("INSERT INTO users DEFAULT VALUES RETURNING id, is_site_admin, created_at")
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO oauth_auth (user_id, provider, subject, email) VALUES ($1, $2, $3, $4)")
            .bind(user.id)
            .bind(&identity.provider)
            .bind(&identity.subject)
            .bind(&identity.email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn link_oauth(&self, user_id: &Uuid, identity: &FederatedIdentity) -> Result<(), AppError> {
        sqlx::query("INSERT INTO oauth_auth (user_id, provider, subject, email) VALUES ($1, $2, $3, $4)")
            .bind(user_id)
            .bind(&identity.provider)
            .bind(&identity.subject)
            .bind(&identity.email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Removes the federated credential unless it is the user's last one.
    pub async fn unlink_oauth(&self, user_id: &Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent credential removals for the same user.
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let summary = sqlx::query_as::<_, CredentialSummary>(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM password_auth WHERE user_id = $1) AS has_password,
                EXISTS (SELECT 1 FROM oauth_auth WHERE user_id = $1) AS has_oauth
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if !summary.has_oauth {
            return Err(AppError::NotFound("Federated credential not found".to_string()));
        }
        if summary.count() <= 1 {
            return Err(AppError::BadRequest("Cannot remove the last credential".to_string()));
        }

        sqlx::query("DELETE FROM oauth_auth WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
