use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::session::Session;
use aes_gcm::aead::{OsRng, rand_core::RngCore};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

const SESSION_KEY_BYTES: usize = 48;

/// 48 random bytes, hex encoded.
pub fn generate_session_key() -> String {
    let mut bytes = [0u8; SESSION_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl PostgresRepository {
    pub async fn create_session(&self, user_id: &Uuid, ttl: Duration) -> Result<Session, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO session (session_key, user_id, valid_until)
            VALUES ($1, $2, $3)
            RETURNING id, session_key, user_id, valid_until, created_at
            "#,
        )
        .bind(generate_session_key())
        .bind(user_id)
        .bind(Utc::now() + ttl)
        .fetch_one(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn get_session_by_key(&self, session_key: &str) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, session_key, user_id, valid_until, created_at
            FROM session
            WHERE session_key = $1
            "#,
        )
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn refresh_session(&self, session_id: &Uuid, valid_until: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query("UPDATE session SET valid_until = $1 WHERE id = $2")
            .bind(valid_until)
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_session(&self, session_id: &Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM session WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_expired_sessions(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM session WHERE valid_until < now()").execute(&self.pool).await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_user, test_repository};

    #[test]
    fn session_keys_are_96_hex_chars_and_unique() {
        let first = generate_session_key();
        let second = generate_session_key();
        assert_eq!(first.len(), 96);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn create_lookup_refresh_delete() {
        let repo = test_repository().await;
        let user = create_user(&repo, false).await;

        let session = repo.create_session(&user.id, Duration::hours(3)).await.unwrap();
        let found = repo.get_session_by_key(&session.session_key).await.unwrap().unwrap();
        assert_eq!(found.id, session.id);

        let later = Utc::now() + Duration::hours(5);
        repo.refresh_session(&session.id, later).await.unwrap();
        let refreshed = repo.get_session_by_key(&session.session_key).await.unwrap().unwrap();
        assert!(refreshed.valid_until > session.valid_until);

        repo.delete_session(&session.id).await.unwrap();
        assert!(repo.get_session_by_key(&session.session_key).await.unwrap().is_none());
    }
}
