use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use uuid::Uuid;

impl PostgresRepository {
    pub async fn list_linked_patient_ids(&self, user_id: &Uuid) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT patient_id FROM user_patient WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids)
    }

    /// Links are idempotent; linking twice keeps the first row.
    pub async fn link_patient(&self, user_id: &Uuid, patient_id: &Uuid) -> Result<(), AppError> {
        sqlx::query("INSERT INTO user_patient (user_id, patient_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(user_id)
            .bind(patient_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Removing a link that does not exist is not an error.
    pub async fn unlink_patient(&self, user_id: &Uuid, patient_id: &Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_patient WHERE user_id = $1 AND patient_id = $2")
            .bind(user_id)
            .bind(patient_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::{create_hospital, create_patient, create_user, test_repository};

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn link_and_unlink_are_idempotent() {
        let repo = test_repository().await;
        let user = create_user(&repo, false).await;
        let patient = create_patient(&repo, create_hospital(&repo).await, None).await;

        repo.link_patient(&user.id, &patient).await.unwrap();
        repo.link_patient(&user.id, &patient).await.unwrap();
        assert_eq!(repo.list_linked_patient_ids(&user.id).await.unwrap(), vec![patient]);

        repo.unlink_patient(&user.id, &patient).await.unwrap();
        repo.unlink_patient(&user.id, &patient).await.unwrap();
        assert!(repo.list_linked_patient_ids(&user.id).await.unwrap().is_empty());
    }
}
