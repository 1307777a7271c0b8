use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::page_view::VisitStats;
use chrono::{DateTime, Utc};

impl PostgresRepository {
    pub async fn record_page_view(&self, path: &str, user_agent: &str, ip_hash: &str) -> Result<(), AppError> {
        sqlx::query("INSERT INTO page_view (path, user_agent, ip_hash) VALUES ($1, $2, $3)")
            .bind(path)
            .bind(user_agent)
            .bind(ip_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Total visits and those since `day_start`.
    pub async fn visit_stats(&self, day_start: DateTime<Utc>) -> Result<VisitStats, AppError> {
        let (daily_visits, total_visits) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE visited_at >= $1),
                COUNT(*)
            FROM page_view
            "#,
        )
        .bind(day_start)
        .fetch_one(&self.pool)
        .await?;

        Ok(VisitStats { daily_visits, total_visits })
    }
}
