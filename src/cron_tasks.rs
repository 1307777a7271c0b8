use crate::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::db::init_pool;

/// Removes every session whose `valid_until` has passed. Expired sessions are
/// also dropped lazily on lookup; this catches the ones nobody presents again.
pub async fn purge_expired_sessions(config: &Config) -> Result<u64, String> {
    let pool = init_pool(&config.database)
        .await
        .map_err(|err| format!("Failed to initialize database pool: {err}"))?;

    let repo = PostgresRepository { pool: pool.clone() };
    let result = repo
        .delete_expired_sessions()
        .await
        .map_err(|err| format!("Failed to purge expired sessions: {err:?}"));

    pool.close().await;
    result
}
