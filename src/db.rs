use crate::config::DatabaseConfig;
use rocket::fairing::AdHoc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

fn pool_options(db_config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.acquire_timeout))
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800))
}

pub async fn init_pool(db_config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    if db_config.lazy_connect {
        return pool_options(db_config).connect_lazy(&db_config.url);
    }
    pool_options(db_config).connect(&db_config.url).await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn stage_db(db_config: DatabaseConfig) -> AdHoc {
    AdHoc::on_ignite("Postgres (sqlx)", |rocket| async move {
        rocket
            .attach(AdHoc::try_on_ignite("Postgres pool", |rocket| async move {
                let pool = match init_pool(&db_config).await {
                    Ok(pool) => pool,
                    Err(e) => {
                        tracing::error!("Failed to initialize database pool: {}", e);
                        return Err(rocket);
                    }
                };

                if db_config.run_migrations
                    && let Err(e) = run_migrations(&pool).await
                {
                    tracing::error!("Failed to apply database migrations: {}", e);
                    return Err(rocket);
                }

                tracing::info!("Database pool initialized successfully");
                Ok(rocket.manage(pool))
            }))
            .attach(AdHoc::on_shutdown("Postgres shutdown", |rocket| {
                Box::pin(async move {
                    if let Some(pool) = rocket.state::<PgPool>() {
                        pool.close().await;
                        tracing::info!("Database pool closed");
                    }
                })
            }))
    })
}
