use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

pub mod position_source;
pub mod queries;
pub mod zone_store;

pub use position_source::PgPositionSource;
pub use zone_store::PgZoneStore;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn ensure_schema(pool: &DbPool) -> Result<()> {
    sqlx::query(queries::CREATE_ZONES_TABLE).execute(pool).await?;
    sqlx::query(queries::CREATE_LIVE_LOCATIONS_TABLE)
        .execute(pool)
        .await?;
    Ok(())
}
