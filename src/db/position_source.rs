use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::Row;
use tracing::warn;

use super::{queries, DbPool};
use crate::error::StoreError;
use crate::feed::PositionSource;
use crate::models::PositionRecord;

/// Reads the `live_locations` table as JSON rows so that column naming
/// differences are handled by the same normalization as pushed events.
#[derive(Clone)]
pub struct PgPositionSource {
    pool: DbPool,
}

impl PgPositionSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PositionSource for PgPositionSource {
    async fn fetch_positions(&self) -> Result<Vec<PositionRecord>, StoreError> {
        let rows = sqlx::query(queries::SELECT_LIVE_LOCATIONS)
            .fetch_all(&self.pool)
            .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let Json(value): Json<Value> = row.try_get("row")?;
            match serde_json::from_value::<PositionRecord>(value) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Failed to parse live location row: {}", e),
            }
        }
        Ok(records)
    }
}
