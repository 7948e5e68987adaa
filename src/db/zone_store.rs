use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgConnection;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::{queries, DbPool};
use crate::error::StoreError;
use crate::models::zone::name_key;
use crate::models::{NewZoneRecord, ZoneRecord};
use crate::repository::ZoneStore;

/// `zones` table backed store.
///
/// Every write that claims a name holds a transaction-scoped advisory lock on
/// it, so concurrent writers of the same name cannot both pass the
/// uniqueness check.
#[derive(Clone)]
pub struct PgZoneStore {
    pool: DbPool,
}

impl PgZoneStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Distinct name keys in lock order. A fixed order keeps two writers from
/// deadlocking on each other's names.
fn lock_order(records: &[NewZoneRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| name_key(&r.name).to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

async fn claim_names(conn: &mut PgConnection, names: &[String]) -> Result<(), StoreError> {
    for name in names {
        sqlx::query(queries::LOCK_ZONE_NAME)
            .bind(name)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_locked(
    conn: &mut PgConnection,
    record: &NewZoneRecord,
) -> Result<Option<ZoneRecord>, StoreError> {
    let row = sqlx::query_as::<_, ZoneRecord>(queries::INSERT_ZONE_UNIQUE)
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.risk_level)
        .bind(&record.description)
        .bind(Json(&record.geometry))
        .bind(&record.active_hours)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

#[async_trait]
impl ZoneStore for PgZoneStore {
    async fn fetch_all(&self) -> Result<Vec<ZoneRecord>, StoreError> {
        let records = sqlx::query_as::<_, ZoneRecord>(queries::SELECT_ZONES)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    async fn insert_unique(&self, record: NewZoneRecord) -> Result<ZoneRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        claim_names(&mut *tx, &lock_order(std::slice::from_ref(&record))).await?;

        match insert_locked(&mut *tx, &record).await? {
            Some(row) => {
                tx.commit().await?;
                Ok(row)
            }
            None => Err(StoreError::NameTaken(record.name)),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(queries::DELETE_ZONE)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn reconcile(
        &self,
        delete_ids: &[Uuid],
        inserts: Vec<NewZoneRecord>,
    ) -> Result<Vec<ZoneRecord>, StoreError> {
        let mut tx = self.pool.begin().await?;
        claim_names(&mut *tx, &lock_order(&inserts)).await?;

        if !delete_ids.is_empty() {
            sqlx::query(queries::DELETE_ZONES)
                .bind(delete_ids.to_vec())
                .execute(&mut *tx)
                .await?;
        }

        let mut inserted = Vec::with_capacity(inserts.len());
        for record in inserts {
            match insert_locked(&mut *tx, &record).await? {
                Some(row) => inserted.push(row),
                // Dropping the transaction rolls back the deletes above.
                None => return Err(StoreError::NameTaken(record.name)),
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, Severity, Zone};

    fn new_record(name: &str) -> NewZoneRecord {
        let zone = Zone::new(Uuid::new_v4(), name, Coordinate::new(12.96, 79.15), 100.0, Severity::Low);
        NewZoneRecord::from_zone(&zone, &[[79.15, 12.96]])
    }

    #[test]
    fn test_lock_order_is_sorted_and_trimmed() {
        let records = vec![new_record("Vellore Fort "), new_record(" Ariyur"), new_record("Ariyur")];
        assert_eq!(lock_order(&records), vec!["Ariyur".to_string(), "Vellore Fort".to_string()]);
    }

    #[test]
    fn test_name_checks_compare_trimmed_names_under_a_lock() {
        assert!(queries::LOCK_ZONE_NAME.contains("pg_advisory_xact_lock(hashtext(btrim($1)))"));
        assert!(queries::INSERT_ZONE_UNIQUE.contains("btrim(name) = btrim($2)"));
    }
}
