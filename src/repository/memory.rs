use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::ZoneStore;
use crate::error::StoreError;
use crate::models::zone::name_key;
use crate::models::{NewZoneRecord, ZoneRecord};

/// Process-local zone store, for deployments without a database and for tests.
///
/// Keeps insertion order and counts every write.
#[derive(Default)]
pub struct InMemoryZoneStore {
    records: Mutex<Vec<ZoneRecord>>,
    inserts: AtomicUsize,
    deletes: AtomicUsize,
}

impl InMemoryZoneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from existing rows, duplicates included.
    pub fn with_records(records: Vec<ZoneRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl ZoneStore for InMemoryZoneStore {
    async fn fetch_all(&self) -> Result<Vec<ZoneRecord>, StoreError> {
        Ok(self.records.lock().await.clone())
    }

    async fn insert_unique(&self, record: NewZoneRecord) -> Result<ZoneRecord, StoreError> {
        let mut records = self.records.lock().await;
        if records
            .iter()
            .any(|r| name_key(&r.name) == name_key(&record.name))
        {
            return Err(StoreError::NameTaken(record.name));
        }

        let row = record.into_record(Utc::now());
        records.push(row.clone());
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(row)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(StoreError::NotFound(id));
        }
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reconcile(
        &self,
        delete_ids: &[Uuid],
        inserts: Vec<NewZoneRecord>,
    ) -> Result<Vec<ZoneRecord>, StoreError> {
        let mut records = self.records.lock().await;

        let mut names: HashSet<String> = records
            .iter()
            .filter(|r| !delete_ids.contains(&r.id))
            .map(|r| name_key(&r.name).to_string())
            .collect();
        // Validate everything before touching the rows.
        for record in &inserts {
            if !names.insert(name_key(&record.name).to_string()) {
                return Err(StoreError::NameTaken(record.name.clone()));
            }
        }

        let before = records.len();
        records.retain(|r| !delete_ids.contains(&r.id));
        self.deletes
            .fetch_add(before - records.len(), Ordering::SeqCst);

        let now = Utc::now();
        let inserted: Vec<ZoneRecord> = inserts.into_iter().map(|r| r.into_record(now)).collect();
        records.extend(inserted.iter().cloned());
        self.inserts.fetch_add(inserted.len(), Ordering::SeqCst);

        Ok(inserted)
    }
}
