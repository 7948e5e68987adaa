use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{NewZoneRecord, ZoneRecord};

pub mod builtin_zones;
pub mod memory;
pub mod zone_repository;

pub use builtin_zones::{builtin_zones, is_builtin_name};
pub use memory::InMemoryZoneStore;
pub use zone_repository::{zone_from_record, ZoneRepository};

/// Persistence seam for zone records.
#[async_trait]
pub trait ZoneStore: Send + Sync {
    /// All records, oldest first. Dedup keeps the first record per name.
    async fn fetch_all(&self) -> Result<Vec<ZoneRecord>, StoreError>;

    /// Fails with [`StoreError::NameTaken`] without writing when the name exists.
    async fn insert_unique(&self, record: NewZoneRecord) -> Result<ZoneRecord, StoreError>;

    /// Fails with [`StoreError::NotFound`] when no record has the id.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Deletes `delete_ids` and inserts `inserts` as one unit: either every
    /// change is applied or none is.
    async fn reconcile(
        &self,
        delete_ids: &[Uuid],
        inserts: Vec<NewZoneRecord>,
    ) -> Result<Vec<ZoneRecord>, StoreError>;
}
