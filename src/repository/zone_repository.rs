use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

use super::builtin_zones::{find_builtin, BUILTIN_ZONES};
use super::ZoneStore;
use crate::error::ZoneError;
use crate::geofence::geometry::{build_polygon, centroid_and_radius, DEFAULT_POINT_COUNT};
use crate::models::zone::{name_key, StoredShape, ZoneGeometry, DEFAULT_CENTER, DEFAULT_RADIUS_M};
use crate::models::{ActiveWindow, NewZoneRecord, Severity, Zone, ZoneDraft, ZoneRecord};

/// Zone lifecycle on top of a [`ZoneStore`].
///
/// `load` is self-healing: it keeps one zone per name, deletes surplus
/// records and inserts any missing built-in zone, so repeated calls converge
/// on the same set without further writes.
pub struct ZoneRepository<S> {
    store: S,
    point_count: usize,
}

impl<S: ZoneStore> ZoneRepository<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            point_count: DEFAULT_POINT_COUNT,
        }
    }

    pub fn with_point_count(mut self, point_count: usize) -> Self {
        self.point_count = point_count;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn load(&self) -> Result<Vec<Zone>, ZoneError> {
        let records = self.store.fetch_all().await?;

        let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
        let mut zones = Vec::with_capacity(records.len());
        let mut surplus = Vec::new();

        for record in &records {
            if !seen.insert(name_key(&record.name).to_string()) {
                warn!(
                    "Duplicate zone '{}' ({}), scheduling for deletion",
                    record.name, record.id
                );
                surplus.push(record.id);
                continue;
            }
            zones.push(zone_from_record(record));
        }

        let missing = self.missing_builtins(&seen)?;

        if surplus.is_empty() && missing.is_empty() {
            return Ok(zones);
        }

        info!(
            "Reconciling zones: deleting {} duplicate(s), seeding {} built-in zone(s)",
            surplus.len(),
            missing.len()
        );
        let inserted = self.store.reconcile(&surplus, missing).await?;
        zones.extend(inserted.iter().map(zone_from_record));

        Ok(zones)
    }

    pub async fn add(&self, draft: ZoneDraft) -> Result<Zone, ZoneError> {
        let name = name_key(&draft.name);
        if name.is_empty() {
            return Err(ZoneError::Validation("zone name must not be empty".to_string()));
        }
        if !(-90.0..=90.0).contains(&draft.center.latitude)
            || !(-180.0..=180.0).contains(&draft.center.longitude)
        {
            return Err(ZoneError::Validation(format!(
                "center ({}, {}) is not a valid coordinate",
                draft.center.latitude, draft.center.longitude
            )));
        }
        if find_builtin(name).is_some() {
            return Err(ZoneError::Conflict(name.to_string()));
        }

        let radius_m = draft.radius_m.unwrap_or(DEFAULT_RADIUS_M);
        let ring = build_polygon(draft.center, radius_m, self.point_count)?;

        let zone = Zone::new(Uuid::new_v4(), name, draft.center, radius_m, draft.severity)
            .with_description(draft.description)
            .with_active_window(draft.active_window);

        let record = self
            .store
            .insert_unique(NewZoneRecord::from_zone(&zone, &ring))
            .await?;
        info!("Added zone '{}' ({})", record.name, record.id);

        Ok(zone_from_record(&record))
    }

    pub async fn remove(&self, zone_id: Uuid) -> Result<(), ZoneError> {
        let records = self.store.fetch_all().await?;
        let record = records
            .iter()
            .find(|r| r.id == zone_id)
            .ok_or(ZoneError::NotFound(zone_id))?;

        if find_builtin(&record.name).is_some() {
            warn!("Refusing to delete built-in zone '{}'", record.name);
            return Err(ZoneError::Protected(record.name.clone()));
        }

        self.store.delete(zone_id).await?;
        info!("Deleted zone '{}' ({})", record.name, zone_id);
        Ok(())
    }

    fn missing_builtins(&self, present: &HashSet<String>) -> Result<Vec<NewZoneRecord>, ZoneError> {
        BUILTIN_ZONES
            .iter()
            .filter(|b| !present.contains(b.name))
            .map(|b| -> Result<NewZoneRecord, ZoneError> {
                let zone = b.to_zone();
                let ring = build_polygon(zone.center, zone.radius_m, self.point_count)?;
                Ok(NewZoneRecord::from_zone(&zone, &ring))
            })
            .collect()
    }
}

/// Translates a stored record into the canonical [`Zone`].
///
/// Unreadable geometry falls back to the default center and radius rather
/// than failing the whole load.
pub fn zone_from_record(record: &ZoneRecord) -> Zone {
    let builtin = find_builtin(&record.name);

    let severity = Severity::from_risk_level(&record.risk_level).unwrap_or_else(|| {
        warn!(
            "Zone '{}' has unknown risk level '{}', treating as moderate",
            record.name, record.risk_level
        );
        Severity::Moderate
    });

    let (center, radius_m) = match ZoneGeometry::parse(&record.geometry.0) {
        Some(StoredShape::Ring(ring)) => match centroid_and_radius(&ring) {
            Ok(shape) => shape,
            Err(e) => {
                warn!("Zone '{}' polygon unreadable: {}", record.name, e);
                (DEFAULT_CENTER, DEFAULT_RADIUS_M)
            }
        },
        Some(StoredShape::Point(center)) => {
            (center, builtin.map_or(DEFAULT_RADIUS_M, |b| b.radius_m))
        }
        None => {
            warn!(
                "Zone '{}' has malformed geometry, using default center and radius",
                record.name
            );
            (DEFAULT_CENTER, DEFAULT_RADIUS_M)
        }
    };

    let active_window = record
        .active_hours
        .as_deref()
        .map(str::trim)
        .filter(|raw| !raw.is_empty())
        .and_then(|raw| {
            let window = ActiveWindow::parse(raw);
            if window.is_none() {
                warn!(
                    "Zone '{}' has unreadable active hours '{}', treating as always active",
                    record.name, raw
                );
            }
            window
        });

    let zone = Zone::new(record.id, record.name.trim(), center, radius_m, severity)
        .with_description(record.description.clone().unwrap_or_default())
        .with_active_window(active_window);

    if builtin.is_some() {
        zone.builtin()
    } else {
        zone
    }
}
