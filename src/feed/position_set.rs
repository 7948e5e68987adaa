use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{LivePosition, PositionDelta};

/// Position set shared between a feed task and its readers. Every delta is
/// applied under one write lock, so readers see either the old or the new set.
pub type SharedPositions = Arc<RwLock<PositionSet>>;

/// Current positions keyed by `user_id`, newest arrivals first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSet {
    positions: Vec<LivePosition>,
}

impl PositionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedPositions {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn apply(&mut self, delta: PositionDelta) {
        match delta {
            PositionDelta::Replace(positions) => self.replace(positions),
            PositionDelta::Upsert(position) => self.upsert(position),
            PositionDelta::Remove(user_id) => self.remove(&user_id),
        }
    }

    /// Replaces the whole set. When a batch holds several samples for one
    /// user, the one with the latest `updated_at` wins (ties go to the later row).
    pub fn replace(&mut self, positions: Vec<LivePosition>) {
        let mut index: HashMap<String, usize> = HashMap::with_capacity(positions.len());
        let mut deduped: Vec<LivePosition> = Vec::with_capacity(positions.len());

        for position in positions {
            match index.get(&position.user_id).copied() {
                Some(i) => {
                    if position.updated_at >= deduped[i].updated_at {
                        deduped[i] = position;
                    }
                }
                None => {
                    index.insert(position.user_id.clone(), deduped.len());
                    deduped.push(position);
                }
            }
        }

        self.positions = deduped;
    }

    /// Replaces the entry in place when the user is known, otherwise prepends.
    pub fn upsert(&mut self, position: LivePosition) {
        match self
            .positions
            .iter()
            .position(|p| p.user_id == position.user_id)
        {
            Some(i) => self.positions[i] = position,
            None => self.positions.insert(0, position),
        }
    }

    pub fn remove(&mut self, user_id: &str) {
        self.positions.retain(|p| p.user_id != user_id);
    }

    pub fn get(&self, user_id: &str) -> Option<&LivePosition> {
        self.positions.iter().find(|p| p.user_id == user_id)
    }

    pub fn as_slice(&self) -> &[LivePosition] {
        &self.positions
    }

    pub fn to_vec(&self) -> Vec<LivePosition> {
        self.positions.clone()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Transport;
    use chrono::{Duration, TimeZone, Utc};

    fn sample(user_id: &str, latitude: f64, age_secs: i64) -> LivePosition {
        LivePosition {
            user_id: user_id.to_string(),
            latitude,
            longitude: 79.15,
            heading: None,
            speed: None,
            updated_at: Utc.with_ymd_and_hms(2025, 11, 29, 6, 0, 0).unwrap() - Duration::seconds(age_secs),
            transport: Transport::Direct,
        }
    }

    #[test]
    fn test_upsert_replaces_known_and_prepends_new() {
        let mut set = PositionSet::new();
        set.upsert(sample("a", 1.0, 0));
        set.upsert(sample("b", 2.0, 0));
        assert_eq!(set.as_slice()[0].user_id, "b");

        set.upsert(sample("a", 3.0, 0));
        assert_eq!(set.len(), 2);
        assert_eq!(set.as_slice()[1].user_id, "a");
        assert_eq!(set.get("a").unwrap().latitude, 3.0);
    }

    #[test]
    fn test_replace_keeps_latest_sample_per_user() {
        let mut set = PositionSet::new();
        set.upsert(sample("stale", 0.0, 0));

        set.replace(vec![
            sample("a", 1.0, 10),
            sample("b", 2.0, 0),
            sample("a", 3.0, 0),
            sample("a", 4.0, 20),
            sample("b", 5.0, 0),
        ]);

        assert_eq!(set.len(), 2);
        assert!(set.get("stale").is_none());
        assert_eq!(set.get("a").unwrap().latitude, 3.0);
        assert_eq!(set.get("b").unwrap().latitude, 5.0);
    }

    #[test]
    fn test_apply_remove() {
        let mut set = PositionSet::new();
        set.apply(PositionDelta::Upsert(sample("a", 1.0, 0)));
        set.apply(PositionDelta::Remove("missing".to_string()));
        assert_eq!(set.len(), 1);
        set.apply(PositionDelta::Remove("a".to_string()));
        assert!(set.is_empty());
    }
}
