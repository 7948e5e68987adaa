use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use super::zone::Coordinate;

/// How a position reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Transport {
    Direct,
    Relayed { hop_count: u32 },
}

/// Latest known position of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePosition {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub updated_at: DateTime<Utc>,
    pub transport: Transport,
}

impl LivePosition {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Raw location row as it arrives from the poll query or a change event.
///
/// Field names vary between producers, so every canonical field has a
/// legacy alias that is only consulted when the canonical one is absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionRecord {
    #[serde(default, deserialize_with = "parse_id_option")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "parse_id_option")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub heading: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub bearing: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub speed: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub hop_count: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub mesh_hop_count: Option<f64>,
}

impl PositionRecord {
    pub fn record_user_id(&self) -> Option<&String> {
        self.user_id.as_ref().or(self.id.as_ref())
    }

    /// Converts the raw row into a [`LivePosition`]. Rows without a user id or
    /// usable coordinates are dropped with a warning.
    pub fn normalize(&self) -> Option<LivePosition> {
        let user_id = match self.record_user_id() {
            Some(id) => id.clone(),
            None => {
                warn!("Location record missing user_id, skipping");
                return None;
            }
        };

        let latitude = self.latitude.or(self.lat);
        let longitude = self.longitude.or(self.lng);
        let (latitude, longitude) = match (latitude, longitude) {
            (Some(lat), Some(lng))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng) =>
            {
                (lat, lng)
            }
            (lat, lng) => {
                warn!(
                    "Location record for {} has unusable coordinates ({:?}, {:?}), skipping",
                    user_id, lat, lng
                );
                return None;
            }
        };

        let heading = self
            .heading
            .or(self.bearing)
            .filter(|h| h.is_finite())
            .map(|h| h.rem_euclid(360.0));
        let speed = self.speed.filter(|s| s.is_finite());

        let updated_at = self
            .updated_at
            .as_ref()
            .or(self.timestamp.as_ref())
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        let transport = match self.source_type.as_deref() {
            Some(kind) if kind.eq_ignore_ascii_case("mesh") => {
                let hops = self.hop_count.or(self.mesh_hop_count).unwrap_or(0.0);
                Transport::Relayed {
                    hop_count: if hops.is_finite() && hops > 0.0 { hops as u32 } else { 0 },
                }
            }
            _ => Transport::Direct,
        };

        Some(LivePosition {
            user_id,
            latitude,
            longitude,
            heading,
            speed,
            updated_at,
            transport,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Row-level change event pushed by the location stream.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionChange {
    #[serde(rename = "eventType")]
    pub event_type: ChangeKind,
    #[serde(default)]
    pub new: Option<PositionRecord>,
    #[serde(default)]
    pub old: Option<PositionRecord>,
}

/// A single mutation of the in-memory position set.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionDelta {
    Replace(Vec<LivePosition>),
    Upsert(LivePosition),
    Remove(String),
}

impl PositionChange {
    pub fn into_delta(self) -> Option<PositionDelta> {
        match self.event_type {
            ChangeKind::Insert | ChangeKind::Update => {
                let record = match self.new {
                    Some(r) => r,
                    None => {
                        warn!("{:?} event without a new record, skipping", self.event_type);
                        return None;
                    }
                };
                record.normalize().map(PositionDelta::Upsert)
            }
            ChangeKind::Delete => {
                let removed = self.old.as_ref().and_then(|r| r.record_user_id().cloned());
                match removed {
                    Some(user_id) => Some(PositionDelta::Remove(user_id)),
                    None => {
                        warn!("DELETE event without a user id, skipping");
                        None
                    }
                }
            }
        }
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(t) = DateTime::parse_from_rfc3339(s) {
                return Some(t.with_timezone(&Utc));
            }
            ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| Utc.from_utc_datetime(&naive))
        }
        Value::Number(n) => {
            let raw = n.as_i64()?;
            // Epoch values above this are milliseconds.
            if raw.abs() > 100_000_000_000 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        _ => None,
    }
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

fn parse_id_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<Value> = Option::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
