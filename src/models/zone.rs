use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;
use tracing::warn;
use uuid::Uuid;

/// Radius applied when a zone carries none, or an unusable one.
pub const DEFAULT_RADIUS_M: f64 = 200.0;

/// Fallback center for zones whose stored geometry cannot be read (VIT Vellore).
pub const DEFAULT_CENTER: Coordinate = Coordinate {
    latitude: 12.9692,
    longitude: 79.1559,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Zone risk severity. Declaration order gives `High > Moderate > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Moderate,
    High,
}

impl Severity {
    /// Maps the persisted `risk_level` colour to a severity.
    pub fn from_risk_level(level: &str) -> Option<Self> {
        match level.trim().to_lowercase().as_str() {
            "red" => Some(Severity::High),
            "yellow" => Some(Severity::Moderate),
            "green" => Some(Severity::Low),
            _ => None,
        }
    }

    pub fn risk_level(&self) -> &'static str {
        match self {
            Severity::High => "red",
            Severity::Moderate => "yellow",
            Severity::Low => "green",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::High => "HIGH",
            Severity::Moderate => "MODERATE",
            Severity::Low => "LOW",
        };
        f.write_str(label)
    }
}

/// Hours of the day during which a zone is considered active.
///
/// The window covers `[start_hour, end_hour)` and wraps past midnight when
/// `start_hour > end_hour`. Equal bounds mean the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl ActiveWindow {
    /// Parses the persisted `"HH-HH"` form, e.g. `"18-06"`. An end of `24` is read as midnight.
    pub fn parse(raw: &str) -> Option<Self> {
        let (start, end) = raw.trim().split_once('-')?;
        let start: u8 = start.trim().parse().ok()?;
        let end: u8 = end.trim().parse().ok()?;
        if start > 23 || end > 24 {
            return None;
        }
        Some(Self {
            start_hour: start,
            end_hour: end % 24,
        })
    }

    pub fn contains(&self, hour: u32) -> bool {
        let hour = hour % 24;
        let start = u32::from(self.start_hour);
        let end = u32::from(self.end_hour);
        if start == end {
            true
        } else if start < end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    pub fn to_hours_string(&self) -> String {
        format!("{:02}-{:02}", self.start_hour, self.end_hour)
    }
}

/// Coarse time-of-day filter: day is 06-18, night is 18-06.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeMode {
    Day,
    Night,
    All,
}

impl ActiveWindow {
    /// Night windows start at or after 18:00 or end by 06:00. Day windows lie within 06-18.
    pub fn matches_mode(&self, mode: TimeMode) -> bool {
        let (start, end) = (self.start_hour, self.end_hour);
        match mode {
            TimeMode::All => true,
            TimeMode::Night => start >= 18 || end <= 6,
            TimeMode::Day => (6..18).contains(&start) && (6..=18).contains(&end),
        }
    }
}

/// Zone counts per severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ZoneStats {
    pub total: usize,
    pub high: usize,
    pub moderate: usize,
    pub low: usize,
}

/// Canonical zone shape handed to the evaluator and to renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: Uuid,
    pub name: String,
    pub center: Coordinate,
    pub radius_m: f64,
    pub severity: Severity,
    pub description: String,
    pub active_window: Option<ActiveWindow>,
    pub is_builtin: bool,
}

impl Zone {
    /// Builds a zone, clamping an unusable radius to [`DEFAULT_RADIUS_M`].
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        center: Coordinate,
        radius_m: f64,
        severity: Severity,
    ) -> Self {
        let name = name.into();
        Self {
            radius_m: sanitize_radius(&name, radius_m),
            id,
            name,
            center,
            severity,
            description: String::new(),
            active_window: None,
            is_builtin: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_active_window(mut self, window: Option<ActiveWindow>) -> Self {
        self.active_window = window;
        self
    }

    pub fn builtin(mut self) -> Self {
        self.is_builtin = true;
        self
    }
}

/// Identity of a zone name. Two zones whose keys match are the same zone.
pub fn name_key(name: &str) -> &str {
    name.trim()
}

/// Zero is a legal radius (matches only the exact center). Negative and
/// non-finite values fall back to the default.
pub fn sanitize_radius(zone_name: &str, radius_m: f64) -> f64 {
    if radius_m.is_finite() && radius_m >= 0.0 {
        radius_m
    } else {
        warn!(
            "Zone '{}' has unusable radius {}, using {} m",
            zone_name, radius_m, DEFAULT_RADIUS_M
        );
        DEFAULT_RADIUS_M
    }
}

/// Input for creating a user-defined zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneDraft {
    pub name: String,
    pub center: Coordinate,
    #[serde(default)]
    pub radius_m: Option<f64>,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub active_window: Option<ActiveWindow>,
}

/// Row of the `zones` table.
#[derive(Debug, Clone, FromRow)]
pub struct ZoneRecord {
    pub id: Uuid,
    pub name: String,
    pub risk_level: String,
    pub description: Option<String>,
    pub geometry: Json<Value>,
    pub active_hours: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A zone row about to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct NewZoneRecord {
    pub id: Uuid,
    pub name: String,
    pub risk_level: String,
    pub description: String,
    pub geometry: Value,
    pub active_hours: Option<String>,
}

impl NewZoneRecord {
    /// Persists a zone as a GeoJSON polygon ring.
    pub fn from_zone(zone: &Zone, ring: &[[f64; 2]]) -> Self {
        Self {
            id: zone.id,
            name: zone.name.clone(),
            risk_level: zone.severity.risk_level().to_string(),
            description: zone.description.clone(),
            geometry: serde_json::json!({
                "type": "Polygon",
                "coordinates": [ring],
            }),
            active_hours: zone.active_window.map(|w| w.to_hours_string()),
        }
    }

    pub fn into_record(self, created_at: DateTime<Utc>) -> ZoneRecord {
        ZoneRecord {
            id: self.id,
            name: self.name,
            risk_level: self.risk_level,
            description: Some(self.description),
            geometry: Json(self.geometry),
            active_hours: self.active_hours,
            created_at,
        }
    }
}

/// GeoJSON geometry as stored on a zone. A `Feature` wrapper is unwrapped.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ZoneGeometry {
    Point { coordinates: Vec<f64> },
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    Feature { geometry: Box<ZoneGeometry> },
}

/// Readable shape of a stored geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredShape {
    Point(Coordinate),
    Ring(Vec<[f64; 2]>),
}

impl ZoneGeometry {
    pub fn parse(value: &Value) -> Option<StoredShape> {
        let geometry: ZoneGeometry = serde_json::from_value(value.clone()).ok()?;
        geometry.into_shape()
    }

    fn into_shape(self) -> Option<StoredShape> {
        match self {
            ZoneGeometry::Feature { geometry } => geometry.into_shape(),
            ZoneGeometry::Point { coordinates } => {
                let position = lng_lat(&coordinates)?;
                Some(StoredShape::Point(Coordinate::new(position[1], position[0])))
            }
            ZoneGeometry::Polygon { coordinates } => {
                let outer = coordinates.into_iter().next()?;
                let ring = outer
                    .iter()
                    .map(|p| lng_lat(p))
                    .collect::<Option<Vec<_>>>()?;
                if ring.is_empty() {
                    None
                } else {
                    Some(StoredShape::Ring(ring))
                }
            }
        }
    }
}

fn lng_lat(position: &[f64]) -> Option<[f64; 2]> {
    match position {
        [lng, lat, ..] if lng.is_finite() && lat.is_finite() => Some([*lng, *lat]),
        _ => None,
    }
}
