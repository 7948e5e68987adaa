use thiserror::Error;
use uuid::Uuid;

/// Failures while synthesizing or reading back zone polygons.
#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Invalid geometry: radius must be a positive finite number of meters, got {0}")]
    InvalidRadius(f64),

    #[error("Invalid geometry: radius {0} m is beyond the planar approximation limit")]
    RadiusTooLarge(f64),

    #[error("Invalid geometry: a ring needs at least 3 points, got {0}")]
    TooFewPoints(usize),

    #[error("Invalid geometry: center latitude {0} is too close to a pole for a planar ring")]
    PolarCenter(f64),

    #[error("Invalid geometry: ring has no vertices")]
    EmptyRing,
}

/// Errors surfaced by a zone or position store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Zone name already taken: {0}")]
    NameTaken(String),

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    #[error("Malformed record: {0}")]
    Malformed(String),
}

/// Errors surfaced by the zone repository.
#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("Conflict: a zone named '{0}' already exists")]
    Conflict(String),

    #[error("Protected: built-in zone '{0}' cannot be deleted")]
    Protected(String),

    #[error("Zone not found: {0}")]
    NotFound(Uuid),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    InvalidGeometry(#[from] GeometryError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ZoneError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NameTaken(name) => ZoneError::Conflict(name),
            StoreError::NotFound(id) => ZoneError::NotFound(id),
            other => ZoneError::Store(other),
        }
    }
}

/// Lifecycle errors of a location feed.
#[derive(Debug, Error, PartialEq)]
pub enum FeedError {
    #[error("Location feed already started")]
    AlreadyStarted,

    #[error("Location feed has been stopped and cannot be restarted")]
    Stopped,
}
