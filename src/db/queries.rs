pub const CREATE_ZONES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS zones (
    id uuid PRIMARY KEY,
    name text NOT NULL,
    risk_level text NOT NULL,
    description text,
    geometry jsonb NOT NULL,
    active_hours text,
    created_at timestamptz NOT NULL DEFAULT NOW()
);
"#;

pub const CREATE_LIVE_LOCATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS live_locations (
    user_id text PRIMARY KEY,
    latitude float8 NOT NULL,
    longitude float8 NOT NULL,
    heading float8,
    speed float8,
    updated_at timestamptz NOT NULL DEFAULT NOW(),
    source_type text,
    mesh_hop_count int4
);
"#;

pub const SELECT_ZONES: &str = r#"
SELECT id, name, risk_level, description, geometry, active_hours, created_at
FROM zones
ORDER BY created_at ASC, id ASC;
"#;

/// Serializes writers claiming the same trimmed name until the transaction ends.
pub const LOCK_ZONE_NAME: &str = r#"
SELECT pg_advisory_xact_lock(hashtext(btrim($1)));
"#;

/// Inserts only when no zone already carries the trimmed name; returns no row otherwise.
/// Run it after [`LOCK_ZONE_NAME`] in the same transaction.
pub const INSERT_ZONE_UNIQUE: &str = r#"
INSERT INTO zones (id, name, risk_level, description, geometry, active_hours)
SELECT $1, $2, $3, $4, $5, $6
WHERE NOT EXISTS (SELECT 1 FROM zones WHERE btrim(name) = btrim($2))
RETURNING id, name, risk_level, description, geometry, active_hours, created_at;
"#;

pub const DELETE_ZONE: &str = r#"
DELETE FROM zones WHERE id = $1;
"#;

pub const DELETE_ZONES: &str = r#"
DELETE FROM zones WHERE id = ANY($1);
"#;

pub const SELECT_LIVE_LOCATIONS: &str = r#"
SELECT to_jsonb(l) AS row
FROM live_locations l;
"#;
