//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::RegistryError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), RegistryError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, RegistryError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    ).map_err(|e| RegistryError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

/// Set schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), RegistryError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| RegistryError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| RegistryError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &Connection) -> Result<(), RegistryError> {
    conn.execute_batch(DIRECTORY_SCHEMA)
        .map_err(|e| RegistryError::Internal(format!("Failed to create directory tables: {}", e)))?;

    conn.execute_batch(CONTENT_SCHEMA)
        .map_err(|e| RegistryError::Internal(format!("Failed to create content tables: {}", e)))?;

    conn.execute_batch(SURVEY_SCHEMA)
        .map_err(|e| RegistryError::Internal(format!("Failed to create survey tables: {}", e)))?;

    conn.execute_batch(PETITION_SCHEMA)
        .map_err(|e| RegistryError::Internal(format!("Failed to create petition tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| RegistryError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), RegistryError> {
    // Add migration steps here as schema evolves
    match from_version {
        _ => {}
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Principals and units schema
const DIRECTORY_SCHEMA: &str = r#"
-- Actors. Never deleted; disabled via is_active.
CREATE TABLE IF NOT EXISTS principals (
    id TEXT PRIMARY KEY NOT NULL,
    display_name TEXT NOT NULL,

    -- admin | aamil | moze_coordinator | doctor | student | other
    role TEXT NOT NULL DEFAULT 'other',

    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Organizational units (Moze). Management relationships live here:
-- a principal manages a unit iff it appears in a staffing column.
CREATE TABLE IF NOT EXISTS units (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,

    aamil_id TEXT,
    coordinator_id TEXT,

    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Content schema - photos, albums, comments, likes over one shape
const CONTENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS content (
    id TEXT PRIMARY KEY NOT NULL,
    kind TEXT NOT NULL DEFAULT 'photo',
    title TEXT NOT NULL,
    body TEXT,

    owner_id TEXT NOT NULL,
    unit_id TEXT,

    -- Comment/like target or album membership
    parent_id TEXT,

    is_public INTEGER NOT NULL DEFAULT 0,

    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Surveys and responses schema
const SURVEY_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS surveys (
    id TEXT PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    description TEXT,

    -- Ordered question definitions (serialized Vec<Question>)
    questions_json TEXT NOT NULL,

    -- Respondent role filter; NULL accepts every role
    target_role TEXT,

    -- Availability window (RFC 3339); NULL bounds are open
    opens_at TEXT,
    closes_at TEXT,

    is_anonymous INTEGER NOT NULL DEFAULT 0,
    allow_multiple_responses INTEGER NOT NULL DEFAULT 0,

    -- Externally supplied invitation count for response-rate computation
    invited_count INTEGER,

    created_by TEXT NOT NULL,
    unit_id TEXT,
    is_public INTEGER NOT NULL DEFAULT 1,

    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS survey_responses (
    id TEXT PRIMARY KEY NOT NULL,
    survey_id TEXT NOT NULL,

    -- NULL for anonymous surveys
    respondent_id TEXT,

    -- Map question-id -> answer value (scalar or list)
    answers_json TEXT NOT NULL,

    is_complete INTEGER NOT NULL DEFAULT 0,
    completion_time_secs REAL,

    created_at TEXT NOT NULL DEFAULT (datetime('now')),

    FOREIGN KEY (survey_id) REFERENCES surveys(id) ON DELETE CASCADE
);
"#;

/// Petitions (Araz) schema
const PETITION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS petitions (
    id TEXT PRIMARY KEY NOT NULL,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,

    petitioner_id TEXT NOT NULL,
    unit_id TEXT,

    -- pending | in_review | resolved | rejected
    status TEXT NOT NULL DEFAULT 'pending',

    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Index definitions for fast queries
const INDEXES_SCHEMA: &str = r#"
-- Staffing lookups (managed-unit derivation)
CREATE INDEX IF NOT EXISTS idx_units_aamil ON units(aamil_id);
CREATE INDEX IF NOT EXISTS idx_units_coordinator ON units(coordinator_id);

-- Content visibility filters
CREATE INDEX IF NOT EXISTS idx_content_owner ON content(owner_id);
CREATE INDEX IF NOT EXISTS idx_content_unit ON content(unit_id);
CREATE INDEX IF NOT EXISTS idx_content_public ON content(is_public);
CREATE INDEX IF NOT EXISTS idx_content_kind ON content(kind);
CREATE INDEX IF NOT EXISTS idx_content_parent ON content(parent_id);
CREATE INDEX IF NOT EXISTS idx_content_created_at ON content(created_at);

-- Survey lookups
CREATE INDEX IF NOT EXISTS idx_surveys_owner ON surveys(created_by);
CREATE INDEX IF NOT EXISTS idx_surveys_unit ON surveys(unit_id);
CREATE INDEX IF NOT EXISTS idx_responses_survey ON survey_responses(survey_id);
CREATE INDEX IF NOT EXISTS idx_responses_respondent ON survey_responses(survey_id, respondent_id);

-- Petition lookups
CREATE INDEX IF NOT EXISTS idx_petitions_owner ON petitions(petitioner_id);
CREATE INDEX IF NOT EXISTS idx_petitions_unit ON petitions(unit_id);
CREATE INDEX IF NOT EXISTS idx_petitions_status ON petitions(status);
"#;
