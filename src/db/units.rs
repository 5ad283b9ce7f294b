//! Organizational unit (Moze) CRUD operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Unit row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRow {
    pub id: String,
    pub name: String,
    pub aamil_id: Option<String>,
    pub coordinator_id: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl UnitRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            aamil_id: row.get("aamil_id")?,
            coordinator_id: row.get("coordinator_id")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Input for creating a unit
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUnitInput {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aamil_id: Option<String>,
    #[serde(default)]
    pub coordinator_id: Option<String>,
}

/// Get a unit by id
pub fn get_unit(conn: &Connection, id: &str) -> Result<Option<UnitRow>, RegistryError> {
    conn.prepare("SELECT * FROM units WHERE id = ?")
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?
        .query_row(params![id], UnitRow::from_row)
        .optional()
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))
}

/// List units, newest first
pub fn list_units(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<UnitRow>, RegistryError> {
    let mut stmt = conn
        .prepare("SELECT * FROM units ORDER BY created_at DESC LIMIT ? OFFSET ?")
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![limit as i64, offset as i64], UnitRow::from_row)
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| RegistryError::Internal(format!("Row parse failed: {}", e)))
}

/// Create a unit
pub fn create_unit(conn: &mut Connection, input: CreateUnitInput) -> Result<UnitRow, RegistryError> {
    let result = conn.execute(
        "INSERT INTO units (id, name, aamil_id, coordinator_id) VALUES (?, ?, ?, ?)",
        params![input.id, input.name, input.aamil_id, input.coordinator_id],
    );

    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(RegistryError::Conflict(format!(
                "unit already exists: {}",
                input.id
            )));
        }
        Err(e) => return Err(RegistryError::Internal(format!("Insert failed: {}", e))),
    }

    get_unit(conn, &input.id)?
        .ok_or_else(|| RegistryError::Internal("Unit not found after insert".to_string()))
}

/// Replace a unit's staffing
pub fn assign_staff(
    conn: &mut Connection,
    id: &str,
    aamil_id: Option<&str>,
    coordinator_id: Option<&str>,
) -> Result<UnitRow, RegistryError> {
    let rows = conn
        .execute(
            "UPDATE units SET aamil_id = ?, coordinator_id = ?, updated_at = datetime('now') WHERE id = ?",
            params![aamil_id, coordinator_id, id],
        )
        .map_err(|e| RegistryError::Internal(format!("Update failed: {}", e)))?;

    if rows == 0 {
        return Err(RegistryError::NotFound(format!("unit not found: {}", id)));
    }

    get_unit(conn, id)?
        .ok_or_else(|| RegistryError::Internal("Unit not found after update".to_string()))
}
