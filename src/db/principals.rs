//! Principal CRUD operations
//!
//! Principals are never deleted; deactivation flips `is_active`.
//! Management relationships are derived from unit staffing columns at
//! load time, so a [`Principal`] handed to the visibility resolver
//! always carries its current managed-unit set.

use std::collections::BTreeSet;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::visibility::{Principal, Role};

/// Principal row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalRow {
    pub id: String,
    pub display_name: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl PrincipalRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            display_name: row.get("display_name")?,
            role: row.get("role")?,
            is_active: row.get::<_, i64>("is_active")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Input for registering a principal
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrincipalInput {
    pub id: String,
    pub display_name: String,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "other".to_string()
}

/// Get a principal row by id
pub fn get_principal(conn: &Connection, id: &str) -> Result<Option<PrincipalRow>, RegistryError> {
    conn.prepare("SELECT * FROM principals WHERE id = ?")
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?
        .query_row(params![id], PrincipalRow::from_row)
        .optional()
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))
}

/// List all principals, newest first
pub fn list_principals(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<PrincipalRow>, RegistryError> {
    let mut stmt = conn
        .prepare("SELECT * FROM principals ORDER BY created_at DESC LIMIT ? OFFSET ?")
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![limit as i64, offset as i64], PrincipalRow::from_row)
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| RegistryError::Internal(format!("Row parse failed: {}", e)))
}

/// Register a new principal
pub fn create_principal(conn: &mut Connection, input: CreatePrincipalInput) -> Result<PrincipalRow, RegistryError> {
    let result = conn.execute(
        "INSERT INTO principals (id, display_name, role) VALUES (?, ?, ?)",
        params![input.id, input.display_name, input.role],
    );

    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(RegistryError::Conflict(format!(
                "principal already exists: {}",
                input.id
            )));
        }
        Err(e) => return Err(RegistryError::Internal(format!("Insert failed: {}", e))),
    }

    get_principal(conn, &input.id)?
        .ok_or_else(|| RegistryError::Internal("Principal not found after insert".to_string()))
}

/// Change a principal's role
pub fn set_role(conn: &mut Connection, id: &str, role: &str) -> Result<PrincipalRow, RegistryError> {
    let rows = conn
        .execute(
            "UPDATE principals SET role = ?, updated_at = datetime('now') WHERE id = ?",
            params![role, id],
        )
        .map_err(|e| RegistryError::Internal(format!("Update failed: {}", e)))?;

    if rows == 0 {
        return Err(RegistryError::NotFound(format!("principal not found: {}", id)));
    }

    get_principal(conn, id)?
        .ok_or_else(|| RegistryError::Internal("Principal not found after update".to_string()))
}

/// Soft-disable or re-enable a principal
pub fn set_active(conn: &mut Connection, id: &str, active: bool) -> Result<PrincipalRow, RegistryError> {
    let rows = conn
        .execute(
            "UPDATE principals SET is_active = ?, updated_at = datetime('now') WHERE id = ?",
            params![active as i64, id],
        )
        .map_err(|e| RegistryError::Internal(format!("Update failed: {}", e)))?;

    if rows == 0 {
        return Err(RegistryError::NotFound(format!("principal not found: {}", id)));
    }

    get_principal(conn, id)?
        .ok_or_else(|| RegistryError::Internal("Principal not found after update".to_string()))
}

/// Units this principal staffs as aamil or coordinator
pub fn managed_units(conn: &Connection, principal_id: &str) -> Result<BTreeSet<String>, RegistryError> {
    let mut stmt = conn
        .prepare("SELECT id FROM units WHERE (aamil_id = ? OR coordinator_id = ?) AND is_active = 1")
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?;

    let ids = stmt
        .query_map(params![principal_id, principal_id], |row| row.get::<_, String>(0))
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))?
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(|e| RegistryError::Internal(format!("Row parse failed: {}", e)))?;

    Ok(ids)
}

/// Load a row into the resolver's [`Principal`] shape.
///
/// Unknown role strings degrade to `Role::Other`; management assignments
/// only survive for roles that can hold them.
pub fn load_principal(conn: &Connection, id: &str) -> Result<Option<Principal>, RegistryError> {
    let Some(row) = get_principal(conn, id)? else {
        return Ok(None);
    };

    let role = Role::parse(&row.role);
    let managed = if role.manages_units() {
        managed_units(conn, id)?
    } else {
        BTreeSet::new()
    };

    Ok(Some(Principal {
        id: row.id,
        role,
        managed_units: managed,
        is_active: row.is_active,
    }))
}
