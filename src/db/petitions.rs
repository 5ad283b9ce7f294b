//! Petition (Araz) CRUD operations
//!
//! Petitions are personal requests routed to a unit; they are never
//! public, so only the petitioner, admins and unit staff see them.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::visibility::{ContentHead, VisibilityScope};

use super::content::push_scope_condition;

/// Petition review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetitionStatus {
    Pending,
    InReview,
    Resolved,
    Rejected,
}

impl PetitionStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PetitionStatus::Pending),
            "in_review" => Some(PetitionStatus::InReview),
            "resolved" => Some(PetitionStatus::Resolved),
            "rejected" => Some(PetitionStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PetitionStatus::Pending => "pending",
            PetitionStatus::InReview => "in_review",
            PetitionStatus::Resolved => "resolved",
            PetitionStatus::Rejected => "rejected",
        }
    }
}

/// Petition row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PetitionRow {
    pub id: String,
    pub subject: String,
    pub body: String,
    pub petitioner_id: String,
    pub unit_id: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PetitionRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            subject: row.get("subject")?,
            body: row.get("body")?,
            petitioner_id: row.get("petitioner_id")?,
            unit_id: row.get("unit_id")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Ownership projection; petitions are never public
    pub fn head(&self) -> ContentHead {
        ContentHead {
            owner_id: self.petitioner_id.clone(),
            unit_id: self.unit_id.clone(),
            is_public: false,
        }
    }
}

/// Input for filing a petition
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePetitionInput {
    #[serde(default)]
    pub id: Option<String>,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub unit_id: Option<String>,
}

/// Get a petition by id
pub fn get_petition(conn: &Connection, id: &str) -> Result<Option<PetitionRow>, RegistryError> {
    conn.prepare("SELECT * FROM petitions WHERE id = ?")
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?
        .query_row(params![id], PetitionRow::from_row)
        .optional()
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))
}

/// List petitions visible under `scope`
pub fn list_petitions(
    conn: &Connection,
    scope: &VisibilityScope,
    limit: u32,
    offset: u32,
) -> Result<Vec<PetitionRow>, RegistryError> {
    let mut sql = String::from("SELECT * FROM petitions");
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    // Petitions have no public arm; the owner column is petitioner_id
    let mut scope_conditions = vec![];
    push_scope_condition(scope, &mut scope_conditions, &mut params_vec);
    for cond in scope_conditions {
        conditions.push(
            cond.replace("owner_id", "petitioner_id")
                .replace("is_public = 1", "0"),
        );
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
    params_vec.push(Box::new(limit as i64));
    params_vec.push(Box::new(offset as i64));

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), PetitionRow::from_row)
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| RegistryError::Internal(format!("Row parse failed: {}", e)))
}

/// File a petition
pub fn create_petition(
    conn: &mut Connection,
    petitioner_id: &str,
    input: CreatePetitionInput,
) -> Result<PetitionRow, RegistryError> {
    let id = input.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let result = conn.execute(
        "INSERT INTO petitions (id, subject, body, petitioner_id, unit_id)
         VALUES (?, ?, ?, ?, ?)",
        params![id, input.subject, input.body, petitioner_id, input.unit_id],
    );

    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(RegistryError::Conflict(format!("petition already exists: {}", id)));
        }
        Err(e) => return Err(RegistryError::Internal(format!("Insert failed: {}", e))),
    }

    get_petition(conn, &id)?
        .ok_or_else(|| RegistryError::Internal("Petition not found after insert".to_string()))
}

/// Move a petition to a new review status
pub fn set_status(
    conn: &mut Connection,
    id: &str,
    status: PetitionStatus,
) -> Result<PetitionRow, RegistryError> {
    let rows = conn
        .execute(
            "UPDATE petitions SET status = ?, updated_at = datetime('now') WHERE id = ?",
            params![status.as_str(), id],
        )
        .map_err(|e| RegistryError::Internal(format!("Update failed: {}", e)))?;

    if rows == 0 {
        return Err(RegistryError::NotFound(format!("petition not found: {}", id)));
    }

    get_petition(conn, id)?
        .ok_or_else(|| RegistryError::Internal("Petition not found after update".to_string()))
}
