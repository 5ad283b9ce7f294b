//! Content CRUD operations
//!
//! Photos, albums, comments and likes share one table and one shape.
//! Listing takes a [`VisibilityScope`] so rows the caller may not see
//! never leave the database.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RegistryError;
use crate::visibility::{ContentHead, VisibilityScope};

/// Content kinds sharing the common shape
pub const CONTENT_KINDS: &[&str] = &["photo", "album", "comment", "like"];

/// Content row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRow {
    pub id: String,
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub owner_id: String,
    pub unit_id: Option<String>,
    pub parent_id: Option<String>,
    pub is_public: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl ContentRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            kind: row.get("kind")?,
            title: row.get("title")?,
            body: row.get("body")?,
            owner_id: row.get("owner_id")?,
            unit_id: row.get("unit_id")?,
            parent_id: row.get("parent_id")?,
            is_public: row.get::<_, i64>("is_public")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Ownership projection for the visibility resolver
    pub fn head(&self) -> ContentHead {
        ContentHead {
            owner_id: self.owner_id.clone(),
            unit_id: self.unit_id.clone(),
            is_public: self.is_public,
        }
    }
}

/// Input for creating content
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContentInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

fn default_kind() -> String {
    "photo".to_string()
}

/// Query parameters for listing content - camelCase for URL params
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentQuery {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    100
}

/// Translate a visibility scope into a WHERE condition.
///
/// The scoped case is the union query `owner OR managed unit OR public`;
/// a scope with no satisfiable arm matches nothing.
pub fn push_scope_condition(
    scope: &VisibilityScope,
    conditions: &mut Vec<String>,
    params_vec: &mut Vec<Box<dyn rusqlite::ToSql>>,
) {
    match scope {
        VisibilityScope::All => {}
        VisibilityScope::Scoped {
            principal_id,
            managed_units,
            include_public,
        } => {
            let mut arms = Vec::new();

            if !principal_id.is_empty() {
                arms.push("owner_id = ?".to_string());
                params_vec.push(Box::new(principal_id.clone()));
            }

            if !managed_units.is_empty() {
                let placeholders: Vec<_> = managed_units.iter().map(|_| "?").collect();
                arms.push(format!("unit_id IN ({})", placeholders.join(", ")));
                for unit in managed_units {
                    params_vec.push(Box::new(unit.clone()));
                }
            }

            if *include_public {
                arms.push("is_public = 1".to_string());
            }

            if arms.is_empty() {
                conditions.push("0".to_string());
            } else {
                conditions.push(format!("({})", arms.join(" OR ")));
            }
        }
    }
}

/// Get content by id (unfiltered; the service checks visibility)
pub fn get_content(conn: &Connection, id: &str) -> Result<Option<ContentRow>, RegistryError> {
    conn.prepare("SELECT * FROM content WHERE id = ?")
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?
        .query_row(params![id], ContentRow::from_row)
        .optional()
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))
}

/// List content visible under `scope`, with optional filters
pub fn list_content(
    conn: &Connection,
    scope: &VisibilityScope,
    query: &ContentQuery,
) -> Result<Vec<ContentRow>, RegistryError> {
    let mut sql = String::from("SELECT * FROM content");
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    push_scope_condition(scope, &mut conditions, &mut params_vec);

    if let Some(ref kind) = query.kind {
        conditions.push("kind = ?".to_string());
        params_vec.push(Box::new(kind.clone()));
    }

    if let Some(ref unit_id) = query.unit_id {
        conditions.push("unit_id = ?".to_string());
        params_vec.push(Box::new(unit_id.clone()));
    }

    if let Some(ref parent_id) = query.parent_id {
        conditions.push("parent_id = ?".to_string());
        params_vec.push(Box::new(parent_id.clone()));
    }

    if let Some(ref search) = query.search {
        conditions.push("(title LIKE ? OR body LIKE ?)".to_string());
        let pattern = format!("%{}%", search);
        params_vec.push(Box::new(pattern.clone()));
        params_vec.push(Box::new(pattern));
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }

    sql.push_str(" ORDER BY created_at DESC LIMIT ? OFFSET ?");
    params_vec.push(Box::new(query.limit as i64));
    params_vec.push(Box::new(query.offset as i64));

    debug!("Executing query: {}", sql);

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?;

    let param_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

    let rows = stmt
        .query_map(param_refs.as_slice(), ContentRow::from_row)
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| RegistryError::Internal(format!("Row parse failed: {}", e)))
}

/// Create a content item
pub fn create_content(
    conn: &mut Connection,
    owner_id: &str,
    input: CreateContentInput,
) -> Result<ContentRow, RegistryError> {
    let id = input.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let result = conn.execute(
        "INSERT INTO content (id, kind, title, body, owner_id, unit_id, parent_id, is_public)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            input.kind,
            input.title,
            input.body,
            owner_id,
            input.unit_id,
            input.parent_id,
            input.is_public as i64,
        ],
    );

    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(RegistryError::Conflict(format!("content already exists: {}", id)));
        }
        Err(e) => return Err(RegistryError::Internal(format!("Insert failed: {}", e))),
    }

    get_content(conn, &id)?
        .ok_or_else(|| RegistryError::Internal("Content not found after insert".to_string()))
}

/// Update mutable fields of a content item
pub fn update_content(
    conn: &mut Connection,
    id: &str,
    title: &str,
    body: Option<&str>,
    is_public: bool,
) -> Result<ContentRow, RegistryError> {
    let rows = conn
        .execute(
            "UPDATE content SET title = ?, body = ?, is_public = ?, updated_at = datetime('now')
             WHERE id = ?",
            params![title, body, is_public as i64, id],
        )
        .map_err(|e| RegistryError::Internal(format!("Update failed: {}", e)))?;

    if rows == 0 {
        return Err(RegistryError::NotFound(format!("content not found: {}", id)));
    }

    get_content(conn, id)?
        .ok_or_else(|| RegistryError::Internal("Content not found after update".to_string()))
}

/// Delete content by id
pub fn delete_content(conn: &mut Connection, id: &str) -> Result<bool, RegistryError> {
    let changes = conn
        .execute("DELETE FROM content WHERE id = ?", params![id])
        .map_err(|e| RegistryError::Internal(format!("Delete failed: {}", e)))?;

    Ok(changes > 0)
}
