//! Survey and response CRUD operations
//!
//! The one-response-per-respondent invariant is enforced here, inside
//! the write transaction; the connection is serialized behind the
//! database mutex, so the check-then-insert cannot race.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::visibility::{ContentHead, VisibilityScope};

use super::content::push_scope_condition;

/// Survey row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub questions_json: String,
    pub target_role: Option<String>,
    pub opens_at: Option<String>,
    pub closes_at: Option<String>,
    pub is_anonymous: bool,
    pub allow_multiple_responses: bool,
    pub invited_count: Option<i64>,
    pub created_by: String,
    pub unit_id: Option<String>,
    pub is_public: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl SurveyRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            questions_json: row.get("questions_json")?,
            target_role: row.get("target_role")?,
            opens_at: row.get("opens_at")?,
            closes_at: row.get("closes_at")?,
            is_anonymous: row.get::<_, i64>("is_anonymous")? != 0,
            allow_multiple_responses: row.get::<_, i64>("allow_multiple_responses")? != 0,
            invited_count: row.get("invited_count")?,
            created_by: row.get("created_by")?,
            unit_id: row.get("unit_id")?,
            is_public: row.get::<_, i64>("is_public")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Ownership projection for the visibility resolver
    pub fn head(&self) -> ContentHead {
        ContentHead {
            owner_id: self.created_by.clone(),
            unit_id: self.unit_id.clone(),
            is_public: self.is_public,
        }
    }
}

/// Input for creating a survey
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSurveyInput {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Ordered question definitions
    pub questions: Vec<crate::analytics::Question>,
    #[serde(default)]
    pub target_role: Option<String>,
    #[serde(default)]
    pub opens_at: Option<String>,
    #[serde(default)]
    pub closes_at: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub allow_multiple_responses: bool,
    #[serde(default)]
    pub invited_count: Option<i64>,
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_public: bool,
}

fn default_true() -> bool {
    true
}

/// Response row from database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRow {
    pub id: String,
    pub survey_id: String,
    pub respondent_id: Option<String>,
    pub answers_json: String,
    pub is_complete: bool,
    pub completion_time_secs: Option<f64>,
    pub created_at: String,
}

impl ResponseRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            survey_id: row.get("survey_id")?,
            respondent_id: row.get("respondent_id")?,
            answers_json: row.get("answers_json")?,
            is_complete: row.get::<_, i64>("is_complete")? != 0,
            completion_time_secs: row.get("completion_time_secs")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Validated response ready for insertion (built by the service layer)
#[derive(Debug, Clone)]
pub struct CreateResponseInput {
    pub survey_id: String,
    pub respondent_id: Option<String>,
    pub answers_json: String,
    pub is_complete: bool,
    pub completion_time_secs: Option<f64>,
    pub enforce_unique: bool,
}

/// Get a survey by id
pub fn get_survey(conn: &Connection, id: &str) -> Result<Option<SurveyRow>, RegistryError> {
    conn.prepare("SELECT * FROM surveys WHERE id = ?")
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?
        .query_row(params![id], SurveyRow::from_row)
        .optional()
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))
}

/// List surveys visible under `scope`
pub fn list_surveys(
    conn: &Connection,
    scope: &VisibilityScope,
    limit: u32,
    offset: u32,
) -> Result<Vec<SurveyRow>, RegistryError> {
    let mut sql = String::from("SELECT * FROM surveys");
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![];
    let mut conditions = vec![];

    // Surveys reuse the content scope with created_by as the owner column
    let mut scope_conditions = vec![];
    push_scope_condition(scope, &mut scope_conditions, &mut params_vec);
    for cond in scope_conditions {
        conditions.push(cond.replace("owner_id", "created_by"));
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
        .query_map(param_refs.as_slice(), SurveyRow::from_row)
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| RegistryError::Internal(format!("Row parse failed: {}", e)))
}

/// Create a survey (questions serialized by the service layer)
pub fn create_survey(
    conn: &mut Connection,
    created_by: &str,
    questions_json: &str,
    input: &CreateSurveyInput,
) -> Result<SurveyRow, RegistryError> {
    let id = input
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let result = conn.execute(
        "INSERT INTO surveys (
            id, title, description, questions_json, target_role,
            opens_at, closes_at, is_anonymous, allow_multiple_responses,
            invited_count, created_by, unit_id, is_public
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            input.title,
            input.description,
            questions_json,
            input.target_role,
            input.opens_at,
            input.closes_at,
            input.is_anonymous as i64,
            input.allow_multiple_responses as i64,
            input.invited_count,
            created_by,
            input.unit_id,
            input.is_public as i64,
        ],
    );

    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(RegistryError::Conflict(format!("survey already exists: {}", id)));
        }
        Err(e) => return Err(RegistryError::Internal(format!("Insert failed: {}", e))),
    }

    get_survey(conn, &id)?
        .ok_or_else(|| RegistryError::Internal("Survey not found after insert".to_string()))
}

/// Update the externally supplied invitation count
pub fn set_invited_count(
    conn: &mut Connection,
    id: &str,
    invited_count: Option<i64>,
) -> Result<SurveyRow, RegistryError> {
    let rows = conn
        .execute(
            "UPDATE surveys SET invited_count = ?, updated_at = datetime('now') WHERE id = ?",
            params![invited_count, id],
        )
        .map_err(|e| RegistryError::Internal(format!("Update failed: {}", e)))?;

    if rows == 0 {
        return Err(RegistryError::NotFound(format!("survey not found: {}", id)));
    }

    get_survey(conn, id)?
        .ok_or_else(|| RegistryError::Internal("Survey not found after update".to_string()))
}

/// Insert a response, enforcing the per-respondent uniqueness invariant
/// inside the transaction
pub fn create_response(
    conn: &mut Connection,
    input: CreateResponseInput,
) -> Result<ResponseRow, RegistryError> {
    let tx = conn
        .transaction()
        .map_err(|e| RegistryError::Internal(format!("Transaction failed: {}", e)))?;

    if input.enforce_unique {
        if let Some(respondent) = &input.respondent_id {
            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM survey_responses WHERE survey_id = ? AND respondent_id = ?",
                    params![input.survey_id, respondent],
                    |_| Ok(true),
                )
                .optional()
                .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))?
                .unwrap_or(false);

            if exists {
                return Err(RegistryError::Conflict(
                    "already responded to this survey".to_string(),
                ));
            }
        }
    }

    let id = uuid::Uuid::new_v4().to_string();

    tx.execute(
        "INSERT INTO survey_responses (
            id, survey_id, respondent_id, answers_json, is_complete, completion_time_secs
        ) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            id,
            input.survey_id,
            input.respondent_id,
            input.answers_json,
            input.is_complete as i64,
            input.completion_time_secs,
        ],
    )
    .map_err(|e| RegistryError::Internal(format!("Insert failed: {}", e)))?;

    tx.commit()
        .map_err(|e| RegistryError::Internal(format!("Commit failed: {}", e)))?;

    get_response(conn, &id)?
        .ok_or_else(|| RegistryError::Internal("Response not found after insert".to_string()))
}

/// Get a response by id
pub fn get_response(conn: &Connection, id: &str) -> Result<Option<ResponseRow>, RegistryError> {
    conn.prepare("SELECT * FROM survey_responses WHERE id = ?")
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?
        .query_row(params![id], ResponseRow::from_row)
        .optional()
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))
}

/// List all responses for a survey, oldest first (stable aggregation order)
pub fn list_responses(conn: &Connection, survey_id: &str) -> Result<Vec<ResponseRow>, RegistryError> {
    let mut stmt = conn
        .prepare("SELECT * FROM survey_responses WHERE survey_id = ? ORDER BY created_at ASC, id ASC")
        .map_err(|e| RegistryError::Internal(format!("Prepare failed: {}", e)))?;

    let rows = stmt
        .query_map(params![survey_id], ResponseRow::from_row)
        .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| RegistryError::Internal(format!("Row parse failed: {}", e)))
}
