//! Content service - business logic for content operations
//!
//! Wraps the content repository with validation, visibility
//! enforcement, and event emission. Every read is filtered through the
//! caller's visibility scope; every write re-checks the per-item rules.

use std::sync::Arc;

use crate::db::{content, RegistryDb};
use crate::error::RegistryError;
use crate::visibility::{self, Access, Principal};

use super::events::{EventBus, RegistryEvent};

/// Fields a content owner or manager may change
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UpdateContentInput {
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Content service for business logic
pub struct ContentService {
    db: Arc<RegistryDb>,
    events: Arc<EventBus>,
}

impl ContentService {
    /// Create a new content service
    pub fn new(db: Arc<RegistryDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Get a content item the principal may read.
    ///
    /// Hidden items surface as NotFound so denial does not leak existence.
    pub fn get(&self, principal: &Principal, id: &str) -> Result<content::ContentRow, RegistryError> {
        let row = self
            .db
            .with_conn(|conn| content::get_content(conn, id))?
            .ok_or_else(|| RegistryError::NotFound(format!("content not found: {}", id)))?;

        if !visibility::allows(principal, &row.head(), Access::Read) {
            return Err(RegistryError::NotFound(format!("content not found: {}", id)));
        }

        Ok(row)
    }

    /// List content visible to the principal
    pub fn list(
        &self,
        principal: &Principal,
        query: &content::ContentQuery,
    ) -> Result<Vec<content::ContentRow>, RegistryError> {
        let scope = visibility::scope(principal, Access::Read);
        self.db.with_conn(|conn| content::list_content(conn, &scope, query))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Create a content item owned by the principal
    pub fn create(
        &self,
        principal: &Principal,
        input: content::CreateContentInput,
    ) -> Result<content::ContentRow, RegistryError> {
        if principal.is_anonymous() {
            return Err(RegistryError::Auth("authentication required".into()));
        }

        self.validate(&input)?;

        let result = self
            .db
            .with_conn_mut(|conn| content::create_content(conn, &principal.id, input))?;

        self.events.emit(RegistryEvent::ContentCreated {
            id: result.id.clone(),
            kind: result.kind.clone(),
            owner_id: result.owner_id.clone(),
        });

        Ok(result)
    }

    /// Update a content item the principal may write
    pub fn update(
        &self,
        principal: &Principal,
        id: &str,
        input: UpdateContentInput,
    ) -> Result<content::ContentRow, RegistryError> {
        let existing = self.get(principal, id)?;

        if !visibility::allows(principal, &existing.head(), Access::Write) {
            return Err(RegistryError::PermissionDenied(
                "not allowed to modify this content".into(),
            ));
        }

        if input.title.is_empty() {
            return Err(RegistryError::InvalidInput("title is required".into()));
        }

        let result = self.db.with_conn_mut(|conn| {
            content::update_content(conn, id, &input.title, input.body.as_deref(), input.is_public)
        })?;

        self.events.emit(RegistryEvent::ContentUpdated { id: id.to_string() });

        Ok(result)
    }

    /// Delete a content item the principal may write
    pub fn delete(&self, principal: &Principal, id: &str) -> Result<bool, RegistryError> {
        let Some(existing) = self.db.with_conn(|conn| content::get_content(conn, id))? else {
            return Ok(false);
        };

        if !visibility::allows(principal, &existing.head(), Access::Read) {
            // Invisible items read as absent
            return Ok(false);
        }
        if !visibility::allows(principal, &existing.head(), Access::Write) {
            return Err(RegistryError::PermissionDenied(
                "not allowed to delete this content".into(),
            ));
        }

        let deleted = self.db.with_conn_mut(|conn| content::delete_content(conn, id))?;

        if deleted {
            self.events.emit(RegistryEvent::ContentDeleted { id: id.to_string() });
        }

        Ok(deleted)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn validate(&self, input: &content::CreateContentInput) -> Result<(), RegistryError> {
        if let Some(id) = &input.id {
            if id.is_empty() || id.len() > 255 {
                return Err(RegistryError::InvalidInput(
                    "id must be 1-255 characters".into(),
                ));
            }
        }

        if input.title.is_empty() {
            return Err(RegistryError::InvalidInput("title is required".into()));
        }

        if input.title.len() > 500 {
            return Err(RegistryError::InvalidInput(
                "title must be <= 500 characters".into(),
            ));
        }

        if !content::CONTENT_KINDS.contains(&input.kind.as_str()) {
            return Err(RegistryError::InvalidInput(format!(
                "kind '{}' is not valid. Valid kinds: {:?}",
                input.kind,
                content::CONTENT_KINDS
            )));
        }

        Ok(())
    }
}
