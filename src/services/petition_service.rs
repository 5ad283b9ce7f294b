//! Petition service - filing and review workflow
//!
//! Petitions are never public: the petitioner, admins and the staff of
//! the unit they were routed to are the only principals that see them.
//! Status transitions are a reviewer (write-side) operation.

use std::sync::Arc;

use crate::db::{petitions, RegistryDb};
use crate::error::RegistryError;
use crate::visibility::{self, Access, Principal};

use super::events::{EventBus, RegistryEvent};

/// Petition service for business logic
pub struct PetitionService {
    db: Arc<RegistryDb>,
    events: Arc<EventBus>,
}

impl PetitionService {
    /// Create a new petition service
    pub fn new(db: Arc<RegistryDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// File a petition owned by the principal
    pub fn create(
        &self,
        principal: &Principal,
        input: petitions::CreatePetitionInput,
    ) -> Result<petitions::PetitionRow, RegistryError> {
        if principal.is_anonymous() {
            return Err(RegistryError::Auth("authentication required".into()));
        }

        if input.subject.is_empty() {
            return Err(RegistryError::InvalidInput("subject is required".into()));
        }
        if input.body.is_empty() {
            return Err(RegistryError::InvalidInput("body is required".into()));
        }

        let result = self
            .db
            .with_conn_mut(|conn| petitions::create_petition(conn, &principal.id, input))?;

        self.events.emit(RegistryEvent::PetitionFiled {
            id: result.id.clone(),
            unit_id: result.unit_id.clone(),
        });

        Ok(result)
    }

    /// Get a petition the principal may read (hidden ones read as absent)
    pub fn get(&self, principal: &Principal, id: &str) -> Result<petitions::PetitionRow, RegistryError> {
        let row = self
            .db
            .with_conn(|conn| petitions::get_petition(conn, id))?
            .ok_or_else(|| RegistryError::NotFound(format!("petition not found: {}", id)))?;

        if !visibility::allows(principal, &row.head(), Access::Read) {
            return Err(RegistryError::NotFound(format!("petition not found: {}", id)));
        }

        Ok(row)
    }

    /// List petitions visible to the principal
    pub fn list(
        &self,
        principal: &Principal,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<petitions::PetitionRow>, RegistryError> {
        let scope = visibility::scope(principal, Access::Read);
        self.db
            .with_conn(|conn| petitions::list_petitions(conn, &scope, limit, offset))
    }

    /// Move a petition through the review workflow
    pub fn set_status(
        &self,
        principal: &Principal,
        id: &str,
        status: &str,
    ) -> Result<petitions::PetitionRow, RegistryError> {
        let status = petitions::PetitionStatus::parse(status).ok_or_else(|| {
            RegistryError::InvalidInput(format!("unknown petition status: {}", status))
        })?;

        let existing = self.get(principal, id)?;

        if !visibility::allows(principal, &existing.head(), Access::Write) {
            return Err(RegistryError::PermissionDenied(
                "not allowed to review this petition".into(),
            ));
        }

        let result = self
            .db
            .with_conn_mut(|conn| petitions::set_status(conn, id, status))?;

        self.events.emit(RegistryEvent::PetitionStatusChanged {
            id: result.id.clone(),
            status: result.status.clone(),
        });

        Ok(result)
    }
}
