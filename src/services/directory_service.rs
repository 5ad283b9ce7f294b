//! Directory service - principals and organizational units
//!
//! Registration and staffing are admin operations. Identity resolution
//! turns a caller-supplied principal id into the resolver's
//! [`Principal`] shape, with the managed-unit set derived from current
//! unit staffing and unknown roles degraded to the most restrictive.

use std::sync::Arc;

use tracing::info;

use crate::db::{principals, units, RegistryDb};
use crate::error::RegistryError;
use crate::visibility::{Principal, Role};

use super::events::{EventBus, RegistryEvent};

/// Directory service for principals and units
pub struct DirectoryService {
    db: Arc<RegistryDb>,
    events: Arc<EventBus>,
}

impl DirectoryService {
    /// Create a new directory service
    pub fn new(db: Arc<RegistryDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Identity resolution
    // =========================================================================

    /// Resolve a caller-supplied principal id into a [`Principal`].
    ///
    /// `None` resolves to the anonymous principal. Unknown ids and
    /// deactivated principals are authentication errors.
    pub fn resolve(&self, principal_id: Option<&str>) -> Result<Principal, RegistryError> {
        let Some(id) = principal_id else {
            return Ok(Principal::anonymous());
        };

        let principal = self
            .db
            .with_conn(|conn| principals::load_principal(conn, id))?
            .ok_or_else(|| RegistryError::Auth(format!("unknown principal: {}", id)))?;

        if !principal.is_active {
            return Err(RegistryError::Auth(format!("principal is disabled: {}", id)));
        }

        Ok(principal)
    }

    // =========================================================================
    // Principals
    // =========================================================================

    /// Register a principal (admin only)
    pub fn create_principal(
        &self,
        caller: &Principal,
        input: principals::CreatePrincipalInput,
    ) -> Result<principals::PrincipalRow, RegistryError> {
        self.require_admin(caller)?;

        if input.id.is_empty() {
            return Err(RegistryError::InvalidInput("id is required".into()));
        }
        if input.display_name.is_empty() {
            return Err(RegistryError::InvalidInput("display_name is required".into()));
        }

        let result = self
            .db
            .with_conn_mut(|conn| principals::create_principal(conn, input))?;

        self.events.emit(RegistryEvent::PrincipalRegistered {
            id: result.id.clone(),
            role: result.role.clone(),
        });

        Ok(result)
    }

    /// Get a principal row
    pub fn get_principal(&self, id: &str) -> Result<principals::PrincipalRow, RegistryError> {
        self.db
            .with_conn(|conn| principals::get_principal(conn, id))?
            .ok_or_else(|| RegistryError::NotFound(format!("principal not found: {}", id)))
    }

    /// List principals (admin only)
    pub fn list_principals(
        &self,
        caller: &Principal,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<principals::PrincipalRow>, RegistryError> {
        self.require_admin(caller)?;
        self.db
            .with_conn(|conn| principals::list_principals(conn, limit, offset))
    }

    /// Change a principal's role (admin only)
    pub fn set_role(
        &self,
        caller: &Principal,
        id: &str,
        role: &str,
    ) -> Result<principals::PrincipalRow, RegistryError> {
        self.require_admin(caller)?;
        self.db.with_conn_mut(|conn| principals::set_role(conn, id, role))
    }

    /// Soft-disable or re-enable a principal (admin only)
    pub fn set_active(
        &self,
        caller: &Principal,
        id: &str,
        active: bool,
    ) -> Result<principals::PrincipalRow, RegistryError> {
        self.require_admin(caller)?;
        self.db
            .with_conn_mut(|conn| principals::set_active(conn, id, active))
    }

    // =========================================================================
    // Units
    // =========================================================================

    /// Create a unit (admin only)
    pub fn create_unit(
        &self,
        caller: &Principal,
        input: units::CreateUnitInput,
    ) -> Result<units::UnitRow, RegistryError> {
        self.require_admin(caller)?;

        if input.id.is_empty() {
            return Err(RegistryError::InvalidInput("id is required".into()));
        }
        if input.name.is_empty() {
            return Err(RegistryError::InvalidInput("name is required".into()));
        }

        let result = self.db.with_conn_mut(|conn| units::create_unit(conn, input))?;

        self.events.emit(RegistryEvent::UnitCreated {
            id: result.id.clone(),
            name: result.name.clone(),
        });

        Ok(result)
    }

    /// Get a unit
    pub fn get_unit(&self, id: &str) -> Result<units::UnitRow, RegistryError> {
        self.db
            .with_conn(|conn| units::get_unit(conn, id))?
            .ok_or_else(|| RegistryError::NotFound(format!("unit not found: {}", id)))
    }

    /// List units
    pub fn list_units(&self, limit: u32, offset: u32) -> Result<Vec<units::UnitRow>, RegistryError> {
        self.db.with_conn(|conn| units::list_units(conn, limit, offset))
    }

    /// Replace a unit's staffing (admin only)
    pub fn assign_staff(
        &self,
        caller: &Principal,
        id: &str,
        aamil_id: Option<&str>,
        coordinator_id: Option<&str>,
    ) -> Result<units::UnitRow, RegistryError> {
        self.require_admin(caller)?;
        self.db
            .with_conn_mut(|conn| units::assign_staff(conn, id, aamil_id, coordinator_id))
    }

    // =========================================================================
    // Bootstrap
    // =========================================================================

    /// Seed an admin principal on first start if it does not exist
    pub fn bootstrap_admin(&self, id: &str) -> Result<(), RegistryError> {
        let existing = self.db.with_conn(|conn| principals::get_principal(conn, id))?;
        if existing.is_some() {
            return Ok(());
        }

        info!(id = %id, "Seeding bootstrap admin principal");
        self.db.with_conn_mut(|conn| {
            principals::create_principal(
                conn,
                principals::CreatePrincipalInput {
                    id: id.to_string(),
                    display_name: id.to_string(),
                    role: "admin".to_string(),
                },
            )
        })?;

        Ok(())
    }

    fn require_admin(&self, caller: &Principal) -> Result<(), RegistryError> {
        if caller.role != Role::Admin {
            return Err(RegistryError::PermissionDenied(
                "admin role required".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn service() -> DirectoryService {
        let db = Arc::new(RegistryDb::open_in_memory().unwrap());
        DirectoryService::new(db, Arc::new(EventBus::new()))
    }

    fn admin() -> Principal {
        Principal {
            id: "root".into(),
            role: Role::Admin,
            managed_units: BTreeSet::new(),
            is_active: true,
        }
    }

    #[test]
    fn test_registration_is_admin_gated() {
        let svc = service();
        let input = principals::CreatePrincipalInput {
            id: "u1".into(),
            display_name: "User One".into(),
            role: "student".into(),
        };

        assert!(matches!(
            svc.create_principal(&Principal::anonymous(), input.clone()),
            Err(RegistryError::PermissionDenied(_))
        ));

        svc.create_principal(&admin(), input).unwrap();
    }

    #[test]
    fn test_resolve_derives_managed_units() {
        let svc = service();

        svc.create_principal(
            &admin(),
            principals::CreatePrincipalInput {
                id: "a1".into(),
                display_name: "Aamil".into(),
                role: "aamil".into(),
            },
        )
        .unwrap();

        svc.create_unit(
            &admin(),
            units::CreateUnitInput {
                id: "moze-1".into(),
                name: "Central Moze".into(),
                aamil_id: Some("a1".into()),
                coordinator_id: None,
            },
        )
        .unwrap();

        let resolved = svc.resolve(Some("a1")).unwrap();
        assert_eq!(resolved.role, Role::Aamil);
        assert!(resolved.managed_units.contains("moze-1"));
    }

    #[test]
    fn test_resolve_rejects_disabled_and_unknown() {
        let svc = service();

        svc.create_principal(
            &admin(),
            principals::CreatePrincipalInput {
                id: "u1".into(),
                display_name: "User".into(),
                role: "student".into(),
            },
        )
        .unwrap();

        svc.set_active(&admin(), "u1", false).unwrap();

        assert!(matches!(svc.resolve(Some("u1")), Err(RegistryError::Auth(_))));
        assert!(matches!(svc.resolve(Some("ghost")), Err(RegistryError::Auth(_))));
        assert!(svc.resolve(None).unwrap().is_anonymous());
    }

    #[test]
    fn test_unknown_role_degrades_on_resolve() {
        let svc = service();

        // Role strings are stored as-is; resolution degrades unknowns
        svc.create_principal(
            &admin(),
            principals::CreatePrincipalInput {
                id: "u1".into(),
                display_name: "User".into(),
                role: "superhero".into(),
            },
        )
        .unwrap();

        let resolved = svc.resolve(Some("u1")).unwrap();
        assert_eq!(resolved.role, Role::Other);
    }

    #[test]
    fn test_staffing_only_counts_for_staff_roles() {
        let svc = service();

        svc.create_principal(
            &admin(),
            principals::CreatePrincipalInput {
                id: "d1".into(),
                display_name: "Doctor".into(),
                role: "doctor".into(),
            },
        )
        .unwrap();

        svc.create_unit(
            &admin(),
            units::CreateUnitInput {
                id: "moze-1".into(),
                name: "Central Moze".into(),
                aamil_id: Some("d1".into()),
                coordinator_id: None,
            },
        )
        .unwrap();

        // A doctor listed in a staffing column still manages nothing
        let resolved = svc.resolve(Some("d1")).unwrap();
        assert!(resolved.managed_units.is_empty());
    }
}
