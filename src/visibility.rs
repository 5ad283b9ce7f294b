//! Role-based visibility resolution for registry content
//!
//! A pure rule layer: given a requesting principal and the ownership
//! projection of a record, decide whether the principal may read or
//! write it. The bulk form produces a [`VisibilityScope`] the repository
//! layer translates into a SQL filter, so list queries never load rows
//! the caller is not allowed to see.
//!
//! Rules are evaluated first-match:
//!
//! 1. Admins see and write everything.
//! 2. Owners see and write their own records.
//! 3. Aamils and coordinators see and write records of units they manage.
//! 4. Public records are readable (not writable) by anyone.
//! 5. Everything else is denied.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Principal roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum Role {
    Admin,
    Aamil,
    MozeCoordinator,
    Doctor,
    Student,
    /// Fallback for unknown or missing roles - most restrictive
    #[default]
    Other,
}

impl Role {
    /// Parse a stored role string; unknown values degrade to `Other`
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "aamil" => Role::Aamil,
            "moze_coordinator" => Role::MozeCoordinator,
            "doctor" => Role::Doctor,
            "student" => Role::Student,
            _ => Role::Other,
        }
    }

    /// Storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Aamil => "aamil",
            Role::MozeCoordinator => "moze_coordinator",
            Role::Doctor => "doctor",
            Role::Student => "student",
            Role::Other => "other",
        }
    }

    /// Whether this role can hold unit management assignments
    pub fn manages_units(&self) -> bool {
        matches!(self, Role::Aamil | Role::MozeCoordinator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Requested access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// A requesting actor with its management relationships resolved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
    /// Units this principal staffs as aamil or coordinator.
    /// Always present - empty set when the principal manages nothing.
    #[serde(default)]
    pub managed_units: BTreeSet<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

impl Principal {
    /// Unauthenticated caller: no identity, no role, no managed units
    pub fn anonymous() -> Self {
        Self {
            id: String::new(),
            role: Role::Other,
            managed_units: BTreeSet::new(),
            is_active: true,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_empty()
    }
}

/// Minimal ownership projection a record exposes for visibility checks
#[derive(Debug, Clone)]
pub struct ContentHead {
    pub owner_id: String,
    pub unit_id: Option<String>,
    pub is_public: bool,
}

/// Decide whether `principal` may perform `access` on the record
/// described by `head`. First matching rule wins.
pub fn allows(principal: &Principal, head: &ContentHead, access: Access) -> bool {
    if principal.role == Role::Admin {
        return true;
    }

    if !principal.is_anonymous() && principal.id == head.owner_id {
        return true;
    }

    if principal.role.manages_units() {
        if let Some(unit_id) = &head.unit_id {
            if principal.managed_units.contains(unit_id) {
                return true;
            }
        }
    }

    head.is_public && access == Access::Read
}

/// Bulk-filter form of the visibility rules.
///
/// `All` means no restriction; `Scoped` reduces to the union
/// `owner_id = principal OR unit_id IN managed_units OR is_public`
/// (the public arm only for reads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityScope {
    All,
    Scoped {
        principal_id: String,
        managed_units: BTreeSet<String>,
        include_public: bool,
    },
}

/// Compute the visibility scope for listing records
pub fn scope(principal: &Principal, access: Access) -> VisibilityScope {
    if principal.role == Role::Admin {
        return VisibilityScope::All;
    }

    let managed_units = if principal.role.manages_units() {
        principal.managed_units.clone()
    } else {
        BTreeSet::new()
    };

    VisibilityScope::Scoped {
        principal_id: principal.id.clone(),
        managed_units,
        include_public: access == Access::Read,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(id: &str, role: Role, units: &[&str]) -> Principal {
        Principal {
            id: id.to_string(),
            role,
            managed_units: units.iter().map(|u| u.to_string()).collect(),
            is_active: true,
        }
    }

    fn head(owner: &str, unit: Option<&str>, public: bool) -> ContentHead {
        ContentHead {
            owner_id: owner.to_string(),
            unit_id: unit.map(|u| u.to_string()),
            is_public: public,
        }
    }

    #[test]
    fn test_admin_sees_everything() {
        let admin = principal("a1", Role::Admin, &[]);
        let private = head("someone", Some("moze-1"), false);

        assert!(allows(&admin, &private, Access::Read));
        assert!(allows(&admin, &private, Access::Write));
    }

    #[test]
    fn test_owner_reads_and_writes_own() {
        let user = principal("u1", Role::Student, &[]);
        let own = head("u1", None, false);
        let other = head("u2", None, false);

        assert!(allows(&user, &own, Access::Read));
        assert!(allows(&user, &own, Access::Write));
        assert!(!allows(&user, &other, Access::Read));
        assert!(!allows(&user, &other, Access::Write));
    }

    #[test]
    fn test_manager_covers_assigned_unit_only() {
        let aamil = principal("a1", Role::Aamil, &["moze-1"]);
        let in_unit = head("u2", Some("moze-1"), false);
        let out_of_unit = head("u2", Some("moze-2"), false);

        assert!(allows(&aamil, &in_unit, Access::Read));
        assert!(allows(&aamil, &in_unit, Access::Write));
        assert!(!allows(&aamil, &out_of_unit, Access::Read));
        assert!(!allows(&aamil, &out_of_unit, Access::Write));
    }

    #[test]
    fn test_management_requires_staff_role() {
        // A student somehow holding a unit assignment still gets no
        // management visibility - rule 3 requires a staff role.
        let student = principal("s1", Role::Student, &["moze-1"]);
        let in_unit = head("u2", Some("moze-1"), false);

        assert!(!allows(&student, &in_unit, Access::Read));
    }

    #[test]
    fn test_public_read_only_for_strangers() {
        let user = principal("u1", Role::Doctor, &[]);
        let public = head("u2", Some("moze-1"), true);

        assert!(allows(&user, &public, Access::Read));
        assert!(!allows(&user, &public, Access::Write));
    }

    #[test]
    fn test_anonymous_reads_public_only() {
        let anon = Principal::anonymous();

        assert!(allows(&anon, &head("u1", None, true), Access::Read));
        assert!(!allows(&anon, &head("u1", None, true), Access::Write));
        assert!(!allows(&anon, &head("u1", None, false), Access::Read));
    }

    #[test]
    fn test_anonymous_never_matches_empty_owner() {
        // Defensive: an anonymous principal has an empty id; it must not
        // accidentally satisfy the ownership rule.
        let anon = Principal::anonymous();
        let orphan = head("", None, false);

        assert!(!allows(&anon, &orphan, Access::Read));
    }

    #[test]
    fn test_null_unit_never_visible_via_management() {
        let coordinator = principal("c1", Role::MozeCoordinator, &["moze-1"]);
        let unitless = head("u2", None, false);

        assert!(!allows(&coordinator, &unitless, Access::Read));
    }

    #[test]
    fn test_private_denied_for_every_unrelated_role() {
        let private = head("owner", Some("moze-9"), false);
        for role in [
            Role::Aamil,
            Role::MozeCoordinator,
            Role::Doctor,
            Role::Student,
            Role::Other,
        ] {
            let p = principal("stranger", role, &[]);
            assert!(!allows(&p, &private, Access::Read), "role {role}");
            assert!(!allows(&p, &private, Access::Write), "role {role}");
        }
    }

    #[test]
    fn test_scope_admin_unrestricted() {
        let admin = principal("a1", Role::Admin, &[]);
        assert_eq!(scope(&admin, Access::Read), VisibilityScope::All);
        assert_eq!(scope(&admin, Access::Write), VisibilityScope::All);
    }

    #[test]
    fn test_scope_read_includes_public() {
        let aamil = principal("a1", Role::Aamil, &["moze-1", "moze-2"]);
        match scope(&aamil, Access::Read) {
            VisibilityScope::Scoped {
                principal_id,
                managed_units,
                include_public,
            } => {
                assert_eq!(principal_id, "a1");
                assert_eq!(managed_units.len(), 2);
                assert!(include_public);
            }
            other => panic!("unexpected scope: {other:?}"),
        }
    }

    #[test]
    fn test_scope_write_excludes_public() {
        let user = principal("u1", Role::Student, &[]);
        match scope(&user, Access::Write) {
            VisibilityScope::Scoped {
                managed_units,
                include_public,
                ..
            } => {
                assert!(managed_units.is_empty());
                assert!(!include_public);
            }
            other => panic!("unexpected scope: {other:?}"),
        }
    }

    #[test]
    fn test_scope_ignores_assignments_of_non_staff_roles() {
        let doctor = principal("d1", Role::Doctor, &["moze-1"]);
        match scope(&doctor, Access::Read) {
            VisibilityScope::Scoped { managed_units, .. } => {
                assert!(managed_units.is_empty());
            }
            other => panic!("unexpected scope: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_role_degrades_to_other() {
        assert_eq!(Role::parse("superuser"), Role::Other);
        assert_eq!(Role::parse(""), Role::Other);
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("moze_coordinator"), Role::MozeCoordinator);
    }

    #[test]
    fn test_role_round_trip() {
        for role in [
            Role::Admin,
            Role::Aamil,
            Role::MozeCoordinator,
            Role::Doctor,
            Role::Student,
            Role::Other,
        ] {
            assert_eq!(Role::parse(role.as_str()), role);
        }
    }
}
