//! SQLite database module for registry entities
//!
//! Single local store for principals, organizational units, content,
//! surveys with their responses, and petitions.
//!
//! ## Tables
//!
//! - `principals` - Actors with a role and an active flag
//! - `units` - Organizational units (Moze) with aamil/coordinator staffing
//! - `content` - Photos, albums, comments and likes over one common shape
//! - `surveys` / `survey_responses` - Question definitions and answer sets
//! - `petitions` - Araz requests with a review status

pub mod schema;
pub mod principals;
pub mod units;
pub mod content;
pub mod surveys;
pub mod petitions;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::RegistryError;

/// SQLite database for registry entities
pub struct RegistryDb {
    conn: Mutex<Connection>,
}

impl RegistryDb {
    /// Open or create the registry database
    pub fn open(db_path: &Path) -> Result<Self, RegistryError> {
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(db_path)
            .map_err(|e| RegistryError::Internal(format!("Failed to open SQLite: {}", e)))?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| RegistryError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, RegistryError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| RegistryError::Internal(format!("Failed to open in-memory SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| RegistryError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), RegistryError> {
        let conn = self.conn.lock()
            .map_err(|e| RegistryError::Internal(format!("Lock poisoned: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(())
    }

    /// Run a read operation against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&Connection) -> Result<T, RegistryError>,
    {
        let conn = self.conn.lock()
            .map_err(|e| RegistryError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Execute a write operation with exclusive access
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, RegistryError>
    where
        F: FnOnce(&mut Connection) -> Result<T, RegistryError>,
    {
        let mut conn = self.conn.lock()
            .map_err(|e| RegistryError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, RegistryError> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<u64, RegistryError> {
                let n: i64 = conn
                    .query_row(sql, [], |row| row.get(0))
                    .map_err(|e| RegistryError::Internal(format!("Query failed: {}", e)))?;
                Ok(n as u64)
            };

            Ok(DbStats {
                principal_count: count("SELECT COUNT(*) FROM principals")?,
                unit_count: count("SELECT COUNT(*) FROM units")?,
                content_count: count("SELECT COUNT(*) FROM content")?,
                survey_count: count("SELECT COUNT(*) FROM surveys")?,
                response_count: count("SELECT COUNT(*) FROM survey_responses")?,
                petition_count: count("SELECT COUNT(*) FROM petitions")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub principal_count: u64,
    pub unit_count: u64,
    pub content_count: u64,
    pub survey_count: u64,
    pub response_count: u64,
    pub petition_count: u64,
}

// Re-exports
pub use principals::{PrincipalRow, CreatePrincipalInput};
pub use units::{UnitRow, CreateUnitInput};
pub use content::{ContentRow, CreateContentInput, ContentQuery};
pub use surveys::{SurveyRow, CreateSurveyInput, ResponseRow, CreateResponseInput};
pub use petitions::{PetitionRow, CreatePetitionInput, PetitionStatus};
