//! Service layer for sehhat-registry
//!
//! Services encapsulate business logic between HTTP handlers and
//! repositories. Each service wraps database operations with:
//! - Input validation
//! - Visibility enforcement
//! - Event emission for audit/notifications
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod response;
pub mod events;
pub mod content_service;
pub mod survey_service;
pub mod petition_service;
pub mod directory_service;

// Re-exports
pub use response::*;
pub use events::{EventBus, RegistryEvent, EventListener};
pub use content_service::{ContentService, UpdateContentInput};
pub use survey_service::{AnalyticsSnapshot, SubmitResponseInput, SurveyService};
pub use petition_service::PetitionService;
pub use directory_service::DirectoryService;

use crate::db::RegistryDb;
use std::sync::Arc;

/// Default freshness window for cached analytics snapshots
pub const DEFAULT_ANALYTICS_TTL_SECS: u64 = 300;

/// Service container for dependency injection
///
/// Holds all services with shared database connection.
/// Pass this to HttpServer for handler access.
pub struct Services {
    pub directory: Arc<DirectoryService>,
    pub content: Arc<ContentService>,
    pub survey: Arc<SurveyService>,
    pub petition: Arc<PetitionService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services with shared database
    pub fn new(db: Arc<RegistryDb>) -> Self {
        Self::with_analytics_ttl(db, DEFAULT_ANALYTICS_TTL_SECS)
    }

    /// Create all services with a specific analytics cache TTL
    pub fn with_analytics_ttl(db: Arc<RegistryDb>, analytics_ttl_secs: u64) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            directory: Arc::new(DirectoryService::new(db.clone(), events.clone())),
            content: Arc::new(ContentService::new(db.clone(), events.clone())),
            survey: Arc::new(SurveyService::new(db.clone(), events.clone(), analytics_ttl_secs)),
            petition: Arc::new(PetitionService::new(db.clone(), events.clone())),
            events,
        }
    }
}
