//! Sehhat Registry - community records service for Umoor Sehhat
//!
//! Stores the community directory (principals and Moze units), shared
//! content (photos, albums, comments, likes), surveys with their
//! responses, and petitions (Araz), and answers two questions the
//! surrounding applications keep asking:
//!
//! - **Who may see what?** A pure role-based visibility resolver filters
//!   every read and gates every write (admin > owner > unit staff >
//!   public-read).
//! - **What did the community answer?** A pure aggregator computes
//!   per-question distributions, response and completion rates over a
//!   survey's collected responses.
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin, hyper)        http.rs
//!     ↓
//! Service Layer (business logic)     services/*
//!     ↓
//! Repository Layer (SQL per entity)  db/*
//!     ↓
//! SQLite Database (rusqlite, WAL)
//! ```
//!
//! The visibility resolver (`visibility.rs`) and the response
//! aggregator (`analytics.rs`) are side-effect-free modules; the service
//! layer feeds them snapshots from the store. Analytics snapshots are
//! cached per survey and invalidated on submission - they are derived
//! data, never the source of truth.

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod services;
pub mod visibility;

// Re-exports
pub use config::Config;
pub use db::RegistryDb;
pub use error::RegistryError;
pub use http::HttpServer;
pub use services::Services;
pub use visibility::{Access, Principal, Role};
