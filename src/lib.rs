//! Core of a multi-user review-sharing site: users create categories, post
//! reviews and threaded sub-reviews, tag reviews, and moderate content.
//! Access control layers plain ownership, per-category moderation, and a
//! global admin flag.
//!
//! This crate owns the authorization model, the session-state model, account
//! registration/login, and the persistence gateway. The HTTP/template layer
//! is an external collaborator: it resolves a session from a request token,
//! calls into this core, and turns the returned values and errors into pages
//! and redirects. The core never renders output and never writes responses.

use std::sync::Arc;

// --- Module Structure ---

// Core application services and components.
pub mod accounts;
pub mod authz;
pub mod config;
pub mod error;
pub mod models;
pub mod password;
pub mod repository;
pub mod session;

// --- Public Re-exports ---

// Makes core state types easily accessible to the embedding transport layer.
pub use config::{AppConfig, Env};
pub use error::Error;
pub use password::PasswordHasher;
pub use repository::{MemoryRepository, PostgresRepository, Repository, RepositoryState};
pub use session::{Session, SessionStore};

/// AppState
///
/// The single, thread-safe container holding all core services the transport
/// layer needs per request: the persistence gateway, the password hasher, the
/// session store, and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    /// Repository layer: abstracts data-store access.
    pub repo: RepositoryState,
    /// Credential hashing service.
    pub hasher: PasswordHasher,
    /// Token-keyed session storage, shared across requests.
    pub sessions: Arc<SessionStore>,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Assembles the state over the given repository with default services.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            repo,
            hasher: PasswordHasher::new(),
            sessions: Arc::new(SessionStore::new()),
            config,
        }
    }
}
