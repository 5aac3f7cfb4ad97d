use thiserror::Error;

/// Error
///
/// Every failure the core can hand back to the transport layer. The core never
/// renders output or writes HTTP responses: the caller turns these into flash
/// messages and redirects. Nothing here is fatal to the process; all failures
/// are per-request.
#[derive(Debug, Error)]
pub enum Error {
    /// Registration or rating validation failure. The reason is surfaced
    /// verbatim as a user-visible message.
    #[error("{reason}")]
    ValidationFailed {
        /// The offending input field ("username", "email", "password", "rating", "tag").
        field: &'static str,
        reason: String,
    },

    /// A read-by-id missed. The caller must treat this as a terminal request
    /// failure (no partial render).
    #[error("not found")]
    NotFound,

    /// A required `can_manage_*` check returned false. Deliberately generic:
    /// the message never leaks which specific check failed.
    #[error("You do not have permission to perform this action")]
    Unauthorized,

    /// Login: no user matches the given username or email.
    #[error("No account matches that username or email")]
    UnknownIdentifier,

    /// Login: the identifier matched but the password did not.
    #[error("Wrong username/email or password")]
    BadCredential,

    /// Login: the session exhausted its attempt budget. Must not reveal
    /// whether the identifier itself was valid.
    #[error("Too many login attempts, please wait a few minutes and try again")]
    TooManyAttempts,

    /// Underlying data-store failure, propagated as-is.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Password hashing or verification failed (bad stored hash, panicked task).
    #[error("password hashing failed")]
    Hash,
}

impl Error {
    /// Shorthand for the validation variant, which gets constructed all over
    /// the registration path.
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Error::ValidationFailed {
            field,
            reason: reason.into(),
        }
    }
}
