use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::models::{LoginRequest, RegisterRequest, User};
use crate::password::PasswordHasher;
use crate::repository::Repository;
use crate::session::Session;

/// is_email
///
/// The syntax check used both to validate registration emails and to
/// disambiguate login identifiers: exactly one "@", a non-empty local part,
/// and a domain containing a ".".
pub fn is_email(candidate: &str) -> bool {
    let mut parts = candidate.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty() && domain.contains('.')
}

/// register
///
/// Validates the registration form, hashes the password, inserts the user,
/// and binds the session to the new identity. The checks run in a fixed
/// order and the first failure wins, so the caller always gets one specific
/// message back.
pub async fn register(
    repo: &dyn Repository,
    hasher: &PasswordHasher,
    session: &mut Session,
    req: &RegisterRequest,
) -> Result<User, Error> {
    if repo.find_user_by_name(&req.username).await?.is_some() {
        return Err(Error::validation("username", "already exists"));
    }
    if !is_email(&req.email) {
        return Err(Error::validation("email", "Email address is not valid"));
    }
    if repo.find_user_by_email(&req.email).await?.is_some() {
        return Err(Error::validation("email", "already exists"));
    }
    if req.password != req.confirm_password {
        return Err(Error::validation("password", "Passwords do not match"));
    }
    if req.password.chars().count() < 8 {
        return Err(Error::validation(
            "password",
            "Password needs to be 8 characters or more",
        ));
    }
    if !req.password.chars().any(|c| c.is_ascii_digit()) {
        return Err(Error::validation(
            "password",
            "Password needs to contain at least one number",
        ));
    }

    let password_hash = hasher.hash(req.password.clone()).await?;
    // New accounts never start with the admin flag; that is flipped by an
    // existing admin out of band.
    let user = repo
        .insert_user(&req.username, &req.email, &password_hash, false)
        .await?;

    tracing::debug!(user_id = user.id, "registered new user");
    session.bind(user.id);
    Ok(user)
}

/// login
///
/// Authenticates a username-or-email identifier against the stored hash.
///
/// The lockout bookkeeping happens before anything else: the attempt is
/// recorded, and once the session exceeds its budget the request is refused
/// with `TooManyAttempts` without any user lookup or hash verification. That
/// keeps a locked-out session from amplifying hash cost and keeps the lockout
/// response from revealing whether the identifier was valid.
pub async fn login(
    repo: &dyn Repository,
    hasher: &PasswordHasher,
    session: &mut Session,
    req: &LoginRequest,
    now: DateTime<Utc>,
) -> Result<User, Error> {
    session.record_attempt(now);
    if session.attempts_exceeded() {
        return Err(Error::TooManyAttempts);
    }

    let user = if is_email(&req.identifier) {
        repo.find_user_by_email(&req.identifier).await?
    } else {
        repo.find_user_by_name(&req.identifier).await?
    };
    let Some(user) = user else {
        return Err(Error::UnknownIdentifier);
    };

    if !hasher
        .verify(req.password.clone(), user.password_hash.clone())
        .await?
    {
        return Err(Error::BadCredential);
    }

    session.reset_attempts();
    session.bind(user.id);
    tracing::debug!(user_id = user.id, "login succeeded");
    Ok(user)
}

/// logout
///
/// Clears the bound identity. Idempotent: logging out an anonymous session is
/// a no-op that still succeeds.
pub fn logout(session: &mut Session) {
    session.clear_identity();
}
