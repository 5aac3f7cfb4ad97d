use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Login attempts allowed inside one window before the session is refused.
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;
/// Seconds of inactivity after which the attempt counter resets.
pub const ATTEMPT_WINDOW_SECS: i64 = 300;

/// Session
///
/// The explicit per-browser-session context object passed into every core
/// call. The transport layer loads it from the `SessionStore` before a request
/// and saves it back after; the core never touches ambient global state.
///
/// The breadcrumb fields are best-effort UX state (pre-filling "new review" /
/// "new tag" forms with the right parent id) and are never consulted by
/// authorization.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Identity bound at register/login time; `None` while anonymous.
    pub user_id: Option<i64>,
    /// Single-shot general error message.
    error: Option<String>,
    /// Single-shot registration form error message.
    registration_error: Option<String>,
    /// Failed-or-not login attempts inside the current window.
    pub login_attempts: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    /// Last viewed category.
    pub current_category_id: Option<i64>,
    /// Last viewed review.
    pub current_review_id: Option<i64>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Binds the session to a user id (the Anonymous -> Authenticated
    /// transition).
    pub fn bind(&mut self, user_id: i64) {
        self.user_id = Some(user_id);
    }

    /// Clears the bound identity. Idempotent; always succeeds.
    pub fn clear_identity(&mut self) {
        self.user_id = None;
    }

    // --- Flash messages (read-once) ---

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Returns the pending error message and clears it, so the next response
    /// in the flow renders it exactly once.
    pub fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    pub fn set_registration_error(&mut self, message: impl Into<String>) {
        self.registration_error = Some(message.into());
    }

    pub fn take_registration_error(&mut self) -> Option<String> {
        self.registration_error.take()
    }

    // --- Breadcrumbs ---

    pub fn visit_category(&mut self, category_id: i64) {
        self.current_category_id = Some(category_id);
    }

    pub fn visit_review(&mut self, review_id: i64) {
        self.current_review_id = Some(review_id);
    }

    // --- Login attempt tracking ---

    /// Records a login attempt at `now`. A window that has gone stale (more
    /// than `ATTEMPT_WINDOW_SECS` since the previous attempt) resets the
    /// counter first; every attempt, allowed or refused, bumps the counter
    /// and the timestamp.
    pub fn record_attempt(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.last_attempt {
            if now - last > Duration::seconds(ATTEMPT_WINDOW_SECS) {
                self.login_attempts = 0;
            }
        }
        self.login_attempts += 1;
        self.last_attempt = Some(now);
    }

    /// True once the session has burned through its attempt budget, i.e. from
    /// the 6th attempt inside one window onward.
    pub fn attempts_exceeded(&self) -> bool {
        self.login_attempts > MAX_LOGIN_ATTEMPTS
    }

    /// Called after a successful login so the budget starts fresh.
    pub fn reset_attempts(&mut self) {
        self.login_attempts = 0;
        self.last_attempt = None;
    }
}

/// SessionStore
///
/// Token-keyed storage the transport layer loads sessions from and saves them
/// back to, one entry per browser session. The token travels in a cookie; the
/// session state itself never leaves the server.
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, Session>> {
        self.sessions.lock().expect("session store poisoned")
    }

    /// Creates a fresh anonymous session and returns its token.
    pub fn create(&self) -> Uuid {
        let token = Uuid::new_v4();
        self.lock().insert(token, Session::new());
        token
    }

    /// Loads a copy of the session for the given token, if one exists.
    pub fn load(&self, token: &Uuid) -> Option<Session> {
        self.lock().get(token).cloned()
    }

    /// Saves the (possibly mutated) session back under its token.
    pub fn save(&self, token: Uuid, session: Session) {
        self.lock().insert(token, session);
    }

    /// Drops the session entirely (e.g. on cookie expiry).
    pub fn remove(&self, token: &Uuid) {
        self.lock().remove(token);
    }
}
