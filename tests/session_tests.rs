use chrono::{Duration, Utc};
use reviewsplus::session::{ATTEMPT_WINDOW_SECS, MAX_LOGIN_ATTEMPTS, Session, SessionStore};

// --- Flash messages ---

#[test]
fn test_error_message_is_read_once() {
    let mut session = Session::new();
    assert_eq!(session.take_error(), None);

    session.set_error("Something went wrong");
    assert_eq!(session.take_error(), Some("Something went wrong".to_string()));
    // Consumed: the next response in the flow sees nothing.
    assert_eq!(session.take_error(), None);
}

#[test]
fn test_registration_error_is_independent_of_general_error() {
    let mut session = Session::new();
    session.set_error("general");
    session.set_registration_error("Passwords do not match");

    assert_eq!(
        session.take_registration_error(),
        Some("Passwords do not match".to_string())
    );
    // The general channel is untouched.
    assert_eq!(session.take_error(), Some("general".to_string()));
    assert_eq!(session.take_registration_error(), None);
}

// --- Breadcrumbs ---

#[test]
fn test_breadcrumbs_track_last_viewed_parents() {
    let mut session = Session::new();
    assert_eq!(session.current_category_id, None);
    assert_eq!(session.current_review_id, None);

    session.visit_category(7);
    session.visit_review(42);
    assert_eq!(session.current_category_id, Some(7));
    assert_eq!(session.current_review_id, Some(42));

    // Viewing another category just repoints the breadcrumb.
    session.visit_category(9);
    assert_eq!(session.current_category_id, Some(9));
}

// --- Identity ---

#[test]
fn test_bind_and_clear_identity() {
    let mut session = Session::new();
    assert!(!session.is_authenticated());

    session.bind(12);
    assert!(session.is_authenticated());
    assert_eq!(session.user_id, Some(12));

    session.clear_identity();
    assert!(!session.is_authenticated());
    session.clear_identity(); // idempotent
    assert!(!session.is_authenticated());
}

// --- Attempt tracking ---

#[test]
fn test_attempt_counter_and_window_reset() {
    let mut session = Session::new();
    let t0 = Utc::now();

    for i in 0..MAX_LOGIN_ATTEMPTS {
        session.record_attempt(t0 + Duration::seconds(i as i64));
        assert!(!session.attempts_exceeded());
    }
    session.record_attempt(t0 + Duration::seconds(10));
    assert!(session.attempts_exceeded());

    // A stale window (strictly more than the window length since the last
    // attempt) resets the counter before the new attempt is counted.
    session.record_attempt(t0 + Duration::seconds(10 + ATTEMPT_WINDOW_SECS + 1));
    assert_eq!(session.login_attempts, 1);
    assert!(!session.attempts_exceeded());
}

#[test]
fn test_attempts_within_window_keep_accumulating() {
    let mut session = Session::new();
    let t0 = Utc::now();

    session.record_attempt(t0);
    // Exactly at the window boundary is still inside the window.
    session.record_attempt(t0 + Duration::seconds(ATTEMPT_WINDOW_SECS));
    assert_eq!(session.login_attempts, 2);
}

#[test]
fn test_reset_attempts_clears_budget() {
    let mut session = Session::new();
    for _ in 0..7 {
        session.record_attempt(Utc::now());
    }
    assert!(session.attempts_exceeded());

    session.reset_attempts();
    assert_eq!(session.login_attempts, 0);
    assert_eq!(session.last_attempt, None);
}

// --- Session store ---

#[test]
fn test_store_round_trips_sessions_by_token() {
    let store = SessionStore::new();
    let token = store.create();

    let mut session = store.load(&token).expect("fresh session exists");
    assert!(!session.is_authenticated());

    session.bind(3);
    session.visit_category(5);
    store.save(token, session);

    let reloaded = store.load(&token).unwrap();
    assert_eq!(reloaded.user_id, Some(3));
    assert_eq!(reloaded.current_category_id, Some(5));
}

#[test]
fn test_store_tokens_are_distinct_and_removable() {
    let store = SessionStore::new();
    let a = store.create();
    let b = store.create();
    assert_ne!(a, b);

    store.remove(&a);
    assert!(store.load(&a).is_none());
    assert!(store.load(&b).is_some());
}
