use chrono::{Duration, Utc};
use reviewsplus::accounts::{is_email, login, logout, register};
use reviewsplus::error::Error;
use reviewsplus::models::{LoginRequest, RegisterRequest};
use reviewsplus::password::PasswordHasher;
use reviewsplus::repository::MemoryRepository;
use reviewsplus::session::Session;

// --- Helpers ---

/// Argon2 with minimal cost so the suite stays fast. Production parameters
/// only differ in cost, not in behavior.
fn fast_hasher() -> PasswordHasher {
    PasswordHasher::with_params(1024, 1, 1)
}

fn valid_registration() -> RegisterRequest {
    RegisterRequest {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password: "password1".to_string(),
        confirm_password: "password1".to_string(),
    }
}

async fn register_alice(repo: &MemoryRepository, hasher: &PasswordHasher) -> i64 {
    let mut session = Session::new();
    register(repo, hasher, &mut session, &valid_registration())
        .await
        .expect("registration should succeed")
        .id
}

// --- Email syntax ---

#[test]
fn test_email_syntax_check() {
    assert!(is_email("a@x.com"));
    assert!(is_email("first.last@sub.domain.org"));

    assert!(!is_email("no-at-sign.com"));
    assert!(!is_email("two@@x.com"));
    assert!(!is_email("a@b@c.com"));
    assert!(!is_email("@x.com"));
    assert!(!is_email("a@nodot"));
    assert!(!is_email(""));
}

// --- Registration ---

#[tokio::test]
async fn test_register_success_binds_session_and_hashes_password() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    let mut session = Session::new();

    let user = register(&repo, &hasher, &mut session, &valid_registration())
        .await
        .unwrap();

    assert_eq!(session.user_id, Some(user.id));
    assert!(!user.admin);
    // Stored credential is a salted PHC-format digest, never the plaintext.
    assert!(user.password_hash.starts_with("$argon2id$"));
    assert_ne!(user.password_hash, "password1");
}

#[tokio::test]
async fn test_register_rejects_taken_username_even_with_fresh_email() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    register_alice(&repo, &hasher).await;

    let mut session = Session::new();
    let mut req = valid_registration();
    req.email = "different@example.com".to_string();

    let err = register(&repo, &hasher, &mut session, &req).await.unwrap_err();
    match err {
        Error::ValidationFailed { field, reason } => {
            assert_eq!(field, "username");
            assert_eq!(reason, "already exists");
        }
        other => panic!("expected username validation failure, got {:?}", other),
    }
    assert_eq!(session.user_id, None);
}

#[tokio::test]
async fn test_register_rejects_taken_email() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    register_alice(&repo, &hasher).await;

    let mut session = Session::new();
    let mut req = valid_registration();
    req.username = "alice2".to_string();

    let err = register(&repo, &hasher, &mut session, &req).await.unwrap_err();
    assert!(matches!(
        err,
        Error::ValidationFailed { field: "email", .. }
    ));
}

#[tokio::test]
async fn test_register_rejects_malformed_email() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();

    for bad in ["plainaddress", "a@b@c.com", "@x.com", "a@nodot"] {
        let mut session = Session::new();
        let mut req = valid_registration();
        req.email = bad.to_string();

        let err = register(&repo, &hasher, &mut session, &req).await.unwrap_err();
        assert!(
            matches!(err, Error::ValidationFailed { field: "email", .. }),
            "{} should be rejected",
            bad
        );
    }
}

#[tokio::test]
async fn test_register_rejects_password_mismatch() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    let mut session = Session::new();
    let mut req = valid_registration();
    req.confirm_password = "password2".to_string();

    let err = register(&repo, &hasher, &mut session, &req).await.unwrap_err();
    match err {
        Error::ValidationFailed { field, reason } => {
            assert_eq!(field, "password");
            assert_eq!(reason, "Passwords do not match");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    let mut session = Session::new();
    let mut req = valid_registration();
    req.password = "pass1".to_string();
    req.confirm_password = "pass1".to_string();

    let err = register(&repo, &hasher, &mut session, &req).await.unwrap_err();
    match err {
        Error::ValidationFailed { reason, .. } => {
            assert_eq!(reason, "Password needs to be 8 characters or more");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_register_rejects_password_without_digit() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    let mut session = Session::new();
    let mut req = valid_registration();
    req.password = "passwords".to_string();
    req.confirm_password = "passwords".to_string();

    let err = register(&repo, &hasher, &mut session, &req).await.unwrap_err();
    match err {
        Error::ValidationFailed { reason, .. } => {
            assert_eq!(reason, "Password needs to contain at least one number");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_register_first_failing_check_wins() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    register_alice(&repo, &hasher).await;

    // Taken username AND malformed email AND short password: the username
    // check runs first, so that is the message reported.
    let mut session = Session::new();
    let req = RegisterRequest {
        username: "alice".to_string(),
        email: "not-an-email".to_string(),
        password: "x".to_string(),
        confirm_password: "x".to_string(),
    };

    let err = register(&repo, &hasher, &mut session, &req).await.unwrap_err();
    assert!(matches!(
        err,
        Error::ValidationFailed {
            field: "username",
            ..
        }
    ));
}

// --- Login ---

#[tokio::test]
async fn test_login_by_username_and_by_email() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    let alice_id = register_alice(&repo, &hasher).await;

    let mut session = Session::new();
    let by_name = LoginRequest {
        identifier: "alice".to_string(),
        password: "password1".to_string(),
    };
    let user = login(&repo, &hasher, &mut session, &by_name, Utc::now())
        .await
        .unwrap();
    assert_eq!(user.id, alice_id);
    assert_eq!(session.user_id, Some(alice_id));

    let mut session = Session::new();
    let by_email = LoginRequest {
        identifier: "alice@example.com".to_string(),
        password: "password1".to_string(),
    };
    let user = login(&repo, &hasher, &mut session, &by_email, Utc::now())
        .await
        .unwrap();
    assert_eq!(user.id, alice_id);
}

#[tokio::test]
async fn test_login_unknown_identifier() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    let mut session = Session::new();

    let req = LoginRequest {
        identifier: "nobody".to_string(),
        password: "password1".to_string(),
    };
    let err = login(&repo, &hasher, &mut session, &req, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownIdentifier));
    assert_eq!(session.user_id, None);
}

#[tokio::test]
async fn test_login_bad_credential() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    register_alice(&repo, &hasher).await;

    let mut session = Session::new();
    let req = LoginRequest {
        identifier: "alice".to_string(),
        password: "wrongpass1".to_string(),
    };
    let err = login(&repo, &hasher, &mut session, &req, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadCredential));
    assert_eq!(session.user_id, None);
}

// --- Lockout policy ---

#[tokio::test]
async fn test_sixth_attempt_in_window_is_locked_out() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    register_alice(&repo, &hasher).await;

    let mut session = Session::new();
    let bad = LoginRequest {
        identifier: "alice".to_string(),
        password: "wrongpass1".to_string(),
    };
    let t0 = Utc::now();

    for i in 0..5 {
        let err = login(&repo, &hasher, &mut session, &bad, t0 + Duration::seconds(i))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BadCredential));
    }

    // 6th attempt inside the window: refused before any credential check,
    // even though the password is now correct.
    let good = LoginRequest {
        identifier: "alice".to_string(),
        password: "password1".to_string(),
    };
    let err = login(&repo, &hasher, &mut session, &good, t0 + Duration::seconds(10))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TooManyAttempts));
}

#[tokio::test]
async fn test_lockout_does_not_reveal_identifier_validity() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();

    // No users at all: the locked-out response is indistinguishable from the
    // locked-out response for a real account.
    let mut session = Session::new();
    let req = LoginRequest {
        identifier: "ghost".to_string(),
        password: "whatever1".to_string(),
    };
    let t0 = Utc::now();
    for i in 0..5 {
        let err = login(&repo, &hasher, &mut session, &req, t0 + Duration::seconds(i))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownIdentifier));
    }
    let err = login(&repo, &hasher, &mut session, &req, t0 + Duration::seconds(6))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TooManyAttempts));
}

#[tokio::test]
async fn test_lockout_window_resets_after_300_seconds() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    register_alice(&repo, &hasher).await;

    let mut session = Session::new();
    let bad = LoginRequest {
        identifier: "alice".to_string(),
        password: "wrongpass1".to_string(),
    };
    let t0 = Utc::now();
    for i in 0..6 {
        let _ = login(&repo, &hasher, &mut session, &bad, t0 + Duration::seconds(i)).await;
    }
    assert!(session.attempts_exceeded());

    // More than 300 seconds after the last attempt the counter resets and the
    // next attempt is evaluated normally.
    let later = t0 + Duration::seconds(5 + 301);
    let good = LoginRequest {
        identifier: "alice".to_string(),
        password: "password1".to_string(),
    };
    let user = login(&repo, &hasher, &mut session, &good, later).await;
    assert!(user.is_ok());
    assert!(session.user_id.is_some());
}

#[tokio::test]
async fn test_successful_login_resets_attempt_budget() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    register_alice(&repo, &hasher).await;

    let mut session = Session::new();
    let bad = LoginRequest {
        identifier: "alice".to_string(),
        password: "wrongpass1".to_string(),
    };
    let good = LoginRequest {
        identifier: "alice".to_string(),
        password: "password1".to_string(),
    };
    let t0 = Utc::now();

    for i in 0..3 {
        let _ = login(&repo, &hasher, &mut session, &bad, t0 + Duration::seconds(i)).await;
    }
    login(&repo, &hasher, &mut session, &good, t0 + Duration::seconds(4))
        .await
        .unwrap();
    assert_eq!(session.login_attempts, 0);
}

// --- Logout ---

#[tokio::test]
async fn test_logout_is_idempotent() {
    let repo = MemoryRepository::new();
    let hasher = fast_hasher();
    let mut session = Session::new();

    register(&repo, &hasher, &mut session, &valid_registration())
        .await
        .unwrap();
    assert!(session.is_authenticated());

    logout(&mut session);
    assert!(!session.is_authenticated());

    // A second logout on an already-anonymous session still succeeds.
    logout(&mut session);
    assert!(!session.is_authenticated());
}
