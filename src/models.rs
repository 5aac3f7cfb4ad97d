use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// Canonical identity record from the `users` table. The password hash is the
/// PHC-format Argon2id digest produced at registration; it is never serialized
/// out to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct User {
    pub id: i64,
    /// Unique display name, usable as a login identifier.
    pub name: String,
    /// Unique email address, also usable as a login identifier.
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Global admin flag: grants management rights over every category,
    /// review, and sub-review.
    pub admin: bool,
}

/// Category
///
/// A topic grouping for reviews. The creating user is granted moderator of
/// the category in the same gateway operation that inserts the row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// Review
///
/// A rated write-up posted inside one category.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Review {
    pub id: i64,
    pub title: String,
    pub body: String,
    /// 1..=5 inclusive, enforced at create and update time.
    pub rating: i32,
    pub author_id: i64,
    pub category_id: i64,
}

/// SubReview
///
/// A threaded response to a review. Leaf entity: nothing cascades from it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct SubReview {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub rating: i32,
    pub author_id: i64,
    pub review_id: i64,
}

/// Tag
///
/// A label scoped to exactly one category. A tag may only ever be attached to
/// reviews of that category.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Default)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
}

// --- Request Payloads (Input Schemas) ---

/// RegisterRequest
///
/// Input for `accounts::register`. The transport layer binds this from the
/// registration form before the core ever sees loosely-typed params.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// LoginRequest
///
/// Input for `accounts::login`. The identifier may be a username or an email;
/// the core disambiguates by syntax.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoginRequest {
    pub identifier: String,
    pub password: String,
}

/// NewReview
///
/// Insert payload for a review. The author id comes from the bound session,
/// never from the form.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewReview {
    pub title: String,
    pub body: String,
    pub rating: i32,
    pub author_id: i64,
    pub category_id: i64,
}

/// NewSubReview
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewSubReview {
    pub title: String,
    pub body: String,
    pub rating: i32,
    pub author_id: i64,
    pub review_id: i64,
}

/// UpdateReview
///
/// Partial update payload. `Option<T>` fields with skipped `None`s so only
/// the provided columns change (COALESCE on the Postgres side).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateReview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
}

/// UpdateSubReview
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateSubReview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,
}

// --- Validation Helpers ---

/// validate_rating
///
/// True iff the rating sits in the accepted 1..=5 band. Out-of-band ratings
/// are rejected, never clamped.
pub fn validate_rating(rating: i32) -> bool {
    (1..=5).contains(&rating)
}
