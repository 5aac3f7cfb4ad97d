use crate::error::Error;
use crate::models::{
    Category, NewReview, NewSubReview, Review, SubReview, Tag, UpdateReview, UpdateSubReview,
    User, validate_rating,
};
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Repository Trait
///
/// The abstract contract for all persistence operations, shared across the
/// application as `Arc<dyn Repository>` so callers never know the concrete
/// backend (Postgres, in-memory, ...).
///
/// The required methods are single-table primitives. The provided methods at
/// the bottom compose them into the operations with real semantics: validated
/// creates/updates, the moderator auto-grant, the tag-scope check, and the
/// cascading deletes. Keeping the composition here means the behavior is
/// identical regardless of the storage engine, and directly testable.
///
/// Referential integrity is application-enforced: the schema carries no
/// foreign-key constraints, so the cascade routines below are the only thing
/// standing between a delete and orphaned rows. Deletes are idempotent
/// (`Ok(())` even when the row is already gone), which makes retrying a
/// partially failed cascade from the start always safe.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    /// Name and email are unique. A duplicate is refused with the same
    /// `ValidationFailed("already exists")` the registration path reports,
    /// on every backend.
    async fn insert_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        admin: bool,
    ) -> Result<User, Error>;
    async fn get_user(&self, id: i64) -> Result<User, Error>;
    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, Error>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;

    // --- Categories ---
    async fn insert_category(&self, name: &str) -> Result<Category, Error>;
    async fn get_category(&self, id: i64) -> Result<Category, Error>;
    async fn list_categories(&self) -> Result<Vec<Category>, Error>;
    async fn update_category(&self, id: i64, name: &str) -> Result<Category, Error>;
    async fn delete_category_row(&self, id: i64) -> Result<(), Error>;

    // --- Moderator relations ---
    // Granting is idempotent: granting an existing moderator is a no-op.
    async fn grant_moderator(&self, user_id: i64, category_id: i64) -> Result<(), Error>;
    async fn revoke_moderator(&self, user_id: i64, category_id: i64) -> Result<(), Error>;
    async fn is_moderator(&self, user_id: i64, category_id: i64) -> Result<bool, Error>;
    async fn list_moderators(&self, category_id: i64) -> Result<Vec<i64>, Error>;
    async fn delete_category_moderators(&self, category_id: i64) -> Result<(), Error>;

    // --- Reviews ---
    async fn insert_review(&self, new: &NewReview) -> Result<Review, Error>;
    async fn get_review(&self, id: i64) -> Result<Review, Error>;
    async fn list_reviews(&self, category_id: i64) -> Result<Vec<Review>, Error>;
    async fn update_review_row(&self, id: i64, upd: &UpdateReview) -> Result<Review, Error>;
    async fn delete_review_row(&self, id: i64) -> Result<(), Error>;

    // --- Sub-reviews ---
    async fn insert_sub_review(&self, new: &NewSubReview) -> Result<SubReview, Error>;
    async fn get_sub_review(&self, id: i64) -> Result<SubReview, Error>;
    async fn list_sub_reviews(&self, review_id: i64) -> Result<Vec<SubReview>, Error>;
    async fn update_sub_review_row(
        &self,
        id: i64,
        upd: &UpdateSubReview,
    ) -> Result<SubReview, Error>;
    /// Sub-reviews are leaves, so this needs no cascade counterpart.
    async fn delete_sub_review(&self, id: i64) -> Result<(), Error>;

    // --- Tags ---
    async fn insert_tag(&self, name: &str, category_id: i64) -> Result<Tag, Error>;
    async fn get_tag(&self, id: i64) -> Result<Tag, Error>;
    async fn list_tags(&self, category_id: i64) -> Result<Vec<Tag>, Error>;
    async fn update_tag(&self, id: i64, name: &str) -> Result<Tag, Error>;
    async fn delete_tag_row(&self, id: i64) -> Result<(), Error>;

    // --- Review <-> Tag relations ---
    async fn insert_review_tag(&self, review_id: i64, tag_id: i64) -> Result<(), Error>;
    async fn delete_review_tag(&self, review_id: i64, tag_id: i64) -> Result<(), Error>;
    async fn list_review_tags(&self, review_id: i64) -> Result<Vec<Tag>, Error>;
    async fn delete_review_relations(&self, review_id: i64) -> Result<(), Error>;
    async fn delete_tag_relations(&self, tag_id: i64) -> Result<(), Error>;

    // --- Composed Operations (shared semantics, all backends) ---

    /// create_category
    ///
    /// Inserts the category and grants the creator moderator of it in the same
    /// operation, so no category ever exists without its creator as moderator.
    /// The two statements are not crash-atomic; retrying is safe because the
    /// grant is idempotent.
    async fn create_category(&self, name: &str, creator_id: i64) -> Result<Category, Error> {
        let category = self.insert_category(name).await?;
        self.grant_moderator(creator_id, category.id).await?;
        Ok(category)
    }

    /// create_review
    ///
    /// Validates the rating band before anything is inserted.
    async fn create_review(&self, new: &NewReview) -> Result<Review, Error> {
        if !validate_rating(new.rating) {
            return Err(Error::validation("rating", "Rating must be between 1 and 5"));
        }
        self.insert_review(new).await
    }

    /// update_review
    ///
    /// An out-of-band rating rejects the whole update; it is never clamped.
    async fn update_review(&self, id: i64, upd: &UpdateReview) -> Result<Review, Error> {
        if let Some(rating) = upd.rating {
            if !validate_rating(rating) {
                return Err(Error::validation("rating", "Rating must be between 1 and 5"));
            }
        }
        self.update_review_row(id, upd).await
    }

    /// create_sub_review
    async fn create_sub_review(&self, new: &NewSubReview) -> Result<SubReview, Error> {
        if !validate_rating(new.rating) {
            return Err(Error::validation("rating", "Rating must be between 1 and 5"));
        }
        self.insert_sub_review(new).await
    }

    /// update_sub_review
    async fn update_sub_review(
        &self,
        id: i64,
        upd: &UpdateSubReview,
    ) -> Result<SubReview, Error> {
        if let Some(rating) = upd.rating {
            if !validate_rating(rating) {
                return Err(Error::validation("rating", "Rating must be between 1 and 5"));
            }
        }
        self.update_sub_review_row(id, upd).await
    }

    /// attach_tag
    ///
    /// Refuses the relation unless the tag belongs to the review's category.
    /// The check happens before any row is inserted.
    async fn attach_tag(&self, review_id: i64, tag_id: i64) -> Result<(), Error> {
        let review = self.get_review(review_id).await?;
        let tag = self.get_tag(tag_id).await?;
        if tag.category_id != review.category_id {
            return Err(Error::validation(
                "tag",
                "That tag does not belong to that category",
            ));
        }
        self.insert_review_tag(review_id, tag_id).await
    }

    /// delete_review
    ///
    /// Cascade: sub-reviews first, then the tag relations, then the review row
    /// itself, so no child ever outlives its parent.
    async fn delete_review(&self, id: i64) -> Result<(), Error> {
        for sub in self.list_sub_reviews(id).await? {
            self.delete_sub_review(sub.id).await?;
        }
        self.delete_review_relations(id).await?;
        self.delete_review_row(id).await
    }

    /// delete_category
    ///
    /// Full cascade: every review in the category (each cascading its own
    /// sub-reviews and tag relations), then the category's tags, then the
    /// moderator relations, then the category row.
    async fn delete_category(&self, id: i64) -> Result<(), Error> {
        for review in self.list_reviews(id).await? {
            self.delete_review(review.id).await?;
        }
        for tag in self.list_tags(id).await? {
            self.delete_tag(tag.id).await?;
        }
        self.delete_category_moderators(id).await?;
        self.delete_category_row(id).await
    }

    /// delete_tag
    ///
    /// Relations first, then the tag row, so nothing ever dangles.
    async fn delete_tag(&self, id: i64) -> Result<(), Error> {
        self.delete_tag_relations(id).await?;
        self.delete_tag_row(id).await
    }
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres Implementation ---

/// Schema for the backing store. Deliberately **without** foreign-key
/// constraints: integrity is enforced by the cascade routines above, so the
/// behavior stays the same on any engine.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    admin BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE TABLE IF NOT EXISTS categories (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS reviews (
    id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    rating INT NOT NULL,
    author_id BIGINT NOT NULL,
    category_id BIGINT NOT NULL
);
CREATE TABLE IF NOT EXISTS sub_reviews (
    id BIGSERIAL PRIMARY KEY,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    rating INT NOT NULL,
    author_id BIGINT NOT NULL,
    review_id BIGINT NOT NULL
);
CREATE TABLE IF NOT EXISTS tags (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    category_id BIGINT NOT NULL
);
CREATE TABLE IF NOT EXISTS moderator_category_relation (
    mod_id BIGINT NOT NULL,
    category_id BIGINT NOT NULL,
    PRIMARY KEY (mod_id, category_id)
);
CREATE TABLE IF NOT EXISTS review_tag_relation (
    review_id BIGINT NOT NULL,
    tag_id BIGINT NOT NULL,
    PRIMARY KEY (review_id, tag_id)
);
"#;

/// PostgresRepository
///
/// The production implementation, backed by a PostgreSQL connection pool.
/// Queries use the runtime-checked sqlx API so the crate builds without a
/// live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository over an already-initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a small pool to the given database URL. Single-operator
    /// low-traffic deployment target; five connections is plenty.
    pub async fn connect(db_url: &str) -> Result<Self, Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Creates all tables if they do not exist yet. Safe to call at startup.
    pub async fn ensure_schema(&self) -> Result<(), Error> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn insert_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        admin: bool,
    ) -> Result<User, Error> {
        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (name, email, password_hash, admin)
               VALUES ($1, $2, $3, $4)
               RETURNING id, name, email, password_hash, admin"#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(admin)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                let field = if db.constraint() == Some("users_email_key") {
                    "email"
                } else {
                    "username"
                };
                Error::validation(field, "already exists")
            }
            _ => Error::Database(e),
        })?;
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<User, Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, admin FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound)
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, admin FROM users WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, name, email, password_hash, admin FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_category(&self, name: &str) -> Result<Category, Error> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn get_category(&self, id: i64) -> Result<Category, Error> {
        sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, Error> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn update_category(&self, id: i64, name: &str) -> Result<Category, Error> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound)
    }

    async fn delete_category_row(&self, id: i64) -> Result<(), Error> {
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn grant_moderator(&self, user_id: i64, category_id: i64) -> Result<(), Error> {
        sqlx::query(
            r#"INSERT INTO moderator_category_relation (mod_id, category_id)
               VALUES ($1, $2) ON CONFLICT DO NOTHING"#,
        )
        .bind(user_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_moderator(&self, user_id: i64, category_id: i64) -> Result<(), Error> {
        sqlx::query(
            "DELETE FROM moderator_category_relation WHERE mod_id = $1 AND category_id = $2",
        )
        .bind(user_id)
        .bind(category_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_moderator(&self, user_id: i64, category_id: i64) -> Result<bool, Error> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1::BIGINT FROM moderator_category_relation WHERE mod_id = $1 AND category_id = $2",
        )
        .bind(user_id)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    async fn list_moderators(&self, category_id: i64) -> Result<Vec<i64>, Error> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT mod_id FROM moderator_category_relation WHERE category_id = $1 ORDER BY mod_id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn delete_category_moderators(&self, category_id: i64) -> Result<(), Error> {
        sqlx::query("DELETE FROM moderator_category_relation WHERE category_id = $1")
            .bind(category_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_review(&self, new: &NewReview) -> Result<Review, Error> {
        let review = sqlx::query_as::<_, Review>(
            r#"INSERT INTO reviews (title, body, rating, author_id, category_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, title, body, rating, author_id, category_id"#,
        )
        .bind(&new.title)
        .bind(&new.body)
        .bind(new.rating)
        .bind(new.author_id)
        .bind(new.category_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(review)
    }

    async fn get_review(&self, id: i64) -> Result<Review, Error> {
        sqlx::query_as::<_, Review>(
            "SELECT id, title, body, rating, author_id, category_id FROM reviews WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound)
    }

    async fn list_reviews(&self, category_id: i64) -> Result<Vec<Review>, Error> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"SELECT id, title, body, rating, author_id, category_id
               FROM reviews WHERE category_id = $1 ORDER BY id"#,
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn update_review_row(&self, id: i64, upd: &UpdateReview) -> Result<Review, Error> {
        sqlx::query_as::<_, Review>(
            r#"UPDATE reviews
               SET title = COALESCE($2, title),
                   body = COALESCE($3, body),
                   rating = COALESCE($4, rating)
               WHERE id = $1
               RETURNING id, title, body, rating, author_id, category_id"#,
        )
        .bind(id)
        .bind(&upd.title)
        .bind(&upd.body)
        .bind(upd.rating)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound)
    }

    async fn delete_review_row(&self, id: i64) -> Result<(), Error> {
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_sub_review(&self, new: &NewSubReview) -> Result<SubReview, Error> {
        let sub = sqlx::query_as::<_, SubReview>(
            r#"INSERT INTO sub_reviews (title, body, rating, author_id, review_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, title, body, rating, author_id, review_id"#,
        )
        .bind(&new.title)
        .bind(&new.body)
        .bind(new.rating)
        .bind(new.author_id)
        .bind(new.review_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sub)
    }

    async fn get_sub_review(&self, id: i64) -> Result<SubReview, Error> {
        sqlx::query_as::<_, SubReview>(
            "SELECT id, title, body, rating, author_id, review_id FROM sub_reviews WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound)
    }

    async fn list_sub_reviews(&self, review_id: i64) -> Result<Vec<SubReview>, Error> {
        let subs = sqlx::query_as::<_, SubReview>(
            r#"SELECT id, title, body, rating, author_id, review_id
               FROM sub_reviews WHERE review_id = $1 ORDER BY id"#,
        )
        .bind(review_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(subs)
    }

    async fn update_sub_review_row(
        &self,
        id: i64,
        upd: &UpdateSubReview,
    ) -> Result<SubReview, Error> {
        sqlx::query_as::<_, SubReview>(
            r#"UPDATE sub_reviews
               SET title = COALESCE($2, title),
                   body = COALESCE($3, body),
                   rating = COALESCE($4, rating)
               WHERE id = $1
               RETURNING id, title, body, rating, author_id, review_id"#,
        )
        .bind(id)
        .bind(&upd.title)
        .bind(&upd.body)
        .bind(upd.rating)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound)
    }

    async fn delete_sub_review(&self, id: i64) -> Result<(), Error> {
        sqlx::query("DELETE FROM sub_reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_tag(&self, name: &str, category_id: i64) -> Result<Tag, Error> {
        let tag = sqlx::query_as::<_, Tag>(
            r#"INSERT INTO tags (name, category_id) VALUES ($1, $2)
               RETURNING id, name, category_id"#,
        )
        .bind(name)
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(tag)
    }

    async fn get_tag(&self, id: i64) -> Result<Tag, Error> {
        sqlx::query_as::<_, Tag>("SELECT id, name, category_id FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::NotFound)
    }

    async fn list_tags(&self, category_id: i64) -> Result<Vec<Tag>, Error> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT id, name, category_id FROM tags WHERE category_id = $1 ORDER BY id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn update_tag(&self, id: i64, name: &str) -> Result<Tag, Error> {
        sqlx::query_as::<_, Tag>(
            "UPDATE tags SET name = $2 WHERE id = $1 RETURNING id, name, category_id",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NotFound)
    }

    async fn delete_tag_row(&self, id: i64) -> Result<(), Error> {
        sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_review_tag(&self, review_id: i64, tag_id: i64) -> Result<(), Error> {
        sqlx::query(
            r#"INSERT INTO review_tag_relation (review_id, tag_id)
               VALUES ($1, $2) ON CONFLICT DO NOTHING"#,
        )
        .bind(review_id)
        .bind(tag_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_review_tag(&self, review_id: i64, tag_id: i64) -> Result<(), Error> {
        sqlx::query("DELETE FROM review_tag_relation WHERE review_id = $1 AND tag_id = $2")
            .bind(review_id)
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_review_tags(&self, review_id: i64) -> Result<Vec<Tag>, Error> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"SELECT t.id, t.name, t.category_id
               FROM review_tag_relation r
               JOIN tags t ON r.tag_id = t.id
               WHERE r.review_id = $1
               ORDER BY t.id"#,
        )
        .bind(review_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn delete_review_relations(&self, review_id: i64) -> Result<(), Error> {
        sqlx::query("DELETE FROM review_tag_relation WHERE review_id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_tag_relations(&self, tag_id: i64) -> Result<(), Error> {
        sqlx::query("DELETE FROM review_tag_relation WHERE tag_id = $1")
            .bind(tag_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// --- In-Memory Implementation (For Unit Tests) ---

/// Backing tables for `MemoryRepository`. Ids come from a single monotonic
/// counter, matching the server-generated, unique contract.
#[derive(Default)]
struct MemoryStore {
    users: Vec<User>,
    categories: Vec<Category>,
    reviews: Vec<Review>,
    sub_reviews: Vec<SubReview>,
    tags: Vec<Tag>,
    /// (mod_id, category_id)
    moderators: Vec<(i64, i64)>,
    /// (review_id, tag_id)
    review_tags: Vec<(i64, i64)>,
    next_id: i64,
}

impl MemoryStore {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// MemoryRepository
///
/// An in-process implementation of the full `Repository` contract, used by the
/// test suite so nothing needs a live Postgres. Because the composed
/// operations are provided trait methods, the cascades and validation checks
/// exercised here are the exact same code paths the Postgres backend runs.
#[derive(Default)]
pub struct MemoryRepository {
    store: Mutex<MemoryStore>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStore> {
        self.store.lock().expect("memory store poisoned")
    }

    /// Raw row counts keyed by table name. Lets tests assert cascade
    /// completeness without widening the `Repository` contract.
    pub fn table_counts(&self) -> HashMap<&'static str, usize> {
        let store = self.lock();
        HashMap::from([
            ("users", store.users.len()),
            ("categories", store.categories.len()),
            ("reviews", store.reviews.len()),
            ("sub_reviews", store.sub_reviews.len()),
            ("tags", store.tags.len()),
            ("moderator_category_relation", store.moderators.len()),
            ("review_tag_relation", store.review_tags.len()),
        ])
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn insert_user(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        admin: bool,
    ) -> Result<User, Error> {
        let mut store = self.lock();
        if store.users.iter().any(|u| u.name == name) {
            return Err(Error::validation("username", "already exists"));
        }
        if store.users.iter().any(|u| u.email == email) {
            return Err(Error::validation("email", "already exists"));
        }
        let user = User {
            id: store.next_id(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            admin,
        };
        store.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> Result<User, Error> {
        self.lock()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn find_user_by_name(&self, name: &str) -> Result<Option<User>, Error> {
        Ok(self.lock().users.iter().find(|u| u.name == name).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_category(&self, name: &str) -> Result<Category, Error> {
        let mut store = self.lock();
        let category = Category {
            id: store.next_id(),
            name: name.to_string(),
        };
        store.categories.push(category.clone());
        Ok(category)
    }

    async fn get_category(&self, id: i64) -> Result<Category, Error> {
        self.lock()
            .categories
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn list_categories(&self) -> Result<Vec<Category>, Error> {
        Ok(self.lock().categories.clone())
    }

    async fn update_category(&self, id: i64, name: &str) -> Result<Category, Error> {
        let mut store = self.lock();
        let category = store
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(Error::NotFound)?;
        category.name = name.to_string();
        Ok(category.clone())
    }

    async fn delete_category_row(&self, id: i64) -> Result<(), Error> {
        self.lock().categories.retain(|c| c.id != id);
        Ok(())
    }

    async fn grant_moderator(&self, user_id: i64, category_id: i64) -> Result<(), Error> {
        let mut store = self.lock();
        if !store.moderators.contains(&(user_id, category_id)) {
            store.moderators.push((user_id, category_id));
        }
        Ok(())
    }

    async fn revoke_moderator(&self, user_id: i64, category_id: i64) -> Result<(), Error> {
        self.lock()
            .moderators
            .retain(|&(m, c)| !(m == user_id && c == category_id));
        Ok(())
    }

    async fn is_moderator(&self, user_id: i64, category_id: i64) -> Result<bool, Error> {
        Ok(self.lock().moderators.contains(&(user_id, category_id)))
    }

    async fn list_moderators(&self, category_id: i64) -> Result<Vec<i64>, Error> {
        Ok(self
            .lock()
            .moderators
            .iter()
            .filter(|&&(_, c)| c == category_id)
            .map(|&(m, _)| m)
            .collect())
    }

    async fn delete_category_moderators(&self, category_id: i64) -> Result<(), Error> {
        self.lock().moderators.retain(|&(_, c)| c != category_id);
        Ok(())
    }

    async fn insert_review(&self, new: &NewReview) -> Result<Review, Error> {
        let mut store = self.lock();
        let review = Review {
            id: store.next_id(),
            title: new.title.clone(),
            body: new.body.clone(),
            rating: new.rating,
            author_id: new.author_id,
            category_id: new.category_id,
        };
        store.reviews.push(review.clone());
        Ok(review)
    }

    async fn get_review(&self, id: i64) -> Result<Review, Error> {
        self.lock()
            .reviews
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn list_reviews(&self, category_id: i64) -> Result<Vec<Review>, Error> {
        Ok(self
            .lock()
            .reviews
            .iter()
            .filter(|r| r.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn update_review_row(&self, id: i64, upd: &UpdateReview) -> Result<Review, Error> {
        let mut store = self.lock();
        let review = store
            .reviews
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(Error::NotFound)?;
        if let Some(title) = &upd.title {
            review.title = title.clone();
        }
        if let Some(body) = &upd.body {
            review.body = body.clone();
        }
        if let Some(rating) = upd.rating {
            review.rating = rating;
        }
        Ok(review.clone())
    }

    async fn delete_review_row(&self, id: i64) -> Result<(), Error> {
        self.lock().reviews.retain(|r| r.id != id);
        Ok(())
    }

    async fn insert_sub_review(&self, new: &NewSubReview) -> Result<SubReview, Error> {
        let mut store = self.lock();
        let sub = SubReview {
            id: store.next_id(),
            title: new.title.clone(),
            body: new.body.clone(),
            rating: new.rating,
            author_id: new.author_id,
            review_id: new.review_id,
        };
        store.sub_reviews.push(sub.clone());
        Ok(sub)
    }

    async fn get_sub_review(&self, id: i64) -> Result<SubReview, Error> {
        self.lock()
            .sub_reviews
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn list_sub_reviews(&self, review_id: i64) -> Result<Vec<SubReview>, Error> {
        Ok(self
            .lock()
            .sub_reviews
            .iter()
            .filter(|s| s.review_id == review_id)
            .cloned()
            .collect())
    }

    async fn update_sub_review_row(
        &self,
        id: i64,
        upd: &UpdateSubReview,
    ) -> Result<SubReview, Error> {
        let mut store = self.lock();
        let sub = store
            .sub_reviews
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(Error::NotFound)?;
        if let Some(title) = &upd.title {
            sub.title = title.clone();
        }
        if let Some(body) = &upd.body {
            sub.body = body.clone();
        }
        if let Some(rating) = upd.rating {
            sub.rating = rating;
        }
        Ok(sub.clone())
    }

    async fn delete_sub_review(&self, id: i64) -> Result<(), Error> {
        self.lock().sub_reviews.retain(|s| s.id != id);
        Ok(())
    }

    async fn insert_tag(&self, name: &str, category_id: i64) -> Result<Tag, Error> {
        let mut store = self.lock();
        let tag = Tag {
            id: store.next_id(),
            name: name.to_string(),
            category_id,
        };
        store.tags.push(tag.clone());
        Ok(tag)
    }

    async fn get_tag(&self, id: i64) -> Result<Tag, Error> {
        self.lock()
            .tags
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    async fn list_tags(&self, category_id: i64) -> Result<Vec<Tag>, Error> {
        Ok(self
            .lock()
            .tags
            .iter()
            .filter(|t| t.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn update_tag(&self, id: i64, name: &str) -> Result<Tag, Error> {
        let mut store = self.lock();
        let tag = store
            .tags
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(Error::NotFound)?;
        tag.name = name.to_string();
        Ok(tag.clone())
    }

    async fn delete_tag_row(&self, id: i64) -> Result<(), Error> {
        self.lock().tags.retain(|t| t.id != id);
        Ok(())
    }

    async fn insert_review_tag(&self, review_id: i64, tag_id: i64) -> Result<(), Error> {
        let mut store = self.lock();
        if !store.review_tags.contains(&(review_id, tag_id)) {
            store.review_tags.push((review_id, tag_id));
        }
        Ok(())
    }

    async fn delete_review_tag(&self, review_id: i64, tag_id: i64) -> Result<(), Error> {
        self.lock()
            .review_tags
            .retain(|&(r, t)| !(r == review_id && t == tag_id));
        Ok(())
    }

    async fn list_review_tags(&self, review_id: i64) -> Result<Vec<Tag>, Error> {
        let store = self.lock();
        let tags = store
            .review_tags
            .iter()
            .filter(|&&(r, _)| r == review_id)
            .filter_map(|&(_, tag_id)| store.tags.iter().find(|t| t.id == tag_id).cloned())
            .collect();
        Ok(tags)
    }

    async fn delete_review_relations(&self, review_id: i64) -> Result<(), Error> {
        self.lock().review_tags.retain(|&(r, _)| r != review_id);
        Ok(())
    }

    async fn delete_tag_relations(&self, tag_id: i64) -> Result<(), Error> {
        self.lock().review_tags.retain(|&(_, t)| t != tag_id);
        Ok(())
    }
}
