use crate::error::Error;
use crate::repository::Repository;

/// can_manage_category
///
/// True iff the acting user is a moderator of the category or carries the
/// global admin flag. An absent acting user short-circuits to `false` before
/// any database lookup: anonymous visitors are never granted management
/// rights, no matter what the owner id happens to be.
///
/// Gateway failures during fact lookup fail closed to `false`.
pub async fn can_manage_category(
    repo: &dyn Repository,
    acting_user: Option<i64>,
    category_id: i64,
) -> bool {
    let Some(user_id) = acting_user else {
        return false;
    };

    match repo.is_moderator(user_id, category_id).await {
        Ok(true) => return true,
        Ok(false) => {}
        Err(e) => {
            tracing::error!("moderator lookup failed: {:?}", e);
            return false;
        }
    }

    match repo.get_user(user_id).await {
        Ok(user) => user.admin,
        Err(Error::NotFound) => false,
        Err(e) => {
            tracing::error!("admin lookup failed: {:?}", e);
            false
        }
    }
}

/// can_manage_review
///
/// Ownership alone suffices; otherwise the category rule applies. The three
/// conditions (owner, moderator, admin) are logically OR'd, so the order only
/// buys an early exit for the common owner case.
pub async fn can_manage_review(
    repo: &dyn Repository,
    acting_user: Option<i64>,
    author_id: i64,
    category_id: i64,
) -> bool {
    let Some(user_id) = acting_user else {
        return false;
    };
    if user_id == author_id {
        return true;
    }
    can_manage_category(repo, acting_user, category_id).await
}

/// can_manage_sub_review
///
/// Resolves the parent review's category, then applies the same
/// ownership-or-moderator-or-admin rule. A missing parent review fails closed.
pub async fn can_manage_sub_review(
    repo: &dyn Repository,
    acting_user: Option<i64>,
    author_id: i64,
    review_id: i64,
) -> bool {
    let Some(user_id) = acting_user else {
        return false;
    };
    if user_id == author_id {
        return true;
    }
    match repo.get_review(review_id).await {
        Ok(review) => can_manage_category(repo, acting_user, review.category_id).await,
        Err(Error::NotFound) => false,
        Err(e) => {
            tracing::error!("review lookup failed: {:?}", e);
            false
        }
    }
}

// The ensure_* variants are what mutation paths call: a refused check becomes
// the generic Unauthorized error, which never leaks which condition failed.

pub async fn ensure_can_manage_category(
    repo: &dyn Repository,
    acting_user: Option<i64>,
    category_id: i64,
) -> Result<(), Error> {
    if can_manage_category(repo, acting_user, category_id).await {
        Ok(())
    } else {
        Err(Error::Unauthorized)
    }
}

pub async fn ensure_can_manage_review(
    repo: &dyn Repository,
    acting_user: Option<i64>,
    author_id: i64,
    category_id: i64,
) -> Result<(), Error> {
    if can_manage_review(repo, acting_user, author_id, category_id).await {
        Ok(())
    } else {
        Err(Error::Unauthorized)
    }
}

pub async fn ensure_can_manage_sub_review(
    repo: &dyn Repository,
    acting_user: Option<i64>,
    author_id: i64,
    review_id: i64,
) -> Result<(), Error> {
    if can_manage_sub_review(repo, acting_user, author_id, review_id).await {
        Ok(())
    } else {
        Err(Error::Unauthorized)
    }
}
