use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo;
use crate::error::AppError;
use crate::pagination::{Page, PageRequest};
use crate::users::repo_types::User;

pub const DEFAULT_ROLE: &str = "user";
const EMAIL_TAKEN: &str = "User with this email already exists";
const NOT_FOUND: &str = "User not found";

#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub name: String,
    pub role: Option<String>,
}

/// Fields left `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

pub async fn create(db: &SqlitePool, input: CreateUser) -> Result<User, AppError> {
    if repo::find_by_email(db, &input.email).await?.is_some() {
        warn!(email = %input.email, "email already registered");
        return Err(AppError::Conflict(EMAIL_TAKEN.into()));
    }

    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4().to_string(),
        email: input.email,
        name: input.name,
        role: input.role.unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        created_at: now,
        updated_at: now,
    };

    // a concurrent insert can still win the race past the check above
    repo::insert(db, &user)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, EMAIL_TAKEN))?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok(user)
}

pub async fn get(db: &SqlitePool, id: &str) -> Result<User, AppError> {
    repo::find_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

pub async fn list(db: &SqlitePool, page: PageRequest) -> Result<Page<User>, AppError> {
    let users = repo::list(db, page.limit, page.offset()).await?;
    let total = repo::count(db).await?;
    Ok(Page::new(users, page, total))
}

pub async fn update(db: &SqlitePool, id: &str, input: UpdateUser) -> Result<User, AppError> {
    let mut user = get(db, id).await?;

    if let Some(email) = input.email {
        if email != user.email {
            if let Some(other) = repo::find_by_email(db, &email).await? {
                if other.id != user.id {
                    warn!(user_id = %id, email = %email, "email already in use");
                    return Err(AppError::Conflict("Email already in use".into()));
                }
            }
        }
        user.email = email;
    }
    if let Some(name) = input.name {
        user.name = name;
    }
    if let Some(role) = input.role {
        user.role = role;
    }
    user.updated_at = OffsetDateTime::now_utc();

    let touched = repo::update(db, &user)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "Email already in use"))?;
    if touched == 0 {
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    Ok(user)
}

pub async fn delete(db: &SqlitePool, id: &str) -> Result<(), AppError> {
    if repo::delete(db, id).await? == 0 {
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    info!(user_id = %id, "user deleted");
    Ok(())
}
