use crate::db;
use crate::users::repo_types::User;
use sqlx::SqlitePool;

/// Find a user by id.
pub async fn find_by_id(db: &SqlitePool, id: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, name, role, created_at, updated_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Find a user by email.
pub async fn find_by_email(db: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, name, role, created_at, updated_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(db)
    .await
}

/// Newest first.
pub async fn list(db: &SqlitePool, limit: i64, offset: i64) -> sqlx::Result<Vec<User>> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, name, role, created_at, updated_at
          FROM users
         ORDER BY created_at DESC, id
         LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn count(db: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await
}

pub async fn insert(db: &SqlitePool, user: &User) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.role)
    .bind(db::timestamp(user.created_at)?)
    .bind(db::timestamp(user.updated_at)?)
    .execute(db)
    .await?;
    Ok(())
}

/// Overwrite the mutable columns. Returns the number of rows touched.
pub async fn update(db: &SqlitePool, user: &User) -> sqlx::Result<u64> {
    let res = sqlx::query(
        r#"
        UPDATE users
           SET email = ?, name = ?, role = ?, updated_at = ?
         WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.role)
    .bind(db::timestamp(user.updated_at)?)
    .bind(&user.id)
    .execute(db)
    .await?;
    Ok(res.rows_affected())
}

pub async fn delete(db: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}
