use crate::db;
use crate::items::repo_types::Item;
use sqlx::SqlitePool;

pub async fn find_by_id(db: &SqlitePool, id: &str) -> sqlx::Result<Option<Item>> {
    sqlx::query_as::<_, Item>(
        r#"
        SELECT id, user_id, title, description, status, created_at, updated_at
          FROM items
         WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Newest first, optionally restricted to one owner.
pub async fn list(
    db: &SqlitePool,
    user_id: Option<&str>,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Item>> {
    sqlx::query_as::<_, Item>(
        r#"
        SELECT id, user_id, title, description, status, created_at, updated_at
          FROM items
         WHERE (? IS NULL OR user_id = ?)
         ORDER BY created_at DESC, id
         LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await
}

pub async fn count(db: &SqlitePool, user_id: Option<&str>) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM items WHERE (? IS NULL OR user_id = ?)")
        .bind(user_id)
        .bind(user_id)
        .fetch_one(db)
        .await
}

pub async fn insert(db: &SqlitePool, item: &Item) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO items (id, user_id, title, description, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&item.id)
    .bind(&item.user_id)
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.status)
    .bind(db::timestamp(item.created_at)?)
    .bind(db::timestamp(item.updated_at)?)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn update(db: &SqlitePool, item: &Item) -> sqlx::Result<u64> {
    let res = sqlx::query(
        r#"
        UPDATE items
           SET title = ?, description = ?, status = ?, updated_at = ?
         WHERE id = ?
        "#,
    )
    .bind(&item.title)
    .bind(&item.description)
    .bind(&item.status)
    .bind(db::timestamp(item.updated_at)?)
    .bind(&item.id)
    .execute(db)
    .await?;
    Ok(res.rows_affected())
}

pub async fn delete(db: &SqlitePool, id: &str) -> sqlx::Result<u64> {
    let res = sqlx::query("DELETE FROM items WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected())
}
