use sqlx::FromRow;
use time::OffsetDateTime;

/// Item record; `user_id` references `users.id`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Item {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
