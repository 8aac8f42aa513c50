use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use super::repo;
use crate::error::AppError;
use crate::items::repo_types::Item;
use crate::pagination::{Page, PageRequest};
use crate::users;

pub const DEFAULT_STATUS: &str = "pending";
const NOT_FOUND: &str = "Item not found";
const UNKNOWN_USER: &str = "User does not exist";

#[derive(Debug, Clone)]
pub struct CreateItem {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
}

/// Fields left `None` keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdateItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

pub async fn create(db: &SqlitePool, input: CreateItem) -> Result<Item, AppError> {
    if users::repo::find_by_id(db, &input.user_id).await?.is_none() {
        warn!(user_id = %input.user_id, "item for unknown user");
        return Err(AppError::validation("userId", UNKNOWN_USER));
    }

    let now = OffsetDateTime::now_utc();
    let item = Item {
        id: Uuid::new_v4().to_string(),
        user_id: input.user_id,
        title: input.title,
        description: input.description.unwrap_or_default(),
        status: input.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        created_at: now,
        updated_at: now,
    };

    // the owner may be deleted between the check and the insert
    repo::insert(db, &item).await.map_err(|e| match &e {
        sqlx::Error::Database(d) if d.is_foreign_key_violation() => {
            AppError::validation("userId", UNKNOWN_USER)
        }
        _ => AppError::Db(e),
    })?;

    info!(item_id = %item.id, user_id = %item.user_id, "item created");
    Ok(item)
}

pub async fn get(db: &SqlitePool, id: &str) -> Result<Item, AppError> {
    repo::find_by_id(db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(NOT_FOUND.into()))
}

pub async fn list(
    db: &SqlitePool,
    user_id: Option<&str>,
    page: PageRequest,
) -> Result<Page<Item>, AppError> {
    let items = repo::list(db, user_id, page.limit, page.offset()).await?;
    let total = repo::count(db, user_id).await?;
    Ok(Page::new(items, page, total))
}

pub async fn update(db: &SqlitePool, id: &str, input: UpdateItem) -> Result<Item, AppError> {
    let mut item = get(db, id).await?;

    if let Some(title) = input.title {
        item.title = title;
    }
    if let Some(description) = input.description {
        item.description = description;
    }
    if let Some(status) = input.status {
        item.status = status;
    }
    item.updated_at = OffsetDateTime::now_utc();

    if repo::update(db, &item).await? == 0 {
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    Ok(item)
}

pub async fn delete(db: &SqlitePool, id: &str) -> Result<(), AppError> {
    if repo::delete(db, id).await? == 0 {
        return Err(AppError::NotFound(NOT_FOUND.into()));
    }
    info!(item_id = %id, "item deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use crate::users::services::{self as user_services, CreateUser};

    async fn owner(db: &SqlitePool, email: &str) -> String {
        user_services::create(
            db,
            CreateUser {
                email: email.into(),
                name: "Owner".into(),
                role: None,
            },
        )
        .await
        .unwrap()
        .id
    }

    fn new_item(user_id: &str, title: &str) -> CreateItem {
        CreateItem {
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            status: None,
        }
    }

    #[tokio::test]
    async fn create_applies_defaults() {
        let state = AppState::for_tests().await;
        let uid = owner(&state.db, "o@x.com").await;

        let item = create(&state.db, new_item(&uid, "Milk")).await.unwrap();
        assert_eq!(item.status, DEFAULT_STATUS);
        assert_eq!(item.description, "");
        assert!(Uuid::parse_str(&item.id).is_ok());

        let stored = get(&state.db, &item.id).await.unwrap();
        assert_eq!(stored.user_id, uid);
        assert_eq!(stored.title, "Milk");
    }

    #[tokio::test]
    async fn unknown_owner_is_a_validation_error() {
        let state = AppState::for_tests().await;
        let err = create(&state.db, new_item("ghost", "Milk")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "userId", .. }));
    }

    #[tokio::test]
    async fn store_rejects_dangling_owner() {
        let state = AppState::for_tests().await;
        let now = OffsetDateTime::now_utc();
        let orphan = Item {
            id: Uuid::new_v4().to_string(),
            user_id: "ghost".into(),
            title: "Milk".into(),
            description: String::new(),
            status: DEFAULT_STATUS.into(),
            created_at: now,
            updated_at: now,
        };
        match repo::insert(&state.db, &orphan).await {
            Err(sqlx::Error::Database(d)) => assert!(d.is_foreign_key_violation()),
            other => panic!("expected a foreign key violation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn partial_update_keeps_unspecified_fields() {
        let state = AppState::for_tests().await;
        let uid = owner(&state.db, "o@x.com").await;
        let item = create(
            &state.db,
            CreateItem {
                description: Some("2 litres".into()),
                ..new_item(&uid, "Milk")
            },
        )
        .await
        .unwrap();

        let updated = update(
            &state.db,
            &item.id,
            UpdateItem {
                status: Some("done".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.status, "done");

        let stored = get(&state.db, &item.id).await.unwrap();
        assert_eq!(
            (stored.title, stored.description, stored.status),
            ("Milk".to_string(), "2 litres".to_string(), "done".to_string())
        );

        // description may be cleared
        let cleared = update(
            &state.db,
            &item.id,
            UpdateItem {
                description: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.description, "");
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let state = AppState::for_tests().await;
        assert!(matches!(
            get(&state.db, "missing").await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            update(&state.db, "missing", UpdateItem::default())
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            delete(&state.db, "missing").await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn list_filters_by_owner() {
        let state = AppState::for_tests().await;
        let a = owner(&state.db, "a@x.com").await;
        let b = owner(&state.db, "b@x.com").await;
        for i in 0..3 {
            create(&state.db, new_item(&a, &format!("a{i}"))).await.unwrap();
        }
        create(&state.db, new_item(&b, "b0")).await.unwrap();

        let all = list(&state.db, None, PageRequest::default()).await.unwrap();
        assert_eq!(all.pagination.total, 4);

        let only_a = list(&state.db, Some(&a), PageRequest::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(only_a.data.len(), 2);
        assert!(only_a.data.iter().all(|i| i.user_id == a));
        assert_eq!(only_a.pagination.total, 3);
        assert_eq!(only_a.pagination.total_pages, 2);
    }

    #[tokio::test]
    async fn list_orders_within_the_same_second() {
        let state = AppState::for_tests().await;
        let uid = owner(&state.db, "o@x.com").await;
        let base = time::macros::datetime!(2024-01-01 12:00:00 UTC);
        for (title, ms) in [("older", 500), ("newer", 550), ("oldest", 0)] {
            let at = base + time::Duration::milliseconds(ms);
            let item = Item {
                id: Uuid::new_v4().to_string(),
                user_id: uid.clone(),
                title: title.into(),
                description: String::new(),
                status: DEFAULT_STATUS.into(),
                created_at: at,
                updated_at: at,
            };
            repo::insert(&state.db, &item).await.unwrap();
        }

        let page = list(&state.db, Some(&uid), PageRequest::default())
            .await
            .unwrap();
        let titles: Vec<_> = page.data.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, ["newer", "older", "oldest"]);
    }

    #[tokio::test]
    async fn deleting_the_owner_removes_its_items() {
        let state = AppState::for_tests().await;
        let uid = owner(&state.db, "o@x.com").await;
        let item = create(&state.db, new_item(&uid, "Milk")).await.unwrap();

        user_services::delete(&state.db, &uid).await.unwrap();
        assert!(matches!(
            get(&state.db, &item.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
