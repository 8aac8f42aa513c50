use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::services::{CreateItem, UpdateItem};
use crate::error::AppError;
use crate::items::repo_types::Item;
use crate::pagination::PageQuery;
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemRequest {
    pub user_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl CreateItemRequest {
    pub fn validate(self) -> Result<CreateItem, AppError> {
        Ok(CreateItem {
            user_id: validation::required("userId", "User id", self.user_id.as_deref())?,
            title: validation::required("title", "Title", self.title.as_deref())?,
            description: self.description,
            status: self
                .status
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

impl UpdateItemRequest {
    pub fn validate(self) -> Result<UpdateItem, AppError> {
        Ok(UpdateItem {
            title: validation::non_blank("title", "Title", self.title.as_deref())?,
            description: self.description,
            status: validation::non_blank("status", "Status", self.status.as_deref())?,
        })
    }
}

/// `GET /api/items` query: paging plus an optional owner filter.
#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    #[serde(flatten)]
    pub page: PageQuery,
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

impl ItemListQuery {
    /// Blank `userId` means no filter.
    pub fn owner(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Item> for ItemResponse {
    fn from(i: Item) -> Self {
        Self {
            id: i.id,
            user_id: i.user_id,
            title: i.title,
            description: i.description,
            status: i.status,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}
