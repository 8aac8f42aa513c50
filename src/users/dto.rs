use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::services::{CreateUser, UpdateUser};
use crate::error::AppError;
use crate::users::repo_types::User;
use crate::validation;

/// Body of `POST /api/users`. Fields are optional so absence is a
/// validation error rather than a decode error.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl CreateUserRequest {
    pub fn validate(self) -> Result<CreateUser, AppError> {
        let email = validation::required("email", "Email", self.email.as_deref())?;
        let email = validation::email("email", email)?;
        let name = validation::required("name", "Name", self.name.as_deref())?;
        // a blank role falls back to the default
        let role = self
            .role
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        Ok(CreateUser { email, name, role })
    }
}

/// Body of `PUT /api/users/:id`; absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl UpdateUserRequest {
    pub fn validate(self) -> Result<UpdateUser, AppError> {
        let email = validation::non_blank("email", "Email", self.email.as_deref())?
            .map(|e| validation::email("email", e))
            .transpose()?;
        Ok(UpdateUser {
            email,
            name: validation::non_blank("name", "Name", self.name.as_deref())?,
            role: validation::non_blank("role", "Role", self.role.as_deref())?,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_requires_email_and_name() {
        let err = CreateUserRequest {
            name: Some("A".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "email", .. }));

        let err = CreateUserRequest {
            email: Some("a@x.com".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "name", .. }));
    }

    #[test]
    fn create_blank_role_means_default() {
        let input = CreateUserRequest {
            email: Some("a@x.com".into()),
            name: Some("A".into()),
            role: Some("  ".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(input.role, None);
    }

    #[test]
    fn update_validates_only_present_fields() {
        let input = UpdateUserRequest {
            role: Some("admin".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(input.role.as_deref(), Some("admin"));
        assert!(input.email.is_none() && input.name.is_none());

        let err = UpdateUserRequest {
            email: Some("not-an-email".into()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { field: "email", .. }));
    }

    #[test]
    fn response_uses_camel_case() {
        let now = OffsetDateTime::now_utc();
        let json = serde_json::to_value(UserResponse::from(User {
            id: "u1".into(),
            email: "a@x.com".into(),
            name: "A".into(),
            role: "user".into(),
            created_at: now,
            updated_at: now,
        }))
        .unwrap();
        assert_eq!(json["id"], "u1");
        assert!(json["createdAt"].is_string());
        assert!(json["updatedAt"].is_string());
    }
}
