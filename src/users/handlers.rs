use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::dto::{CreateUserRequest, UpdateUserRequest, UserResponse};
use super::services;
use crate::error::ApiError;
use crate::extractors::{JsonBody, QueryParams};
use crate::pagination::{Page, PageQuery};
use crate::request_id::XRequestId;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    rid: XRequestId,
    QueryParams(q): QueryParams<PageQuery>,
) -> Result<Json<Page<UserResponse>>, ApiError> {
    let page = services::list(&state.db, q.to_request())
        .await
        .map_err(|e| rid.reject(e))?;
    Ok(Json(page.map(UserResponse::from)))
}

#[instrument(skip(state, body))]
pub async fn create_user(
    State(state): State<AppState>,
    rid: XRequestId,
    JsonBody(body): JsonBody<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = body.validate().map_err(|e| rid.reject(e))?;
    let user = services::create(&state.db, input)
        .await
        .map_err(|e| rid.reject(e))?;

    let location = format!("/api/users/{}", user.id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(UserResponse::from(user)),
    ))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    rid: XRequestId,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = services::get(&state.db, &id)
        .await
        .map_err(|e| rid.reject(e))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, body))]
pub async fn update_user(
    State(state): State<AppState>,
    rid: XRequestId,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let input = body.validate().map_err(|e| rid.reject(e))?;
    let user = services::update(&state.db, &id, input)
        .await
        .map_err(|e| rid.reject(e))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    rid: XRequestId,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    services::delete(&state.db, &id)
        .await
        .map_err(|e| rid.reject(e))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::Request,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let state = AppState::for_tests().await;
        Router::new().nest("/api", user_routes()).with_state(state)
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn create_then_duplicate_conflicts() {
        let app = app().await;
        let body = json!({ "email": "a@x.com", "name": "A" }).to_string();

        let resp = app.clone().oneshot(post("/api/users", &body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let created: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(created["role"], "user");
        assert_eq!(created["email"], "a@x.com");
        let id = created["id"].as_str().unwrap();
        assert_eq!(location, format!("/api/users/{id}"));

        let (status, err) = send(&app, post("/api/users", &body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(err["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let app = app().await;
        let (status, err) = send(&app, post("/api/users", "{\"email\":")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "BAD_REQUEST");
        assert_eq!(err["message"], "Invalid request body");
        assert!(err["details"]["reason"].is_string());
    }

    #[tokio::test]
    async fn missing_name_is_a_validation_error() {
        let app = app().await;
        let (status, err) = send(&app, post("/api/users", r#"{"email":"a@x.com"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "VALIDATION_ERROR");
        assert_eq!(err["details"]["field"], "name");
    }

    #[tokio::test]
    async fn unknown_id_is_404_with_request_id() {
        let app = app().await;
        let req = Request::get("/api/users/nope")
            .header("x-request-id", "rid-42")
            .body(Body::empty())
            .unwrap();
        let (status, err) = send(&app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["code"], "NOT_FOUND");
        assert_eq!(err["requestId"], "rid-42");
    }

    #[tokio::test]
    async fn update_get_delete_roundtrip() {
        let app = app().await;
        let (_, created) = send(
            &app,
            post("/api/users", r#"{"email":"B@X.com","name":"B"}"#),
        )
        .await;
        assert_eq!(created["email"], "b@x.com");
        let uri = format!("/api/users/{}", created["id"].as_str().unwrap());

        let req = Request::put(&uri)
            .body(Body::from(r#"{"name":"Bee"}"#))
            .unwrap();
        let (status, updated) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "Bee");
        assert_eq!(updated["email"], "b@x.com");

        let req = Request::delete(&uri).body(Body::empty()).unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let req = Request::get(&uri).body(Body::empty()).unwrap();
        let (status, _) = send(&app, req).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn undecodable_query_gets_the_json_error_body() {
        let app = app().await;
        let req = Request::get("/api/users?page=1&page=2")
            .header("x-request-id", "rid-q")
            .body(Body::empty())
            .unwrap();
        let (status, err) = send(&app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["code"], "BAD_REQUEST");
        assert_eq!(err["message"], "Invalid query string");
        assert_eq!(err["requestId"], "rid-q");
        assert!(err["details"]["reason"].is_string());
    }

    #[tokio::test]
    async fn list_tolerates_garbage_pagination() {
        let app = app().await;
        for i in 0..3 {
            let body = json!({ "email": format!("u{i}@x.com"), "name": "U" }).to_string();
            send(&app, post("/api/users", &body)).await;
        }

        let req = Request::get("/api/users?page=abc&limit=-5")
            .body(Body::empty())
            .unwrap();
        let (status, page) = send(&app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["data"].as_array().unwrap().len(), 3);
        assert_eq!(
            page["pagination"],
            json!({ "page": 1, "limit": 10, "total": 3, "totalPages": 1 })
        );
    }
}
