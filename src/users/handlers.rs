use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{delete, get, patch, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    state::AppState,
    users::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RegisterResponse,
            UpdateUserRequest,
        },
        repo_types::User,
        services::{login_user, register_user, update_user},
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/all", get(list_users))
        .route("/:id", get(get_user))
        .route("/update/:id", patch(update))
        .route("/delete/:id", delete(remove))
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::validation("Invalid user id"))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(req) = payload?;
    let user_id = register_user(&state, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            user_id,
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(req) = payload?;
    let (token, role) = login_user(&state, req).await?;
    Ok(Json(LoginResponse {
        success: true,
        token,
        role,
    }))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.users.list_all().await?))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let id = parse_id(&id)?;
    state
        .users
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

#[instrument(skip(state, payload))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id)?;
    let Json(req) = payload?;
    update_user(&state, id, req).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "User updated successfully",
    }))
}

#[instrument(skip(state))]
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_id(&id)?;
    state.users.delete(id).await?;
    info!(user_id = id, "user deleted permanently");
    Ok(Json(MessageResponse {
        success: true,
        message: "User deleted permanently",
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    fn app(state: AppState) -> Router {
        Router::new().merge(user_routes()).with_state(state)
    }

    async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(v) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let res = app(state.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn register_ada(state: &AppState) -> i64 {
        let (status, body) = call(
            state,
            "POST",
            "/register",
            Some(json!({ "name": "Ada", "email": " Ada@Example.com ", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        body["userId"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn register_then_login() {
        let state = AppState::fake();
        register_ada(&state).await;

        let (status, body) = call(
            &state,
            "POST",
            "/login",
            Some(json!({ "email": "ada@example.com", "password": "pw" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "applicant");
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn register_status_codes() {
        let state = AppState::fake();
        register_ada(&state).await;

        let (status, body) = call(
            &state,
            "POST",
            "/register",
            Some(json!({ "name": "Eve", "email": "ada@example.com", "password": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], "User with this email already exists");

        let (status, _) = call(&state, "POST", "/register", Some(json!({ "name": "Eve" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let state = AppState::fake();
        let req = Request::builder()
            .method("POST")
            .uri("/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_wrong_password_is_unauthorized() {
        let state = AppState::fake();
        register_ada(&state).await;
        let (status, body) = call(
            &state,
            "POST",
            "/login",
            Some(json!({ "email": "ada@example.com", "password": "nope" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid email or password");
    }

    #[tokio::test]
    async fn users_never_expose_password() {
        let state = AppState::fake();
        let id = register_ada(&state).await;

        let (status, body) = call(&state, "GET", &format!("/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email"], "ada@example.com");
        assert_eq!(body["role"], "applicant");
        assert!(body.get("password").is_none());
        assert!(body.get("createdAt").is_some());

        let (status, body) = call(&state, "GET", "/all", None).await;
        assert_eq!(status, StatusCode::OK);
        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 1);
        assert!(users[0].get("password").is_none());
    }

    #[tokio::test]
    async fn get_unknown_or_bad_id() {
        let state = AppState::fake();
        let (status, body) = call(&state, "GET", "/4242", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "User not found");

        let (status, _) = call(&state, "GET", "/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn update_then_fetch() {
        let state = AppState::fake();
        let id = register_ada(&state).await;

        let (status, body) = call(
            &state,
            "PATCH",
            &format!("/update/{id}"),
            Some(json!({ "name": "Ada Lovelace", "role": "admin" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User updated successfully");

        let (_, body) = call(&state, "GET", &format!("/{id}"), None).await;
        assert_eq!(body["name"], "Ada Lovelace");
        assert_eq!(body["role"], "admin");

        let (status, _) = call(&state, "PATCH", "/update/999", Some(json!({ "name": "x" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_is_permanent() {
        let state = AppState::fake();
        let id = register_ada(&state).await;

        let (status, body) = call(&state, "DELETE", &format!("/delete/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User deleted permanently");

        let (status, _) = call(&state, "GET", &format!("/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, body) = call(&state, "GET", "/all", None).await;
        assert!(body.as_array().unwrap().is_empty());

        let (status, _) = call(&state, "DELETE", &format!("/delete/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // the email is free again after a hard delete
        let again = register_ada(&state).await;
        assert_ne!(again, id);
    }
}
