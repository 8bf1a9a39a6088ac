use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::Request;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use devmatch_common::MessageResponse;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

pub fn router() -> Router {
    Router::new()
        .route("/", get(root))
        .route("/signup", post(account::signup))
        .route("/login", post(account::login))
        .route("/logout", post(account::logout))
        .route("/profile/view", get(account::view_profile))
        .route("/profile/edit", patch(account::edit_profile))
        .route("/profile/password", patch(account::change_password))
        .route("/request/send/interested/:user_id", post(requests::send_interested))
        .route("/request/send/ignored/:user_id", post(requests::send_ignored))
        .route("/request/review/accepted/:request_id", post(requests::review_accepted))
        .route("/request/review/rejected/:request_id", post(requests::review_rejected))
        .route("/request/received", get(requests::received))
        .route("/connections", get(requests::connections))
        .route("/feed", get(admin::feed))
        .route("/users", get(admin::find_user))
        .route("/user", patch(admin::update_user_by_body).delete(admin::delete_user))
        .route("/user/:id", patch(admin::update_user))
}

async fn root() -> &'static str {
    "devmatch is up"
}

/// A JSON request body whose extraction failures render as `ValidationError`s.
pub struct Payload(pub Value);

#[async_trait]
impl<S, B> FromRequest<S, B> for Payload
where
    Json<Value>: FromRequest<S, B, Rejection = JsonRejection>,
    S: Send + Sync,
    B: Send + 'static,
{
    type Rejection = AppError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self> {
        match Json::<Value>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Payload(value)),
            Err(rejection) => Err(AppError::validation(rejection.body_text())),
        }
    }
}

fn parse<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| AppError::validation(format!("Malformed payload: {e}")))
}

fn object(payload: Value) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::validation("Expected a JSON object")),
    }
}

fn message(msg: &str) -> Json<MessageResponse> {
    Json(MessageResponse {
        success: true,
        message: msg.to_string(),
    })
}

mod account {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::{Extension, Json};
    use devmatch_common::{LoginRequest, MessageResponse, PasswordChange, SessionResponse, SignupRequest, UserResponse};

    use super::{message, object, parse, Payload};
    use crate::auth::{self, CurrentUser};
    use crate::error::Result;
    use crate::profile;
    use crate::State;

    pub async fn signup(Extension(state): Extension<State>, Payload(payload): Payload) -> Result<impl IntoResponse> {
        let req: SignupRequest = parse(payload)?;
        let user = auth::signup(&state, req).await?;
        Ok((
            StatusCode::CREATED,
            Json(UserResponse {
                success: true,
                message: Some(String::from("User created successfully")),
                user: user.view(),
            }),
        ))
    }

    pub async fn login(Extension(state): Extension<State>, Payload(payload): Payload) -> Result<Json<SessionResponse>> {
        let req: LoginRequest = parse(payload)?;
        let (user, token) = auth::login(&state, req).await?;
        Ok(Json(SessionResponse {
            success: true,
            message: String::from("Login successful"),
            token,
            user: user.view(),
        }))
    }

    pub async fn logout(Extension(state): Extension<State>, current: CurrentUser) -> Result<Json<MessageResponse>> {
        auth::logout(&state, &current)?;
        Ok(message("Logged out successfully"))
    }

    pub async fn view_profile(current: CurrentUser) -> Json<UserResponse> {
        Json(UserResponse {
            success: true,
            message: None,
            user: current.user.view(),
        })
    }

    pub async fn edit_profile(
        Extension(state): Extension<State>,
        current: CurrentUser,
        Payload(payload): Payload,
    ) -> Result<Json<UserResponse>> {
        let fields = object(payload)?;
        let user = profile::edit_profile(&state, &current, &fields)?;
        Ok(Json(UserResponse {
            success: true,
            message: Some(String::from("Profile updated successfully")),
            user: user.view(),
        }))
    }

    pub async fn change_password(
        Extension(state): Extension<State>,
        current: CurrentUser,
        Payload(payload): Payload,
    ) -> Result<Json<MessageResponse>> {
        let req: PasswordChange = parse(payload)?;
        profile::change_password(&state, &current, req).await?;
        Ok(message("Password updated successfully"))
    }
}

mod requests {
    use axum::extract::Path;
    use axum::{Extension, Json};
    use devmatch_common::{ConnectionsResponse, MessageResponse, ReceivedRequestsResponse, UserId};
    use tracing::info;

    use super::message;
    use crate::auth::CurrentUser;
    use crate::engine;
    use crate::error::Result;
    use crate::State;

    pub async fn send_interested(
        Extension(state): Extension<State>,
        current: CurrentUser,
        Path(user_id): Path<String>,
    ) -> Result<Json<MessageResponse>> {
        let target = UserId(user_id);
        engine::check_distinct(&current.user.id, &target)?;
        state
            .users
            .update_pair(&current.user.id, &target, "Target user not found", |actor, target| {
                Ok(engine::send_interest(actor, target)?)
            })?;
        info!(from = %current.user.id, to = %target, "interest sent");
        Ok(message("Request sent"))
    }

    pub async fn send_ignored(
        Extension(state): Extension<State>,
        current: CurrentUser,
        Path(user_id): Path<String>,
    ) -> Result<Json<MessageResponse>> {
        let target = UserId(user_id);
        engine::check_distinct(&current.user.id, &target)?;
        state
            .users
            .update_against(&current.user.id, &target, "Target user not found", |actor, target| {
                Ok(engine::ignore(actor, &target.id)?)
            })?;
        info!(by = %current.user.id, ignored = %target, "user ignored");
        Ok(message("User ignored"))
    }

    pub async fn review_accepted(
        Extension(state): Extension<State>,
        current: CurrentUser,
        Path(request_id): Path<String>,
    ) -> Result<Json<MessageResponse>> {
        let requester = UserId(request_id);
        engine::check_distinct(&current.user.id, &requester)?;
        state
            .users
            .update_pair(&current.user.id, &requester, "Requesting user not found", |actor, requester| {
                Ok(engine::accept_request(actor, requester)?)
            })?;
        info!(by = %current.user.id, requester = %requester, "request accepted");
        Ok(message("Request accepted, now connected"))
    }

    pub async fn review_rejected(
        Extension(state): Extension<State>,
        current: CurrentUser,
        Path(request_id): Path<String>,
    ) -> Result<Json<MessageResponse>> {
        let requester = UserId(request_id);
        engine::check_distinct(&current.user.id, &requester)?;
        state
            .users
            .update_pair(&current.user.id, &requester, "Requesting user not found", |actor, requester| {
                Ok(engine::reject_request(actor, requester)?)
            })?;
        info!(by = %current.user.id, requester = %requester, "request rejected");
        Ok(message("Request rejected"))
    }

    pub async fn connections(Extension(state): Extension<State>, current: CurrentUser) -> Result<Json<ConnectionsResponse>> {
        Ok(Json(ConnectionsResponse {
            success: true,
            connections: state.users.summaries(&current.user.relations.connections)?,
        }))
    }

    pub async fn received(
        Extension(state): Extension<State>,
        current: CurrentUser,
    ) -> Result<Json<ReceivedRequestsResponse>> {
        Ok(Json(ReceivedRequestsResponse {
            success: true,
            received_requests: state.users.summaries(&current.user.relations.received_requests)?,
        }))
    }
}

mod admin {
    use axum::extract::rejection::QueryRejection;
    use axum::extract::{Path, Query};
    use axum::{Extension, Json};
    use devmatch_common::{DeleteUserRequest, UserId, UserResponse, UserView};
    use serde::Deserialize;
    use serde_json::{Map, Value};
    use tracing::info;

    use super::{object, parse, Payload};
    use crate::error::{AppError, Result};
    use crate::profile;
    use crate::State;

    #[derive(Deserialize)]
    pub struct EmailQuery {
        email: Option<String>,
    }

    pub async fn feed(Extension(state): Extension<State>) -> Result<Json<Vec<UserView>>> {
        Ok(Json(state.users.all()?.iter().map(|u| u.view()).collect()))
    }

    pub async fn find_user(
        Extension(state): Extension<State>,
        query: std::result::Result<Query<EmailQuery>, QueryRejection>,
    ) -> Result<Json<UserResponse>> {
        let Query(query) = query.map_err(|rejection| AppError::validation(rejection.body_text()))?;
        let email = query
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::validation("Email is required"))?;
        let user = state
            .users
            .find_by_email(&email)?
            .ok_or_else(|| AppError::not_found("User not found"))?;
        Ok(Json(UserResponse {
            success: true,
            message: None,
            user: user.view(),
        }))
    }

    pub async fn delete_user(Extension(state): Extension<State>, Payload(payload): Payload) -> Result<Json<UserView>> {
        let req: DeleteUserRequest = parse(payload)?;
        let removed = state.users.remove(&req.id)?;
        info!(id = %removed.id, "user deleted");
        Ok(Json(removed.view()))
    }

    pub async fn update_user(
        Extension(state): Extension<State>,
        Path(id): Path<String>,
        Payload(payload): Payload,
    ) -> Result<Json<UserResponse>> {
        apply(&state, UserId(id), object(payload)?).await
    }

    pub async fn update_user_by_body(Extension(state): Extension<State>, Payload(payload): Payload) -> Result<Json<UserResponse>> {
        let fields: Map<String, Value> = object(payload)?;
        let id = fields
            .get("id")
            .and_then(Value::as_str)
            .map(UserId::from)
            .ok_or_else(|| AppError::validation("id is required"))?;
        apply(&state, id, fields).await
    }

    async fn apply(state: &State, id: UserId, fields: Map<String, Value>) -> Result<Json<UserResponse>> {
        let user = profile::update_user(state, &id, fields).await?;
        Ok(Json(UserResponse {
            success: true,
            message: Some(String::from("User updated successfully")),
            user: user.view(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use tower::ServiceExt; // for oneshot

    use super::*;
    use crate::config::Config;
    use crate::State;

    fn test_app() -> Router {
        let state = State::temporary(Config {
            bcrypt_cost: 4,
            ..Default::default()
        })
        .unwrap();
        crate::app(state)
    }

    async fn call(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header("authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Signs up and logs in, returning `(id, token)`.
    async fn register(app: &Router, first: &str, email: &str) -> (String, String) {
        let (status, body) = call(
            app,
            "POST",
            "/signup",
            None,
            Some(json!({ "firstName": first, "lastName": "Test", "email": email, "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let (status, body) = call(app, "POST", "/login", None, Some(json!({ "email": email, "password": "secret1" }))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn signup_then_login() {
        let app = test_app();
        let (status, body) = call(
            &app,
            "POST",
            "/signup",
            None,
            Some(json!({ "firstName": "A", "lastName": "B", "email": "a@b.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert!(body["user"].get("password").is_none());

        let (status, _) = call(&app, "POST", "/login", None, Some(json!({ "email": "a@b.com", "password": "secret1" }))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "POST", "/login", None, Some(json!({ "email": "a@b.com", "password": "nope!!" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "success": false, "message": "Invalid credentials", "error": "AuthError" }));
    }

    async fn send_raw(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn unreadable_bodies_use_the_error_envelope() {
        let app = test_app();

        let malformed = Request::builder()
            .method("POST")
            .uri("/signup")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send_raw(&app, malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "ValidationError");
        assert!(body["message"].is_string());

        let untyped = Request::builder()
            .method("POST")
            .uri("/login")
            .body(Body::from(r#"{"email":"a@b.com","password":"secret1"}"#))
            .unwrap();
        let (status, body) = send_raw(&app, untyped).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "ValidationError");

        let delete = Request::builder()
            .method("DELETE")
            .uri("/user")
            .header("content-type", "application/json")
            .body(Body::from("[1, 2"))
            .unwrap();
        let (status, body) = send_raw(&app, delete).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ValidationError");
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected() {
        let app = test_app();
        register(&app, "A", "a@b.com").await;
        let (status, body) = call(
            &app,
            "POST",
            "/signup",
            None,
            Some(json!({ "firstName": "A", "lastName": "B", "email": "A@B.com", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "DuplicateError");
    }

    #[tokio::test]
    async fn actor_routes_require_a_token() {
        let app = test_app();
        let (status, body) = call(&app, "GET", "/profile/view", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = call(&app, "GET", "/connections", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn request_accept_workflow() {
        let app = test_app();
        let (a_id, a_token) = register(&app, "A", "a@x.io").await;
        let (b_id, b_token) = register(&app, "B", "b@x.io").await;

        let send = format!("/request/send/interested/{b_id}");
        let (status, _) = call(&app, "POST", &send, Some(&a_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, "POST", &send, Some(&a_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "DuplicateError");

        let (_, body) = call(&app, "GET", "/request/received", Some(&b_token), None).await;
        assert_eq!(body["receivedRequests"][0]["id"], a_id.as_str());

        let accept = format!("/request/review/accepted/{a_id}");
        let (status, _) = call(&app, "POST", &accept, Some(&b_token), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, a) = call(&app, "GET", "/profile/view", Some(&a_token), None).await;
        assert_eq!(a["user"]["connections"], json!([b_id]));
        assert_eq!(a["user"]["sentRequests"], json!([]));
        let (_, b) = call(&app, "GET", "/connections", Some(&b_token), None).await;
        assert_eq!(b["connections"][0]["firstName"], "A");
        assert_eq!(b["connections"][0]["email"], "a@x.io");

        let (status, _) = call(&app, "POST", &accept, Some(&b_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reject_clears_pending_pair() {
        let app = test_app();
        let (a_id, a_token) = register(&app, "A", "a@x.io").await;
        let (b_id, b_token) = register(&app, "B", "b@x.io").await;
        call(&app, "POST", &format!("/request/send/interested/{b_id}"), Some(&a_token), None).await;

        let (status, body) = call(&app, "POST", &format!("/request/review/rejected/{a_id}"), Some(&b_token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Request rejected");

        let (_, a) = call(&app, "GET", "/profile/view", Some(&a_token), None).await;
        let (_, b) = call(&app, "GET", "/profile/view", Some(&b_token), None).await;
        assert_eq!(a["user"]["sentRequests"], json!([]));
        assert_eq!(b["user"]["receivedRequests"], json!([]));
        assert_eq!(a["user"]["connections"], json!([]));
        assert_eq!(b["user"]["connections"], json!([]));
    }

    #[tokio::test]
    async fn self_and_missing_targets() {
        let app = test_app();
        let (a_id, a_token) = register(&app, "A", "a@x.io").await;

        let (status, body) = call(&app, "POST", &format!("/request/send/interested/{a_id}"), Some(&a_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "SelfReferenceError");

        let (status, body) = call(&app, "POST", "/request/send/ignored/nobody", Some(&a_token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Target user not found");
    }

    #[tokio::test]
    async fn ignore_only_touches_the_actor() {
        let app = test_app();
        let (a_id, a_token) = register(&app, "A", "a@x.io").await;
        let (b_id, b_token) = register(&app, "B", "b@x.io").await;

        let ignore = format!("/request/send/ignored/{b_id}");
        let (status, _) = call(&app, "POST", &ignore, Some(&a_token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "POST", &ignore, Some(&a_token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, a) = call(&app, "GET", "/profile/view", Some(&a_token), None).await;
        let (_, b) = call(&app, "GET", "/profile/view", Some(&b_token), None).await;
        assert_eq!(a["user"]["ignoredRequests"], json!([b_id]));
        assert_eq!(b["user"]["ignoredRequests"], json!([]));
        assert_eq!(b["user"]["receivedRequests"], json!([]));
        assert_ne!(a_id, b_id);
    }

    #[tokio::test]
    async fn profile_edit_is_all_or_nothing() {
        let app = test_app();
        let (_, token) = register(&app, "A", "a@x.io").await;

        let (status, body) = call(&app, "PATCH", "/profile/edit", Some(&token), Some(json!({ "firstName": "Z", "email": "z@x.io" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ValidationError");
        let (_, view) = call(&app, "GET", "/profile/view", Some(&token), None).await;
        assert_eq!(view["user"]["firstName"], "A");

        let (status, body) = call(&app, "PATCH", "/profile/edit", Some(&token), Some(json!({ "skills": ["rust"], "age": 30 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["skills"], json!(["rust"]));
        assert_eq!(body["user"]["age"], 30);
    }

    #[tokio::test]
    async fn password_change_and_logout() {
        let app = test_app();
        let (_, token) = register(&app, "A", "a@x.io").await;

        let change = |old: &str| json!({ "oldPassword": old, "newPassword": "another1" });
        let (status, _) = call(&app, "PATCH", "/profile/password", Some(&token), Some(change("wrong!!"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = call(&app, "PATCH", "/profile/password", Some(&token), Some(change("secret1"))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "POST", "/login", None, Some(json!({ "email": "a@x.io", "password": "another1" }))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, "POST", "/logout", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, "GET", "/profile/view", Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_routes() {
        let app = test_app();
        let (a_id, a_token) = register(&app, "A", "a@x.io").await;
        let (b_id, _) = register(&app, "B", "b@x.io").await;
        call(&app, "POST", &format!("/request/send/interested/{b_id}"), Some(&a_token), None).await;

        let (_, feed) = call(&app, "GET", "/feed", None, None).await;
        assert_eq!(feed.as_array().unwrap().len(), 2);

        let (status, found) = call(&app, "GET", "/users?email=B@x.io", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["user"]["id"], b_id.as_str());

        let (status, _) = call(&app, "PATCH", &format!("/user/{b_id}"), None, Some(json!({ "connections": [a_id] }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(&app, "PATCH", &format!("/user/{b_id}"), None, Some(json!({ "lastName": "Renamed" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["lastName"], "Renamed");

        let (status, deleted) = call(&app, "DELETE", "/user", None, Some(json!({ "id": b_id }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted["email"], "b@x.io");
        let (_, a) = call(&app, "GET", "/profile/view", Some(&a_token), None).await;
        assert_eq!(a["user"]["sentRequests"], json!([]));

        let (status, _) = call(&app, "DELETE", "/user", None, Some(json!({ "id": b_id }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
