//! Signup, login and the `CurrentUser` extractor that gates every actor-scoped route.

use std::sync::OnceLock;

use anyhow::Context;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use devmatch_common::{LoginRequest, SignupRequest, Token};
use regex_lite::Regex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::state::State;
use crate::users::User;

pub const MIN_PASSWORD_LEN: usize = 6;
/// Sessions kept per user; logging in past this evicts the oldest token.
pub const MAX_SESSIONS: usize = 10;

/// The authenticated caller plus the token it presented.
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub user: User,
    pub token: Token,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let state = parts
            .extensions
            .get::<State>()
            .cloned()
            .context("State extension missing")?;
        let token = presented_token(&parts.headers).ok_or_else(|| AppError::auth("Authentication required"))?;
        match state.users.find_by_token(&token)? {
            Some(user) => Ok(CurrentUser { user, token }),
            None => {
                warn!("rejected unknown session token");
                Err(AppError::auth("Invalid or expired token"))
            }
        }
    }
}

/// `Authorization: Bearer <token>` wins over a `token=<token>` cookie.
pub fn presented_token(headers: &HeaderMap) -> Option<Token> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    let cookie = || {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .find_map(|pair| pair.trim().strip_prefix("token="))
    };
    bearer
        .or_else(cookie)
        .filter(|t| !t.is_empty())
        .map(|t| Token(t.to_string()))
}

pub fn issue_token() -> Token {
    Token(Uuid::new_v4().simple().to_string())
}

pub fn is_email(candidate: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"))
        .is_match(candidate)
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(())
}

pub fn validate_signup(req: &SignupRequest) -> Result<()> {
    if [&req.first_name, &req.last_name, &req.email, &req.password]
        .iter()
        .any(|f| f.trim().is_empty())
    {
        return Err(AppError::validation("All fields are required"));
    }
    if !is_email(req.email.trim()) {
        return Err(AppError::validation("Invalid email format"));
    }
    validate_password(&req.password)
}

pub async fn hash_password(plain: String, cost: u32) -> Result<String> {
    let hashed = tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
        .await
        .context("password hashing task failed")??;
    Ok(hashed)
}

pub async fn verify_password(plain: String, hash: String) -> Result<bool> {
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(plain, &hash))
        .await
        .context("password verification task failed")??;
    Ok(matches)
}

pub async fn signup(state: &State, req: SignupRequest) -> Result<User> {
    validate_signup(&req)?;
    let hash = hash_password(req.password, state.config.bcrypt_cost).await?;
    let mut user = User::new(
        req.first_name.trim().to_string(),
        req.last_name.trim().to_string(),
        &req.email,
        hash,
    );
    user.age = req.age;
    user.gender = req.gender;
    state.users.insert(&user)?;
    info!(id = %user.id, "user signed up");
    Ok(user)
}

pub async fn login(state: &State, req: LoginRequest) -> Result<(User, Token)> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }
    let user = state
        .users
        .find_by_email(&req.email)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    if !verify_password(req.password, user.password.clone()).await? {
        warn!(id = %user.id, "login with wrong password");
        return Err(AppError::auth("Invalid credentials"));
    }
    let token = issue_token();
    let user = state.users.update(&user.id, |u| {
        u.tokens.push(token.clone());
        let excess = u.tokens.len().saturating_sub(MAX_SESSIONS);
        u.tokens.drain(..excess);
        Ok(())
    })?;
    info!(id = %user.id, "user logged in");
    Ok((user, token))
}

/// Drops only the presented token; other sessions stay valid.
pub fn logout(state: &State, current: &CurrentUser) -> Result<User> {
    let user = state.users.update(&current.user.id, |u| {
        u.tokens.retain(|t| t != &current.token);
        Ok(())
    })?;
    info!(id = %user.id, "user logged out");
    Ok(user)
}
