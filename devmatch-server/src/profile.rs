//! Profile edits, password changes and the unscoped admin update.

use devmatch_common::{PasswordChange, UserId, EDITABLE_FIELDS};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::auth::{self, CurrentUser};
use crate::error::{AppError, Result};
use crate::state::State;
use crate::users::{normalize_email, User};

/// Applies an allow-listed set of field updates. Any unknown field, or any badly typed value,
/// rejects the whole edit and leaves `user` untouched.
pub fn apply_profile_edit(user: &mut User, fields: &Map<String, Value>) -> Result<()> {
    if !fields.keys().all(|k| EDITABLE_FIELDS.contains(&k.as_str())) {
        return Err(AppError::validation("Invalid updates!"));
    }
    let mut staged = user.clone();
    for (key, value) in fields {
        apply_field(&mut staged, key, value)?;
    }
    *user = staged;
    Ok(())
}

fn apply_field(user: &mut User, key: &str, value: &Value) -> Result<()> {
    match key {
        "firstName" => user.first_name = required_string(key, value)?,
        "lastName" => user.last_name = required_string(key, value)?,
        "age" => {
            user.age = match value {
                Value::Null => None,
                v => Some(
                    v.as_u64()
                        .and_then(|n| u32::try_from(n).ok())
                        .ok_or_else(|| AppError::validation("age must be a non-negative integer"))?,
                ),
            }
        }
        "gender" => user.gender = optional_string(key, value)?,
        "photourl" => user.photourl = optional_string(key, value)?,
        "skills" => {
            user.skills = value
                .as_array()
                .and_then(|items| items.iter().map(|s| s.as_str().map(str::to_string)).collect::<Option<Vec<_>>>())
                .ok_or_else(|| AppError::validation("skills must be a list of strings"))?
        }
        other => return Err(AppError::validation(format!("{other} cannot be updated"))),
    }
    Ok(())
}

fn required_string(key: &str, value: &Value) -> Result<String> {
    match value.as_str().map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(AppError::validation(format!("{key} must be a non-empty string"))),
    }
}

fn optional_string(key: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(AppError::validation(format!("{key} must be a string"))),
    }
}

pub fn edit_profile(state: &State, current: &CurrentUser, fields: &Map<String, Value>) -> Result<User> {
    let user = state.users.update(&current.user.id, |u| apply_profile_edit(u, fields))?;
    info!(id = %user.id, fields = fields.len(), "profile edited");
    Ok(user)
}

pub async fn change_password(state: &State, current: &CurrentUser, req: PasswordChange) -> Result<()> {
    if req.old_password.is_empty() || req.new_password.is_empty() {
        return Err(AppError::validation("Old and new passwords are required"));
    }
    if !auth::verify_password(req.old_password, current.user.password.clone()).await? {
        warn!(id = %current.user.id, "password change with wrong old password");
        return Err(AppError::auth("Old password is incorrect"));
    }
    auth::validate_password(&req.new_password)?;
    let hash = auth::hash_password(req.new_password, state.config.bcrypt_cost).await?;
    state.users.update(&current.user.id, |u| {
        u.password = hash.clone();
        Ok(())
    })?;
    info!(id = %current.user.id, "password changed");
    Ok(())
}

/// Unauthenticated update by id. Accepts the profile fields plus `email` and `password`;
/// relationship lists and tokens are never writable from here.
pub async fn update_user(state: &State, id: &UserId, mut fields: Map<String, Value>) -> Result<User> {
    if let Some(given) = fields.remove("id") {
        if given.as_str() != Some(id.as_str()) {
            return Err(AppError::validation("Cannot change user id"));
        }
    }
    let email = match fields.remove("email") {
        Some(v) => {
            let email = v
                .as_str()
                .map(normalize_email)
                .filter(|e| auth::is_email(e))
                .ok_or_else(|| AppError::validation("Invalid email format"))?;
            Some(email)
        }
        None => None,
    };
    let hash = match fields.remove("password") {
        Some(v) => {
            let plain = v
                .as_str()
                .ok_or_else(|| AppError::validation("password must be a string"))?;
            auth::validate_password(plain)?;
            Some(auth::hash_password(plain.to_string(), state.config.bcrypt_cost).await?)
        }
        None => None,
    };

    let user = state.users.update(id, |u| {
        apply_profile_edit(u, &fields)?;
        if let Some(email) = &email {
            u.email = email.clone();
        }
        if let Some(hash) = &hash {
            u.password = hash.clone();
        }
        Ok(())
    })?;
    info!(id = %user.id, "user updated by id");
    Ok(user)
}
