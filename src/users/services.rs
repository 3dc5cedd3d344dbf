use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::{
    error::AppError,
    state::AppState,
    users::{
        dto::{LoginRequest, RegisterRequest, UpdateUserRequest},
        repo::RepoError,
        repo_types::{NewUser, Role, UserPatch},
    },
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Canonical comparison key for an email: trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    raw.parse::<Role>().map_err(AppError::Validation)
}

/// Creates an account and returns its id.
pub async fn register_user(state: &AppState, req: RegisterRequest) -> Result<i64, AppError> {
    let (Some(name), Some(email), Some(password)) = (
        non_blank(req.name),
        non_blank(req.email),
        non_empty(req.password),
    ) else {
        warn!("register missing fields");
        return Err(AppError::validation(
            "Required fields missing: name, email, password",
        ));
    };

    let email = normalize_email(&email);
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::validation("Invalid email"));
    }
    let role = match non_blank(req.role) {
        Some(raw) => parse_role(&raw)?,
        None => Role::default(),
    };

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(RepoError::Conflict.into());
    }

    let password_hash = state
        .passwords
        .hash(&password)
        .map_err(|e| AppError::internal("hash_password failed", e))?;

    // A concurrent registration can still win the race; the unique index turns
    // that into RepoError::Conflict, which maps to the same 409.
    let user = state
        .users
        .create(NewUser {
            name: name.trim().to_string(),
            email,
            password_hash,
            role,
            gender: req.gender,
        })
        .await?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user.id)
}

/// Verifies credentials and issues a bearer token.
pub async fn login_user(state: &AppState, req: LoginRequest) -> Result<(String, Role), AppError> {
    let (Some(email), Some(password)) = (non_blank(req.email), non_empty(req.password)) else {
        return Err(AppError::validation("Email and password are required"));
    };
    let email = normalize_email(&email);

    let Some(user) = state.users.find_by_email(&email).await? else {
        // same argon2 cost as a real mismatch
        state.passwords.verify_dummy(&password);
        warn!(%email, "login unknown email");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    let ok = state
        .passwords
        .verify(&password, &user.password)
        .map_err(|e| AppError::internal("verify_password failed", e))?;
    if !ok {
        warn!(%email, user_id = user.id, "login invalid password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let token = state
        .jwt
        .sign(user.id, user.role)
        .map_err(|e| AppError::internal("jwt sign failed", e))?;

    info!(user_id = user.id, "user logged in");
    Ok((token, user.role))
}

/// Applies a patch after normalizing and hashing the fields that need it.
pub async fn update_user(state: &AppState, id: i64, req: UpdateUserRequest) -> Result<(), AppError> {
    if state.users.find_by_id(id).await?.is_none() {
        return Err(RepoError::NotFound.into());
    }

    let name = match req.name {
        Some(name) if name.trim().is_empty() => {
            return Err(AppError::validation("Name must not be empty"))
        }
        Some(name) => Some(name.trim().to_string()),
        None => None,
    };

    let email = match req.email {
        Some(email) => {
            let email = normalize_email(&email);
            if !is_valid_email(&email) {
                return Err(AppError::validation("Invalid email"));
            }
            Some(email)
        }
        None => None,
    };

    let role = non_blank(req.role).as_deref().map(parse_role).transpose()?;

    let password_hash = match non_empty(req.password) {
        Some(password) => Some(
            state
                .passwords
                .hash(&password)
                .map_err(|e| AppError::internal("hash_password failed", e))?,
        ),
        None => None,
    };

    state
        .users
        .update(
            id,
            UserPatch {
                name,
                email,
                password_hash,
                role,
                gender: req.gender,
                is_active: req.is_active,
            },
        )
        .await?;

    info!(user_id = id, "user updated");
    Ok(())
}
