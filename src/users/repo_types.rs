use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User role. Stored as an integer, exchanged as a string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[repr(i32)]
pub enum Role {
    Admin = 1,
    #[default]
    Applicant = 2,
    #[serde(alias = "job_provider")]
    JobProvider = 3,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Applicant => "applicant",
            Role::JobProvider => "job-provider",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "applicant" => Ok(Role::Applicant),
            "job-provider" | "job_provider" => Ok(Role::JobProvider),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String, // argon2 digest, never exposed in JSON
    pub role: Role,
    pub gender: Option<i64>,
    pub is_active: bool,
    pub is_deleted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields for a row about to be inserted; email already normalized.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub gender: Option<i64>,
}

/// Partial update. `None` leaves a column untouched; `gender: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub gender: Option<Option<i64>>,
    pub is_active: Option<bool>,
}
