use serde::{Deserialize, Serialize};

use crate::users::repo_types::Role;

/// JWT payload issued on login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: i64,    // user ID
    pub role: Role, // user role
    pub iat: usize, // issued at (unix timestamp)
    pub exp: usize, // expires at (unix timestamp)
}
