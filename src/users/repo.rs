use async_trait::async_trait;
use sqlx::PgPool;

use crate::users::repo_types::{NewUser, User, UserPatch};

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("user not found")]
    NotFound,
    #[error("email already in use")]
    Conflict,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
            _ => RepoError::Database(e),
        }
    }
}

/// Persistence contract for users. Every read skips soft-deleted rows.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError>;
    /// Fails with `Conflict` when the email collides at the storage layer.
    async fn create(&self, user: NewUser) -> Result<User, RepoError>;
    /// Unpaginated, insertion order.
    async fn list_all(&self) -> Result<Vec<User>, RepoError>;
    async fn update(&self, id: i64, patch: UserPatch) -> Result<(), RepoError>;
    /// Hard delete: the row is removed, not flagged.
    async fn delete(&self, id: i64) -> Result<(), RepoError>;
}

#[derive(Clone)]
pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str =
    "id, name, email, password, role, gender, is_active, is_deleted, created_at, updated_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_deleted = FALSE LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND is_deleted = FALSE"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password, role, gender)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.gender)
        .fetch_one(&self.db)
        .await?;
        Ok(created)
    }

    async fn list_all(&self) -> Result<Vec<User>, RepoError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE is_deleted = FALSE ORDER BY id"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<(), RepoError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                name       = COALESCE($2, name),
                email      = COALESCE($3, email),
                password   = COALESCE($4, password),
                role       = COALESCE($5, role),
                gender     = CASE WHEN $6 THEN $7 ELSE gender END,
                is_active  = COALESCE($8, is_active),
                updated_at = clock_timestamp()
            WHERE id = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.password_hash)
        .bind(patch.role)
        .bind(patch.gender.is_some())
        .bind(patch.gender.flatten())
        .bind(patch.is_active)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND is_deleted = FALSE")
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
