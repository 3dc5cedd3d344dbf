use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::users::{
    repo::{RepoError, UserRepository},
    repo_types::{NewUser, User, UserPatch},
};

/// In-process stand-in for the `users` table, including its unique email index.
#[derive(Default)]
pub struct MemoryUserRepository {
    inner: Mutex<Table>,
}

impl MemoryUserRepository {
    /// Flags a row the way a legacy soft delete would have.
    pub fn mark_deleted(&self, id: i64) {
        let mut table = self.inner.lock().expect("poisoned");
        if let Some(row) = table.rows.iter_mut().find(|u| u.id == id) {
            row.is_deleted = true;
        }
    }
}

#[derive(Default)]
struct Table {
    next_id: i64,
    rows: Vec<User>,
}

impl Table {
    fn live(&self, id: i64) -> Option<usize> {
        self.rows.iter().position(|u| u.id == id && !u.is_deleted)
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.rows
            .iter()
            .any(|u| u.email.to_lowercase() == email.to_lowercase() && Some(u.id) != except)
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let table = self.inner.lock().expect("poisoned");
        Ok(table
            .rows
            .iter()
            .find(|u| u.email == email && !u.is_deleted)
            .cloned())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let table = self.inner.lock().expect("poisoned");
        Ok(table.live(id).map(|idx| table.rows[idx].clone()))
    }

    async fn create(&self, user: NewUser) -> Result<User, RepoError> {
        let mut table = self.inner.lock().expect("poisoned");
        if table.email_taken(&user.email, None) {
            return Err(RepoError::Conflict);
        }
        table.next_id += 1;
        let now = OffsetDateTime::now_utc();
        let row = User {
            id: table.next_id,
            name: user.name,
            email: user.email,
            password: user.password_hash,
            role: user.role,
            gender: user.gender,
            is_active: true,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        table.rows.push(row.clone());
        Ok(row)
    }

    async fn list_all(&self) -> Result<Vec<User>, RepoError> {
        let table = self.inner.lock().expect("poisoned");
        Ok(table.rows.iter().filter(|u| !u.is_deleted).cloned().collect())
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<(), RepoError> {
        let mut table = self.inner.lock().expect("poisoned");
        let idx = table.live(id).ok_or(RepoError::NotFound)?;
        if let Some(email) = &patch.email {
            if table.email_taken(email, Some(id)) {
                return Err(RepoError::Conflict);
            }
        }
        let row = &mut table.rows[idx];
        if let Some(name) = patch.name {
            row.name = name;
        }
        if let Some(email) = patch.email {
            row.email = email;
        }
        if let Some(hash) = patch.password_hash {
            row.password = hash;
        }
        if let Some(role) = patch.role {
            row.role = role;
        }
        if let Some(gender) = patch.gender {
            row.gender = gender;
        }
        if let Some(active) = patch.is_active {
            row.is_active = active;
        }
        let now = OffsetDateTime::now_utc();
        row.updated_at = if now > row.updated_at {
            now
        } else {
            row.updated_at + time::Duration::nanoseconds(1)
        };
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<(), RepoError> {
        let mut table = self.inner.lock().expect("poisoned");
        let idx = table.live(id).ok_or(RepoError::NotFound)?;
        table.rows.remove(idx);
        Ok(())
    }
}
