use async_trait::async_trait;
use thiserror::Error;

use crate::{
    posts::repo_types::{NewPost, Post, PostChanges},
    users::repo_types::{NewUser, User, UserChanges},
};

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint (the user email) rejected the write.
    #[error("unique constraint violated")]
    Conflict,

    /// A foreign key (the post author) points at a missing row.
    #[error("referenced record does not exist")]
    MissingReference,

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return StoreError::Conflict;
            }
            if db.is_foreign_key_violation() {
                return StoreError::MissingReference;
            }
        }
        StoreError::Database(err)
    }
}

/// Persisted user records. Email uniqueness is enforced here, at write time.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user(&self, user_id: i32) -> Result<Option<User>, StoreError>;
    async fn list_users(&self, is_teacher: Option<bool>) -> Result<Vec<User>, StoreError>;
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;
    async fn update_user(
        &self,
        user_id: i32,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError>;
    /// Removes the user and every post they authored. Returns `false` if absent.
    async fn delete_user(&self, user_id: i32) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// All posts, newest first.
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError>;
    async fn find_post(&self, post_id: i32) -> Result<Option<Post>, StoreError>;
    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError>;
    async fn update_post(
        &self,
        post_id: i32,
        changes: PostChanges,
    ) -> Result<Option<Post>, StoreError>;
    async fn delete_post(&self, post_id: i32) -> Result<bool, StoreError>;
}
