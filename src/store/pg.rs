use async_trait::async_trait;
use sqlx::PgPool;

use super::{PostStore, StoreError, UserStore};
use crate::{
    posts::repo_types::{NewPost, Post, PostChanges},
    users::repo_types::{NewUser, User, UserChanges},
};

/// Postgres-backed store. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, name, email, password_hash, is_teacher, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, user_id: i32) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, name, email, password_hash, is_teacher, created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn list_users(&self, is_teacher: Option<bool>) -> Result<Vec<User>, StoreError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, name, email, password_hash, is_teacher, created_at
            FROM users
            WHERE $1::boolean IS NULL OR is_teacher = $1
            ORDER BY user_id
            "#,
        )
        .bind(is_teacher)
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, is_teacher)
            VALUES ($1, $2, $3, $4)
            RETURNING user_id, name, email, password_hash, is_teacher, created_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_teacher)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_user(
        &self,
        user_id: i32,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   password_hash = COALESCE($4, password_hash)
             WHERE user_id = $1
            RETURNING user_id, name, email, password_hash, is_teacher, created_at
            "#,
        )
        .bind(user_id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.password_hash)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, user_id: i32) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}

#[async_trait]
impl PostStore for PgStore {
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.post_id, p.title, p.content, p.author_id, u.name AS author, p.creation_date
              FROM posts p
              JOIN users u ON u.user_id = p.author_id
             ORDER BY p.creation_date DESC, p.post_id DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(posts)
    }

    async fn find_post(&self, post_id: i32) -> Result<Option<Post>, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.post_id, p.title, p.content, p.author_id, u.name AS author, p.creation_date
              FROM posts p
              JOIN users u ON u.user_id = p.author_id
             WHERE p.post_id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(post)
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            WITH inserted AS (
                INSERT INTO posts (title, content, author_id)
                VALUES ($1, $2, $3)
                RETURNING post_id, title, content, author_id, creation_date
            )
            SELECT i.post_id, i.title, i.content, i.author_id, u.name AS author, i.creation_date
              FROM inserted i
              JOIN users u ON u.user_id = i.author_id
            "#,
        )
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.author_id)
        .fetch_one(&self.db)
        .await?;
        Ok(post)
    }

    async fn update_post(
        &self,
        post_id: i32,
        changes: PostChanges,
    ) -> Result<Option<Post>, StoreError> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            WITH updated AS (
                UPDATE posts
                   SET title = COALESCE($2, title),
                       content = COALESCE($3, content)
                 WHERE post_id = $1
                RETURNING post_id, title, content, author_id, creation_date
            )
            SELECT d.post_id, d.title, d.content, d.author_id, u.name AS author, d.creation_date
              FROM updated d
              JOIN users u ON u.user_id = d.author_id
            "#,
        )
        .bind(post_id)
        .bind(changes.title)
        .bind(changes.content)
        .fetch_optional(&self.db)
        .await?;
        Ok(post)
    }

    async fn delete_post(&self, post_id: i32) -> Result<bool, StoreError> {
        let res = sqlx::query("DELETE FROM posts WHERE post_id = $1")
            .bind(post_id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
