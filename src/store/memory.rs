use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use time::OffsetDateTime;

use super::{PostStore, StoreError, UserStore};
use crate::{
    posts::repo_types::{NewPost, Post, PostChanges},
    users::repo_types::{NewUser, User, UserChanges},
};

#[derive(Debug, Clone)]
struct PostRow {
    post_id: i32,
    title: String,
    content: String,
    author_id: i32,
    creation_date: OffsetDateTime,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i32, User>,
    posts: BTreeMap<i32, PostRow>,
    next_user_id: i32,
    next_post_id: i32,
}

impl Tables {
    fn email_taken(&self, email: &str, except: Option<i32>) -> bool {
        self.users
            .values()
            .any(|u| u.email == email && Some(u.user_id) != except)
    }

    fn join(&self, row: &PostRow) -> Option<Post> {
        let author = self.users.get(&row.author_id)?;
        Some(Post {
            post_id: row.post_id,
            title: row.title.clone(),
            content: row.content.clone(),
            author_id: row.author_id,
            author: author.name.clone(),
            creation_date: row.creation_date,
        })
    }
}

/// In-process store with the same constraints as the Postgres schema.
/// All tables sit behind one lock so cross-table rules stay atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock();
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user(&self, user_id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().users.get(&user_id).cloned())
    }

    async fn list_users(&self, is_teacher: Option<bool>) -> Result<Vec<User>, StoreError> {
        let t = self.tables.lock();
        Ok(t.users
            .values()
            .filter(|u| is_teacher.map_or(true, |flag| u.is_teacher == flag))
            .cloned()
            .collect())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut t = self.tables.lock();
        if t.email_taken(&user.email, None) {
            return Err(StoreError::Conflict);
        }
        t.next_user_id += 1;
        let row = User {
            user_id: t.next_user_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            is_teacher: user.is_teacher,
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.insert(row.user_id, row.clone());
        Ok(row)
    }

    async fn update_user(
        &self,
        user_id: i32,
        changes: UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut t = self.tables.lock();
        if let Some(email) = &changes.email {
            if t.email_taken(email, Some(user_id)) {
                return Err(StoreError::Conflict);
            }
        }
        let Some(user) = t.users.get_mut(&user_id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(hash) = changes.password_hash {
            user.password_hash = hash;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, user_id: i32) -> Result<bool, StoreError> {
        let mut t = self.tables.lock();
        if t.users.remove(&user_id).is_none() {
            return Ok(false);
        }
        t.posts.retain(|_, p| p.author_id != user_id);
        Ok(true)
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        let t = self.tables.lock();
        let mut posts: Vec<Post> = t.posts.values().filter_map(|p| t.join(p)).collect();
        posts.sort_by(|a, b| {
            b.creation_date
                .cmp(&a.creation_date)
                .then(b.post_id.cmp(&a.post_id))
        });
        Ok(posts)
    }

    async fn find_post(&self, post_id: i32) -> Result<Option<Post>, StoreError> {
        let t = self.tables.lock();
        Ok(t.posts.get(&post_id).and_then(|p| t.join(p)))
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, StoreError> {
        let mut t = self.tables.lock();
        if !t.users.contains_key(&post.author_id) {
            return Err(StoreError::MissingReference);
        }
        t.next_post_id += 1;
        let row = PostRow {
            post_id: t.next_post_id,
            title: post.title,
            content: post.content,
            author_id: post.author_id,
            creation_date: OffsetDateTime::now_utc(),
        };
        t.posts.insert(row.post_id, row.clone());
        t.join(&row).ok_or(StoreError::MissingReference)
    }

    async fn update_post(
        &self,
        post_id: i32,
        changes: PostChanges,
    ) -> Result<Option<Post>, StoreError> {
        let mut t = self.tables.lock();
        let Some(row) = t.posts.get_mut(&post_id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            row.title = title;
        }
        if let Some(content) = changes.content {
            row.content = content;
        }
        let row = row.clone();
        Ok(t.join(&row))
    }

    async fn delete_post(&self, post_id: i32) -> Result<bool, StoreError> {
        Ok(self.tables.lock().posts.remove(&post_id).is_some())
    }
}
