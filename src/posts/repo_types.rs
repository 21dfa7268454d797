use sqlx::FromRow;
use time::OffsetDateTime;

/// Post joined with its author's display name.
#[derive(Debug, Clone, FromRow)]
pub struct Post {
    pub post_id: i32,
    pub title: String,
    pub content: String,
    pub author_id: i32,
    pub author: String,
    pub creation_date: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author_id: i32,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}
