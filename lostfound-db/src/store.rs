use async_trait::async_trait;
use lostfound_common::{
    model::{
        Id, LostFoundSnowflakeGenerator, ModelValidationError,
        auth::{AuthTokenHash, Authentication},
        post::{CommentMarker, CreatePost, Post, PostMarker},
        user::{CreateUser, User, UserMarker},
    },
    snowflake::{NodeId, SnowflakeTimestampError},
};
use std::{
    fmt::Debug,
    sync::{Mutex, PoisonError},
};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error("Could not generate an id: {0}")]
    Snowflake(#[from] SnowflakeTimestampError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// The document store behind the API.
///
/// Posts are read whole, changed in memory and written back with
/// [`Store::save_post`]; concurrent writers to one post race and the last
/// save wins.
#[async_trait]
pub trait Store: Debug + Send + Sync {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>>;

    async fn create_user(&self, user: &CreateUser) -> Result<User>;

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>>;

    async fn create_auth(&self, authentication: &Authentication) -> Result<()>;

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>>;

    /// All posts, most recent first.
    async fn fetch_posts(&self) -> Result<Vec<Post>>;

    /// `None` when the user does not exist.
    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Option<Vec<Post>>>;

    /// Assigns the id and creation time.
    async fn create_post(&self, post: CreatePost) -> Result<Post>;

    /// Overwrites a stored post. Whether the post still existed; a post
    /// deleted in the meantime stays deleted.
    async fn save_post(&self, post: &Post) -> Result<bool>;

    /// Whether a post was removed.
    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool>;

    fn generate_comment_id(&self) -> Result<Id<CommentMarker>>;
}

#[derive(Debug)]
pub(crate) struct IdGenerator(Mutex<LostFoundSnowflakeGenerator>);

impl IdGenerator {
    pub(crate) fn new(node_id: NodeId) -> Self {
        Self(Mutex::new(LostFoundSnowflakeGenerator::new(node_id)))
    }

    pub(crate) fn generate<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(Id::new(snowflake))
    }
}
