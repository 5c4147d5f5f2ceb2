use crate::{
    record::{AuthenticationRecord, PostRecord, UserRecord},
    store::{IdGenerator, Result, Store},
};
use async_trait::async_trait;
use lostfound_common::{
    model::{
        Id,
        auth::{AuthTokenHash, Authentication},
        post::{CommentMarker, CreatePost, Post, PostMarker},
        user::{CreateUser, User, UserMarker},
    },
    snowflake::NodeId,
};
use sqlx::{PgPool, query, query_as, query_scalar, types::Json};
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{debug, info};

fn db_id<Marker>(id: Id<Marker>) -> i64 {
    u64::from(id).cast_signed()
}

const POST_COLUMNS: &str = "
    posts.post_snowflake,
    posts.user_snowflake,
    posts.name,
    posts.text,
    posts.founded_date,
    posts.location,
    posts.found,
    posts.comments,
    posts.created_at
";

/// Postgres-backed store. Comments live in a JSONB column on their post so
/// that a post is read and written as one document.
#[derive(Debug)]
pub struct PgStore {
    pool: PgPool,
    ids: IdGenerator,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool, node_id: NodeId) -> Self {
        Self {
            pool,
            ids: IdGenerator::new(node_id),
        }
    }

    /// Connects and brings the schema up to date.
    pub async fn connect(database_url: &str, node_id: NodeId) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database schema is up to date");

        Ok(Self::new(pool, node_id))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.user_snowflake,
                users.name
            FROM
                users.users
            WHERE
                users.user_snowflake = $1
            ",
        )
        .bind(db_id(user_id))
        .fetch_optional(&self.pool)
        .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user_id: Id<UserMarker> = self.ids.generate()?;

        let record = query_as::<_, UserRecord>(
            "
            INSERT INTO users.users (user_snowflake, name)
            VALUES ($1, $2)
            RETURNING user_snowflake, name
            ",
        )
        .bind(db_id(user_id))
        .bind(user.name.get())
        .fetch_one(&self.pool)
        .await?;

        debug!(%user_id, created_at = %user_id.created_at(), "Inserted user");
        Ok(User::try_from(record)?)
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        let record = query_as::<_, AuthenticationRecord>(
            "
            SELECT
                authentications.user_snowflake,
                authentications.token_hash,
                authentications.created_at,
                authentications.expires_after_seconds
            FROM
                users.authentications
            WHERE
                authentications.token_hash = $1
            ",
        )
        .bind(token_hash.0.as_slice())
        .fetch_optional(&self.pool)
        .await?;

        let authentication = record.map(Authentication::try_from).transpose()?;
        Ok(authentication)
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        let created_at = PrimitiveDateTime::new(
            authentication.created_at.date(),
            authentication.created_at.time(),
        );

        query(
            "
            INSERT INTO users.authentications
                (user_snowflake, token_hash, created_at, expires_after_seconds)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(db_id(authentication.user))
        .bind(authentication.token_hash.0.as_slice())
        .bind(created_at)
        .bind(
            authentication
                .expires_after
                .map(|duration| duration.get().whole_seconds()),
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        let record = query_as::<_, PostRecord>(&format!(
            "SELECT {POST_COLUMNS} FROM posts.posts WHERE posts.post_snowflake = $1"
        ))
        .bind(db_id(post_id))
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Post::from))
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let records = query_as::<_, PostRecord>(&format!(
            "SELECT {POST_COLUMNS} FROM posts.posts
            ORDER BY posts.created_at DESC, posts.post_snowflake DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(Post::from).collect())
    }

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Option<Vec<Post>>> {
        let user_exists = query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM users.users WHERE users.user_snowflake = $1)",
        )
        .bind(db_id(user_id))
        .fetch_one(&self.pool)
        .await?;

        if !user_exists {
            return Ok(None);
        }

        let records = query_as::<_, PostRecord>(&format!(
            "SELECT {POST_COLUMNS} FROM posts.posts
            WHERE posts.user_snowflake = $1
            ORDER BY posts.created_at DESC, posts.post_snowflake DESC"
        ))
        .bind(db_id(user_id))
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(records.into_iter().map(Post::from).collect()))
    }

    async fn create_post(&self, post: CreatePost) -> Result<Post> {
        let post_id: Id<PostMarker> = self.ids.generate()?;

        let record = query_as::<_, PostRecord>(&format!(
            "
            INSERT INTO posts.posts
                (post_snowflake, user_snowflake, name, text, founded_date, location, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {POST_COLUMNS}
            "
        ))
        .bind(db_id(post_id))
        .bind(db_id(post.user))
        .bind(&post.name)
        .bind(&post.content.text)
        .bind(post.content.founded_date)
        .bind(&post.content.location)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.pool)
        .await?;

        debug!(%post_id, "Inserted post");
        Ok(Post::from(record))
    }

    async fn save_post(&self, post: &Post) -> Result<bool> {
        let result = query(
            "
            UPDATE posts.posts
            SET found = $2, comments = $3
            WHERE posts.post_snowflake = $1
            ",
        )
        .bind(db_id(post.id))
        .bind(post.found)
        .bind(Json(&post.comments))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        let result = query("DELETE FROM posts.posts WHERE posts.post_snowflake = $1")
            .bind(db_id(post_id))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn generate_comment_id(&self) -> Result<Id<CommentMarker>> {
        self.ids.generate()
    }
}
