use crate::store::{IdGenerator, Result, Store};
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
use std::{cmp::Reverse, collections::HashMap};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Documents {
    users: HashMap<Id<UserMarker>, User>,
    authentications: HashMap<AuthTokenHash, Authentication>,
    posts: HashMap<Id<PostMarker>, Post>,
}

/// Keeps every document in process memory. Nothing survives a restart.
#[derive(Debug)]
pub struct MemoryStore {
    ids: IdGenerator,
    documents: RwLock<Documents>,
}

impl MemoryStore {
    #[must_use]
    pub fn new(node_id: NodeId) -> Self {
        Self {
            ids: IdGenerator::new(node_id),
            documents: RwLock::default(),
        }
    }
}

fn newest_first(posts: &mut [Post]) {
    posts.sort_by_key(|post| Reverse((post.date, post.id)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        Ok(self.documents.read().await.users.get(&user_id).cloned())
    }

    async fn create_user(&self, user: &CreateUser) -> Result<User> {
        let user = User {
            id: self.ids.generate()?,
            name: user.name.clone(),
        };

        self.documents
            .write()
            .await
            .users
            .insert(user.id, user.clone());
        debug!(user_id = %user.id, created_at = %user.id.created_at(), "Stored user");

        Ok(user)
    }

    async fn fetch_auth(&self, token_hash: &AuthTokenHash) -> Result<Option<Authentication>> {
        Ok(self
            .documents
            .read()
            .await
            .authentications
            .get(token_hash)
            .cloned())
    }

    async fn create_auth(&self, authentication: &Authentication) -> Result<()> {
        self.documents
            .write()
            .await
            .authentications
            .insert(authentication.token_hash.clone(), authentication.clone());

        Ok(())
    }

    async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>> {
        Ok(self.documents.read().await.posts.get(&post_id).cloned())
    }

    async fn fetch_posts(&self) -> Result<Vec<Post>> {
        let mut posts: Vec<_> = self.documents.read().await.posts.values().cloned().collect();
        newest_first(&mut posts);

        Ok(posts)
    }

    async fn fetch_user_posts(&self, user_id: Id<UserMarker>) -> Result<Option<Vec<Post>>> {
        let documents = self.documents.read().await;
        if !documents.users.contains_key(&user_id) {
            return Ok(None);
        }

        let mut posts: Vec<_> = documents
            .posts
            .values()
            .filter(|post| post.user == user_id)
            .cloned()
            .collect();
        newest_first(&mut posts);

        Ok(Some(posts))
    }

    async fn create_post(&self, post: CreatePost) -> Result<Post> {
        let post = Post::new(self.ids.generate()?, post, OffsetDateTime::now_utc());

        self.documents
            .write()
            .await
            .posts
            .insert(post.id, post.clone());
        debug!(post_id = %post.id, "Stored post");

        Ok(post)
    }

    async fn save_post(&self, post: &Post) -> Result<bool> {
        let mut documents = self.documents.write().await;
        let Some(stored) = documents.posts.get_mut(&post.id) else {
            debug!(post_id = %post.id, "Dropped save of missing post");
            return Ok(false);
        };
        stored.clone_from(post);

        Ok(true)
    }

    async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<bool> {
        Ok(self
            .documents
            .write()
            .await
            .posts
            .remove(&post_id)
            .is_some())
    }

    fn generate_comment_id(&self) -> Result<Id<CommentMarker>> {
        self.ids.generate()
    }
}

#[cfg(test)]
mod tests {
    use crate::{memory::MemoryStore, store::Store};
    use lostfound_common::{
        model::{
            auth::{AuthToken, Authentication},
            post::{Comment, CreatePost, PostContent},
            user::{CreateUser, User, UserName},
        },
        snowflake::NodeId,
    };
    use time::macros::date;

    fn store() -> MemoryStore {
        MemoryStore::new(NodeId::default())
    }

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(&CreateUser {
                name: UserName::new(name.to_owned()).unwrap(),
            })
            .await
            .unwrap()
    }

    fn create_post(user: &User, text: &str) -> CreatePost {
        CreatePost {
            user: user.id,
            name: user.name.get().to_owned(),
            content: PostContent {
                text: text.to_owned(),
                founded_date: date!(2024-01-01),
                location: "library".to_owned(),
            },
        }
    }

    #[tokio::test]
    async fn users_are_stored_with_fresh_ids() {
        let store = store();
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;

        assert_ne!(ada.id, bob.id);
        assert_eq!(store.fetch_user(ada.id).await.unwrap(), Some(ada));
        assert_eq!(store.fetch_user(12_345_u64.into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn authentications_are_found_by_hash() {
        let store = store();
        let ada = user(&store, "ada").await;
        let token = AuthToken::generate_random(ada.id);
        let authentication = Authentication::issue(&token, token.hash().unwrap(), None);

        store.create_auth(&authentication).await.unwrap();

        assert_eq!(
            store.fetch_auth(&token.hash().unwrap()).await.unwrap(),
            Some(authentication)
        );
        let other = AuthToken::generate_random(ada.id);
        assert_eq!(store.fetch_auth(&other.hash().unwrap()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first() {
        let store = store();
        let ada = user(&store, "ada").await;
        for text in ["first", "second", "third"] {
            store.create_post(create_post(&ada, text)).await.unwrap();
        }

        let texts: Vec<_> = store
            .fetch_posts()
            .await
            .unwrap()
            .into_iter()
            .map(|post| post.content.text)
            .collect();

        assert_eq!(texts, ["third", "second", "first"]);
    }

    #[tokio::test]
    async fn user_posts_are_filtered_by_owner() {
        let store = store();
        let ada = user(&store, "ada").await;
        let bob = user(&store, "bob").await;
        store.create_post(create_post(&ada, "umbrella")).await.unwrap();
        store.create_post(create_post(&bob, "keys")).await.unwrap();

        let posts = store.fetch_user_posts(bob.id).await.unwrap().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content.text, "keys");

        assert_eq!(store.fetch_user_posts(999_u64.into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn saved_posts_replace_the_stored_document() {
        let store = store();
        let ada = user(&store, "ada").await;
        let mut post = store.create_post(create_post(&ada, "scarf")).await.unwrap();

        post.add_comment(Comment {
            id: store.generate_comment_id().unwrap(),
            user: ada.id,
            name: "ada".to_owned(),
            text: "still missing".to_owned(),
        });
        post.mark_found(ada.id).unwrap();
        assert!(store.save_post(&post).await.unwrap());

        assert_eq!(store.fetch_post(post.id).await.unwrap(), Some(post));
    }

    #[tokio::test]
    async fn deleted_posts_are_gone() {
        let store = store();
        let ada = user(&store, "ada").await;
        let post = store.create_post(create_post(&ada, "hat")).await.unwrap();

        assert!(store.delete_post(post.id).await.unwrap());
        assert!(!store.delete_post(post.id).await.unwrap());
        assert_eq!(store.fetch_post(post.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn saving_a_deleted_post_does_not_restore_it() {
        let store = store();
        let ada = user(&store, "ada").await;
        let post = store.create_post(create_post(&ada, "bike lock")).await.unwrap();
        let mut stale = store.fetch_post(post.id).await.unwrap().unwrap();

        assert!(store.delete_post(post.id).await.unwrap());
        stale.mark_found(ada.id).unwrap();

        assert!(!store.save_post(&stale).await.unwrap());
        assert_eq!(store.fetch_post(post.id).await.unwrap(), None);
        assert!(store.fetch_posts().await.unwrap().is_empty());
    }
}
