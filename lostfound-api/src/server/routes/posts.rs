use crate::server::{
    Result, ServerError, ServerRouter, ServerState,
    auth::{AuthenticatedUser, require_auth},
    json::{Json, Message},
};
use axum::{extract::State, middleware};
use axum_extra::routing::{RouterExt, TypedPath};
use lostfound_common::{
    model::{
        Id,
        post::{Comment, CommentMarker, CreatePost, Post, PostMarker},
        user::User,
    },
    validation::{CommentRequest, PostRequest, validate_comment, validate_post},
};
use lostfound_db::Store;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Every post route requires a bearer token.
pub fn routes(state: &ServerState) -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_get(get_posts)
        .typed_get(get_post)
        .typed_delete(delete_post)
        .typed_post(add_comment)
        .typed_delete(delete_comment)
        .typed_put(mark_found)
        .typed_put(mark_lost)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
}

async fn fetch_post(store: &dyn Store, id: Id<PostMarker>) -> Result<Post> {
    store
        .fetch_post(id)
        .await?
        .ok_or(ServerError::PostByIdNotFound(id))
}

/// Fails when the post was deleted after it was loaded.
async fn save_post(store: &dyn Store, post: &Post) -> Result<()> {
    if store.save_post(post).await? {
        Ok(())
    } else {
        Err(ServerError::PostByIdNotFound(post.id))
    }
}

async fn fetch_author(store: &dyn Store, user: AuthenticatedUser) -> Result<User> {
    let user_id = user.user_id();

    store
        .fetch_user(user_id)
        .await?
        .ok_or(ServerError::AuthorMissing(user_id))
}

#[derive(TypedPath)]
#[typed_path("/posts")]
struct PostsPath;

async fn create_post(
    _: PostsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(request): Json<PostRequest>,
) -> Result<Json<Post>> {
    let content = validate_post(request).map_err(ServerError::Validation)?;
    let author = fetch_author(&*store, user).await?;

    let post = store
        .create_post(CreatePost {
            user: author.id,
            name: author.name.into_inner(),
            content,
        })
        .await?;

    info!(post_id = %post.id, user_id = %post.user, "Created post");
    Ok(Json(post))
}

async fn get_posts(
    _: PostsPath,
    State(store): State<Arc<dyn Store>>,
    _: AuthenticatedUser,
) -> Result<Json<Vec<Post>>> {
    let posts = store.fetch_posts().await?;

    Ok(Json(posts))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    _: AuthenticatedUser,
) -> Result<Json<Post>> {
    let post = fetch_post(&*store, id).await?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Message>> {
    let post = fetch_post(&*store, id).await?;
    post.ensure_owner(user.user_id())?;

    if !store.delete_post(id).await? {
        return Err(ServerError::PostByIdNotFound(id));
    }

    info!(post_id = %id, user_id = %user.user_id(), "Removed post");
    Ok(Json::from("Post removed"))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/comment/{id}", rejection(ServerError))]
struct CommentsPath {
    id: Id<PostMarker>,
}

async fn add_comment(
    CommentsPath { id }: CommentsPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
    Json(request): Json<CommentRequest>,
) -> Result<Json<Vec<Comment>>> {
    let text = validate_comment(request).map_err(ServerError::Validation)?;

    let mut post = fetch_post(&*store, id).await?;
    let author = fetch_author(&*store, user).await?;

    let comment = Comment {
        id: store.generate_comment_id()?,
        user: author.id,
        name: author.name.into_inner(),
        text,
    };
    let comment_id = comment.id;
    post.add_comment(comment);
    save_post(&*store, &post).await?;

    info!(post_id = %id, %comment_id, "Added comment");
    Ok(Json(post.comments))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/comment/{id}/{comment_id}", rejection(ServerError))]
struct CommentPath {
    id: Id<PostMarker>,
    comment_id: Id<CommentMarker>,
}

async fn delete_comment(
    CommentPath { id, comment_id }: CommentPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Comment>>> {
    let mut post = fetch_post(&*store, id).await?;
    post.remove_comment(comment_id, user.user_id())?;
    save_post(&*store, &post).await?;

    info!(post_id = %id, %comment_id, "Removed comment");
    Ok(Json(post.comments))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/found/{id}", rejection(ServerError))]
struct FoundPath {
    id: Id<PostMarker>,
}

async fn mark_found(
    FoundPath { id }: FoundPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Post>> {
    let mut post = fetch_post(&*store, id).await?;
    post.mark_found(user.user_id())?;
    save_post(&*store, &post).await?;

    info!(post_id = %id, "Marked post as found");
    Ok(Json(post))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/lost/{id}", rejection(ServerError))]
struct LostPath {
    id: Id<PostMarker>,
}

async fn mark_lost(
    LostPath { id }: LostPath,
    State(store): State<Arc<dyn Store>>,
    user: AuthenticatedUser,
) -> Result<Json<Post>> {
    let mut post = fetch_post(&*store, id).await?;
    post.mark_lost(user.user_id())?;
    save_post(&*store, &post).await?;

    info!(post_id = %id, "Marked post as lost");
    Ok(Json(post))
}
