use crate::server::{Result, ServerError, ServerRouter, ServerState, json::Json};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use lostfound_common::model::{
    Id,
    auth::{AuthToken, Authentication},
    post::Post,
    user::{CreateUser, User, UserMarker},
};
use lostfound_db::Store;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_user)
        .typed_get(get_user)
        .typed_get(get_user_posts)
}

#[derive(TypedPath)]
#[typed_path("/users")]
struct UsersPath;

/// The only time a token is ever shown in the clear.
#[derive(Clone, Debug, Serialize)]
struct Registration {
    user: User,
    token: String,
}

async fn create_user(
    _: UsersPath,
    State(state): State<ServerState>,
    Json(user): Json<CreateUser>,
) -> Result<Json<Registration>> {
    let user = state.store.create_user(&user).await?;

    let token = AuthToken::generate_random(user.id);
    let authentication = Authentication::issue(&token, token.hash()?, state.token_ttl);
    state.store.create_auth(&authentication).await?;

    info!(user_id = %user.id, "Registered user");
    Ok(Json(Registration {
        user,
        token: token.as_token_str(),
    }))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    UserPath { id }: UserPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<User>> {
    let user = store
        .fetch_user(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/posts", rejection(ServerError))]
struct UserPostsPath {
    id: Id<UserMarker>,
}

async fn get_user_posts(
    UserPostsPath { id }: UserPostsPath,
    State(store): State<Arc<dyn Store>>,
) -> Result<Json<Vec<Post>>> {
    let posts = store
        .fetch_user_posts(id)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(posts))
}
