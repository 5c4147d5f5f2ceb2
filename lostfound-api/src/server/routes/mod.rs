use crate::server::{ServerRouter, ServerState};
use axum::Router;

mod posts;
mod users;

pub fn routes(state: &ServerState) -> ServerRouter {
    Router::new()
        .merge(posts::routes(state))
        .merge(users::routes())
}
