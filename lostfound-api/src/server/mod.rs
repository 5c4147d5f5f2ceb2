use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use lostfound_common::{
    model::{
        Id,
        auth::{AuthTokenDecodeError, AuthTokenHashError},
        post::{PostActionError, PostMarker},
        user::UserMarker,
    },
    util::PositiveDuration,
    validation::FieldError,
};
use lostfound_db::{DbError, Store};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, Debug, FromRef)]
pub struct ServerState {
    pub store: Arc<dyn Store>,
    /// Lifetime of newly issued tokens; `None` means they never expire.
    pub token_ttl: Option<PositiveDuration>,
}

pub fn app(state: ServerState) -> Router {
    routes::routes(&state)
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(fallback)
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.uri().clone())
}

pub async fn method_not_allowed(request: Request) -> ServerError {
    ServerError::MethodNotAllowed(request.method().clone(), request.uri().clone())
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Method {0} is not allowed on {1}")]
    MethodNotAllowed(Method, Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error("The provided auth token could not be decoded: {0}")]
    InvalidAuthToken(#[from] AuthTokenDecodeError),
    #[error("The auth token could not be hashed: {0}")]
    AuthTokenHash(#[from] AuthTokenHashError),
    #[error("Provided token was invalid or expired")]
    InvalidToken,
    #[error(transparent)]
    Database(#[from] DbError),
    #[error("Request failed validation: {0:?}")]
    Validation(Vec<FieldError>),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserByIdNotFound(Id<UserMarker>),
    #[error("Authenticated user {0} has no profile.")]
    AuthorMissing(Id<UserMarker>),
    #[error(transparent)]
    PostAction(#[from] PostActionError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_)
            | ServerError::UserByIdNotFound(_)
            | ServerError::PostAction(PostActionError::CommentNotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken
            | ServerError::PostAction(PostActionError::NotAuthorized) => StatusCode::UNAUTHORIZED,
            ServerError::MethodNotAllowed(..) => StatusCode::METHOD_NOT_ALLOWED,
            ServerError::JsonRejection(_)
            | ServerError::Validation(_)
            | ServerError::PostAction(PostActionError::AlreadyFound | PostActionError::AlreadyLost) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::AuthorMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What the caller gets to read. Server-side causes stay in the logs.
    fn message(&self) -> String {
        match self {
            ServerError::UnknownRoute(_) => "Route not found".to_owned(),
            ServerError::MethodNotAllowed(..) => "Method not allowed".to_owned(),
            ServerError::PathRejection(_) => "Invalid id".to_owned(),
            ServerError::JsonRejection(rejection) => rejection.body_text(),
            ServerError::InvalidAuthorizationHeader(rejection) if rejection.is_missing() => {
                "No token, authorization denied".to_owned()
            }
            ServerError::InvalidAuthorizationHeader(_)
            | ServerError::InvalidAuthToken(_)
            | ServerError::InvalidToken => "Token is not valid".to_owned(),
            ServerError::Validation(_) => "Validation failed".to_owned(),
            ServerError::PostByIdNotFound(_) => "Post not found".to_owned(),
            ServerError::UserByIdNotFound(_) => "User not found".to_owned(),
            ServerError::PostAction(err) => err.to_string(),
            ServerError::JsonResponse(_)
            | ServerError::Database(_)
            | ServerError::AuthTokenHash(_)
            | ServerError::AuthorMissing(_) => "Server error".to_owned(),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        error!(error = %self, %status, "Replying with error");

        let error_response = ErrorResponse {
            status: status.as_u16(),
            msg: self.message(),
            errors: match self {
                ServerError::Validation(errors) => Some(errors),
                _ => None,
            },
        };
        (status, Json(error_response)).into_response()
    }
}
