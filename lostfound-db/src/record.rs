use lostfound_common::model::{
    ModelValidationError,
    auth::Authentication,
    post::{Comment, Post, PostContent},
    user::{User, UserName},
};
use sqlx::{FromRow, types::Json};
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub name: String,
}

#[derive(Clone, Debug, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub name: String,
    pub text: String,
    pub founded_date: Date,
    pub location: String,
    pub found: bool,
    pub comments: Json<Vec<Comment>>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct AuthenticationRecord {
    pub user_snowflake: i64,
    pub token_hash: Vec<u8>,
    pub created_at: PrimitiveDateTime,
    pub expires_after_seconds: Option<i64>,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.user_snowflake.cast_unsigned().into(),
            name: UserName::new(value.name)?,
        })
    }
}

impl From<PostRecord> for Post {
    fn from(value: PostRecord) -> Self {
        Self {
            id: value.post_snowflake.cast_unsigned().into(),
            user: value.user_snowflake.cast_unsigned().into(),
            name: value.name,
            content: PostContent {
                text: value.text,
                founded_date: value.founded_date,
                location: value.location,
            },
            found: value.found,
            comments: value.comments.0,
            date: value.created_at,
        }
    }
}

impl TryFrom<AuthenticationRecord> for Authentication {
    type Error = ModelValidationError;

    fn try_from(value: AuthenticationRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            user: value.user_snowflake.cast_unsigned().into(),
            token_hash: value.token_hash.try_into()?,
            created_at: value.created_at.as_utc(),
            expires_after: value
                .expires_after_seconds
                .map(|seconds| Duration::seconds(seconds).try_into())
                .transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::record::{AuthenticationRecord, PostRecord, UserRecord};
    use lostfound_common::model::{
        ModelValidationError,
        auth::{AUTH_TOKEN_HASH_LEN, Authentication},
        post::{Comment, Post},
        user::User,
    };
    use sqlx::types::Json;
    use time::{
        Duration,
        macros::{date, datetime},
    };

    #[test]
    fn post_record_keeps_comment_order() {
        let comments = vec![
            Comment {
                id: 3_u64.into(),
                ..Comment::default()
            },
            Comment {
                id: 1_u64.into(),
                ..Comment::default()
            },
        ];
        let record = PostRecord {
            post_snowflake: 10,
            user_snowflake: 2,
            name: "ada".to_owned(),
            text: "umbrella".to_owned(),
            founded_date: date!(2024-03-05),
            location: "bus stop".to_owned(),
            found: true,
            comments: Json(comments.clone()),
            created_at: datetime!(2024-03-06 09:00 UTC),
        };

        let post = Post::from(record);

        assert_eq!(u64::from(post.id), 10);
        assert_eq!(u64::from(post.user), 2);
        assert!(post.found);
        assert_eq!(post.comments, comments);
    }

    #[test]
    fn negative_snowflakes_map_to_high_ids() {
        let user = User::try_from(UserRecord {
            user_snowflake: -1,
            name: "ada".to_owned(),
        })
        .unwrap();

        assert_eq!(u64::from(user.id), u64::MAX);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let result = User::try_from(UserRecord {
            user_snowflake: 1,
            name: String::new(),
        });

        assert!(matches!(result, Err(ModelValidationError::UserName(_))));
    }

    #[test]
    fn authentication_record_validation() {
        let record = AuthenticationRecord {
            user_snowflake: 1,
            token_hash: vec![0; AUTH_TOKEN_HASH_LEN],
            created_at: datetime!(2025-02-01 10:00),
            expires_after_seconds: Some(3600),
        };

        let authentication = Authentication::try_from(record.clone()).unwrap();
        assert_eq!(
            authentication.expires_after.map(|duration| duration.get()),
            Some(Duration::hours(1))
        );

        let short_hash = AuthenticationRecord {
            token_hash: vec![0; 3],
            ..record.clone()
        };
        assert!(matches!(
            Authentication::try_from(short_hash),
            Err(ModelValidationError::TokenHash(_))
        ));

        let negative_expiry = AuthenticationRecord {
            expires_after_seconds: Some(-5),
            ..record
        };
        assert!(matches!(
            Authentication::try_from(negative_expiry),
            Err(ModelValidationError::NonPositiveDuration(_))
        ));
    }
}
