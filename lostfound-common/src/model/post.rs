use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{
    Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description,
};

/// `YYYY-MM-DD`, the wire format of [`PostContent::founded_date`].
pub const CALENDAR_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

time::serde::format_description!(calendar_date, Date, "[year]-[month]-[day]");

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

/// Things that can go wrong when a user tries to change a post.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum PostActionError {
    #[error("User not authorized")]
    NotAuthorized,
    #[error("Comment does not exist")]
    CommentNotFound(Id<CommentMarker>),
    #[error("Lost item already found")]
    AlreadyFound,
    #[error("Lost item already lost")]
    AlreadyLost,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    /// Owner. Never changes after creation.
    pub user: Id<UserMarker>,
    pub name: String,
    #[serde(flatten)]
    pub content: PostContent,
    pub found: bool,
    /// Most recent first.
    pub comments: Vec<Comment>,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostContent {
    pub text: String,
    #[serde(with = "calendar_date")]
    pub founded_date: Date,
    pub location: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreatePost {
    pub user: Id<UserMarker>,
    pub name: String,
    pub content: PostContent,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub user: Id<UserMarker>,
    pub name: String,
    pub text: String,
}

impl Post {
    #[must_use]
    pub fn new(id: Id<PostMarker>, post: CreatePost, date: OffsetDateTime) -> Self {
        Self {
            id,
            user: post.user,
            name: post.name,
            content: post.content,
            found: false,
            comments: Vec::new(),
            date,
        }
    }

    pub fn ensure_owner(&self, user: Id<UserMarker>) -> Result<(), PostActionError> {
        if self.user == user {
            Ok(())
        } else {
            Err(PostActionError::NotAuthorized)
        }
    }

    pub fn add_comment(&mut self, comment: Comment) {
        self.comments.insert(0, comment);
    }

    /// Only the comment's own author may remove it, whoever owns the post.
    pub fn remove_comment(
        &mut self,
        comment_id: Id<CommentMarker>,
        user: Id<UserMarker>,
    ) -> Result<Comment, PostActionError> {
        let index = self
            .comments
            .iter()
            .position(|comment| comment.id == comment_id)
            .ok_or(PostActionError::CommentNotFound(comment_id))?;

        if self.comments[index].user != user {
            return Err(PostActionError::NotAuthorized);
        }

        Ok(self.comments.remove(index))
    }

    /// The state is checked before ownership.
    pub fn mark_found(&mut self, user: Id<UserMarker>) -> Result<(), PostActionError> {
        if self.found {
            return Err(PostActionError::AlreadyFound);
        }
        self.ensure_owner(user)?;

        self.found = true;
        Ok(())
    }

    /// The state is checked before ownership.
    pub fn mark_lost(&mut self, user: Id<UserMarker>) -> Result<(), PostActionError> {
        if !self.found {
            return Err(PostActionError::AlreadyLost);
        }
        self.ensure_owner(user)?;

        self.found = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{
        Id,
        post::{Comment, CreatePost, Post, PostActionError, PostContent},
        user::UserMarker,
    };
    use time::macros::{date, datetime};

    const OWNER: u64 = 1;
    const OTHER: u64 = 2;

    fn user(id: u64) -> Id<UserMarker> {
        id.into()
    }

    fn wallet_post() -> Post {
        Post::new(
            10_u64.into(),
            CreatePost {
                user: user(OWNER),
                name: "owner".to_owned(),
                content: PostContent {
                    text: "lost wallet".to_owned(),
                    founded_date: date!(2024-01-01),
                    location: "library".to_owned(),
                },
            },
            datetime!(2024-01-02 12:00 UTC),
        )
    }

    fn comment(id: u64, author: u64) -> Comment {
        Comment {
            id: id.into(),
            user: user(author),
            name: format!("user {author}"),
            text: format!("comment {id}"),
        }
    }

    fn comment_ids(post: &Post) -> Vec<u64> {
        post.comments.iter().map(|c| c.id.into()).collect()
    }

    #[test]
    fn new_post_is_lost_and_uncommented() {
        let post = wallet_post();

        assert!(!post.found);
        assert!(post.comments.is_empty());
        assert_eq!(post.user, user(OWNER));
    }

    #[test]
    fn comments_are_prepended() {
        let mut post = wallet_post();
        post.add_comment(comment(1, OWNER));
        post.add_comment(comment(2, OTHER));
        post.add_comment(comment(3, OWNER));

        assert_eq!(comment_ids(&post), [3, 2, 1]);
    }

    #[test]
    fn removing_a_comment_keeps_the_others_in_order() {
        let mut post = wallet_post();
        for id in 1..=4 {
            post.add_comment(comment(id, OTHER));
        }

        let removed = post.remove_comment(2_u64.into(), user(OTHER)).unwrap();

        assert_eq!(u64::from(removed.id), 2);
        assert_eq!(comment_ids(&post), [4, 3, 1]);
    }

    #[test]
    fn comment_removal_checks_comment_author_not_post_owner() {
        let mut post = wallet_post();
        post.add_comment(comment(1, OTHER));

        assert_eq!(
            post.remove_comment(1_u64.into(), user(OWNER)),
            Err(PostActionError::NotAuthorized)
        );
        assert_eq!(post.comments.len(), 1);

        assert!(post.remove_comment(1_u64.into(), user(OTHER)).is_ok());
        assert!(post.comments.is_empty());
    }

    #[test]
    fn removing_a_missing_comment_fails() {
        let mut post = wallet_post();
        post.add_comment(comment(1, OWNER));

        assert_eq!(
            post.remove_comment(99_u64.into(), user(OWNER)),
            Err(PostActionError::CommentNotFound(99_u64.into()))
        );
        assert_eq!(comment_ids(&post), [1]);
    }

    #[test]
    fn found_and_lost_toggle_for_owner() {
        let mut post = wallet_post();

        post.mark_found(user(OWNER)).unwrap();
        assert!(post.found);
        assert_eq!(
            post.mark_found(user(OWNER)),
            Err(PostActionError::AlreadyFound)
        );

        post.mark_lost(user(OWNER)).unwrap();
        assert!(!post.found);
        assert_eq!(post.mark_lost(user(OWNER)), Err(PostActionError::AlreadyLost));
    }

    #[test]
    fn state_is_checked_before_ownership() {
        let mut post = wallet_post();
        assert_eq!(post.mark_lost(user(OTHER)), Err(PostActionError::AlreadyLost));

        post.mark_found(user(OWNER)).unwrap();
        assert_eq!(
            post.mark_found(user(OTHER)),
            Err(PostActionError::AlreadyFound)
        );
    }

    #[test]
    fn non_owner_cannot_toggle() {
        let mut post = wallet_post();

        assert_eq!(
            post.mark_found(user(OTHER)),
            Err(PostActionError::NotAuthorized)
        );
        assert!(!post.found);
    }

    #[test]
    fn wire_format() {
        let mut post = wallet_post();
        post.add_comment(comment(5, OTHER));

        let json = serde_json::to_value(&post).unwrap();

        assert_eq!(json["text"], "lost wallet");
        assert_eq!(json["foundedDate"], "2024-01-01");
        assert_eq!(json["location"], "library");
        assert_eq!(json["found"], false);
        assert_eq!(json["user"], OWNER);
        assert_eq!(json["date"], "2024-01-02T12:00:00Z");
        assert_eq!(json["comments"][0]["id"], 5);

        let back: Post = serde_json::from_value(json).unwrap();
        assert_eq!(back, post);
    }
}
