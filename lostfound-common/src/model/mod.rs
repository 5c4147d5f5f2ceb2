pub mod auth;
pub mod post;
pub mod user;

use crate::{
    model::{auth::InvalidAuthTokenHashError, user::InvalidUserNameError},
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::NonPositiveDurationError,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData, num::ParseIntError, str::FromStr};
use thiserror::Error;
use time::{UtcDateTime, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserName(#[from] InvalidUserNameError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct LostFoundEpoch;
impl Epoch for LostFoundEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type LostFoundSnowflake = Snowflake<LostFoundEpoch>;
pub type LostFoundSnowflakeGenerator = SnowflakeGenerator<LostFoundEpoch>;

/// A snowflake tagged with the kind of object it identifies.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(LostFoundSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: LostFoundSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    /// When the object was created, to the millisecond.
    #[must_use]
    pub fn created_at(self) -> UtcDateTime {
        self.0.created_at()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<LostFoundSnowflake> for Id<Marker> {
    fn from(value: LostFoundSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(LostFoundSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.0.get()
    }
}

/// Decimal, the way ids appear in paths and tokens.
impl<Marker> FromStr for Id<Marker> {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{Id, LostFoundEpoch, LostFoundSnowflake, post::PostMarker},
        snowflake::{Epoch, NodeId},
    };
    use time::Duration;

    #[test]
    fn ids_parse_from_decimal() {
        let id: Id<PostMarker> = "4194304".parse().unwrap();

        assert_eq!(u64::from(id), 4_194_304);
        assert_eq!(id.to_string(), "4194304");
        assert!("-1".parse::<Id<PostMarker>>().is_err());
        assert!("abc".parse::<Id<PostMarker>>().is_err());
    }

    #[test]
    fn ids_know_their_creation_time() {
        let snowflake = LostFoundSnowflake::from_parts(90_000, NodeId::default(), 3);
        let id = Id::<PostMarker>::from(snowflake);

        assert_eq!(
            id.created_at(),
            LostFoundEpoch::EPOCH_TIME + Duration::seconds(90)
        );
    }
}
