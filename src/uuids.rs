//! Typed, prefixed identifiers

use std::{
    cmp::Ordering,
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    marker::PhantomData,
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _};
use thiserror::Error;
use uuid::Uuid;

/// Entity types that own an identifier prefix.
pub trait IdPrefix {
    /// Prefix rendered before the identifier payload, e.g. `tnntten`.
    const PREFIX: &'static str;
}

/// Failure parsing a prefixed identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdParseError {
    /// The separator between prefix and payload was absent.
    #[error("identifier is missing the prefix separator")]
    MissingSeparator,

    /// The prefix does not belong to the expected entity type.
    #[error("identifier prefix `{found}` does not match `{expected}`")]
    WrongPrefix {
        /// Prefix the identifier type requires.
        expected: &'static str,
        /// Prefix that was supplied.
        found: String,
    },

    /// The payload was not a valid UUID.
    #[error("identifier payload is malformed")]
    Payload(#[source] uuid::Error),
}

/// An identifier tagged with the entity type it refers to.
///
/// Rendered as `<prefix>-<32 hex digits>`. Generation uses UUIDv7 so fresh
/// identifiers are unique and never reused.
pub struct TypedId<T>(Uuid, PhantomData<fn() -> T>);

impl<T> TypedId<T> {
    /// Generates a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self::from_uuid(Uuid::now_v7())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid, PhantomData)
    }

    #[must_use]
    pub const fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl<T> Default for TypedId<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for TypedId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedId<T> {}

impl<T: IdPrefix> Debug for TypedId<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(self, f)
    }
}

impl<T: IdPrefix> Display for TypedId<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}-{}", T::PREFIX, self.0.simple())
    }
}

impl<T: IdPrefix> FromStr for TypedId<T> {
    type Err = IdParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (prefix, payload) = value
            .split_once('-')
            .ok_or(IdParseError::MissingSeparator)?;

        if prefix != T::PREFIX {
            return Err(IdParseError::WrongPrefix {
                expected: T::PREFIX,
                found: prefix.to_string(),
            });
        }

        Uuid::try_parse(payload)
            .map(Self::from_uuid)
            .map_err(IdParseError::Payload)
    }
}

impl<T> PartialEq for TypedId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<T> Eq for TypedId<T> {}

impl<T> Hash for TypedId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl<T> PartialOrd for TypedId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for TypedId<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl<T: IdPrefix> Serialize for TypedId<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: IdPrefix> Deserialize<'de> for TypedId<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;

        raw.parse().map_err(D::Error::custom)
    }
}
