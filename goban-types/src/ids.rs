//! Server identifiers.
//!
//! All ids are opaque positive integers assigned by the server. They
//! deserialize from any numeric encoding (see [`crate::coerce`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(#[serde(deserialize_with = "crate::coerce::lenient_u64")] u64);

        impl $name {
            /// Wrap a raw id.
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            /// The raw id.
            pub const fn value(&self) -> u64 {
                self.0
            }

            /// Decode from a loosely typed JSON value.
            pub fn from_json(value: &serde_json::Value) -> Option<Self> {
                crate::coerce::as_u64(value).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

numeric_id!(
    /// Identifies one game on the server.
    GameId
);

numeric_id!(
    /// Identifies an open challenge (seek) in the lobby.
    ChallengeId
);

numeric_id!(
    /// Identifies a user account.
    PlayerId
);
