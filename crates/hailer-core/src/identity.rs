//! # Identifier Newtypes
//!
//! Newtype wrappers for every identifier in the dispatch stack. The
//! distinction is enforced at the type level: a `DriverId` cannot be handed
//! to a repository method that expects a `UserId`.
//!
//! All identifiers serialize as a bare UUID string and order by their UUID,
//! which gives the driver selector a stable tie-break.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            /// Accepts a bare UUID or the `Display` form `{kind}:{uuid}`.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bare = s.strip_prefix(concat!($kind, ":")).unwrap_or(s);
                Uuid::parse_str(bare)
                    .map(Self)
                    .map_err(|_| CoreError::InvalidIdentifier {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($kind, ":{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of a passenger account.
    UserId,
    "user"
);

define_id!(
    /// Identifier of a driver account.
    DriverId,
    "driver"
);

define_id!(
    /// Identifier of a single trip.
    TripId,
    "trip"
);
