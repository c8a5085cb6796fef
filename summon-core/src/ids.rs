//! Strongly typed identifiers shared across the summon engine.
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Construct the identifier, trimming surrounding whitespace.
            #[must_use]
            pub fn new(value: &str) -> Self {
                Self(value.trim().to_string())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Player account identifier.
    PlayerId
);
string_id!(
    /// Game server (realm) the player belongs to; wishlists are scoped per server.
    ServerId
);
string_id!(
    /// Banner configuration identifier.
    BannerId
);
string_id!(
    /// Catalog item (hero) identifier.
    ItemId
);

/// Handle for a currency hold placed by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub u64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rsv-{:016x}", self.0)
    }
}

/// Identifier of one pull session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ses-{:016x}", self.0)
    }
}

/// Names one non-idempotent write of a session, so a backend can apply it at
/// most once and undo it only if it landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantKey {
    pub session: SessionId,
    pub step: u32,
}

impl GrantKey {
    #[must_use]
    pub const fn new(session: SessionId, step: u32) -> Self {
        Self { session, step }
    }
}

impl fmt::Display for GrantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.session, self.step)
    }
}
