//! Error types surfaced by the summon engine.
use crate::currency::CurrencyKind;
use crate::ids::{BannerId, ItemId, ReservationId};
use crate::rarity::{Element, Rarity};
use crate::session::SessionPhase;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A string did not name a member of a closed enum.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    #[must_use]
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.trim().to_string(),
        }
    }
}

/// Errors raised when banner or engine configuration invariants are violated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("rarity weights must add up to 100 (got {total:.4})")]
    WeightTotal { total: f64 },
    #[error("{rarity} weight must be finite and non-negative (got {value})")]
    InvalidWeight { rarity: Rarity, value: f64 },
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: u64,
        value: u64,
    },
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("banner {banner} has no {rarity} candidates")]
    EmptyPool { banner: BannerId, rarity: Rarity },
    #[error("unknown banner {0}")]
    UnknownBanner(BannerId),
    #[error("banner {0} is defined more than once")]
    DuplicateBanner(BannerId),
    #[error("elemental banner {0} must declare an element")]
    MissingElement(BannerId),
    #[error("draw count {requested} outside 1..={max}")]
    DrawCount { requested: u32, max: u32 },
    #[error("bonus reward table is empty")]
    EmptyBonusRewards,
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Failure reported by an external store or ledger backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("unknown reservation {0}")]
    UnknownReservation(ReservationId),
    #[error("no confirmation within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Ledger refused to place a hold.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReserveError {
    #[error("insufficient {kind}: need {required}, have {available}")]
    InsufficientFunds {
        kind: CurrencyKind,
        required: u64,
        available: u64,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Local validation failures when editing a wishlist.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WishlistError {
    #[error("wishlist already holds the maximum of {max} heroes")]
    WishlistFull { max: usize },
    #[error("{0} is already on the wishlist")]
    DuplicateEntry(ItemId),
    #[error("{0} is not a legendary hero")]
    RarityNotAllowed(ItemId),
    #[error("{item} is not a {expected} hero")]
    ElementMismatch { item: ItemId, expected: Element },
    #[error("{0} is not on the wishlist")]
    NotOnWishlist(ItemId),
    #[error("wishlist is locked by a running session")]
    ConcurrencyConflict,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Stage of a session at which a backend call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStep {
    Preflight,
    Reserve,
    OwnershipLookup,
    SavePity,
    SaveWishlist,
    GrantItem,
    GrantFragments,
    CreditBonus,
    CommitLedger,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Preflight => "preflight",
            Self::Reserve => "reserve",
            Self::OwnershipLookup => "ownership lookup",
            Self::SavePity => "save pity",
            Self::SaveWishlist => "save wishlist",
            Self::GrantItem => "grant item",
            Self::GrantFragments => "grant fragments",
            Self::CreditBonus => "credit bonus",
            Self::CommitLedger => "commit ledger",
        };
        f.write_str(label)
    }
}

/// What happened to the reserved currency of a failed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Nothing had been reserved yet.
    NotNeeded,
    Refunded,
    /// The release call failed; logged for manual reconciliation.
    RefundFailed,
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotNeeded => "nothing reserved",
            Self::Refunded => "refunded",
            Self::RefundFailed => "refund failed",
        };
        f.write_str(label)
    }
}

/// Illegal session state transition.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("session cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub from: SessionPhase,
    pub to: SessionPhase,
}

/// Terminal failure of a pull session. Currency is never lost on any variant.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PullError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("insufficient {kind}: need {required}, have {available}")]
    InsufficientCurrency {
        kind: CurrencyKind,
        required: u64,
        available: u64,
    },
    #[error("persistence failure during {step}: {source} ({refund})")]
    Persistence {
        step: CommitStep,
        #[source]
        source: StoreError,
        refund: RefundStatus,
    },
    #[error("another session holds {key}")]
    ConcurrencyConflict { key: String },
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl PullError {
    /// Whether the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::Persistence { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_error_mentions_step_and_refund() {
        let err = PullError::Persistence {
            step: CommitStep::CommitLedger,
            source: StoreError::Timeout { timeout_ms: 50 },
            refund: RefundStatus::Refunded,
        };
        let text = err.to_string();
        assert!(text.contains("commit ledger"), "{text}");
        assert!(text.contains("50ms"), "{text}");
        assert!(text.contains("refunded"), "{text}");
        assert!(err.is_retryable());
    }

    #[test]
    fn configuration_errors_are_not_retryable() {
        let err = PullError::from(ConfigError::EmptyPool {
            banner: BannerId::new("std"),
            rarity: Rarity::Epic,
        });
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "configuration error: banner std has no epic candidates"
        );
    }
}
