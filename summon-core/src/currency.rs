//! Closed set of currency kinds handled by the ledger.
use crate::error::ParseEnumError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurrencyKind {
    /// Premium currency.
    Gems,
    Gold,
    /// Ticket spent on ticket banners.
    SummonScroll,
    /// Ticket spent on elemental banners.
    ElementalScroll,
    /// Secondary currency paid out by bonus drops.
    Dust,
    FriendshipPoints,
}

impl CurrencyKind {
    pub const ALL: [Self; 6] = [
        Self::Gems,
        Self::Gold,
        Self::SummonScroll,
        Self::ElementalScroll,
        Self::Dust,
        Self::FriendshipPoints,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Gems => "gems",
            Self::Gold => "gold",
            Self::SummonScroll => "summon_scroll",
            Self::ElementalScroll => "elemental_scroll",
            Self::Dust => "dust",
            Self::FriendshipPoints => "friendship_points",
        }
    }
}

impl fmt::Display for CurrencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CurrencyKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.key().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseEnumError::new("currency", s))
    }
}

/// A quantity of one currency kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyAmount {
    pub kind: CurrencyKind,
    pub amount: u64,
}

impl CurrencyAmount {
    #[must_use]
    pub const fn new(kind: CurrencyKind, amount: u64) -> Self {
        Self { kind, amount }
    }
}

impl fmt::Display for CurrencyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.kind)
    }
}
