//! Balance bucket classification.
//!
//! The engine reports bucket keys either by name or by numeric code, and
//! older builds use different names for some buckets. [`BalanceBucket`]
//! is the one closed set everything downstream works with; raw keys are
//! parsed exactly once, at the cache boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of confidential funds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BalanceBucket {
    Spendable,
    ShieldPending,
    MissingInternalProof,
    MissingExternalProof,
    ProofSubmitted,
    Blocked,
}

impl BalanceBucket {
    pub const ALL: [BalanceBucket; 6] = [
        Self::Spendable,
        Self::ShieldPending,
        Self::MissingInternalProof,
        Self::MissingExternalProof,
        Self::ProofSubmitted,
        Self::Blocked,
    ];

    /// Buckets that count toward the pending total.
    pub const PENDING: [BalanceBucket; 4] = [
        Self::ShieldPending,
        Self::MissingInternalProof,
        Self::MissingExternalProof,
        Self::ProofSubmitted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spendable => "Spendable",
            Self::ShieldPending => "ShieldPending",
            Self::MissingInternalProof => "MissingInternalProof",
            Self::MissingExternalProof => "MissingExternalProof",
            Self::ProofSubmitted => "ProofSubmitted",
            Self::Blocked => "Blocked",
        }
    }

    /// Numeric code used by engines that report buckets as integers.
    pub fn code(&self) -> u8 {
        match self {
            Self::Spendable => 0,
            Self::ShieldPending => 1,
            Self::MissingInternalProof => 2,
            Self::MissingExternalProof => 3,
            Self::ProofSubmitted => 4,
            Self::Blocked => 5,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|b| u64::from(b.code()) == code)
    }

    pub fn is_pending(&self) -> bool {
        Self::PENDING.contains(self)
    }
}

impl fmt::Display for BalanceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown balance bucket key: {0}")]
pub struct UnknownBucket(pub String);

impl FromStr for BalanceBucket {
    type Err = UnknownBucket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        if let Ok(code) = key.parse::<u64>() {
            return Self::from_code(code).ok_or_else(|| UnknownBucket(key.to_string()));
        }
        match key {
            "Spendable" => Ok(Self::Spendable),
            "ShieldPending" => Ok(Self::ShieldPending),
            "MissingInternalProof" | "MissingInternalPOI" => Ok(Self::MissingInternalProof),
            "MissingExternalProof" | "MissingExternalPOI" => Ok(Self::MissingExternalProof),
            "ProofSubmitted" => Ok(Self::ProofSubmitted),
            "Blocked" | "ShieldBlocked" => Ok(Self::Blocked),
            other => Err(UnknownBucket(other.to_string())),
        }
    }
}

/// Bucket key exactly as the engine delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawBucketKey {
    Code(u64),
    Name(String),
}

impl RawBucketKey {
    pub fn parse(&self) -> Result<BalanceBucket, UnknownBucket> {
        match self {
            Self::Code(code) => {
                BalanceBucket::from_code(*code).ok_or_else(|| UnknownBucket(code.to_string()))
            }
            Self::Name(name) => name.parse(),
        }
    }
}

impl From<&str> for RawBucketKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<u64> for RawBucketKey {
    fn from(code: u64) -> Self {
        Self::Code(code)
    }
}

impl fmt::Display for RawBucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{}", code),
            Self::Name(name) => f.write_str(name),
        }
    }
}
