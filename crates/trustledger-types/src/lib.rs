//! Shared types, error classification, and constants for the TrustLedger
//! registries.
//!
//! This crate provides the foundational types used across all TrustLedger
//! crates: agent and request identifiers, the caller [`Address`], the
//! fixed-size [`Digest`] used for content hashes, score bounds, and the
//! [`ErrorKind`] taxonomy every registry error maps onto.
//!
//! No crate in the workspace depends on anything *except* `trustledger-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies between the registries.

use serde::{Deserialize, Serialize};

mod digest;
pub use digest::{Digest, ParseDigestError};

/// Identifier of a registered agent.
///
/// Allocation starts at 1, so `0` is never a valid agent id and is used as
/// the "absent" sentinel by domain lookups.
pub type AgentId = u64;

/// Identifier of a validation request. Allocation starts at 0.
pub type RequestId = u64;

/// Converts an id to the store's signed 64-bit key.
///
/// Returns `None` above `i64::MAX`. The store can never have issued such an
/// id, so reads treat it as absent and writes reject it.
pub fn storage_key(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

/// Highest score accepted by feedback and validation responses.
pub const MAX_SCORE: u8 = 100;

/// Returns `true` if `score` lies in `0..=MAX_SCORE`.
pub fn is_valid_score(score: u8) -> bool {
    score <= MAX_SCORE
}

/// Integer mean of `total / count`, truncated toward zero.
///
/// Returns `0` when `count` is zero. Scores are bounded by [`MAX_SCORE`], so
/// the result always fits in a `u8`.
pub fn truncated_mean(total: u64, count: u64) -> u8 {
    if count == 0 {
        return 0;
    }
    u8::try_from(total / count).unwrap_or(MAX_SCORE)
}

/// Identity of a caller as asserted by the external authenticator.
///
/// Addresses are opaque strings; they are trimmed and lowercased on
/// construction so that `0xABC` and `0xabc` name the same caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Creates a normalized address.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_lowercase())
    }

    /// Returns the normalized address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the null identity: an empty address or one made of
    /// zero digits only (with or without a `0x` prefix).
    pub fn is_null(&self) -> bool {
        let digits = self.0.strip_prefix("0x").unwrap_or(&self.0);
        digits.chars().all(|c| c == '0')
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classification of registry failures.
///
/// Every registry error exposes a `kind()` returning one of these so that
/// outer surfaces (HTTP, RPC) can map failures to typed codes without
/// matching on each crate's variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Malformed input: empty strings, zero ids, score above the maximum.
    InvalidArgument,
    /// Reference to an agent or request that was never issued.
    NotFound,
    /// Duplicate domain registration or duplicate authorization.
    AlreadyExists,
    /// The caller does not own the resource.
    Unauthorized,
    /// The record's current state forbids the operation.
    InvalidState,
    /// Index lookup past the end of a sequence.
    OutOfRange,
    /// The ledger store itself failed.
    Storage,
}

impl ErrorKind {
    /// Returns the wire code for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::InvalidState => "INVALID_STATE",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Storage => "STORAGE",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
