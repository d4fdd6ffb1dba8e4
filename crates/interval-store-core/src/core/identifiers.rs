// crates/interval-store-core/src/core/identifiers.rs
// ============================================================================
// Module: Interval Store Identifiers
// Description: Owner, sort key, and tag identifiers for interval records.
// Purpose: Provide strongly typed, serializable keys with stable wire forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque strings on the wire. Construction through the
//! checked constructors enforces the store's key size limits so malformed keys
//! are rejected before any network call is made.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::sort_key::CodecError;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum partition key size in bytes.
pub const MAX_OWNER_BYTES: usize = 2048;
/// Maximum sort key size in bytes.
pub const MAX_SORT_KEY_BYTES: usize = 1024;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Owner identifier used as the partition key.
///
/// # Invariants
/// - Non-empty and at most [`MAX_OWNER_BYTES`] bytes when built via [`OwnerId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    /// Creates an owner identifier without validation.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates an owner identifier, enforcing size limits.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] when the identifier is empty or too long.
    pub fn parse(id: impl Into<String>) -> Result<Self, CodecError> {
        let owner = Self(id.into());
        owner.validate()?;
        Ok(owner)
    }

    /// Validates size limits for the identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] when the identifier is empty or too long.
    pub fn validate(&self) -> Result<(), CodecError> {
        validate_key_bytes("owner", &self.0, MAX_OWNER_BYTES)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sort key within an owner partition.
///
/// # Invariants
/// - Opaque UTF-8 string; the chronological layout is owned by
///   [`SortKeyCodec`](crate::SortKeyCodec).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortKey(String);

impl SortKey {
    /// Creates a sort key without validation.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Validates size limits for the sort key.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidKey`] when the key is empty or too long.
    pub fn validate(&self) -> Result<(), CodecError> {
        validate_key_bytes("sort key", &self.0, MAX_SORT_KEY_BYTES)
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key and returns the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tag suffix that disambiguates intervals sharing a start instant.
///
/// # Invariants
/// - Non-empty and free of control characters.
/// - May contain the codec separator; decoding splits at the first separator only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntervalTag(String);

impl IntervalTag {
    /// Creates a validated tag.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidTag`] when the tag is empty or contains
    /// control characters.
    pub fn new(tag: impl Into<String>) -> Result<Self, CodecError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(CodecError::InvalidTag("tag must not be empty".to_string()));
        }
        if tag.chars().any(char::is_control) {
            return Err(CodecError::InvalidTag("tag must not contain control characters".to_string()));
        }
        Ok(Self(tag))
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IntervalTag {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<IntervalTag> for String {
    fn from(tag: IntervalTag) -> Self {
        tag.0
    }
}

impl fmt::Display for IntervalTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Checks that a key is non-empty and within `max_bytes`.
fn validate_key_bytes(label: &str, value: &str, max_bytes: usize) -> Result<(), CodecError> {
    if value.is_empty() {
        return Err(CodecError::InvalidKey(format!("{label} must not be empty")));
    }
    if value.len() > max_bytes {
        return Err(CodecError::InvalidKey(format!(
            "{label} exceeds {max_bytes} bytes: {} bytes",
            value.len()
        )));
    }
    Ok(())
}
