//! Shared types for the Tally workspace.
//!
//! This crate defines the cell addressing and value model used by every
//! backend ([`CellSelector`], [`CellValue`], [`VersionToken`],
//! [`VersionedCell`]), plus table-name validation and time-sliced name
//! resolution.

use std::fmt;
use std::fmt::Write as _;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of one physical counter shard, in `[1, shard_count]`.
pub type ShardNumber = u32;

// ---------------------------------------------------------------------------
// Version tokens
// ---------------------------------------------------------------------------

/// Opaque concurrency-control tag assigned by a backend on every write.
///
/// A conditional write must present the token returned by the preceding
/// read; a stale token loses the race and the write fails with contention.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VersionToken(u64);

impl VersionToken {
    /// Wrap a raw backend-assigned token value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionToken({self})")
    }
}

// ---------------------------------------------------------------------------
// Cell addressing and values
// ---------------------------------------------------------------------------

/// Addresses one physical cell under a `(table, key)` pair.
///
/// Ordinary records live in the `Plain` cell; a sharded counter spreads its
/// value over `Shard(1)..=Shard(n)` cells. Backends map the selector to
/// their own physical addressing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellSelector {
    /// The record cell itself, no shard qualifier.
    Plain,
    /// One numbered counter shard.
    Shard(ShardNumber),
}

impl fmt::Display for CellSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellSelector::Plain => write!(f, "plain"),
            CellSelector::Shard(n) => write!(f, "shard_{n}"),
        }
    }
}

/// The payload stored in a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellValue {
    /// Opaque record payload. Encoding is owned by the caller.
    Blob(Bytes),
    /// Integer counter shard value.
    Count(i64),
}

/// A cell value together with the version token assigned on its last write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedCell {
    /// The stored payload.
    pub value: CellValue,
    /// Token to present on the next conditional write of this cell.
    pub version: VersionToken,
}

// ---------------------------------------------------------------------------
// Table names
// ---------------------------------------------------------------------------

/// Errors produced while resolving or validating a table name.
///
/// These are caller errors and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableNameError {
    /// The (resolved) name violates the naming rules.
    #[error("invalid table name '{name}': {reason}")]
    Invalid {
        /// The offending name.
        name: String,
        /// Which rule was violated.
        reason: &'static str,
    },

    /// The name contains a time pattern that cannot be formatted.
    #[error("unresolvable time pattern in table name '{pattern}'")]
    BadPattern {
        /// The offending pattern.
        pattern: String,
    },
}

/// Whether a table name contains a strftime-style time pattern.
pub fn is_time_sliced(pattern: &str) -> bool {
    pattern.contains('%')
}

/// Resolve a possibly time-sliced table name against the given instant.
///
/// A name containing `%` patterns (e.g. `events_%Y%m%d`) is formatted with
/// the UTC timestamp; a plain name passes through. The result is validated
/// either way.
pub fn resolve_table_name(pattern: &str, at: DateTime<Utc>) -> Result<String, TableNameError> {
    let name = if is_time_sliced(pattern) {
        let mut out = String::with_capacity(pattern.len());
        write!(out, "{}", at.format(pattern)).map_err(|_| TableNameError::BadPattern {
            pattern: pattern.to_string(),
        })?;
        out
    } else {
        pattern.to_string()
    };
    validate_table_name(&name)?;
    Ok(name)
}

/// Validate a fully resolved table name.
///
/// Names must be 3 to 63 characters, start with an ASCII letter, and contain
/// only ASCII alphanumerics and underscores. The bounds follow the stricter
/// of the managed-service naming rules so a name valid here is valid on
/// either backend.
pub fn validate_table_name(name: &str) -> Result<(), TableNameError> {
    let invalid = |reason| TableNameError::Invalid {
        name: name.to_string(),
        reason,
    };

    if name.len() < 3 || name.len() > 63 {
        return Err(invalid("must be 3 to 63 characters"));
    }
    if !name.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(invalid("must start with a letter"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("may contain only letters, digits, and underscores"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_selector_display() {
        assert_eq!(CellSelector::Plain.to_string(), "plain");
        assert_eq!(CellSelector::Shard(7).to_string(), "shard_7");
    }

    #[test]
    fn test_validate_accepts_typical_names() {
        validate_table_name("events").unwrap();
        validate_table_name("events_20240105").unwrap();
        validate_table_name("test_counter_shard_index").unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        assert!(validate_table_name("ab").is_err());
        assert!(validate_table_name("1events").is_err());
        assert!(validate_table_name("ev ents").is_err());
        assert!(validate_table_name(&"x".repeat(64)).is_err());
    }

    #[test]
    fn test_resolve_plain_name_passes_through() {
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        assert_eq!(resolve_table_name("events", at).unwrap(), "events");
    }

    #[test]
    fn test_resolve_time_sliced_name() {
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        assert_eq!(
            resolve_table_name("events_%Y%m%d", at).unwrap(),
            "events_20240105"
        );
    }

    #[test]
    fn test_resolve_validates_result() {
        let at = Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap();
        // Resolves to "5", which is too short.
        assert!(resolve_table_name("%-d", at).is_err());
    }
}
