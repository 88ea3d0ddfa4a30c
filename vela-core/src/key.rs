//! Composite resource identifiers
//!
//! Several resources have no single remote ID; their identifier joins the
//! business keys with a fixed separator (e.g. `cluster_id#account_name#host`).
//! Join order must exactly match split order, so resource types wrap these
//! helpers in their own typed key structs instead of juggling raw strings.

use thiserror::Error;

/// Separator used when joining key parts into one identifier
pub const SEPARATOR: char = '#';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("id is broken: expected {expected} parts, got {got}: \"{id}\"")]
    WrongPartCount {
        id: String,
        expected: usize,
        got: usize,
    },

    /// Part count was right but a part does not parse as its key type
    #[error("id is broken: \"{id}\"")]
    Malformed { id: String },
}

/// Join key parts into a composite identifier
pub fn join_id<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| p.as_ref())
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}

/// Split a composite identifier back into its parts
///
/// Fails when the part count does not match what the caller expects, which
/// happens when an identifier from a different resource type (or a corrupted
/// state file) is fed in.
pub fn split_id(id: &str, expected: usize) -> Result<Vec<&str>, IdError> {
    let parts: Vec<&str> = id.split(SEPARATOR).collect();
    if parts.len() != expected {
        return Err(IdError::WrongPartCount {
            id: id.to_string(),
            expected,
            got: parts.len(),
        });
    }
    Ok(parts)
}
