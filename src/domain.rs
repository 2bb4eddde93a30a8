use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GrabError;

/// Record token as it appears on the listing page and in file names,
/// e.g. `a40439n`. File selection prefix-matches against this string,
/// so the original casing is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = GrabError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed.chars().all(|ch| ch.is_ascii_alphanumeric())
            && trimmed
                .chars()
                .next()
                .map(|ch| ch.is_ascii_alphabetic())
                .unwrap_or(false)
            && trimmed.chars().any(|ch| ch.is_ascii_digit());
        if !is_valid {
            return Err(GrabError::InvalidRecordId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Two-character group code taken from a listing section heading
/// (`"Group H1, ..."` yields `H1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupCode(String);

impl GroupCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GroupCode {
    type Err = GrabError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid =
            trimmed.chars().count() == 2 && trimmed.chars().all(|ch| ch.is_ascii_alphanumeric());
        if !is_valid {
            return Err(GrabError::InvalidGroupCode(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}
