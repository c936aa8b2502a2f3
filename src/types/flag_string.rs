// ABOUTME: Validated kMigrator flag string.
// ABOUTME: A fixed-width sequence of Y/N characters, one per schema position.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlagStringError {
    #[error("flag string cannot be empty")]
    Empty,

    #[error("invalid character in flag string at position {position}: '{found}'")]
    InvalidChar { position: usize, found: char },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FlagString(String);

impl FlagString {
    pub fn new(value: &str) -> Result<Self, FlagStringError> {
        if value.is_empty() {
            return Err(FlagStringError::Empty);
        }

        for (index, c) in value.chars().enumerate() {
            if c != 'Y' && c != 'N' {
                return Err(FlagStringError::InvalidChar {
                    position: index + 1,
                    found: c,
                });
            }
        }

        Ok(Self(value.to_string()))
    }

    pub(crate) fn from_bits(bits: impl IntoIterator<Item = bool>) -> Self {
        Self(bits.into_iter().map(|b| if b { 'Y' } else { 'N' }).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the flag at a 1-based schema position is set.
    pub fn is_set(&self, position: usize) -> Option<bool> {
        position
            .checked_sub(1)
            .and_then(|i| self.0.as_bytes().get(i))
            .map(|b| *b == b'Y')
    }
}

impl fmt::Display for FlagString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FlagString {
    type Error = FlagStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        FlagString::new(&value)
    }
}

impl From<FlagString> for String {
    fn from(flags: FlagString) -> Self {
        flags.0
    }
}
