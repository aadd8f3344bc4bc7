// Queue identity: caller and queue name value types

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted phone number or queue name (characters, after trimming)
pub const MAX_IDENTIFIER_LEN: usize = 128;

fn validate_identifier(field: &str, raw: &str) -> Result<String> {
    let value = raw.trim();

    if value.is_empty() {
        return Err(DomainError::ValidationError(format!(
            "{} must not be empty",
            field
        )));
    }

    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(DomainError::ValidationError(format!(
            "{} is too long (max {} characters)",
            field, MAX_IDENTIFIER_LEN
        )));
    }

    if value.chars().any(char::is_control) {
        return Err(DomainError::ValidationError(format!(
            "{} must not contain control characters",
            field
        )));
    }

    Ok(value.to_string())
}

/// Caller identifier as supplied by the IVR
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        validate_identifier("phone_number", raw.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Queue identifier. Queues exist implicitly while they have members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QueueName(String);

impl QueueName {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self> {
        validate_identifier("queue_name", raw.as_ref()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! impl_string_newtype {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $ty {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self> {
                Self::parse(value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }
    };
}

impl_string_newtype!(PhoneNumber);
impl_string_newtype!(QueueName);
