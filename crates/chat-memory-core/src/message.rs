//! Role-tagged conversation messages and session keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::traits::StoreError;

/// Opaque session identifier.
///
/// Any string is a valid key; sessions spring into existence on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    /// Create a session key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SessionKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions for the model.
    System,
    /// Text typed by the person chatting.
    User,
    /// Text generated by the model.
    Assistant,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation entry. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Check that the message may be stored.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidMessage` if the content is empty.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.content.is_empty() {
            return Err(StoreError::InvalidMessage(format!(
                "{} message has empty content",
                self.role
            )));
        }
        Ok(())
    }

    /// Build a message from an untyped `{role, content}` record.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidMessage` unless `role` is one of the known
    /// role names and `content` is a non-empty string.
    pub fn from_value(value: &Value) -> Result<Self, StoreError> {
        let obj = value
            .as_object()
            .ok_or_else(|| StoreError::InvalidMessage("message must be an object".into()))?;

        let role = match obj.get("role") {
            Some(Value::String(s)) => Role::parse(s)
                .ok_or_else(|| StoreError::InvalidMessage(format!("unknown role: {s}")))?,
            Some(_) => return Err(StoreError::InvalidMessage("role must be a string".into())),
            None => return Err(StoreError::InvalidMessage("missing role".into())),
        };

        let content = match obj.get("content") {
            Some(Value::String(s)) => s.clone(),
            Some(_) => {
                return Err(StoreError::InvalidMessage("content must be a string".into()));
            }
            None => return Err(StoreError::InvalidMessage("missing content".into())),
        };

        let msg = Self { role, content };
        msg.validate()?;
        Ok(msg)
    }
}
