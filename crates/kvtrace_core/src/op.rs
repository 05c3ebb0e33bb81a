//! Operation records.
//!
//! One record per key-value call made by the captured application. The wire
//! form is a JSON object `{"id", "op", "key", "value"}` where empty `key` and
//! `value` are omitted rather than written as `null` or `""`.

use crate::error::CoreResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a captured operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OpKind {
    /// Application opened the database
    DbOpen,
    /// Application closed the database
    DbClose,
    /// Autocommit delete
    Delete,
    /// Autocommit put
    Set,
    /// Autocommit point read
    Get,
    /// Open a read cursor
    IterBegin,
    /// Advance a read cursor
    IterNext,
    /// Release a read cursor
    IterClose,
    /// Open a write batch
    BatchBegin,
    /// Commit a write batch
    BatchCommit,
    /// Delete inside a write batch
    BatchDelete,
    /// Put inside a write batch
    BatchSet,
    /// Point read inside a write batch
    BatchGet,
    /// Kind this replayer does not model
    Unknown(String),
}

impl OpKind {
    /// Every kind the replayer models
    pub const KNOWN: [OpKind; 13] = [
        OpKind::DbOpen,
        OpKind::DbClose,
        OpKind::Delete,
        OpKind::Set,
        OpKind::Get,
        OpKind::IterBegin,
        OpKind::IterNext,
        OpKind::IterClose,
        OpKind::BatchBegin,
        OpKind::BatchCommit,
        OpKind::BatchDelete,
        OpKind::BatchSet,
        OpKind::BatchGet,
    ];

    /// Wire name of this kind
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::DbOpen => "dbOpen",
            Self::DbClose => "dbClose",
            Self::Delete => "delete",
            Self::Set => "set",
            Self::Get => "get",
            Self::IterBegin => "iterBegin",
            Self::IterNext => "iterNext",
            Self::IterClose => "iterClose",
            Self::BatchBegin => "batchBegin",
            Self::BatchCommit => "batchCommit",
            Self::BatchDelete => "batchDelete",
            Self::BatchSet => "batchSet",
            Self::BatchGet => "batchGet",
            Self::Unknown(name) => name,
        }
    }

    /// Whether the replayer models this kind
    #[must_use]
    pub const fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }

    /// Whether this kind addresses a batch or iterator through the id suffix
    #[must_use]
    pub const fn targets_handle(&self) -> bool {
        matches!(
            self,
            Self::IterBegin
                | Self::IterNext
                | Self::IterClose
                | Self::BatchBegin
                | Self::BatchCommit
                | Self::BatchDelete
                | Self::BatchSet
                | Self::BatchGet
        )
    }
}

impl From<&str> for OpKind {
    fn from(name: &str) -> Self {
        match name {
            "dbOpen" => Self::DbOpen,
            "dbClose" => Self::DbClose,
            "delete" => Self::Delete,
            "set" => Self::Set,
            "get" => Self::Get,
            "iterBegin" => Self::IterBegin,
            "iterNext" => Self::IterNext,
            "iterClose" => Self::IterClose,
            "batchBegin" => Self::BatchBegin,
            "batchCommit" => Self::BatchCommit,
            "batchDelete" => Self::BatchDelete,
            "batchSet" => Self::BatchSet,
            "batchGet" => Self::BatchGet,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl From<String> for OpKind {
    fn from(name: String) -> Self {
        match Self::from(name.as_str()) {
            Self::Unknown(_) => Self::Unknown(name),
            known => known,
        }
    }
}

impl From<OpKind> for String {
    fn from(kind: OpKind) -> Self {
        match kind {
            OpKind::Unknown(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One captured key-value operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Session id: session prefix followed by the handle suffix
    pub id: String,
    /// Operation kind
    pub op: OpKind,
    /// Key, omitted when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Value, omitted when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Operation {
    /// Create a record without key or value
    #[must_use]
    pub fn new(id: impl Into<String>, op: OpKind) -> Self {
        Self {
            id: id.into(),
            op,
            key: None,
            value: None,
        }
    }

    /// Set the key
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the value
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Key bytes; an omitted key is the empty key
    #[must_use]
    pub fn key_bytes(&self) -> &[u8] {
        self.key.as_deref().unwrap_or_default().as_bytes()
    }

    /// Value bytes; an omitted value is the empty value
    #[must_use]
    pub fn value_bytes(&self) -> &[u8] {
        self.value.as_deref().unwrap_or_default().as_bytes()
    }

    /// Parse a single JSON record
    ///
    /// # Errors
    ///
    /// Returns error if the text is not a valid record
    pub fn from_json(text: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encode as a single JSON record
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op, self.id)?;
        if let Some(key) = &self.key {
            write!(f, " key={:?}", key)?;
        }
        if let Some(value) = &self.value {
            write!(f, " value_len={}", value.len())?;
        }
        Ok(())
    }
}
