//! Handle identifiers derived from session ids.
//!
//! A captured session id has the shape `<sessionPrefix><handleSuffix>`. The
//! prefix names the connection that produced the record; the suffix names one
//! open batch or iterator inside it. Records that do not target a handle
//! (plain `get`, `set`, `dbOpen`, ...) carry just the prefix.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Width of the session prefix in captured ids; the handle suffix starts here.
pub const SESSION_PREFIX_LEN: usize = 12;

/// Handle identifier - the suffix of a session id naming one batch or iterator
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(String);

impl HandleId {
    /// Create from a raw suffix
    #[must_use]
    pub fn new(suffix: impl Into<String>) -> Self {
        Self(suffix.into())
    }

    /// Extract the handle suffix of `session_id`, skipping `prefix_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidId`] if nothing follows the prefix or if
    /// `prefix_len` falls inside a multi-byte character.
    pub fn from_session(session_id: &str, prefix_len: usize) -> CoreResult<Self> {
        if session_id.len() <= prefix_len {
            return Err(CoreError::InvalidId {
                id: session_id.to_string(),
                reason: format!("no handle suffix after byte {}", prefix_len),
            });
        }
        session_id
            .get(prefix_len..)
            .map(|suffix| Self(suffix.to_string()))
            .ok_or_else(|| CoreError::InvalidId {
                id: session_id.to_string(),
                reason: format!("byte {} is not a character boundary", prefix_len),
            })
    }

    /// Get as str
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
