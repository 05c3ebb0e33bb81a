//! Session membership check.

use crate::error::ReplayError;

/// Remembers the first session id and rejects records from other sessions.
///
/// A trace interleaved from unrelated captures would replay nonsense, so any
/// record whose id does not start with the first id aborts the run.
#[derive(Debug, Clone, Default)]
pub struct SessionValidator {
    prefix: Option<String>,
}

impl SessionValidator {
    /// Create a validator that has seen nothing yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check record `seq`, adopting its id as the prefix if it is the first
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::SessionMismatch`] if `id` lacks the prefix
    pub fn check(&mut self, seq: u64, id: &str) -> Result<(), ReplayError> {
        match &self.prefix {
            None => {
                self.prefix = Some(id.to_string());
                Ok(())
            }
            Some(prefix) if id.starts_with(prefix.as_str()) => Ok(()),
            Some(prefix) => Err(ReplayError::SessionMismatch {
                seq,
                expected: prefix.clone(),
                actual: id.to_string(),
            }),
        }
    }

    /// Session prefix, once a record has been seen
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_id_becomes_prefix() {
        let mut validator = SessionValidator::new();
        assert_eq!(validator.prefix(), None);
        validator.check(0, "S001").unwrap();
        assert_eq!(validator.prefix(), Some("S001"));
    }

    #[test]
    fn test_accepts_handle_suffixes() {
        let mut validator = SessionValidator::new();
        validator.check(0, "S001").unwrap();
        validator.check(1, "S001").unwrap();
        validator.check(2, "S001batch01").unwrap();
    }

    #[test]
    fn test_rejects_other_session() {
        let mut validator = SessionValidator::new();
        validator.check(0, "S001").unwrap();
        match validator.check(1, "S002") {
            Err(ReplayError::SessionMismatch { seq, expected, actual }) => {
                assert_eq!(seq, 1);
                assert_eq!(expected, "S001");
                assert_eq!(actual, "S002");
            }
            other => panic!("expected mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_shorter_id_is_rejected() {
        let mut validator = SessionValidator::new();
        validator.check(0, "S001batch01").unwrap();
        assert!(validator.check(1, "S001").is_err());
    }

    #[test]
    fn test_mismatch_keeps_prefix() {
        let mut validator = SessionValidator::new();
        validator.check(0, "S001").unwrap();
        assert!(validator.check(1, "X").is_err());
        assert_eq!(validator.prefix(), Some("S001"));
        validator.check(2, "S001").unwrap();
    }
}
