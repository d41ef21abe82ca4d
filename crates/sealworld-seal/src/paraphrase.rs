//! Optional paraphrasing hook
//!
//! A [`Paraphraser`] rewrites prose before substitution. Implementations may
//! call out to an external model; the builder treats every failure as fatal
//! for the build and reports it with the record and field involved.

/// Paraphrase call failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("paraphrase failed: {reason}")]
pub struct ParaphraseFailure {
    /// What went wrong
    pub reason: String,
    /// Whether a later attempt might succeed
    pub retryable: bool,
}

impl ParaphraseFailure {
    /// Permanent failure
    #[must_use]
    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: false,
        }
    }

    /// Transient failure
    #[must_use]
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: true,
        }
    }
}

/// Rewrites one free-text field
#[cfg_attr(test, mockall::automock)]
pub trait Paraphraser: Send + Sync {
    /// Paraphrase `text` taken from field `field`
    ///
    /// # Errors
    /// Returns [`ParaphraseFailure`] when no rewrite could be produced
    fn paraphrase(&self, field: &str, text: &str) -> Result<String, ParaphraseFailure>;
}

/// Collapses runs of whitespace; the only paraphrase that never fails
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceParaphraser;

impl Paraphraser for WhitespaceParaphraser {
    fn paraphrase(&self, _field: &str, text: &str) -> Result<String, ParaphraseFailure> {
        Ok(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_paraphrase_collapses_runs() {
        let out = WhitespaceParaphraser
            .paraphrase("background", "a   b\n\tc ")
            .unwrap();
        assert_eq!(out, "a b c");
    }

    #[test]
    fn mock_failure_is_reported() {
        let mut mock = MockParaphraser::new();
        mock.expect_paraphrase()
            .returning(|_, _| Err(ParaphraseFailure::transient("upstream timeout")));
        let err = mock.paraphrase("background", "text").unwrap_err();
        assert!(err.retryable);
        assert!(err.to_string().contains("upstream timeout"));
    }
}
