//! Error types for the conversation pipeline.

use hearth_core::error::HearthError;

/// Errors from the conversation pipeline.
///
/// Most of these never leave the crate: `Orchestrator::handle_turn` turns
/// them into an apology message and a failed trace step.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyMessage,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("search error: {0}")]
    Search(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("turn timed out after {0} seconds")]
    Timeout(u64),
}

impl From<HearthError> for ChatError {
    fn from(err: HearthError) -> Self {
        match err {
            HearthError::Search(msg) | HearthError::Embedding(msg) => ChatError::Search(msg),
            HearthError::Generation(msg) => ChatError::Generation(msg),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        assert_eq!(ChatError::EmptyMessage.to_string(), "message cannot be empty");
        assert_eq!(
            ChatError::MessageTooLong(2000).to_string(),
            "message exceeds maximum length of 2000 characters"
        );
        assert_eq!(
            ChatError::Parse("no JSON block".into()).to_string(),
            "parse error: no JSON block"
        );
        assert_eq!(
            ChatError::Timeout(60).to_string(),
            "turn timed out after 60 seconds"
        );
    }

    #[test]
    fn test_chat_error_from_hearth_error() {
        let err: ChatError = HearthError::Storage("connection lost".into()).into();
        assert!(matches!(err, ChatError::Storage(ref m) if m.contains("connection lost")));

        let err: ChatError = HearthError::Embedding("quota".into()).into();
        assert!(matches!(err, ChatError::Search(_)));

        let err: ChatError = HearthError::Generation("503".into()).into();
        assert!(matches!(err, ChatError::Generation(_)));
    }
}
