//! Error types for the transcription client.

/// Error taxonomy for streaming transcription.
///
/// Transport-level failures always surface to the caller: a stateful
/// session cannot be safely resumed mid-stream, so there is no automatic
/// reconnect. Read timeouts are not represented here; the session treats
/// them as "no event available now".
#[derive(Debug, Clone, thiserror::Error)]
pub enum SttError {
    /// Missing or invalid configuration, detected before any connection
    /// attempt. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The transport could not be established (refused connection, bad
    /// handshake status). Fatal for the session.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A send or receive failed on an established connection.
    #[error("Network error: {0}")]
    Network(String),

    /// The connection closed while the session still expected traffic.
    /// Accumulated-but-not-finalized text is not delivered because it
    /// cannot be distinguished from an incomplete transcript.
    #[error("Connection closed unexpectedly: {0}")]
    ConnectionClosed(String),

    /// The remote service reported an error.
    #[error("Provider error: {0}")]
    Provider(String),

    /// A session method was invoked in a lifecycle state that does not
    /// allow it (for example streaming on a closed session).
    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

/// Result type alias for STT operations.
pub type SttResult<T> = Result<T, SttError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SttError::Configuration("OPENAI_API_KEY is not set".to_string());
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let err = SttError::ConnectionFailed("refused".to_string());
        assert!(err.to_string().starts_with("Connection failed"));

        let err = SttError::ConnectionClosed("mid-stream".to_string());
        assert!(err.to_string().contains("unexpectedly"));
    }
}
