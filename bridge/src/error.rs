use toolgate_protocol::EnvelopeError;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("socket i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("timed out waiting for reply")]
    Timeout,
    #[error("malformed reply: {0}")]
    MalformedReply(#[from] serde_json::Error),
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(#[from] EnvelopeError),
    #[error("connection closed before a reply line arrived")]
    ConnectionClosed,
}
