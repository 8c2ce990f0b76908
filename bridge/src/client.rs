use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::time::timeout;
use toolgate_protocol::ReplyAction;
use toolgate_protocol::ReplyEnvelope;
use toolgate_protocol::RequestEnvelope;
use tracing::debug;

use crate::BridgeError;
use crate::socket_path_for;

/// Hard deadline for the whole round trip. The host is waiting on us; a slow
/// UI must never stall it.
pub const CLIENT_TIMEOUT: Duration = Duration::from_millis(500);

/// What the forwarder process should do after one round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum ForwardOutcome {
    Passthrough,
    Block { stderr: String },
    JsonOutput { stdout_json: Value },
}

impl ForwardOutcome {
    /// Exit status contract with the host: 2 blocks the tool, everything
    /// else (including internal failure) lets it run.
    pub fn exit_code(&self) -> i32 {
        match self {
            ForwardOutcome::Block { .. } => 2,
            _ => 0,
        }
    }
}

/// Forward one hook document read from stdin to the project's server.
///
/// Every failure mode here — empty input, absent socket, malformed reply,
/// timeout — degrades to [`ForwardOutcome::Passthrough`].
pub async fn forward_hook(stdin_doc: &str, project_dir: &Path) -> ForwardOutcome {
    let doc = stdin_doc.trim();
    if doc.is_empty() {
        return ForwardOutcome::Passthrough;
    }
    let Ok(payload) = serde_json::from_str::<Value>(doc) else {
        debug!("hook stdin was not valid JSON; passing through");
        return ForwardOutcome::Passthrough;
    };
    if !payload.is_object() {
        return ForwardOutcome::Passthrough;
    }

    let session_id = payload
        .get("session_id")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let hook_event_name = payload
        .get("hook_event_name")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .to_string();
    let envelope = RequestEnvelope::new(session_id, hook_event_name, payload);

    let socket = socket_path_for(project_dir);
    match round_trip(&socket, &envelope).await {
        Ok(reply) if reply.request_id == envelope.request_id => match reply.payload.action {
            ReplyAction::Passthrough => ForwardOutcome::Passthrough,
            ReplyAction::BlockWithStderr => ForwardOutcome::Block {
                stderr: reply.payload.stderr.unwrap_or_default(),
            },
            ReplyAction::JsonOutput => ForwardOutcome::JsonOutput {
                stdout_json: reply
                    .payload
                    .stdout_json
                    .unwrap_or(Value::Object(Default::default())),
            },
        },
        Ok(reply) => {
            debug!(
                "reply correlates to {} not {}; passing through",
                reply.request_id, envelope.request_id
            );
            ForwardOutcome::Passthrough
        }
        Err(err) => {
            debug!("hook round trip failed ({err}); passing through");
            ForwardOutcome::Passthrough
        }
    }
}

/// One connection, one envelope line out, one reply line back.
async fn round_trip(
    socket: &Path,
    envelope: &RequestEnvelope,
) -> Result<ReplyEnvelope, BridgeError> {
    let fut = async {
        let mut stream = UnixStream::connect(socket).await?;
        let mut line = serde_json::to_string(envelope)?;
        line.push('\n');
        stream.write_all(line.as_bytes()).await?;

        let mut reader = BufReader::new(stream);
        let mut reply_line = String::new();
        let n = reader.read_line(&mut reply_line).await?;
        if n == 0 {
            return Err(BridgeError::ConnectionClosed);
        }
        Ok(serde_json::from_str::<ReplyEnvelope>(reply_line.trim())?)
    };
    timeout(CLIENT_TIMEOUT, fut)
        .await
        .map_err(|_| BridgeError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn empty_stdin_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = forward_hook("", dir.path()).await;
        assert_eq!(outcome, ForwardOutcome::Passthrough);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test]
    async fn absent_socket_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = forward_hook(
            r#"{"session_id":"s1","hook_event_name":"Stop"}"#,
            dir.path(),
        )
        .await;
        assert_eq!(outcome, ForwardOutcome::Passthrough);
    }

    #[tokio::test]
    async fn malformed_stdin_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = forward_hook("not json at all", dir.path()).await;
        assert_eq!(outcome, ForwardOutcome::Passthrough);
    }

    #[test]
    fn block_outcome_exits_2() {
        let outcome = ForwardOutcome::Block {
            stderr: "Blocked by rule".to_string(),
        };
        assert_eq!(outcome.exit_code(), 2);
    }
}
