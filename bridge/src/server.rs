use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::UnixListener;
use tokio::net::UnixStream;
use toolgate_protocol::ReplyEnvelope;
use toolgate_protocol::ReplyPayload;
use toolgate_protocol::RequestEnvelope;
use toolgate_protocol::RuntimeEvent;
use tracing::debug;
use tracing::warn;

use crate::BridgeError;

/// Implemented by the dispatch pipeline. The returned reply may be produced
/// immediately or after waiting out the event's decision window; either way
/// the server writes exactly one reply line per connection.
pub trait HookDispatch: Send + Sync + 'static {
    fn dispatch(
        &self,
        event: RuntimeEvent,
    ) -> impl std::future::Future<Output = ReplyPayload> + Send;
}

/// Accept loop over the per-project Unix socket.
pub struct HookServer {
    listener: UnixListener,
    path: PathBuf,
}

impl HookServer {
    /// Bind, replacing any stale socket file left by a previous process.
    pub fn bind(path: &Path) -> Result<Self, BridgeError> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path)?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve forever. Each connection is handled on its own task; the
    /// dispatcher is the single logical writer behind them.
    pub async fn run<D: HookDispatch>(self, dispatch: Arc<D>) -> Result<(), BridgeError> {
        loop {
            let (stream, _addr) = self.listener.accept().await?;
            let dispatch = Arc::clone(&dispatch);
            tokio::spawn(async move {
                handle_connection(stream, dispatch).await;
            });
        }
    }
}

/// Read one envelope line, validate at the boundary, dispatch, write one
/// reply line. Malformed envelopes close the connection without a reply —
/// they are never propagated into the pipeline.
async fn handle_connection<D: HookDispatch>(stream: UnixStream, dispatch: Arc<D>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let line = match lines.next_line().await {
        Ok(Some(line)) => line,
        Ok(None) => return,
        Err(err) => {
            debug!("hook connection read failed: {err}");
            return;
        }
    };

    let envelope = match serde_json::from_str::<RequestEnvelope>(&line) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("rejecting malformed hook envelope: {err}");
            return;
        }
    };

    let event = match RuntimeEvent::from_envelope(envelope) {
        Ok(event) => event,
        Err(err) => {
            warn!("rejecting invalid hook envelope: {err}");
            return;
        }
    };

    let request_id = event.request_id.clone();
    let payload = dispatch.dispatch(event).await;
    let reply = ReplyEnvelope::new(request_id, payload);

    let mut reply_line = match serde_json::to_string(&reply) {
        Ok(line) => line,
        Err(err) => {
            warn!("failed to serialize hook reply: {err}");
            return;
        }
    };
    reply_line.push('\n');
    if let Err(err) = write_half.write_all(reply_line.as_bytes()).await {
        // The forwarder may have timed out and gone away; that is its
        // fallback working as intended.
        debug!("failed to write hook reply: {err}");
    }
}
