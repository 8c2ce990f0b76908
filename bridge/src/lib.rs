//! Transport bridge between the host's hook invocations and the pipeline.
//!
//! The client half runs inside the forwarder process the host spawns for
//! every hook; the server half listens on a per-project Unix socket and
//! feeds validated envelopes to a dispatcher. One envelope per connection,
//! newline-terminated, and every client-side failure degrades to
//! passthrough: a slow or absent server must never stall the host.

mod client;
mod error;
mod server;
mod socket_path;

pub use client::CLIENT_TIMEOUT;
pub use client::ForwardOutcome;
pub use client::forward_hook;
pub use error::BridgeError;
pub use server::HookDispatch;
pub use server::HookServer;
pub use socket_path::socket_path_for;
