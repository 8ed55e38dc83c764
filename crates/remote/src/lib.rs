//! # webpilot remote
//!
//! One-shot authorization handshake with a remote observer. The client
//! sends the test case and a credential, waits for an approval or an
//! error, and closes the connection either way.

pub mod client;
pub mod messages;
pub mod transport;

pub use client::{DEFAULT_HANDSHAKE_TIMEOUT, ObserverClient, RemoteError};
pub use messages::{AcceptAuthorize, ErrorPayload, InitAuthorize, ObserverMessage};
pub use transport::{HandshakeTransport, MemoryTransport};
