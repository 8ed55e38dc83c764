//! Client side of the authorization handshake.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::messages::{AcceptAuthorize, InitAuthorize, ObserverMessage};
use crate::transport::HandshakeTransport;

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to authorize with observer: {0}")]
    Rejected(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Connection closed before the observer replied")]
    ConnectionClosed,

    #[error("Observer did not reply within {0:?}")]
    Timeout(Duration),
}

/// Runs one authorization over a transport, then closes it.
pub struct ObserverClient<T: HandshakeTransport> {
    transport: T,
    timeout: Duration,
}

impl<T: HandshakeTransport> ObserverClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// How long to wait for the observer's reply.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `request` and wait for the verdict.
    ///
    /// The connection is closed once the handshake resolves, whether the
    /// observer approved, refused, or broke the protocol.
    pub async fn authorize(
        mut self,
        request: InitAuthorize,
    ) -> Result<AcceptAuthorize, RemoteError> {
        let verdict = self.handshake(request).await;
        if let Err(error) = self.transport.close().await {
            warn!(error = %error, "Failed to close observer connection");
        }
        verdict
    }

    async fn handshake(&mut self, request: InitAuthorize) -> Result<AcceptAuthorize, RemoteError> {
        debug!(test_case_id = %request.test_case_id, "Requesting authorization");
        let frame = serde_json::to_string(&ObserverMessage::InitAuthorize(request))
            .map_err(|e| RemoteError::Protocol(e.to_string()))?;
        self.transport.send(frame).await?;

        let reply = tokio::time::timeout(self.timeout, self.transport.recv())
            .await
            .map_err(|_| RemoteError::Timeout(self.timeout))??
            .ok_or(RemoteError::ConnectionClosed)?;

        match serde_json::from_str::<ObserverMessage>(&reply) {
            Ok(ObserverMessage::AcceptAuthorize(approval)) => {
                info!(
                    org = %approval.org_name,
                    dashboard = %approval.dashboard_url,
                    "Authorized with observer"
                );
                Ok(approval)
            }
            Ok(ObserverMessage::Error(error)) => Err(RemoteError::Rejected(error.message)),
            Ok(other) => Err(RemoteError::Protocol(format!(
                "unexpected message kind '{}'",
                other.kind()
            ))),
            Err(e) => Err(RemoteError::Protocol(format!("unreadable message: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ErrorPayload;
    use crate::transport::MemoryTransport;

    fn request() -> InitAuthorize {
        InitAuthorize {
            test_case_id: "checkout-1".into(),
            test_case: serde_json::json!({ "url": "https://shop.test" }),
            api_key: "wp-secret".into(),
        }
    }

    /// Play the observer: read the init frame, answer with `reply`, and
    /// report whether the client closed afterwards.
    async fn observe(mut server: MemoryTransport, reply: String) -> (ObserverMessage, bool) {
        let init = server.recv().await.unwrap().unwrap();
        server.send(reply).await.unwrap();
        let closed = server.recv().await.unwrap().is_none();
        (serde_json::from_str(&init).unwrap(), closed)
    }

    #[tokio::test]
    async fn approval_resolves_and_closes() {
        let (client_end, server_end) = MemoryTransport::pair(4);
        let reply = serde_json::to_string(&ObserverMessage::AcceptAuthorize(AcceptAuthorize {
            org_name: "Acme".into(),
            dashboard_url: "https://dash.test/runs/1".into(),
        }))
        .unwrap();
        let server = tokio::spawn(observe(server_end, reply));

        let approval = ObserverClient::new(client_end).authorize(request()).await.unwrap();
        assert_eq!(approval.dashboard_url, "https://dash.test/runs/1");

        let (init, closed) = server.await.unwrap();
        assert_eq!(init, ObserverMessage::InitAuthorize(request()));
        assert!(closed);
    }

    #[tokio::test]
    async fn error_reply_is_a_rejection() {
        let (client_end, server_end) = MemoryTransport::pair(4);
        let reply = serde_json::to_string(&ObserverMessage::Error(ErrorPayload {
            message: "unknown api key".into(),
        }))
        .unwrap();
        let server = tokio::spawn(observe(server_end, reply));

        let err = ObserverClient::new(client_end).authorize(request()).await.unwrap_err();
        assert!(matches!(&err, RemoteError::Rejected(m) if m == "unknown api key"));
        assert!(server.await.unwrap().1);
    }

    #[tokio::test]
    async fn unexpected_message_closes_connection() {
        let (client_end, server_end) = MemoryTransport::pair(4);
        let echo = serde_json::to_string(&ObserverMessage::InitAuthorize(request())).unwrap();
        let server = tokio::spawn(observe(server_end, echo));

        let err = ObserverClient::new(client_end).authorize(request()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Protocol(_)));
        assert!(server.await.unwrap().1);
    }

    #[tokio::test]
    async fn garbage_reply_is_a_protocol_violation() {
        let (client_end, server_end) = MemoryTransport::pair(4);
        let server = tokio::spawn(observe(server_end, "not json".into()));

        let err = ObserverClient::new(client_end).authorize(request()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Protocol(_)));
        assert!(server.await.unwrap().1);
    }

    #[tokio::test]
    async fn peer_hangup_is_reported() {
        let (client_end, mut server_end) = MemoryTransport::pair(4);
        let server = tokio::spawn(async move {
            server_end.recv().await.unwrap();
            server_end.close().await.unwrap();
        });

        let err = ObserverClient::new(client_end).authorize(request()).await.unwrap_err();
        assert!(matches!(err, RemoteError::ConnectionClosed));
        server.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_observer_times_out() {
        let (client_end, _server_end) = MemoryTransport::pair(4);
        let err = ObserverClient::new(client_end)
            .with_timeout(Duration::from_secs(5))
            .authorize(request())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Timeout(_)));
    }
}
