//! The connection the handshake runs over.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::client::RemoteError;

/// A persistent, message-framed, bidirectional connection.
#[async_trait]
pub trait HandshakeTransport: Send {
    /// Send one text frame.
    async fn send(&mut self, frame: String) -> Result<(), RemoteError>;

    /// Next text frame, or `None` once the peer has closed.
    async fn recv(&mut self) -> Result<Option<String>, RemoteError>;

    /// Close the connection. Closing twice is harmless.
    async fn close(&mut self) -> Result<(), RemoteError>;
}

/// In-process transport over a pair of channels.
pub struct MemoryTransport {
    outgoing: Option<mpsc::Sender<String>>,
    incoming: mpsc::Receiver<String>,
}

impl MemoryTransport {
    /// Two connected ends.
    pub fn pair(capacity: usize) -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::channel(capacity);
        let (b_tx, b_rx) = mpsc::channel(capacity);
        (
            Self {
                outgoing: Some(a_tx),
                incoming: b_rx,
            },
            Self {
                outgoing: Some(b_tx),
                incoming: a_rx,
            },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.outgoing.is_none()
    }
}

#[async_trait]
impl HandshakeTransport for MemoryTransport {
    async fn send(&mut self, frame: String) -> Result<(), RemoteError> {
        let sender = self.outgoing.as_ref().ok_or(RemoteError::ConnectionClosed)?;
        sender
            .send(frame)
            .await
            .map_err(|_| RemoteError::ConnectionClosed)
    }

    async fn recv(&mut self) -> Result<Option<String>, RemoteError> {
        Ok(self.incoming.recv().await)
    }

    async fn close(&mut self) -> Result<(), RemoteError> {
        self.outgoing = None;
        self.incoming.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_cross_and_close_is_seen() {
        let (mut left, mut right) = MemoryTransport::pair(4);
        left.send("hello".into()).await.unwrap();
        assert_eq!(right.recv().await.unwrap().as_deref(), Some("hello"));

        left.close().await.unwrap();
        left.close().await.unwrap();
        assert!(left.is_closed());
        assert_eq!(right.recv().await.unwrap(), None);
        assert!(left.send("late".into()).await.is_err());
    }
}
