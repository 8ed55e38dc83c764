//! A connector's lease on a driver session, with retried operations.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use webpilot_core::{DriverError, DriverHandle, DriverSession, Image, Retry, RetryPolicy};

use crate::screen::ScreenTransform;

/// Holds the session a connector opened in `on_start`.
///
/// Resolvers and observation collectors share one slot; every driver
/// operation goes through [`run`](Self::run) so transient failures are
/// retried under the connector's driver policy.
pub struct SessionSlot {
    connector: String,
    handle: Arc<DriverHandle>,
    session: RwLock<Option<Arc<dyn DriverSession>>>,
    policy: RetryPolicy,
    screen: ScreenTransform,
}

impl SessionSlot {
    pub fn new(
        connector: impl Into<String>,
        handle: Arc<DriverHandle>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            connector: connector.into(),
            handle,
            session: RwLock::new(None),
            policy,
            screen: ScreenTransform::new(None),
        }
    }

    /// Let the model work on a `width x height` grid instead of real pixels.
    pub fn with_virtual_screen(mut self, virtual_screen: Option<(u32, u32)>) -> Self {
        self.screen = ScreenTransform::new(virtual_screen);
        self
    }

    pub fn screen(&self) -> &ScreenTransform {
        &self.screen
    }

    /// Take a screenshot and remember the real screen size it shows.
    pub async fn screenshot(&self) -> Result<Image, DriverError> {
        let image = self.run("screenshot", |s| async move { s.screenshot().await }).await?;
        self.screen.observe(&image).await;
        Ok(image)
    }

    /// Map model coordinates to real pixels, taking a screenshot first if
    /// the real size is not known yet.
    pub async fn to_real(&self, x: f64, y: f64) -> Result<(i64, i64), DriverError> {
        if self.screen.needs_real_size().await {
            self.screenshot().await?;
        }
        Ok(self.screen.to_real(x, y).await)
    }

    /// Open a session on the shared driver. A second call is a no-op.
    pub async fn open(&self) -> Result<(), DriverError> {
        let mut slot = self.session.write().await;
        if slot.is_none() {
            *slot = Some(self.handle.session().await?);
            debug!(connector = %self.connector, "Driver session opened");
        }
        Ok(())
    }

    /// Close and forget the session, if one is open.
    pub async fn close(&self) -> Result<(), DriverError> {
        let session = self.session.write().await.take();
        if let Some(session) = session {
            session.close().await?;
            debug!(connector = %self.connector, "Driver session closed");
        }
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn current(&self) -> Result<Arc<dyn DriverSession>, DriverError> {
        self.session.read().await.clone().ok_or_else(|| {
            DriverError::Unavailable(format!("connector '{}' is not started", self.connector))
        })
    }

    /// Run one driver operation, retrying transient failures.
    pub async fn run<T, F, Fut>(&self, operation: &str, op: F) -> Result<T, DriverError>
    where
        F: Fn(Arc<dyn DriverSession>) -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        let session = self.current().await?;
        Retry::new(self.policy.clone())
            .retry_if(DriverError::is_transient)
            .on_retry(|error, attempt| {
                warn!(
                    connector = %self.connector,
                    operation,
                    attempt,
                    error = %error,
                    "Retrying driver operation"
                );
            })
            .call(|| op(Arc::clone(&session)))
            .await
    }
}
