//! Automation driver traits and the process-wide driver handle.
//!
//! An [`AutomationDriver`] is the expensive thing (a browser process, a
//! desktop automation service). It is launched at most once per process
//! and hands out cheap per-connector [`DriverSession`]s.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;

use crate::error::DriverError;
use crate::observation::Image;

/// One tab or window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceInfo {
    pub title: String,
    pub url: String,
}

impl SurfaceInfo {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// All surfaces of a session and which one has focus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceList {
    pub active: usize,
    pub surfaces: Vec<SurfaceInfo>,
}

impl SurfaceList {
    pub fn active_surface(&self) -> Option<&SurfaceInfo> {
        self.surfaces.get(self.active)
    }
}

/// Primitive operations on one isolated session.
#[async_trait]
pub trait DriverSession: Send + Sync {
    async fn click(&self, x: i64, y: i64) -> Result<(), DriverError>;

    async fn type_text(&self, content: &str) -> Result<(), DriverError>;

    async fn scroll(&self, x: i64, y: i64, delta_x: i64, delta_y: i64) -> Result<(), DriverError>;

    async fn navigate(&self, url: &str) -> Result<(), DriverError>;

    async fn screenshot(&self) -> Result<Image, DriverError>;

    /// Enumerate tabs (web) or windows (desktop).
    async fn surfaces(&self) -> Result<SurfaceList, DriverError>;

    async fn switch_surface(&self, index: usize) -> Result<(), DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait AutomationDriver: Send + Sync {
    fn name(&self) -> &str;

    /// Open an isolated session (a browser context, a desktop lease).
    async fn new_session(&self) -> Result<Arc<dyn DriverSession>, DriverError>;

    /// Release the driver itself. Called once by [`DriverHandle::shutdown`].
    async fn shutdown(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

type LaunchResult = Result<Arc<dyn AutomationDriver>, DriverError>;
type Launcher = Box<dyn Fn() -> BoxFuture<'static, LaunchResult> + Send + Sync>;

/// Shared access to one driver, launched on first use.
///
/// Concurrent first callers race on a [`OnceCell`], so the launcher runs
/// once. A failed launch leaves the cell empty and the next caller tries
/// again. After [`shutdown`](Self::shutdown) the handle refuses new work.
pub struct DriverHandle {
    launcher: Launcher,
    driver: OnceCell<Arc<dyn AutomationDriver>>,
    closed: AtomicBool,
}

impl DriverHandle {
    pub fn new<F>(launcher: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<Arc<dyn AutomationDriver>, DriverError>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            launcher: Box::new(launcher),
            driver: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// A handle around a driver that is already running.
    pub fn from_driver(driver: Arc<dyn AutomationDriver>) -> Self {
        Self {
            launcher: Box::new(|| -> BoxFuture<'static, _> {
                Box::pin(async {
                    Err(DriverError::Unavailable("driver cannot be relaunched".into()))
                })
            }),
            driver: OnceCell::new_with(Some(driver)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_launched(&self) -> bool {
        self.driver.initialized()
    }

    /// Get the driver, launching it if nobody has yet.
    pub async fn acquire(&self) -> Result<Arc<dyn AutomationDriver>, DriverError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DriverError::Unavailable("driver handle is shut down".into()));
        }
        let driver = self
            .driver
            .get_or_try_init(|| async {
                tracing::debug!("Launching automation driver");
                (self.launcher)().await
            })
            .await?;
        Ok(Arc::clone(driver))
    }

    /// Open a session on the shared driver.
    pub async fn session(&self) -> Result<Arc<dyn DriverSession>, DriverError> {
        let driver = self.acquire().await?;
        let session = driver.new_session().await?;
        tracing::debug!(driver = driver.name(), "Opened driver session");
        Ok(session)
    }

    /// Tear the driver down. Idempotent; a never-launched driver is left alone.
    pub async fn shutdown(&self) -> Result<(), DriverError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(driver) = self.driver.get() {
            tracing::info!(driver = driver.name(), "Shutting down automation driver");
            driver.shutdown().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for DriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("launched", &self.is_launched())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::ImageFormat;
    use std::sync::atomic::AtomicU32;

    struct NullSession;

    #[async_trait]
    impl DriverSession for NullSession {
        async fn click(&self, _: i64, _: i64) -> Result<(), DriverError> {
            Ok(())
        }
        async fn type_text(&self, _: &str) -> Result<(), DriverError> {
            Ok(())
        }
        async fn scroll(&self, _: i64, _: i64, _: i64, _: i64) -> Result<(), DriverError> {
            Ok(())
        }
        async fn navigate(&self, _: &str) -> Result<(), DriverError> {
            Ok(())
        }
        async fn screenshot(&self) -> Result<Image, DriverError> {
            Ok(Image::new(ImageFormat::Png, 1, 1, vec![0u8]))
        }
        async fn surfaces(&self) -> Result<SurfaceList, DriverError> {
            Ok(SurfaceList::default())
        }
        async fn switch_surface(&self, _: usize) -> Result<(), DriverError> {
            Ok(())
        }
        async fn close(&self) -> Result<(), DriverError> {
            Ok(())
        }
    }

    struct NullDriver {
        shutdowns: Arc<AtomicU32>,
    }

    #[async_trait]
    impl AutomationDriver for NullDriver {
        fn name(&self) -> &str {
            "null"
        }
        async fn new_session(&self) -> Result<Arc<dyn DriverSession>, DriverError> {
            Ok(Arc::new(NullSession))
        }
        async fn shutdown(&self) -> Result<(), DriverError> {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting_handle(launches: Arc<AtomicU32>, shutdowns: Arc<AtomicU32>) -> DriverHandle {
        DriverHandle::new(move || {
            let launches = launches.clone();
            let shutdowns = shutdowns.clone();
            Box::pin(async move {
                launches.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok(Arc::new(NullDriver { shutdowns }) as Arc<dyn AutomationDriver>)
            })
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_use_launches_once() {
        let launches = Arc::new(AtomicU32::new(0));
        let handle = Arc::new(counting_handle(launches.clone(), Arc::new(AtomicU32::new(0))));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move { handle.session().await.map(|_| ()) }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(launches.load(Ordering::SeqCst), 1);
        assert!(handle.is_launched());
    }

    #[tokio::test]
    async fn failed_launch_can_be_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let handle = DriverHandle::new(move || {
            let counter = counter.clone();
            Box::pin(async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(DriverError::Unavailable("browser binary missing".into()))
                } else {
                    Ok(Arc::new(NullDriver {
                        shutdowns: Arc::new(AtomicU32::new(0)),
                    }) as Arc<dyn AutomationDriver>)
                }
            })
        });

        assert!(handle.acquire().await.is_err());
        assert!(!handle.is_launched());
        assert!(handle.acquire().await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent_and_final() {
        let shutdowns = Arc::new(AtomicU32::new(0));
        let handle = counting_handle(Arc::new(AtomicU32::new(0)), shutdowns.clone());
        handle.acquire().await.unwrap();

        handle.shutdown().await.unwrap();
        handle.shutdown().await.unwrap();

        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
        assert!(matches!(
            handle.session().await,
            Err(DriverError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_without_launch_does_nothing() {
        let launches = Arc::new(AtomicU32::new(0));
        let handle = counting_handle(launches.clone(), Arc::new(AtomicU32::new(0)));
        handle.shutdown().await.unwrap();
        assert_eq!(launches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn active_surface_lookup() {
        let list = SurfaceList {
            active: 1,
            surfaces: vec![
                SurfaceInfo::new("Home", "https://example.com"),
                SurfaceInfo::new("Docs", "https://example.com/docs"),
            ],
        };
        assert_eq!(list.active_surface().unwrap().title, "Docs");
    }
}
