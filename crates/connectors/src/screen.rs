//! Mapping between the coordinate space the model works in and the real screen.
//!
//! With a virtual screen configured, the model gives every position and
//! distance on a fixed `width x height` grid laid over the screenshot. The
//! real size is learned from each screenshot the connector takes, so the
//! mapping follows the screen if it is resized.

use tokio::sync::RwLock;
use webpilot_core::Image;

pub struct ScreenTransform {
    virtual_screen: Option<(u32, u32)>,
    real: RwLock<Option<(u32, u32)>>,
}

impl ScreenTransform {
    pub fn new(virtual_screen: Option<(u32, u32)>) -> Self {
        Self {
            virtual_screen,
            real: RwLock::new(None),
        }
    }

    pub fn virtual_screen(&self) -> Option<(u32, u32)> {
        self.virtual_screen
    }

    /// Whether model coordinates need the real screen size to be mapped.
    pub async fn needs_real_size(&self) -> bool {
        self.virtual_screen.is_some() && self.real.read().await.is_none()
    }

    /// Remember the real screen size from a fresh screenshot.
    pub async fn observe(&self, screenshot: &Image) {
        *self.real.write().await = Some((screenshot.width, screenshot.height));
    }

    pub async fn real_size(&self) -> Option<(u32, u32)> {
        *self.real.read().await
    }

    /// Map a point, or a distance, from model space to real pixels.
    pub async fn to_real(&self, x: f64, y: f64) -> (i64, i64) {
        let (sx, sy) = self.scale().await;
        ((x * sx).round() as i64, (y * sy).round() as i64)
    }

    async fn scale(&self) -> (f64, f64) {
        match (self.virtual_screen, *self.real.read().await) {
            (Some((vw, vh)), Some((rw, rh))) if vw > 0 && vh > 0 => {
                (f64::from(rw) / f64::from(vw), f64::from(rh) / f64::from(vh))
            }
            _ => (1.0, 1.0),
        }
    }

    /// Guidance for the model about the coordinate grid.
    pub fn instructions(&self) -> Option<String> {
        self.virtual_screen.map(|(width, height)| {
            format!(
                "Give coordinates on a {width}x{height} grid laid over the whole screenshot, \
                 with (0, 0) at the top left."
            )
        })
    }
}
