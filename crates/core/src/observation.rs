//! Observations: sensed state that connectors hand to memory.
//!
//! An observation renders into [`Renderable`] parts: plain text or images.
//! Images are the heavyweight content that memory tries hard not to repeat.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

/// Encoded image bytes plus their pixel dimensions.
///
/// Bytes are shared, so cloning an image is cheap.
#[derive(Clone, Serialize, Deserialize)]
pub struct Image {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    #[serde(with = "base64_bytes")]
    data: Arc<[u8]>,
}

impl Image {
    pub fn new(format: ImageFormat, width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            format,
            width,
            height,
            data: data.into(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// SHA-256 of the encoded bytes, hex encoded.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.data);
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Base64 payload for providers that take inline images.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
            && self.width == other.width
            && self.height == other.height
            && (Arc::ptr_eq(&self.data, &other.data) || self.data == other.data)
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

mod base64_bytes {
    use super::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S: Serializer>(data: &Arc<[u8]>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<[u8]>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Arc::from)
            .map_err(serde::de::Error::custom)
    }
}

/// One piece of model-consumable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Renderable {
    Text { text: String },
    Image { image: Image },
}

impl Renderable {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(image: Image) -> Self {
        Self::Image { image }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// How long an observation stays visible in rendered context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retention {
    /// Observations sharing a kind are masked together.
    pub kind: String,
    /// Keep only the most recent N of this kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Collapse adjacent identical observations to the latest one.
    #[serde(default)]
    pub dedupe: bool,
}

impl Retention {
    pub fn kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            limit: None,
            dedupe: false,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn dedupe(mut self) -> Self {
        self.dedupe = true;
        self
    }
}

/// Sensed state attributed to exactly one connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub content: Vec<Renderable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention: Option<Retention>,
}

impl Observation {
    pub fn from_connector(connector_id: impl Into<String>, content: Vec<Renderable>) -> Self {
        Self {
            source: connector_id.into(),
            timestamp: Utc::now(),
            content,
            retention: None,
        }
    }

    pub fn text(connector_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::from_connector(connector_id, vec![Renderable::text(text)])
    }

    pub fn image(connector_id: impl Into<String>, image: Image) -> Self {
        Self::from_connector(connector_id, vec![Renderable::image(image)])
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Turn this observation into model-consumable parts.
    pub fn render(&self) -> Vec<Renderable> {
        self.content.clone()
    }

    /// Content equality, ignoring when the observation was taken.
    pub fn same_content(&self, other: &Observation) -> bool {
        self.source == other.source && self.content == other.content
    }
}
