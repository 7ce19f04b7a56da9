use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use uuid::Uuid;

/// 1-based page number.
pub type PageNumber = usize;

pub type DocumentId = Uuid;

const DOCUMENT_NAMESPACE: Uuid = Uuid::from_u128(0x3f0c_7a2e_94d1_5b6e_8a47_c2f9_01de_6b53);

pub fn document_id_for_url(url: &str) -> DocumentId {
    Uuid::new_v5(&DOCUMENT_NAMESPACE, url.trim().as_bytes())
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub url: String,
    pub page_count: usize,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl Viewport {
    pub fn pixel_size(&self) -> (u32, u32) {
        (to_pixels(self.width), to_pixels(self.height))
    }
}

fn to_pixels(value: f32) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        1
    } else {
        value.round().min(u32::MAX as f32) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major.
    pub pixels: Vec<u8>,
}

/// Rectangle in page space normalized to `0.0..=1.0`, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl NormalizedRect {
    pub fn clamp(self) -> Self {
        Self {
            left: self.left.clamp(0.0, 1.0),
            top: self.top.clamp(0.0, 1.0),
            right: self.right.clamp(0.0, 1.0),
            bottom: self.bottom.clamp(0.0, 1.0),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.right > self.left && self.bottom > self.top
    }
}

/// One run of text on a page together with where it sits.
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    pub text: String,
    pub bounds: NormalizedRect,
}

impl TextItem {
    pub fn new(text: impl Into<String>, bounds: NormalizedRect) -> Self {
        Self {
            text: text.into(),
            bounds,
        }
    }
}

#[async_trait::async_trait]
pub trait PageHandle: Send + Sync {
    fn number(&self) -> PageNumber;
    fn viewport(&self, scale: f32) -> Viewport;
    /// Rasterizes into an off-screen image. Dropping the future abandons the work.
    async fn rasterize(&self, viewport: Viewport) -> Result<RenderImage>;
    async fn text_content(&self) -> Result<Vec<TextItem>>;
}

#[async_trait::async_trait]
pub trait DocumentHandle: Send + Sync {
    fn info(&self) -> &DocumentInfo;

    fn page_count(&self) -> usize {
        self.info().page_count
    }

    /// `number` is 1-based and already bounds-checked by the caller.
    async fn page(&self, number: PageNumber) -> Result<Arc<dyn PageHandle>>;
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, url: &str) -> Result<Arc<dyn DocumentHandle>>;
}

/// Joins the page's text items with single spaces.
pub fn page_text(items: &[TextItem]) -> String {
    items
        .iter()
        .map(|item| item.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}
