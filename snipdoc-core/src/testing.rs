//! In-memory provider for exercising the pipeline without a PDF backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::document::{
    document_id_for_url, DocumentHandle, DocumentInfo, DocumentProvider, NormalizedRect,
    PageHandle, PageNumber, RenderImage, TextItem, Viewport,
};

type PageKey = (String, PageNumber);

#[derive(Default)]
struct Gates {
    pages: HashMap<PageKey, Arc<Notify>>,
    urls: HashMap<String, Arc<Notify>>,
    failing_pages: HashSet<PageKey>,
    failing_text: HashSet<PageKey>,
}

/// Each page is a list of text runs; each run becomes one [`TextItem`].
#[derive(Clone, Default)]
pub struct FakeProvider {
    documents: Arc<Mutex<HashMap<String, Vec<Vec<String>>>>>,
    gates: Arc<Mutex<Gates>>,
    rasterized: Arc<AtomicUsize>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, url: &str, pages: &[&[&str]]) -> Self {
        let pages = pages
            .iter()
            .map(|runs| runs.iter().map(|run| run.to_string()).collect())
            .collect();
        self.documents.lock().insert(url.to_string(), pages);
        self
    }

    /// Rasterizing `page` of `url` blocks until [`FakeProvider::release_page`].
    pub fn hold_page(&self, url: &str, page: PageNumber) {
        self.gates
            .lock()
            .pages
            .insert((url.to_string(), page), Arc::new(Notify::new()));
    }

    pub fn release_page(&self, url: &str, page: PageNumber) {
        let key = (url.to_string(), page);
        if let Some(notify) = self.gates.lock().pages.remove(&key) {
            notify.notify_one();
        }
    }

    /// Opening `url` blocks until [`FakeProvider::release_url`].
    pub fn hold_url(&self, url: &str) {
        self.gates
            .lock()
            .urls
            .insert(url.to_string(), Arc::new(Notify::new()));
    }

    pub fn release_url(&self, url: &str) {
        if let Some(notify) = self.gates.lock().urls.remove(url) {
            notify.notify_one();
        }
    }

    /// Rasterizing `page` of `url` fails.
    pub fn fail_page(&self, url: &str, page: PageNumber) {
        self.gates
            .lock()
            .failing_pages
            .insert((url.to_string(), page));
    }

    /// Extracting the text of `page` of `url` fails; rasterizing still works.
    pub fn fail_text(&self, url: &str, page: PageNumber) {
        self.gates
            .lock()
            .failing_text
            .insert((url.to_string(), page));
    }

    pub fn rasterized(&self) -> usize {
        self.rasterized.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DocumentProvider for FakeProvider {
    async fn open(&self, url: &str) -> Result<Arc<dyn DocumentHandle>> {
        let gate = self.gates.lock().urls.get(url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let pages = self
            .documents
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("no document at {url}"))?;
        Ok(Arc::new(FakeDocument {
            info: DocumentInfo {
                id: document_id_for_url(url),
                url: url.to_string(),
                page_count: pages.len(),
                title: None,
            },
            pages,
            provider: self.clone(),
        }))
    }
}

struct FakeDocument {
    info: DocumentInfo,
    pages: Vec<Vec<String>>,
    provider: FakeProvider,
}

#[async_trait::async_trait]
impl DocumentHandle for FakeDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    async fn page(&self, number: PageNumber) -> Result<Arc<dyn PageHandle>> {
        let runs = self
            .pages
            .get(number.wrapping_sub(1))
            .cloned()
            .ok_or_else(|| anyhow!("page {number} out of range"))?;
        Ok(Arc::new(FakePage {
            key: (self.info.url.clone(), number),
            number,
            runs,
            provider: self.provider.clone(),
        }))
    }
}

struct FakePage {
    key: PageKey,
    number: PageNumber,
    runs: Vec<String>,
    provider: FakeProvider,
}

#[async_trait::async_trait]
impl PageHandle for FakePage {
    fn number(&self) -> PageNumber {
        self.number
    }

    fn viewport(&self, scale: f32) -> Viewport {
        Viewport {
            width: 4.0 * scale,
            height: 2.0 * scale,
            scale,
        }
    }

    async fn rasterize(&self, viewport: Viewport) -> Result<RenderImage> {
        let gate = self.provider.gates.lock().pages.get(&self.key).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.provider.gates.lock().failing_pages.contains(&self.key) {
            return Err(anyhow!("corrupt content stream"));
        }
        self.provider.rasterized.fetch_add(1, Ordering::SeqCst);
        let (width, height) = viewport.pixel_size();
        Ok(RenderImage {
            width,
            height,
            pixels: vec![self.number as u8; (width * height * 4) as usize],
        })
    }

    async fn text_content(&self) -> Result<Vec<TextItem>> {
        if self.provider.gates.lock().failing_text.contains(&self.key) {
            return Err(anyhow!("text layer unavailable"));
        }
        let count = self.runs.len().max(1) as f32;
        Ok(self
            .runs
            .iter()
            .enumerate()
            .map(|(idx, run)| {
                let top = idx as f32 / count;
                TextItem::new(
                    run.clone(),
                    NormalizedRect {
                        left: 0.05,
                        top,
                        right: 0.95,
                        bottom: top + 1.0 / count,
                    },
                )
            })
            .collect())
    }
}
