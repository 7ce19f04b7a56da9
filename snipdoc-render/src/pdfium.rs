use std::mem;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use snipdoc_core::{
    document_id_for_url, DocumentHandle, DocumentInfo, DocumentProvider, PageHandle, PageNumber,
    RenderImage, TextItem, Viewport,
};
use tracing::{debug, instrument, warn};

use crate::geometry::normalize_rect;
use crate::location::resolve_location;

const LIBRARY_ENV: &str = "SNIPDOC_PDFIUM_LIBRARY";

pub struct PdfiumProvider {
    pdfium: Arc<Pdfium>,
}

impl PdfiumProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pdfium: Arc::new(bind_pdfium()?),
        })
    }
}

#[async_trait]
impl DocumentProvider for PdfiumProvider {
    #[instrument(skip(self))]
    async fn open(&self, url: &str) -> Result<Arc<dyn DocumentHandle>> {
        let path = resolve_location(url)?;
        let path = path
            .canonicalize()
            .with_context(|| format!("failed to resolve path for {:?}", path))?;
        let pdfium = Arc::clone(&self.pdfium);
        let url = url.to_string();
        let document = tokio::task::spawn_blocking(move || PdfiumDocument::load(pdfium, path, url))
            .await
            .context("document loader stopped unexpectedly")??;
        Ok(Arc::new(PdfiumDocumentHandle {
            inner: Arc::new(document),
        }))
    }
}

struct PdfiumDocument {
    // Declared before `_pdfium` so it is dropped first.
    document: Mutex<PdfDocument<'static>>,
    _pdfium: Arc<Pdfium>,
    path: PathBuf,
    info: DocumentInfo,
}

impl PdfiumDocument {
    fn load(pdfium: Arc<Pdfium>, path: PathBuf, url: String) -> Result<Self> {
        let document = pdfium
            .load_pdf_from_file(&path, None)
            .with_context(|| format!("failed to open {:?}", path))?;
        // SAFETY: the document borrows the bindings owned by `_pdfium`. Both live
        // in this struct and `document` is dropped before `pdfium`, so the
        // borrow never outlives the bindings.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };

        let page_count = usize::try_from(document.pages().len()).unwrap_or_default();
        let title = document
            .metadata()
            .get(PdfDocumentMetadataTagType::Title)
            .map(|tag| tag.value().trim().to_owned())
            .filter(|title| !title.is_empty());

        debug!(path = %path.display(), page_count, "pdf parsed");
        Ok(Self {
            document: Mutex::new(document),
            _pdfium: pdfium,
            info: DocumentInfo {
                id: document_id_for_url(&url),
                url,
                page_count,
                title,
            },
            path,
        })
    }

    fn with_page<R, F>(&self, number: PageNumber, f: F) -> Result<R>
    where
        F: FnOnce(&PdfPage<'_>) -> Result<R>,
    {
        let index = number
            .checked_sub(1)
            .and_then(|index| PdfPageIndex::try_from(index).ok())
            .ok_or_else(|| anyhow!("page {} is out of supported range", number))?;
        let document = self.document.lock();
        let page = document
            .pages()
            .get(index)
            .with_context(|| format!("page {} out of range in {:?}", number, self.path))?;
        f(&page)
    }

    fn page_size(&self, number: PageNumber) -> Result<(f32, f32)> {
        self.with_page(number, |page| Ok((page.width().value, page.height().value)))
    }

    fn rasterize(&self, number: PageNumber, viewport: Viewport) -> Result<RenderImage> {
        self.with_page(number, |page| {
            let config = PdfRenderConfig::new().scale_page_by_factor(viewport.scale.max(0.1));
            let bitmap = page
                .render_with_config(&config)
                .with_context(|| format!("failed to render page {}", number))?;
            let image = bitmap.as_image().to_rgba8();
            let (width, height) = image.dimensions();
            Ok(RenderImage {
                width,
                height,
                pixels: image.into_raw(),
            })
        })
    }

    fn text_items(&self, number: PageNumber) -> Result<Vec<TextItem>> {
        self.with_page(number, |page| {
            let page_width = page.width().value;
            let page_height = page.height().value;
            let text = page
                .text()
                .with_context(|| format!("failed to extract text for page {}", number))?;

            let mut items = Vec::new();
            for segment in text.segments().iter() {
                let content = segment.text();
                if content.trim().is_empty() {
                    continue;
                }
                let bounds = segment.bounds();
                let Some(rect) = normalize_rect(
                    bounds.left().value,
                    bounds.top().value,
                    bounds.right().value,
                    bounds.bottom().value,
                    page_width,
                    page_height,
                ) else {
                    warn!(page = number, "text segment with degenerate bounds");
                    continue;
                };
                items.push(TextItem::new(content, rect));
            }
            Ok(items)
        })
    }
}

struct PdfiumDocumentHandle {
    inner: Arc<PdfiumDocument>,
}

#[async_trait]
impl DocumentHandle for PdfiumDocumentHandle {
    fn info(&self) -> &DocumentInfo {
        &self.inner.info
    }

    async fn page(&self, number: PageNumber) -> Result<Arc<dyn PageHandle>> {
        let document = Arc::clone(&self.inner);
        let (width, height) = run_blocking(move || document.page_size(number)).await?;
        Ok(Arc::new(PdfiumPage {
            document: Arc::clone(&self.inner),
            number,
            width,
            height,
        }))
    }
}

struct PdfiumPage {
    document: Arc<PdfiumDocument>,
    number: PageNumber,
    /// Page size in points.
    width: f32,
    height: f32,
}

#[async_trait]
impl PageHandle for PdfiumPage {
    fn number(&self) -> PageNumber {
        self.number
    }

    fn viewport(&self, scale: f32) -> Viewport {
        Viewport {
            width: self.width * scale,
            height: self.height * scale,
            scale,
        }
    }

    async fn rasterize(&self, viewport: Viewport) -> Result<RenderImage> {
        let document = Arc::clone(&self.document);
        let number = self.number;
        run_blocking(move || document.rasterize(number, viewport)).await
    }

    async fn text_content(&self) -> Result<Vec<TextItem>> {
        let document = Arc::clone(&self.document);
        let number = self.number;
        run_blocking(move || document.text_items(number)).await
    }
}

async fn run_blocking<R, F>(f: F) -> Result<R>
where
    F: FnOnce() -> Result<R> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| anyhow!("pdfium worker stopped unexpectedly: {err}"))?
}

fn bind_pdfium() -> Result<Pdfium> {
    let mut errors = Vec::new();

    if let Ok(path) = std::env::var(LIBRARY_ENV) {
        if !path.is_empty() {
            match Pdfium::bind_to_library(&path) {
                Ok(bindings) => return Ok(Pdfium::new(bindings)),
                Err(err) => {
                    warn!("failed to load Pdfium from {}={}: {}", LIBRARY_ENV, path, err);
                    errors.push(format!("{path}: {err}"));
                }
            }
        }
    }

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => errors.push(format!("{}: {}", cwd_path.display(), err)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; install it or set {} ({})",
                LIBRARY_ENV,
                errors.join(", ")
            ))
        }
    }
}
