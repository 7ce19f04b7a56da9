use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::ViewerConfig;
use crate::document::{DocumentHandle, DocumentProvider, PageNumber};
use crate::error::{Result, ViewerError};
use crate::highlight::HighlightInjector;
use crate::locator::{MatchResult, SearchQuery, SnippetLocator};
use crate::navigator::PageNavigator;
use crate::render::{RenderPipeline, RenderStatus, RenderTask};
use crate::session::DocumentSession;
use crate::surface::{Frame, TextLayer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRender {
    pub task_id: u64,
    pub page: PageNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerState {
    /// `None` while loading, after a failed load, or for an empty document.
    pub current_page: Option<PageNumber>,
    pub total_pages: usize,
    pub load_error: Option<ViewerError>,
    pub render_error: Option<ViewerError>,
    pub active_render: Option<ActiveRender>,
}

/// What the surrounding UI talks to: a document session, its page cursor,
/// the render pipeline, and snippet search on top.
pub struct Viewer {
    config: ViewerConfig,
    session: DocumentSession,
    pipeline: RenderPipeline,
    navigator: PageNavigator,
    locator: SnippetLocator,
    injector: HighlightInjector,
}

impl Viewer {
    pub fn new(provider: Arc<dyn DocumentProvider>, config: ViewerConfig) -> Self {
        let pipeline = RenderPipeline::new(config.render_scale);
        Self {
            config,
            session: DocumentSession::new(provider),
            pipeline,
            navigator: PageNavigator::new(),
            locator: SnippetLocator::new(),
            injector: HighlightInjector::new(),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Loads `url`, replacing any open document, and starts rendering the
    /// configured initial page. The previous document's frame, text layer
    /// and render error are dropped up front, so a failed load shows nothing.
    #[instrument(skip(self))]
    pub async fn open(&mut self, url: &str) -> Result<Option<RenderTask>> {
        self.pipeline.cancel_active().await;
        self.pipeline.clear();
        self.navigator.clear();

        let document = self.session.open(url).await?;
        self.navigator
            .reset(document.page_count(), self.config.initial_page);
        match self.navigator.current() {
            Some(page) => Ok(Some(self.pipeline.render_page(document, page).await?)),
            None => {
                info!("document has no pages");
                Ok(None)
            }
        }
    }

    /// Moves the cursor by `offset` pages. Returns the new render, or `None`
    /// when the cursor was already at the boundary.
    pub async fn change_page(&mut self, offset: isize) -> Result<Option<RenderTask>> {
        let document = self.document()?;
        match self.navigator.change_page(offset) {
            Some(page) => Ok(Some(self.pipeline.render_page(document, page).await?)),
            None => Ok(None),
        }
    }

    pub async fn goto_page(&mut self, page: PageNumber) -> Result<Option<RenderTask>> {
        let document = self.document()?;
        match self.navigator.goto_page(page) {
            Some(page) => Ok(Some(self.pipeline.render_page(document, page).await?)),
            None => Ok(None),
        }
    }

    /// Finds the page best matching `query`, renders it and highlights the
    /// matched span once its text layer is in place.
    #[instrument(skip(self))]
    pub async fn search_and_highlight(&mut self, query: &str) -> Result<Option<MatchResult>> {
        let query = SearchQuery::new(query)?;
        let document = self.document()?;

        let Some(matched) = self.locator.locate(&*document, &query).await? else {
            return Ok(None);
        };

        self.navigator.goto_page(matched.page_number);
        let page = self.navigator.current().unwrap_or(matched.page_number);
        let task = self.pipeline.render_page(document, page).await?;

        match task.settled().await {
            RenderStatus::Completed => {
                let layer = self.pipeline.text_layer();
                let marked = self.injector.inject(&mut layer.lock(), &matched);
                info!(page, marked, distance = matched.distance, "match highlighted");
            }
            status => debug!(?status, "render for match did not complete; no highlight"),
        }

        Ok(Some(matched))
    }

    /// Waits for the in-flight render, if any.
    pub async fn wait_for_render(&self) -> Option<RenderStatus> {
        let task = self.pipeline.active_task()?.clone();
        Some(task.settled().await)
    }

    pub fn current_page(&self) -> Option<PageNumber> {
        self.navigator.current()
    }

    pub fn total_pages(&self) -> usize {
        self.navigator.total()
    }

    pub fn load_error(&self) -> Option<ViewerError> {
        self.session.load_error()
    }

    pub fn render_error(&self) -> Option<ViewerError> {
        self.pipeline.last_error()
    }

    pub fn active_task(&self) -> Option<&RenderTask> {
        self.pipeline.active_task()
    }

    pub fn tasks_started(&self) -> u64 {
        self.pipeline.tasks_started()
    }

    pub fn frame(&self) -> Option<Frame> {
        self.pipeline.surface().lock().frame().cloned()
    }

    pub fn text_layer(&self) -> TextLayer {
        self.pipeline.text_layer().lock().clone()
    }

    pub fn document(&self) -> Result<Arc<dyn DocumentHandle>> {
        self.session.document().ok_or(ViewerError::NoDocument)
    }

    pub fn state(&self) -> ViewerState {
        ViewerState {
            current_page: self.current_page(),
            total_pages: self.total_pages(),
            load_error: self.load_error(),
            render_error: self.render_error(),
            active_render: self.active_task().map(|task| ActiveRender {
                task_id: task.id(),
                page: task.page(),
            }),
        }
    }

    /// Cancels in-flight work and drops the document; anything that settles
    /// afterwards has no effect.
    pub fn teardown(&mut self) {
        self.session.teardown();
        self.pipeline.teardown();
        self.navigator.clear();
    }
}
