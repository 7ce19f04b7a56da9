use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::document::{DocumentHandle, PageNumber, RenderImage, TextItem, Viewport};
use crate::error::{Result, ViewerError};
use crate::surface::{Frame, Surface, TextLayer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStatus {
    Pending,
    Completed,
    Cancelled,
    Failed(ViewerError),
}

impl RenderStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RenderStatus::Pending)
    }
}

/// Handle to one in-flight render. Clones observe the same task.
#[derive(Debug, Clone)]
pub struct RenderTask {
    id: u64,
    page: PageNumber,
    token: CancellationToken,
    status: watch::Receiver<RenderStatus>,
}

impl RenderTask {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn page(&self) -> PageNumber {
        self.page
    }

    pub fn status(&self) -> RenderStatus {
        self.status.borrow().clone()
    }

    pub fn is_settled(&self) -> bool {
        self.status.borrow().is_terminal()
    }

    /// Idempotent. A task that already settled keeps its status.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn settled(&self) -> RenderStatus {
        let mut receiver = self.status.clone();
        let status = match receiver.wait_for(RenderStatus::is_terminal).await {
            Ok(terminal) => terminal.clone(),
            // The worker vanished without reporting, e.g. the runtime shut down.
            Err(_) => RenderStatus::Cancelled,
        };
        status
    }
}

/// Single-flight page renderer.
///
/// At most one task is non-terminal at a time: starting a render cancels the
/// previous one and waits for it to settle first. Rasterization and text
/// extraction both happen off-surface; the results are committed together
/// under the surface lock, and only if the task was not cancelled by then.
pub struct RenderPipeline {
    scale: f32,
    surface: Arc<Mutex<Surface>>,
    text_layer: Arc<Mutex<TextLayer>>,
    last_error: Arc<Mutex<Option<ViewerError>>>,
    active: Option<RenderTask>,
    next_task_id: u64,
    shutdown: CancellationToken,
}

impl RenderPipeline {
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            surface: Arc::new(Mutex::new(Surface::default())),
            text_layer: Arc::new(Mutex::new(TextLayer::default())),
            last_error: Arc::new(Mutex::new(None)),
            active: None,
            next_task_id: 1,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn surface(&self) -> Arc<Mutex<Surface>> {
        Arc::clone(&self.surface)
    }

    pub fn text_layer(&self) -> Arc<Mutex<TextLayer>> {
        Arc::clone(&self.text_layer)
    }

    pub fn last_error(&self) -> Option<ViewerError> {
        self.last_error.lock().clone()
    }

    /// Number of render tasks started so far.
    pub fn tasks_started(&self) -> u64 {
        self.next_task_id - 1
    }

    /// The current task, if it has not settled yet.
    pub fn active_task(&self) -> Option<&RenderTask> {
        self.active.as_ref().filter(|task| !task.is_settled())
    }

    pub fn is_torn_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    #[instrument(skip(self, document), fields(scale = self.scale))]
    pub async fn render_page(
        &mut self,
        document: Arc<dyn DocumentHandle>,
        page: PageNumber,
    ) -> Result<RenderTask> {
        if self.shutdown.is_cancelled() {
            return Err(ViewerError::Cancelled);
        }

        self.cancel_active().await;

        let page_count = document.page_count();
        if page == 0 || page > page_count {
            warn!(page, page_count, "render requested for a page outside the document");
            return Err(ViewerError::PageOutOfRange { page, page_count });
        }

        let id = self.next_task_id;
        self.next_task_id += 1;

        let token = self.shutdown.child_token();
        let (status_tx, status_rx) = watch::channel(RenderStatus::Pending);
        let task = RenderTask {
            id,
            page,
            token: token.clone(),
            status: status_rx,
        };

        let job = RenderJob {
            id,
            page,
            scale: self.scale,
            document,
            token,
            surface: Arc::clone(&self.surface),
            text_layer: Arc::clone(&self.text_layer),
            last_error: Arc::clone(&self.last_error),
        };
        tokio::spawn(async move {
            let status = job.run().await;
            let _ = status_tx.send(status);
        });

        self.active = Some(task.clone());
        Ok(task)
    }

    /// Cancels the current task and waits until it has settled.
    pub async fn cancel_active(&mut self) -> Option<RenderStatus> {
        let task = self.active.take()?;
        if !task.is_settled() {
            debug!(task = task.id, page = task.page, "preempting in-flight render");
        }
        task.cancel();
        Some(task.settled().await)
    }

    /// Blanks the surface, text layer and error slot. Callers settle the
    /// active task first so nothing repaints behind them.
    pub fn clear(&mut self) {
        let mut surface = self.surface.lock();
        let mut text_layer = self.text_layer.lock();
        surface.blank();
        *text_layer = TextLayer::default();
        *self.last_error.lock() = None;
    }

    /// Cancels everything without waiting. Nothing started before teardown
    /// touches the surface or the error slot afterwards.
    pub fn teardown(&mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.active.take() {
            debug!(task = task.id, page = task.page, "render pipeline torn down");
        }
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

struct RenderJob {
    id: u64,
    page: PageNumber,
    scale: f32,
    document: Arc<dyn DocumentHandle>,
    token: CancellationToken,
    surface: Arc<Mutex<Surface>>,
    text_layer: Arc<Mutex<TextLayer>>,
    last_error: Arc<Mutex<Option<ViewerError>>>,
}

struct RenderOutput {
    viewport: Viewport,
    image: RenderImage,
    items: Vec<TextItem>,
}

impl RenderJob {
    async fn run(self) -> RenderStatus {
        let outcome = tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(ViewerError::Cancelled),
            output = self.produce() => output,
        };

        match outcome {
            Ok(output) => self.commit(output),
            Err(err) if err.is_cancelled() || self.token.is_cancelled() => {
                debug!(task = self.id, page = self.page, "render cancelled");
                RenderStatus::Cancelled
            }
            Err(err) => {
                warn!(task = self.id, page = self.page, %err, "render failed");
                let mut last_error = self.last_error.lock();
                if self.token.is_cancelled() {
                    return RenderStatus::Cancelled;
                }
                *last_error = Some(err.clone());
                RenderStatus::Failed(err)
            }
        }
    }

    async fn produce(&self) -> Result<RenderOutput> {
        let page = self
            .document
            .page(self.page)
            .await
            .map_err(|err| ViewerError::render(self.page, &err))?;
        let viewport = page.viewport(self.scale);
        let image = page
            .rasterize(viewport)
            .await
            .map_err(|err| ViewerError::render(self.page, &err))?;
        let items = page
            .text_content()
            .await
            .map_err(|err| ViewerError::render(self.page, &err))?;
        Ok(RenderOutput {
            viewport,
            image,
            items,
        })
    }

    fn commit(&self, output: RenderOutput) -> RenderStatus {
        let mut surface = self.surface.lock();
        let mut text_layer = self.text_layer.lock();
        if self.token.is_cancelled() {
            debug!(task = self.id, page = self.page, "dropping frame of cancelled render");
            return RenderStatus::Cancelled;
        }

        surface.paint(Frame {
            page: self.page,
            task_id: self.id,
            viewport: output.viewport,
            image: output.image,
        });
        text_layer.replace(self.page, output.items);
        *self.last_error.lock() = None;
        debug!(task = self.id, page = self.page, "frame committed");
        RenderStatus::Completed
    }
}
