use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::document::{DocumentHandle, DocumentProvider};
use crate::error::{Result, ViewerError};

#[derive(Default)]
struct SessionState {
    generation: u64,
    torn_down: bool,
    document: Option<Arc<dyn DocumentHandle>>,
    load_error: Option<ViewerError>,
}

/// Owns the currently opened document.
///
/// Every load is tagged with a generation; a load that resolves after a newer
/// `open` or after [`DocumentSession::teardown`] is dropped without touching
/// the session.
pub struct DocumentSession {
    provider: Arc<dyn DocumentProvider>,
    state: Mutex<SessionState>,
}

impl DocumentSession {
    pub fn new(provider: Arc<dyn DocumentProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(SessionState::default()),
        }
    }

    #[instrument(skip(self))]
    pub async fn open(&self, url: &str) -> Result<Arc<dyn DocumentHandle>> {
        let generation = {
            let mut state = self.state.lock();
            if state.torn_down {
                return Err(ViewerError::Cancelled);
            }
            state.generation += 1;
            state.document = None;
            state.load_error = None;
            state.generation
        };

        if url.trim().is_empty() {
            return Err(self.fail(generation, ViewerError::load("no document URL provided")));
        }

        let loaded = self.provider.open(url).await;

        let mut state = self.state.lock();
        if state.torn_down || state.generation != generation {
            debug!(generation, "discarding stale document load");
            return Err(ViewerError::Cancelled);
        }

        match loaded {
            Ok(document) => {
                info!(
                    id = %document.info().id,
                    pages = document.page_count(),
                    "document loaded"
                );
                state.document = Some(Arc::clone(&document));
                Ok(document)
            }
            Err(err) => {
                let err = ViewerError::load(format!("{err:#}"));
                warn!(%err, "document load failed");
                state.load_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn fail(&self, generation: u64, err: ViewerError) -> ViewerError {
        let mut state = self.state.lock();
        if !state.torn_down && state.generation == generation {
            warn!(%err, "document load failed");
            state.load_error = Some(err.clone());
        }
        err
    }

    pub fn document(&self) -> Option<Arc<dyn DocumentHandle>> {
        self.state.lock().document.clone()
    }

    pub fn page_count(&self) -> usize {
        self.state
            .lock()
            .document
            .as_ref()
            .map_or(0, |document| document.page_count())
    }

    pub fn load_error(&self) -> Option<ViewerError> {
        self.state.lock().load_error.clone()
    }

    pub fn is_alive(&self) -> bool {
        !self.state.lock().torn_down
    }

    /// Releases the document. Loads still in flight resolve into nothing.
    pub fn teardown(&self) {
        let mut state = self.state.lock();
        state.torn_down = true;
        state.document = None;
        debug!("document session torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::FakeProvider;

    fn provider() -> FakeProvider {
        FakeProvider::new()
            .with_document("file:///a.pdf", &[&["one"], &["two"]])
            .with_document("file:///b.pdf", &[&["only"]])
    }

    #[tokio::test]
    async fn open_publishes_page_count() {
        let session = DocumentSession::new(Arc::new(provider()));
        let document = session.open("file:///a.pdf").await.unwrap();
        assert_eq!(document.page_count(), 2);
        assert_eq!(session.page_count(), 2);
        assert!(session.load_error().is_none());
    }

    #[tokio::test]
    async fn empty_url_and_missing_document_are_load_errors() {
        let session = DocumentSession::new(Arc::new(provider()));

        let err = session.open("  ").await.err().unwrap();
        assert!(matches!(err, ViewerError::Load { .. }));
        assert_eq!(session.load_error(), Some(err));

        let err = session.open("file:///missing.pdf").await.err().unwrap();
        match &err {
            ViewerError::Load { reason } => assert!(reason.contains("missing.pdf")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(session.document().is_none());
        assert_eq!(session.page_count(), 0);
    }

    #[tokio::test]
    async fn newer_open_supersedes_slow_one() {
        let provider = provider();
        provider.hold_url("file:///a.pdf");
        let session = Arc::new(DocumentSession::new(Arc::new(provider.clone())));

        let slow = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.open("file:///a.pdf").await.map(|_| ()) }
        });
        tokio::task::yield_now().await;

        session.open("file:///b.pdf").await.unwrap();
        provider.release_url("file:///a.pdf");

        assert_eq!(slow.await.unwrap(), Err(ViewerError::Cancelled));
        assert_eq!(session.document().unwrap().info().url, "file:///b.pdf");
        assert_eq!(session.page_count(), 1);
    }

    #[tokio::test]
    async fn load_resolving_after_teardown_is_ignored() {
        let provider = provider();
        provider.hold_url("file:///a.pdf");
        let session = Arc::new(DocumentSession::new(Arc::new(provider.clone())));

        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.open("file:///a.pdf").await.map(|_| ()) }
        });
        tokio::task::yield_now().await;

        session.teardown();
        provider.release_url("file:///a.pdf");

        assert_eq!(pending.await.unwrap(), Err(ViewerError::Cancelled));
        assert!(session.document().is_none());
        assert!(session.load_error().is_none());
        assert!(!session.is_alive());
        assert_eq!(
            session.open("file:///b.pdf").await.map(|_| ()),
            Err(ViewerError::Cancelled)
        );
    }
}
