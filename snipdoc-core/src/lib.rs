//! Page rendering with single-flight cancellation and fuzzy snippet search
//! for paginated documents.

pub mod config;
pub mod distance;
pub mod document;
pub mod error;
pub mod highlight;
pub mod locator;
pub mod navigator;
pub mod render;
pub mod session;
pub mod surface;
pub mod viewer;

#[cfg(test)]
mod testing;

pub use config::ViewerConfig;
pub use distance::distance;
pub use document::{
    document_id_for_url, page_text, DocumentHandle, DocumentId, DocumentInfo, DocumentProvider,
    NormalizedRect, PageHandle, PageNumber, RenderImage, TextItem, Viewport,
};
pub use error::{ConfigError, Result, ViewerError};
pub use highlight::{HighlightInjector, HighlightRange};
pub use locator::{MatchResult, SearchQuery, SnippetLocator};
pub use navigator::PageNavigator;
pub use render::{RenderPipeline, RenderStatus, RenderTask};
pub use session::DocumentSession;
pub use surface::{Frame, Surface, TextLayer};
pub use viewer::{ActiveRender, Viewer, ViewerState};
