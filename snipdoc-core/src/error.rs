use thiserror::Error;

use crate::document::PageNumber;

pub type Result<T> = std::result::Result<T, ViewerError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewerError {
    #[error("failed to load document: {reason}")]
    Load { reason: String },

    #[error("page {page} out of range (document has {page_count} pages)")]
    PageOutOfRange { page: PageNumber, page_count: usize },

    #[error("failed to render page {page}: {reason}")]
    Render { page: PageNumber, reason: String },

    #[error("no document loaded")]
    NoDocument,

    #[error("empty query")]
    EmptyQuery,

    /// Preempted or torn down. Never shown to the user.
    #[error("operation cancelled")]
    Cancelled,
}

impl ViewerError {
    pub fn load(err: impl std::fmt::Display) -> Self {
        Self::Load {
            reason: err.to_string(),
        }
    }

    pub fn render(page: PageNumber, err: &anyhow::Error) -> Self {
        Self::Render {
            page,
            reason: format!("{err:#}"),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("render scale must be a positive finite number, got {0}")]
    InvalidScale(f32),

    #[error("initial page must be at least 1")]
    InvalidInitialPage,
}
