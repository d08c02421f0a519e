//! Page surfaces driven by the editor controller

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{DocumentVersion, ListingEntry};
use crate::error::{FolioError, Result};

/// Phase of the document session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Loading,
    Clean,
    Dirty,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::Loading => write!(f, "loading"),
            SessionPhase::Clean => write!(f, "clean"),
            SessionPhase::Dirty => write!(f, "modified"),
        }
    }
}

/// Snapshot of everything a surface needs to draw the page.
///
/// Revisions only move forward. A surface replaces the editable content when
/// `editor_revision` changes and the preview document when
/// `preview_revision` changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub filename: Option<String>,
    pub phase: SessionPhase,
    pub ready: bool,
    pub editor_content: String,
    pub editor_revision: u64,
    pub preview_html: String,
    pub preview_revision: u64,
    pub comment: String,
    pub publish_enabled: bool,
    pub comment_enabled: bool,
    pub status_line: Option<String>,
}

/// What a surface managed to do with a view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOutcome {
    pub preview_rendered: bool,
}

/// The page the controller renders into
#[async_trait]
pub trait PageSurface: Send {
    /// Bring the page in line with the view
    async fn render(&mut self, view: &SessionView) -> Result<RenderOutcome>;

    /// Show the store listing as a selectable table
    async fn show_listing(&mut self, entries: &[ListingEntry]) -> Result<()>;

    /// Show the version listing of a document
    async fn show_history(&mut self, filename: &str, versions: &[DocumentVersion]) -> Result<()>;

    /// Tell the user an operation failed
    async fn report_error(&mut self, error: &FolioError);
}
