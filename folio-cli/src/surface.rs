//! Console page surface: working copy on disk, live preview and terminal

use async_trait::async_trait;
use folio_core::document::human_size;
use folio_core::{
    DocumentVersion, FolioError, ListingEntry, PageSurface, RenderOutcome, Result, SessionView,
};
use folio_file_watcher::WorkingCopy;
use folio_preview::PreviewHub;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Render a listing as a numbered table
pub fn format_listing(entries: &[ListingEntry]) -> String {
    if entries.is_empty() {
        return "The store has no pages\n".to_string();
    }

    let width = entries.iter().map(|entry| entry.name.len()).max().unwrap_or(0);
    let mut table = String::new();
    for (number, entry) in entries.iter().enumerate() {
        table.push_str(&format!(
            "{:>3}  {:<width$}  {:>9}  {}\n",
            number + 1,
            entry.name,
            human_size(entry.size),
            entry.modified.format("%Y-%m-%d %H:%M"),
            width = width,
        ));
    }
    table
}

/// Render a version listing, newest first as the store returns it
pub fn format_history(filename: &str, versions: &[DocumentVersion]) -> String {
    if versions.is_empty() {
        return format!("No versions recorded for {}\n", filename);
    }

    let mut table = format!("History of {}\n", filename);
    for version in versions {
        let hash: String = version.hash.chars().take(10).collect();
        let line = format!(
            "  {}  {}  {}",
            hash,
            version.modified.format("%Y-%m-%d %H:%M"),
            version.comment
        );
        table.push_str(line.trim_end());
        table.push('\n');
    }
    table
}

/// One-line summary of the session
pub fn describe_view(view: &SessionView) -> String {
    let mut line = match &view.filename {
        Some(name) => format!("{} [{}]", name, view.phase),
        None => format!("no page [{}]", view.phase),
    };
    if let Some(status) = &view.status_line {
        line.push_str(" - ");
        line.push_str(status);
    }
    if view.comment_enabled && !view.comment.is_empty() {
        line.push_str(&format!(" (comment: {})", view.comment));
    }
    line
}

/// Draws the session into a working copy file, the preview hub and a
/// terminal stream.
pub struct ConsoleSurface {
    working_copy: WorkingCopy,
    preview: Option<Arc<PreviewHub>>,
    out: Box<dyn Write + Send>,
    written: Option<(String, u64)>,
    preview_revision: u64,
    last_summary: Option<String>,
}

impl ConsoleSurface {
    pub fn new(working_copy: WorkingCopy, preview: Option<Arc<PreviewHub>>) -> Self {
        Self::with_output(working_copy, preview, Box::new(std::io::stdout()))
    }

    pub fn with_output(
        working_copy: WorkingCopy,
        preview: Option<Arc<PreviewHub>>,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            working_copy,
            preview,
            out,
            written: None,
            preview_revision: 0,
            last_summary: None,
        }
    }

    pub fn working_copy(&self) -> &WorkingCopy {
        &self.working_copy
    }

    /// File currently backing the editable content
    pub fn current_file(&self) -> Option<PathBuf> {
        let (filename, _) = self.written.as_ref()?;
        self.working_copy.path_for(filename).ok()
    }

    fn print(&mut self, text: &str) -> Result<()> {
        self.out.write_all(text.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    async fn sync_working_copy(&mut self, view: &SessionView) -> Result<()> {
        let Some(filename) = &view.filename else {
            return Ok(());
        };
        let key = (filename.clone(), view.editor_revision);
        if view.editor_revision == 0 || self.written.as_ref() == Some(&key) {
            return Ok(());
        }

        let path = self
            .working_copy
            .write(filename, &view.editor_content)
            .await?;
        let moved = self
            .written
            .as_ref()
            .map_or(true, |(previous, _)| previous != filename);
        self.written = Some(key);
        if moved {
            self.print(&format!("Editing {}\n", path.display()))?;
        }
        Ok(())
    }

    async fn push_preview(&mut self, view: &SessionView) {
        if let Some(hub) = &self.preview {
            let clients = hub
                .replace_document(
                    view.filename.clone(),
                    view.preview_html.clone(),
                    view.preview_revision,
                )
                .await;
            tracing::debug!(
                "Preview revision {} sent to {} clients",
                view.preview_revision,
                clients
            );
        }
    }
}

#[async_trait]
impl PageSurface for ConsoleSurface {
    async fn render(&mut self, view: &SessionView) -> Result<RenderOutcome> {
        // The preview goes out even when the working copy cannot be written.
        // Its revision is only recorded once the whole view is applied.
        let preview_rendered = view.preview_revision != self.preview_revision;
        if preview_rendered {
            self.push_preview(view).await;
        }
        self.sync_working_copy(view).await?;
        self.preview_revision = view.preview_revision;

        let summary = describe_view(view);
        if self.last_summary.as_deref() != Some(summary.as_str()) {
            self.print(&format!("{}\n", summary))?;
            self.last_summary = Some(summary);
        }

        Ok(RenderOutcome { preview_rendered })
    }

    async fn show_listing(&mut self, entries: &[ListingEntry]) -> Result<()> {
        self.print(&format_listing(entries))
    }

    async fn show_history(&mut self, filename: &str, versions: &[DocumentVersion]) -> Result<()> {
        self.print(&format_history(filename, versions))
    }

    async fn report_error(&mut self, error: &FolioError) {
        let message = format!("error ({}): {}\n", error.kind(), error);
        if self.print(&message).is_err() {
            eprint!("{}", message);
        }
    }
}
