//! Editor controller: the single owner of the document session

use std::sync::Arc;

use folio_core::{
    DocumentStore, EventBus, FetchedDocument, FolioError, ListingEntry, PageSurface, Result,
    SystemEvent,
};

use crate::editor_state::{DocumentSession, EditOutcome, LoadOutcome, LoadTicket};

/// Drives a [`DocumentSession`] against a store and renders every
/// transition into a page surface.
///
/// Failures are reported to the surface, published on the event bus and
/// returned to the caller. The session is never left half-updated.
pub struct EditorController<S, V> {
    store: S,
    surface: V,
    session: DocumentSession,
    listing: Vec<ListingEntry>,
    blank_template: String,
    event_bus: Option<Arc<dyn EventBus>>,
}

impl<S, V> EditorController<S, V>
where
    S: DocumentStore,
    V: PageSurface,
{
    pub fn new(store: S, surface: V, blank_template: impl Into<String>) -> Self {
        Self {
            store,
            surface,
            session: DocumentSession::new(),
            listing: Vec::new(),
            blank_template: blank_template.into(),
            event_bus: None,
        }
    }

    /// Publish session events on `event_bus`
    pub fn with_event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn session(&self) -> &DocumentSession {
        &self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn surface(&self) -> &V {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut V {
        &mut self.surface
    }

    /// Listing from the last successful refresh
    pub fn listing(&self) -> &[ListingEntry] {
        &self.listing
    }

    /// Load `name` from the store and show it
    pub async fn load(&mut self, name: &str) -> Result<()> {
        let ticket = self.start_load(name).await?;
        let fetched = self.store.fetch(ticket.filename()).await;
        self.finish_load(&ticket, fetched).await.map(|_| ())
    }

    /// Enter Loading for `name`. Pair with [`finish_load`](Self::finish_load)
    /// when the fetch is driven elsewhere.
    pub async fn start_load(&mut self, name: &str) -> Result<LoadTicket> {
        let ticket = match self.session.begin_load(name) {
            Ok(ticket) => ticket,
            Err(e) => return Err(self.fail("load", e).await),
        };
        tracing::info!("Loading {}", ticket.filename());
        let _ = self.render().await;
        Ok(ticket)
    }

    /// Apply the outcome of a fetch started with [`start_load`](Self::start_load)
    pub async fn finish_load(
        &mut self,
        ticket: &LoadTicket,
        fetched: Result<FetchedDocument>,
    ) -> Result<LoadOutcome> {
        match fetched {
            Ok(document) => {
                let bytes = document.content.len();
                let outcome = self.session.complete_load(ticket, document);
                if outcome == LoadOutcome::Applied {
                    tracing::info!("Loaded {} ({} bytes)", ticket.filename(), bytes);
                    self.emit(SystemEvent::document_loaded(
                        ticket.filename().to_string(),
                        bytes,
                    ))
                    .await;
                    self.render().await?;
                }
                Ok(outcome)
            }
            Err(e) => {
                if self.session.abort_load(ticket) {
                    let _ = self.render().await;
                }
                Err(self.fail("load", e).await)
            }
        }
    }

    /// Replace the session with a blank document called `name`
    pub async fn create_new(&mut self, name: &str) -> Result<()> {
        if let Err(e) = self.session.create_new(name, &self.blank_template) {
            return Err(self.fail("new", e).await);
        }

        let filename = self.session.filename().unwrap_or_default().to_string();
        tracing::info!("Created new document {}", filename);
        self.emit(SystemEvent::document_created(filename)).await;
        self.render().await
    }

    /// Feed content from the editable surface into the session
    pub async fn on_edit(&mut self, content: String) -> EditOutcome {
        let outcome = self.session.apply_edit(content);
        match outcome {
            EditOutcome::Unchanged => return outcome,
            EditOutcome::BecameDirty => {
                let filename = self.session.filename().unwrap_or_default().to_string();
                tracing::info!("Page {} is modified", filename);
                self.emit(SystemEvent::document_modified(filename)).await;
            }
            EditOutcome::Updated => {}
        }
        let _ = self.render().await;
        outcome
    }

    /// Store the annotation sent with the next publish
    pub async fn set_comment(&mut self, comment: &str) {
        self.session.set_comment(comment);
        let _ = self.render().await;
    }

    /// Send the current document to the store.
    ///
    /// `comment` replaces the pending comment when given.
    pub async fn publish(&mut self, comment: Option<&str>) -> Result<()> {
        if let Some(comment) = comment {
            self.session.set_comment(comment);
        }

        let submission = match self.session.submission() {
            Ok(submission) => submission,
            Err(e) => return Err(self.fail("publish", e).await),
        };

        tracing::info!(
            "Publishing {} ({} bytes)",
            submission.filename,
            submission.body.len()
        );
        if let Err(e) = self.store.publish(&submission).await {
            return Err(self.fail("publish", e).await);
        }

        self.session.mark_published(&submission);
        self.emit(SystemEvent::document_published(
            submission.filename.clone(),
            submission.comment.clone(),
            submission.body.len(),
        ))
        .await;
        let _ = self.render().await;
        Ok(())
    }

    /// Fetch the store listing and show it
    pub async fn list_documents(&mut self) -> Result<&[ListingEntry]> {
        let entries = match self.store.list().await {
            Ok(entries) => entries,
            Err(e) => return Err(self.fail("list", e).await),
        };

        tracing::debug!("Store listing has {} entries", entries.len());
        self.listing = entries;
        if let Err(e) = self.surface.show_listing(&self.listing).await {
            tracing::warn!("Failed to show listing: {}", e);
            self.surface.report_error(&e).await;
        }
        self.emit(SystemEvent::listing_refreshed(self.listing.len()))
            .await;
        Ok(&self.listing)
    }

    /// Load a listing entry, then refresh the listing whether or not the
    /// load succeeded. The load error wins when both fail.
    pub async fn select(&mut self, name: &str) -> Result<()> {
        let loaded = self.load(name).await;
        let refreshed = self.list_documents().await.map(|_| ());
        loaded.and(refreshed)
    }

    /// Select the entry at `index` in the last listing
    pub async fn select_index(&mut self, index: usize) -> Result<()> {
        let name = match self.listing.get(index) {
            Some(entry) => entry.name.clone(),
            None => {
                let e = FolioError::session(format!(
                    "No listing entry {} (listing has {} entries)",
                    index,
                    self.listing.len()
                ));
                return Err(self.fail("select", e).await);
            }
        };
        self.select(&name).await
    }

    /// Point the next publish at `name`
    pub async fn rename(&mut self, name: &str) -> Result<()> {
        let previous = match self.session.rename(name) {
            Ok(previous) => previous,
            Err(e) => return Err(self.fail("rename", e).await),
        };

        let current = self.session.filename().unwrap_or_default().to_string();
        tracing::info!("Renamed {} to {}", previous, current);
        self.emit(SystemEvent::document_renamed(previous, current))
            .await;
        self.render().await
    }

    /// Fetch and show the version listing of `name`, or of the open
    /// document when `name` is `None`. The session is not touched.
    pub async fn history(&mut self, name: Option<&str>) -> Result<()> {
        let name = name
            .map(str::to_string)
            .or_else(|| self.session.filename().map(str::to_string));
        let name = match name {
            Some(name) => name,
            None => {
                let e = FolioError::session("No document is open");
                return Err(self.fail("history", e).await);
            }
        };

        let fetched = match self.store.fetch(&name).await {
            Ok(fetched) => fetched,
            Err(e) => return Err(self.fail("history", e).await),
        };

        if let Err(e) = self
            .surface
            .show_history(&fetched.filename, &fetched.versions)
            .await
        {
            return Err(self.fail("history", e).await);
        }
        Ok(())
    }

    /// Render the current view, marking the session ready after the first
    /// successful preview render. Failures are reported before they are
    /// returned.
    pub async fn render(&mut self) -> Result<()> {
        let view = self.session.view();
        match self.surface.render(&view).await {
            Ok(outcome) => {
                if outcome.preview_rendered && self.session.mark_ready() {
                    tracing::debug!("Preview rendered, dirty tracking enabled");
                }
                Ok(())
            }
            Err(e) => Err(self.fail("render", e).await),
        }
    }

    async fn fail(&mut self, operation: &str, error: FolioError) -> FolioError {
        tracing::error!("{} failed: {}", operation, error);
        self.surface.report_error(&error).await;
        self.emit(SystemEvent::from_error(operation, &error)).await;
        error
    }

    async fn emit(&self, event: SystemEvent) {
        if let Some(bus) = &self.event_bus {
            if let Err(e) = bus.publish_system_event(event).await {
                tracing::warn!("Failed to publish event: {}", e);
            }
        }
    }
}
