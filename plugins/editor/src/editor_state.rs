//! Document session state machine with dirty and ready tracking

use folio_core::{
    normalize_filename, Document, DocumentVersion, FetchedDocument, FolioError, Result,
    SessionPhase, SessionView, Submission,
};

/// Handle for one in-flight load. Only the most recent ticket can complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    id: u64,
    filename: String,
}

impl LoadTicket {
    /// Normalised name of the document being loaded
    pub fn filename(&self) -> &str {
        &self.filename
    }
}

/// Result of completing a load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was started after this one; nothing changed
    Superseded,
}

/// Result of feeding editable-surface content into the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Content matched the session already
    Unchanged,
    /// Content and preview updated, phase unchanged
    Updated,
    /// Content updated and the session went from clean to dirty
    BecameDirty,
}

#[derive(Debug, Clone)]
struct PendingLoad {
    id: u64,
    restore_phase: SessionPhase,
}

/// The document currently being edited
#[derive(Debug, Clone)]
pub struct DocumentSession {
    filename: Option<String>,
    renamed_from: Option<String>,
    content: String,
    comment: String,
    versions: Vec<DocumentVersion>,
    phase: SessionPhase,
    ready: bool,
    editor_revision: u64,
    preview_revision: u64,
    pending_load: Option<PendingLoad>,
    next_ticket: u64,
}

impl DocumentSession {
    /// Create an empty session waiting for its first document
    pub fn new() -> Self {
        Self {
            filename: None,
            renamed_from: None,
            content: String::new(),
            comment: String::new(),
            versions: Vec::new(),
            phase: SessionPhase::Loading,
            ready: false,
            editor_revision: 0,
            preview_revision: 0,
            pending_load: None,
            next_ticket: 1,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Versions returned with the last fetched document
    pub fn versions(&self) -> &[DocumentVersion] {
        &self.versions
    }

    pub fn is_dirty(&self) -> bool {
        self.phase == SessionPhase::Dirty
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Enter Loading for `name`, superseding any load still in flight
    pub fn begin_load(&mut self, name: &str) -> Result<LoadTicket> {
        let filename = normalize_filename(name)?;
        let id = self.next_ticket;
        self.next_ticket += 1;

        let restore_phase = match &self.pending_load {
            Some(pending) => pending.restore_phase,
            None => self.phase,
        };
        self.pending_load = Some(PendingLoad { id, restore_phase });
        self.phase = SessionPhase::Loading;

        tracing::debug!("Started load #{} for {}", id, filename);
        Ok(LoadTicket { id, filename })
    }

    /// Apply a fetched document if `ticket` is still the current load
    pub fn complete_load(&mut self, ticket: &LoadTicket, fetched: FetchedDocument) -> LoadOutcome {
        if !self.is_current(ticket) {
            tracing::debug!(
                "Discarding superseded load #{} for {}",
                ticket.id,
                ticket.filename
            );
            return LoadOutcome::Superseded;
        }

        self.pending_load = None;
        self.filename = Some(ticket.filename.clone());
        self.renamed_from = None;
        self.content = fetched.content;
        self.versions = fetched.versions;
        self.comment.clear();
        self.phase = SessionPhase::Clean;
        self.editor_revision += 1;
        self.preview_revision += 1;
        LoadOutcome::Applied
    }

    /// Leave Loading after a failed fetch, restoring the phase from before
    /// the load. Returns false when the ticket was already superseded.
    pub fn abort_load(&mut self, ticket: &LoadTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        if let Some(pending) = self.pending_load.take() {
            self.phase = pending.restore_phase;
        }
        true
    }

    fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.pending_load
            .as_ref()
            .map(|pending| pending.id == ticket.id)
            .unwrap_or(false)
    }

    /// Seed a blank document under `name` and enter Clean.
    ///
    /// A load still in flight is superseded.
    pub fn create_new(&mut self, name: &str, template: &str) -> Result<()> {
        let document = Document::new(name, template)?;

        self.pending_load = None;
        self.filename = Some(document.filename);
        self.renamed_from = None;
        self.content = document.content;
        self.versions.clear();
        self.comment.clear();
        self.phase = SessionPhase::Clean;
        self.editor_revision += 1;
        self.preview_revision += 1;
        Ok(())
    }

    /// Take new content from the editable surface
    pub fn apply_edit(&mut self, content: String) -> EditOutcome {
        if content == self.content {
            return EditOutcome::Unchanged;
        }

        self.content = content;
        self.preview_revision += 1;

        if self.ready && self.phase == SessionPhase::Clean {
            self.phase = SessionPhase::Dirty;
            EditOutcome::BecameDirty
        } else {
            EditOutcome::Updated
        }
    }

    /// Record that the preview surface finished its first render
    pub fn mark_ready(&mut self) -> bool {
        let changed = !self.ready;
        self.ready = true;
        changed
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    /// Point the next publish at a different name, keeping the content
    pub fn rename(&mut self, name: &str) -> Result<String> {
        if self.phase == SessionPhase::Loading {
            return Err(FolioError::session("Cannot rename while a document is loading"));
        }
        let current = self
            .filename
            .clone()
            .ok_or_else(|| FolioError::session("No document is open"))?;
        let new_name = normalize_filename(name)?;

        if self.renamed_from.is_none() && new_name != current {
            self.renamed_from = Some(current.clone());
        }
        self.filename = Some(new_name);
        Ok(current)
    }

    /// Build the write request for the current document
    pub fn submission(&self) -> Result<Submission> {
        if self.phase == SessionPhase::Loading {
            return Err(FolioError::session(
                "Cannot publish while a document is loading",
            ));
        }
        let filename = self
            .filename
            .clone()
            .ok_or_else(|| FolioError::session("No document is open"))?;

        Ok(Submission {
            filename,
            comment: self.comment.clone(),
            body: self.content.clone(),
        })
    }

    /// Record a successful publish of `submission`
    pub fn mark_published(&mut self, submission: &Submission) {
        self.filename = Some(submission.filename.clone());
        self.renamed_from = None;
        self.comment.clear();
        if self.content == submission.body {
            self.phase = SessionPhase::Clean;
        }
    }

    /// Derive what the page should show right now
    pub fn view(&self) -> SessionView {
        let dirty = self.phase == SessionPhase::Dirty;
        let status_line = match (&self.renamed_from, dirty) {
            (Some(old), true) => Some(format!("Page is modified. Old name: {}", old)),
            (Some(old), false) => Some(format!("Old name: {}", old)),
            (None, true) => Some("Page is modified".to_string()),
            (None, false) => None,
        };

        SessionView {
            filename: self.filename.clone(),
            phase: self.phase,
            ready: self.ready,
            editor_content: self.content.clone(),
            editor_revision: self.editor_revision,
            preview_html: self.content.clone(),
            preview_revision: self.preview_revision,
            comment: self.comment.clone(),
            publish_enabled: dirty,
            comment_enabled: dirty,
            status_line,
        }
    }
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::new()
    }
}
