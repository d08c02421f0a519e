use async_trait::async_trait;
use chrono::DateTime;
use folio_core::{
    DocumentStore, DocumentVersion, EventBus, FetchedDocument, FolioError, InMemoryEventBus,
    ListingEntry, PageSurface, RenderOutcome, Result, SessionPhase, SessionView, Submission,
    SystemEvent, SystemEventHandler, BLANK_DOCUMENT,
};
use folio_editor::{EditOutcome, EditorController, LoadOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Store double that records every request
#[derive(Default)]
struct MockStore {
    documents: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<String>>,
    published: Mutex<Vec<Submission>>,
    fail_fetch: Mutex<bool>,
    reject_publish: Mutex<bool>,
}

impl MockStore {
    fn with_documents(documents: &[(&str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut map = store.documents.lock().unwrap();
            for (name, content) in documents {
                map.insert(name.to_string(), content.to_string());
            }
        }
        store
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn published(&self) -> Vec<Submission> {
        self.published.lock().unwrap().clone()
    }

    fn set_fail_fetch(&self, fail: bool) {
        *self.fail_fetch.lock().unwrap() = fail;
    }

    fn set_reject_publish(&self, reject: bool) {
        *self.reject_publish.lock().unwrap() = reject;
    }
}

#[async_trait]
impl DocumentStore for MockStore {
    async fn fetch(&self, filename: &str) -> Result<FetchedDocument> {
        self.requests.lock().unwrap().push(format!("fetch {}", filename));
        if *self.fail_fetch.lock().unwrap() {
            return Err(FolioError::network("connection refused"));
        }
        let content = self
            .documents
            .lock()
            .unwrap()
            .get(filename)
            .cloned()
            .ok_or_else(|| FolioError::request_failed(404, "not found"))?;
        Ok(FetchedDocument {
            filename: filename.to_string(),
            content,
            versions: vec![DocumentVersion {
                hash: "abc123".to_string(),
                modified: DateTime::parse_from_rfc3339("2016-03-01T10:20:30-05:00").unwrap(),
                comment: "initial".to_string(),
            }],
        })
    }

    async fn list(&self) -> Result<Vec<ListingEntry>> {
        self.requests.lock().unwrap().push("list".to_string());
        let modified = DateTime::parse_from_rfc3339("2016-03-01T10:20:30-05:00").unwrap();
        let mut entries: Vec<ListingEntry> = self
            .documents
            .lock()
            .unwrap()
            .iter()
            .map(|(name, content)| ListingEntry {
                name: name.clone(),
                size: content.len() as u64,
                modified,
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn publish(&self, submission: &Submission) -> Result<()> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("publish {}", submission.filename));
        if *self.reject_publish.lock().unwrap() {
            return Err(FolioError::write_rejected("store reported failure"));
        }
        self.documents
            .lock()
            .unwrap()
            .insert(submission.filename.clone(), submission.body.clone());
        self.published.lock().unwrap().push(submission.clone());
        Ok(())
    }
}

/// Surface double standing in for the editable and preview panes
#[derive(Default)]
struct RecordingSurface {
    editor: String,
    editor_revision: u64,
    preview: String,
    preview_revision: u64,
    renders: usize,
    last_view: Option<SessionView>,
    listings: Vec<Vec<String>>,
    history: Vec<(String, usize)>,
    errors: Vec<String>,
    fail_editor: bool,
}

#[async_trait]
impl PageSurface for RecordingSurface {
    async fn render(&mut self, view: &SessionView) -> Result<RenderOutcome> {
        self.renders += 1;
        if view.editor_revision != self.editor_revision {
            if self.fail_editor {
                return Err(FolioError::file_system("editable pane is read-only"));
            }
            self.editor = view.editor_content.clone();
            self.editor_revision = view.editor_revision;
        }
        let mut outcome = RenderOutcome::default();
        if view.preview_revision != self.preview_revision {
            self.preview = view.preview_html.clone();
            self.preview_revision = view.preview_revision;
            outcome.preview_rendered = true;
        }
        self.last_view = Some(view.clone());
        Ok(outcome)
    }

    async fn show_listing(&mut self, entries: &[ListingEntry]) -> Result<()> {
        self.listings
            .push(entries.iter().map(|e| e.name.clone()).collect());
        Ok(())
    }

    async fn show_history(&mut self, filename: &str, versions: &[DocumentVersion]) -> Result<()> {
        self.history.push((filename.to_string(), versions.len()));
        Ok(())
    }

    async fn report_error(&mut self, error: &FolioError) {
        self.errors.push(error.kind().to_string());
    }
}

struct EventRecorder(Mutex<Vec<String>>);

#[async_trait]
impl SystemEventHandler for EventRecorder {
    async fn handle_system_event(&self, event: &SystemEvent) -> Result<()> {
        self.0
            .lock()
            .unwrap()
            .push(folio_core::Event::event_type(event).to_string());
        Ok(())
    }
}

fn controller(store: MockStore) -> EditorController<MockStore, RecordingSurface> {
    EditorController::new(store, RecordingSurface::default(), BLANK_DOCUMENT)
}

#[tokio::test]
async fn load_shows_fetched_content_everywhere() {
    let mut editor = controller(MockStore::with_documents(&[("a.html", "<p>a</p>")]));

    editor.load("a.html").await.unwrap();

    assert_eq!(editor.session().phase(), SessionPhase::Clean);
    assert_eq!(editor.session().content(), "<p>a</p>");
    assert_eq!(editor.surface().editor, "<p>a</p>");
    assert_eq!(editor.surface().preview, "<p>a</p>");
    assert!(editor.session().is_ready());
}

#[tokio::test]
async fn first_edit_after_load_marks_dirty_once() {
    let mut editor = controller(MockStore::with_documents(&[("a.html", "one")]));
    editor.load("a.html").await.unwrap();

    assert_eq!(
        editor.on_edit("two".to_string()).await,
        EditOutcome::BecameDirty
    );
    assert_eq!(editor.on_edit("three".to_string()).await, EditOutcome::Updated);
    assert_eq!(editor.on_edit("three".to_string()).await, EditOutcome::Unchanged);

    assert_eq!(editor.session().phase(), SessionPhase::Dirty);
    assert_eq!(editor.surface().preview, "three");
    // The editable pane is the source of edits and is not rewritten
    assert_eq!(editor.surface().editor, "one");

    let view = editor.surface().last_view.clone().unwrap();
    assert!(view.publish_enabled);
    assert_eq!(view.status_line.as_deref(), Some("Page is modified"));
}

#[tokio::test]
async fn publish_returns_to_clean_and_clears_comment() {
    let mut editor = controller(MockStore::with_documents(&[("a.html", "one")]));
    editor.load("a.html").await.unwrap();
    editor.on_edit("two".to_string()).await;
    editor.set_comment("typo").await;

    editor.publish(None).await.unwrap();

    assert_eq!(editor.session().phase(), SessionPhase::Clean);
    assert_eq!(editor.session().comment(), "");
    let published = editor.store().published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].comment, "typo");
    assert_eq!(published[0].body, "two");
}

#[tokio::test]
async fn create_new_then_publish_sends_blank_body() {
    let mut editor = controller(MockStore::default());

    editor.create_new("foo.html").await.unwrap();
    editor.publish(Some("")).await.unwrap();

    let published = editor.store().published();
    assert_eq!(
        published,
        vec![Submission {
            filename: "foo.html".to_string(),
            comment: String::new(),
            body: BLANK_DOCUMENT.to_string(),
        }]
    );
    assert_eq!(editor.store().requests(), vec!["publish foo.html"]);
}

#[tokio::test]
async fn selecting_entry_loads_then_refreshes_listing() {
    let mut editor = controller(MockStore::with_documents(&[
        ("a.html", "<p>a</p>"),
        ("b.html", "<p>b</p>"),
    ]));

    editor.list_documents().await.unwrap();
    editor.select_index(0).await.unwrap();

    assert_eq!(
        editor.store().requests(),
        vec!["list", "fetch a.html", "list"]
    );
    assert_eq!(editor.session().filename(), Some("a.html"));
    assert_eq!(editor.surface().listings.len(), 2);
}

#[tokio::test]
async fn selecting_missing_entry_still_refreshes_listing() {
    let mut editor = controller(MockStore::with_documents(&[("a.html", "x")]));

    let result = editor.select("gone.html").await;

    assert!(matches!(
        result,
        Err(FolioError::RequestFailed { status: 404, .. })
    ));
    assert_eq!(editor.store().requests(), vec!["fetch gone.html", "list"]);
}

#[tokio::test]
async fn failed_load_leaves_session_unchanged() {
    let mut editor = controller(MockStore::with_documents(&[("a.html", "one")]));
    editor.load("a.html").await.unwrap();
    editor.on_edit("local edit".to_string()).await;

    editor.store().set_fail_fetch(true);
    let result = editor.load("b.html").await;

    assert!(matches!(result, Err(FolioError::Network(_))));
    assert_eq!(editor.session().phase(), SessionPhase::Dirty);
    assert_eq!(editor.session().filename(), Some("a.html"));
    assert_eq!(editor.session().content(), "local edit");
    assert_eq!(editor.surface().errors, vec!["network"]);
}

#[tokio::test]
async fn rejected_publish_keeps_dirty_state() {
    let mut editor = controller(MockStore::with_documents(&[("a.html", "one")]));
    editor.load("a.html").await.unwrap();
    editor.on_edit("two".to_string()).await;
    editor.store().set_reject_publish(true);

    let result = editor.publish(Some("attempt")).await;

    assert!(matches!(result, Err(FolioError::WriteRejected(_))));
    assert_eq!(editor.session().phase(), SessionPhase::Dirty);
    assert_eq!(editor.session().comment(), "attempt");
    assert_eq!(editor.surface().errors, vec!["write_rejected"]);
}

#[tokio::test]
async fn superseded_load_does_not_change_session() {
    let mut editor = controller(MockStore::with_documents(&[
        ("a.html", "one"),
        ("b.html", "bee"),
        ("c.html", "sea"),
    ]));
    editor.load("a.html").await.unwrap();

    let slow = editor.start_load("b.html").await.unwrap();
    let fast = editor.start_load("c.html").await.unwrap();

    let fetched_fast = editor.store().fetch(fast.filename()).await;
    assert_eq!(
        editor.finish_load(&fast, fetched_fast).await.unwrap(),
        LoadOutcome::Applied
    );

    let fetched_slow = editor.store().fetch(slow.filename()).await;
    assert_eq!(
        editor.finish_load(&slow, fetched_slow).await.unwrap(),
        LoadOutcome::Superseded
    );

    assert_eq!(editor.session().filename(), Some("c.html"));
    assert_eq!(editor.session().content(), "sea");
    assert_eq!(editor.surface().preview, "sea");
}

#[tokio::test]
async fn publish_while_loading_is_refused() {
    let mut editor = controller(MockStore::with_documents(&[("a.html", "one")]));
    editor.load("a.html").await.unwrap();
    let _ticket = editor.start_load("a.html").await.unwrap();

    let result = editor.publish(None).await;

    assert!(matches!(result, Err(FolioError::Session(_))));
    assert!(editor.store().published().is_empty());
}

#[tokio::test]
async fn rename_redirects_next_publish() {
    let mut editor = controller(MockStore::with_documents(&[("a.html", "one")]));
    editor.load("a.html").await.unwrap();

    editor.rename("b.html").await.unwrap();
    let view = editor.surface().last_view.clone().unwrap();
    assert_eq!(view.status_line.as_deref(), Some("Old name: a.html"));

    editor.publish(None).await.unwrap();
    assert_eq!(editor.store().published()[0].filename, "b.html");
    let view = editor.surface().last_view.clone().unwrap();
    assert!(view.status_line.is_none());
}

#[tokio::test]
async fn history_shows_versions_without_touching_session() {
    let mut editor = controller(MockStore::with_documents(&[
        ("a.html", "one"),
        ("b.html", "bee"),
    ]));
    editor.load("a.html").await.unwrap();

    editor.history(Some("b.html")).await.unwrap();
    editor.history(None).await.unwrap();

    assert_eq!(
        editor.surface().history,
        vec![("b.html".to_string(), 1), ("a.html".to_string(), 1)]
    );
    assert_eq!(editor.session().filename(), Some("a.html"));
}

#[tokio::test]
async fn invalid_name_is_reported_before_any_request() {
    let mut editor = controller(MockStore::default());

    assert!(editor.load("../escape.html").await.is_err());
    assert!(editor.create_new("").await.is_err());

    assert!(editor.store().requests().is_empty());
    assert_eq!(
        editor.surface().errors,
        vec!["invalid_filename", "invalid_filename"]
    );
}

#[tokio::test]
async fn controller_publishes_session_events() {
    let bus = Arc::new(InMemoryEventBus::new());
    let recorder = Arc::new(EventRecorder(Mutex::new(Vec::new())));
    bus.subscribe_system_events(recorder.clone()).await.unwrap();

    let mut editor = controller(MockStore::with_documents(&[("a.html", "one")]))
        .with_event_bus(bus.clone());
    editor.load("a.html").await.unwrap();
    editor.on_edit("two".to_string()).await;
    editor.on_edit("three".to_string()).await;
    editor.publish(None).await.unwrap();
    editor.store().set_fail_fetch(true);
    let _ = editor.load("a.html").await;

    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec![
            "document_loaded",
            "document_modified",
            "document_published",
            "error"
        ]
    );
}

#[tokio::test]
async fn load_fails_when_surface_cannot_show_document() {
    let mut editor = controller(MockStore::with_documents(&[("a.html", "one")]));
    editor.surface_mut().fail_editor = true;

    let err = editor.load("a.html").await.unwrap_err();
    assert_eq!(err.kind(), "file_system");
    assert_eq!(editor.surface().errors, vec!["file_system"]);
    assert!(!editor.session().is_ready());

    editor.surface_mut().fail_editor = false;
    editor.render().await.unwrap();
    assert!(editor.session().is_ready());
    assert_eq!(editor.surface().editor, "one");
    assert_eq!(editor.surface().preview, "one");
    assert_eq!(editor.on_edit("two".to_string()).await, EditOutcome::BecameDirty);
}
