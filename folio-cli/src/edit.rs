//! Interactive edit session
//!
//! One `select!` loop owns the controller and processes console lines,
//! working copy changes and Ctrl+C one at a time.

use async_trait::async_trait;
use folio_core::event::format_event_for_log;
use folio_core::{
    ChangeType, Config, CoreEngine, DocumentStore, EventBus, PageSurface, SystemEvent,
    SystemEventHandler,
};
use folio_editor::EditorController;
use folio_file_watcher::{FileWatcherPlugin, WorkingCopy};
use folio_preview::{PreviewHub, PreviewPlugin};
use folio_store::HttpStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::console::{parse_command, ConsoleCommand, Selection, HELP};
use crate::surface::ConsoleSurface;

/// What to open when the session starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOptions {
    pub name: String,
    pub new: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Forwards working copy changes into the session loop
struct ChangeForwarder(mpsc::UnboundedSender<PathBuf>);

#[async_trait]
impl SystemEventHandler for ChangeForwarder {
    async fn handle_system_event(&self, event: &SystemEvent) -> folio_core::Result<()> {
        if let SystemEvent::FileChanged {
            path, change_type, ..
        } = event
        {
            if *change_type != ChangeType::Deleted {
                let _ = self.0.send(path.clone());
            }
        }
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "change-forwarder"
    }
}

/// Logs every event and announces where the preview is served
struct SessionLog;

#[async_trait]
impl SystemEventHandler for SessionLog {
    async fn handle_system_event(&self, event: &SystemEvent) -> folio_core::Result<()> {
        debug!("{}", format_event_for_log(event));
        if let SystemEvent::ServerStarted { address, .. } = event {
            println!("Preview at http://{}/", address);
        }
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "session-log"
    }
}

/// Feed a changed working copy file into the session when it backs the
/// open document
pub async fn apply_file_change<S: DocumentStore>(
    controller: &mut EditorController<S, ConsoleSurface>,
    working_copy: &WorkingCopy,
    path: &std::path::Path,
) {
    let Some(changed) = working_copy.filename_for(path) else {
        return;
    };
    match controller.session().filename() {
        Some(current) if current == changed => {}
        Some(current) => {
            let edited_at = working_copy
                .path_for(current)
                .map(|path| path.display().to_string())
                .unwrap_or_else(|_| current.to_string());
            warn!(
                "Ignoring saved changes to {}: the open page is {}, edited at {}",
                changed, current, edited_at
            );
            return;
        }
        None => {
            debug!("Ignoring change to {} with no page open", changed);
            return;
        }
    }

    match working_copy.read(&changed).await {
        Ok(content) => {
            controller.on_edit(content).await;
        }
        Err(e) => debug!("Skipping unreadable change to {}: {}", changed, e),
    }
}

/// Run one console command. Controller failures are already reported by
/// the surface.
pub async fn execute<S, V>(controller: &mut EditorController<S, V>, command: ConsoleCommand) -> Flow
where
    S: DocumentStore,
    V: PageSurface,
{
    match command {
        ConsoleCommand::Publish(comment) => {
            if controller.publish(comment.as_deref()).await.is_ok() {
                println!("Published");
            }
        }
        ConsoleCommand::Comment(text) => controller.set_comment(&text).await,
        ConsoleCommand::Open(name) => {
            let _ = controller.load(&name).await;
        }
        ConsoleCommand::New(name) => {
            let _ = controller.create_new(&name).await;
        }
        ConsoleCommand::Rename(name) => {
            let _ = controller.rename(&name).await;
        }
        ConsoleCommand::List => {
            let _ = controller.list_documents().await;
        }
        ConsoleCommand::Select(Selection::Index(index)) => {
            let _ = controller.select_index(index).await;
        }
        ConsoleCommand::Select(Selection::Name(name)) => {
            let _ = controller.select(&name).await;
        }
        ConsoleCommand::History(name) => {
            let _ = controller.history(name.as_deref()).await;
        }
        ConsoleCommand::Info => {
            let session = controller.session();
            println!("Page:    {}", session.filename().unwrap_or("(none)"));
            println!("State:   {}", session.phase());
            println!("Ready:   {}", session.is_ready());
            println!("Bytes:   {}", session.content().len());
            if !session.comment().is_empty() {
                println!("Comment: {}", session.comment());
            }
        }
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit { force } => {
            if controller.session().is_dirty() && !force {
                println!("The page has unpublished changes; publish first or use quit!");
            } else {
                return Flow::Quit;
            }
        }
    }
    Flow::Continue
}

/// Start the preview and watcher plugins and run the session until quit
pub async fn run_edit(config: Config, options: EditOptions) -> anyhow::Result<()> {
    let preview_enabled = config.preview.enabled;
    let mut engine = CoreEngine::new(config);
    let config = engine.config();
    let event_bus = engine.event_bus();

    let (change_sender, mut changes) = mpsc::unbounded_channel();
    event_bus
        .subscribe_filtered(
            Arc::new(ChangeForwarder(change_sender)),
            Box::new(|event: &SystemEvent| event.is_file_event()),
        )
        .await?;
    event_bus.subscribe_system_events(Arc::new(SessionLog)).await?;

    let hub = Arc::new(PreviewHub::new());
    engine
        .register_plugin(Box::new(PreviewPlugin::new(hub.clone())))
        .await?;
    engine
        .register_plugin(Box::new(FileWatcherPlugin::new()))
        .await?;

    let working_copy = WorkingCopy::open(&config.editor.working_dir).await?;
    let store = HttpStore::new(&config.store)?;
    info!(
        "Editing against {} with working copy {}",
        store.base_url(),
        working_copy.root().display()
    );

    let surface = ConsoleSurface::new(working_copy.clone(), preview_enabled.then_some(hub));
    let mut controller =
        EditorController::new(store, surface, config.editor.blank_template.clone())
            .with_event_bus(event_bus.clone());

    let _ = if options.new {
        controller.create_new(&options.name).await
    } else {
        controller.load(&options.name).await
    };
    println!("Type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Some(command)) => {
                        if execute(&mut controller, command).await == Flow::Quit {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("{}", message),
                },
                Ok(None) => {
                    info!("Console closed");
                    break;
                }
                Err(e) => {
                    error!("Failed to read console input: {}", e);
                    break;
                }
            },
            Some(path) = changes.recv() => {
                apply_file_change(&mut controller, &working_copy, &path).await;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("Shutdown signal received");
                break;
            }
        }
    }

    if controller.session().is_dirty() {
        if let Some(path) = controller.surface().current_file() {
            println!("Unpublished changes remain in {}", path.display());
        }
    }

    engine.shutdown().await?;
    info!("Edit session closed");
    Ok(())
}
