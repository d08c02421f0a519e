#[cfg(test)]
mod tests {
    use crate::error::{ErrorSeverity, FolioError};
    use crate::event::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    impl RecordingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        async fn seen(&self) -> Vec<String> {
            self.seen.lock().await.clone()
        }
    }

    #[async_trait]
    impl SystemEventHandler for RecordingHandler {
        async fn handle_system_event(&self, event: &SystemEvent) -> crate::Result<()> {
            self.seen.lock().await.push(event.event_type().to_string());
            Ok(())
        }

        fn handler_name(&self) -> &str {
            "RecordingHandler"
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl SystemEventHandler for FailingHandler {
        async fn handle_system_event(&self, _event: &SystemEvent) -> crate::Result<()> {
            Err(FolioError::generic("handler failure"))
        }
    }

    #[test]
    fn test_event_creation_helpers() {
        let file_event = SystemEvent::file_changed(PathBuf::from("page.html"), ChangeType::Modified);
        assert_eq!(file_event.event_type(), "file_changed");
        assert!(file_event.is_file_event());
        assert!(!file_event.is_document_event());

        let published =
            SystemEvent::document_published("a.html".to_string(), "typo".to_string(), 42);
        assert_eq!(published.event_type(), "document_published");
        assert!(published.is_document_event());
        assert_eq!(published.description(), "Published a.html (42 bytes): typo");

        let error = SystemEvent::from_error("store", &FolioError::network("refused"));
        assert!(error.is_error());
        assert!(error.description().starts_with("HIGH error from store"));
    }

    #[test]
    fn test_event_metadata() {
        let event = SystemEvent::document_renamed("old.html".to_string(), "new.html".to_string());
        let metadata = event.metadata();
        assert_eq!(metadata.get("from"), Some(&"old.html".to_string()));
        assert_eq!(metadata.get("to"), Some(&"new.html".to_string()));

        let event = SystemEvent::error(
            "preview".to_string(),
            "bind failed".to_string(),
            ErrorSeverity::Critical,
        );
        assert_eq!(event.metadata().get("severity"), Some(&"CRITICAL".to_string()));
    }

    #[test]
    fn test_event_json_round_trip() {
        let event = SystemEvent::listing_refreshed(3);
        let json = serde_json::to_string(&event).unwrap();
        let back: SystemEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.description(), event.description());
    }

    #[test]
    fn test_format_event_for_log() {
        let event = SystemEvent::document_loaded("index.html".to_string(), 10);
        let line = format_event_for_log(&event);
        assert!(line.contains("DOCUMENT_LOADED"));
        assert!(line.contains("Loaded index.html (10 bytes)"));
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = InMemoryEventBus::new();
        let first = RecordingHandler::new();
        let second = RecordingHandler::new();

        bus.subscribe_system_events(first.clone()).await.unwrap();
        bus.subscribe_system_events(second.clone()).await.unwrap();
        assert_eq!(bus.subscription_count().await, 2);

        bus.publish_system_event(SystemEvent::document_created("x.html".to_string()))
            .await
            .unwrap();

        assert_eq!(first.seen().await, vec!["document_created"]);
        assert_eq!(second.seen().await, vec!["document_created"]);
    }

    #[tokio::test]
    async fn test_filtered_subscription() {
        let bus = InMemoryEventBus::new();
        let handler = RecordingHandler::new();

        bus.subscribe_filtered(
            handler.clone(),
            Box::new(|event: &SystemEvent| event.is_file_event()),
        )
        .await
        .unwrap();

        bus.publish_system_event(SystemEvent::listing_refreshed(1))
            .await
            .unwrap();
        bus.publish_system_event(SystemEvent::file_changed(
            PathBuf::from("a.html"),
            ChangeType::Created,
        ))
        .await
        .unwrap();

        assert_eq!(handler.seen().await, vec!["file_changed"]);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_block_others() {
        let bus = InMemoryEventBus::new();
        let handler = RecordingHandler::new();

        bus.subscribe_system_events(Arc::new(FailingHandler))
            .await
            .unwrap();
        bus.subscribe_system_events(handler.clone()).await.unwrap();

        let result = bus
            .publish_system_event(SystemEvent::server_started("127.0.0.1:3000".to_string()))
            .await;
        assert!(result.is_ok());
        assert_eq!(handler.seen().await, vec!["server_started"]);
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = InMemoryEventBus::new();
        let handler = RecordingHandler::new();

        let id = bus.subscribe_system_events(handler.clone()).await.unwrap();
        bus.unsubscribe(id).await.unwrap();
        assert_eq!(bus.subscription_count().await, 0);
        assert!(bus.unsubscribe(id).await.is_err());

        bus.publish_system_event(SystemEvent::listing_refreshed(0))
            .await
            .unwrap();
        assert!(handler.seen().await.is_empty());
    }
}
