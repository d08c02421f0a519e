use axum::http::StatusCode;
use axum_test::TestServer;
use folio_core::{
    Config, Event, EventBus, InMemoryEventBus, Plugin, PluginContext, PluginStatus,
    PreviewConfig, SystemEvent, SystemEventHandler,
};
use folio_preview::{
    build_router, handlers::PreviewApiHandler, HttpHandler, HttpRequest, PreviewDocument,
    PreviewHub, PreviewPlugin, PreviewState,
};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

struct EventLog(Mutex<Vec<String>>);

#[async_trait::async_trait]
impl SystemEventHandler for EventLog {
    async fn handle_system_event(&self, event: &SystemEvent) -> folio_core::Result<()> {
        self.0.lock().unwrap().push(event.event_type().to_string());
        Ok(())
    }
}

#[tokio::test]
async fn api_handler_reports_current_document() {
    let hub = Arc::new(PreviewHub::new());
    hub.replace_document(Some("a.html".to_string()), "<p>a</p>".to_string(), 7)
        .await;

    let handler = PreviewApiHandler::new(hub);
    let response = handler.handle(HttpRequest::get("/api/preview")).await.unwrap();

    let document: PreviewDocument = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(document.filename.as_deref(), Some("a.html"));
    assert_eq!(document.revision, 7);
    assert_eq!(document.html, "<p>a</p>");
}

#[tokio::test]
async fn preview_routes_serve_page_and_document() {
    let hub = Arc::new(PreviewHub::new());
    let server = TestServer::new(build_router(PreviewState::new(hub.clone(), None), true)).unwrap();

    let missing = server.get("/preview").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

    hub.replace_document(Some("a.html".to_string()), "<h1>A</h1>".to_string(), 1)
        .await;

    let page = server.get("/").await;
    assert_eq!(page.status_code(), StatusCode::OK);
    assert!(page.text().contains("Folio preview: a.html"));
    assert!(page.text().contains("new WebSocket"));

    let document = server.get("/preview").await;
    assert_eq!(document.status_code(), StatusCode::OK);
    assert_eq!(document.text(), "<h1>A</h1>");

    let api = server.get("/api/preview").await;
    let json: serde_json::Value = api.json();
    assert_eq!(json["revision"], 1);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let hub = Arc::new(PreviewHub::new());
    let app = build_router(PreviewState::new(hub, None), false);

    let response = app
        .oneshot(
            axum::http::Request::builder()
                .uri("/nope")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn websocket_pushes_replacements_and_answers_ping() {
    let hub = Arc::new(PreviewHub::new());
    hub.replace_document(Some("a.html".to_string()), "one".to_string(), 1)
        .await;

    let bus = Arc::new(InMemoryEventBus::new());
    let log = Arc::new(EventLog(Mutex::new(Vec::new())));
    bus.subscribe_system_events(log.clone()).await.unwrap();

    let router = build_router(PreviewState::new(hub.clone(), Some(bus)), true);
    let server = TestServer::builder()
        .http_transport()
        .build(router)
        .unwrap();

    let mut socket = server.get_websocket("/ws").await.into_websocket().await;

    let initial: serde_json::Value = socket.receive_json().await;
    assert_eq!(initial["type"], "document");
    assert_eq!(initial["html"], "one");

    hub.replace_document(Some("a.html".to_string()), "two".to_string(), 2)
        .await;
    let update: serde_json::Value = socket.receive_json().await;
    assert_eq!(update["html"], "two");
    assert_eq!(update["revision"], 2);

    socket.send_json(&serde_json::json!({"type": "ping"})).await;
    let pong: serde_json::Value = socket.receive_json().await;
    assert_eq!(pong, serde_json::json!({"type": "pong"}));

    assert_eq!(
        log.0.lock().unwrap().first().map(String::as_str),
        Some("preview_client_connected")
    );
}

#[tokio::test]
async fn plugin_binds_and_announces_address() {
    let bus: Arc<dyn EventBus> = Arc::new(InMemoryEventBus::new());
    let log = Arc::new(EventLog(Mutex::new(Vec::new())));
    bus.subscribe_system_events(log.clone()).await.unwrap();
    let context = PluginContext::new(bus, Arc::new(Config::new()));

    let config = PreviewConfig {
        hostname: "127.0.0.1".to_string(),
        port: 0,
        ..PreviewConfig::default()
    };
    let mut plugin = PreviewPlugin::with_config(config, Arc::new(PreviewHub::new()));
    plugin.initialize(&context).await.unwrap();

    assert_eq!(plugin.status(), PluginStatus::Active);
    assert!(plugin.local_addr().unwrap().port() > 0);
    assert_eq!(*log.0.lock().unwrap(), vec!["server_started"]);

    plugin.shutdown().await.unwrap();
    assert_eq!(plugin.status(), PluginStatus::Stopped);
}

#[tokio::test]
async fn disabled_plugin_does_not_bind() {
    let context = PluginContext::new(Arc::new(InMemoryEventBus::new()), Arc::new(Config::new()));
    let config = PreviewConfig {
        enabled: false,
        ..PreviewConfig::default()
    };

    let mut plugin = PreviewPlugin::with_config(config, Arc::new(PreviewHub::new()));
    plugin.initialize(&context).await.unwrap();

    assert_eq!(plugin.status(), PluginStatus::Disabled);
    assert!(plugin.local_addr().is_none());
}
