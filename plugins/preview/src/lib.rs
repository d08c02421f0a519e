//! Preview plugin: the page's read-only rendering surface
//!
//! Serves a page holding a sandboxed frame whose document is replaced
//! wholesale over a WebSocket every time the session renders.

pub mod handlers;
pub mod hub;
mod websocket;

pub use hub::{PreviewDocument, PreviewHub, PreviewMessage};

use async_trait::async_trait;
use axum::{
    extract::{Request, State, WebSocketUpgrade},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use folio_core::{
    EventBus, FolioError, Plugin, PluginContext, PluginStatus, PreviewConfig, Result, SystemEvent,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

/// One page served by the preview server
#[async_trait]
pub trait HttpHandler: Send + Sync {
    /// Exact request path served by this handler
    fn route(&self) -> &str;

    fn method(&self) -> Method {
        Method::GET
    }

    async fn handle(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// The parts of a request the preview handlers look at
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
}

impl HttpRequest {
    pub fn get(path: &str) -> Self {
        Self {
            method: Method::GET,
            path: path.to_string(),
        }
    }
}

/// Uncached response produced by a handler
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn with_type(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn html(content: &str) -> Self {
        Self::with_type(
            StatusCode::OK,
            "text/html; charset=utf-8",
            content.as_bytes().to_vec(),
        )
    }

    pub fn json<T: Serialize>(data: &T) -> Result<Self> {
        let body = serde_json::to_vec(data)
            .map_err(|e| FolioError::server(format!("Failed to encode preview state: {}", e)))?;
        Ok(Self::with_type(StatusCode::OK, "application/json", body))
    }

    /// Plain-text status page
    pub fn plain(status: StatusCode, message: &str) -> Self {
        Self::with_type(
            status,
            "text/plain; charset=utf-8",
            message.as_bytes().to_vec(),
        )
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

/// Handlers reachable through the router fallback
#[derive(Clone, Default)]
pub struct PreviewRoutes {
    handlers: Vec<Arc<dyn HttpHandler>>,
}

impl PreviewRoutes {
    /// The page, bare document and JSON state routes for `hub`
    pub fn for_hub(hub: Arc<PreviewHub>) -> Self {
        let mut routes = Self::default();
        routes.add(Arc::new(handlers::PreviewPageHandler::new(hub.clone())));
        routes.add(Arc::new(handlers::PreviewDocumentHandler::new(hub.clone())));
        routes.add(Arc::new(handlers::PreviewApiHandler::new(hub)));
        routes
    }

    pub fn add(&mut self, handler: Arc<dyn HttpHandler>) {
        debug!("Preview route {} {}", handler.method(), handler.route());
        self.handlers.push(handler);
    }

    /// Handler for `method` on `path`.
    ///
    /// A known path requested with another method yields
    /// `METHOD_NOT_ALLOWED`, an unknown path `NOT_FOUND`.
    pub fn resolve(
        &self,
        path: &str,
        method: &Method,
    ) -> std::result::Result<Arc<dyn HttpHandler>, StatusCode> {
        let mut path_known = false;
        for handler in &self.handlers {
            if handler.route() == path {
                if handler.method() == *method {
                    return Ok(handler.clone());
                }
                path_known = true;
            }
        }
        Err(if path_known {
            StatusCode::METHOD_NOT_ALLOWED
        } else {
            StatusCode::NOT_FOUND
        })
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Shared state of the preview router
#[derive(Clone)]
pub struct PreviewState {
    pub hub: Arc<PreviewHub>,
    pub routes: PreviewRoutes,
    pub event_bus: Option<Arc<dyn EventBus>>,
}

impl PreviewState {
    pub fn new(hub: Arc<PreviewHub>, event_bus: Option<Arc<dyn EventBus>>) -> Self {
        Self {
            routes: PreviewRoutes::for_hub(hub.clone()),
            hub,
            event_bus,
        }
    }

    pub(crate) async fn publish(&self, event: SystemEvent) {
        if let Some(bus) = &self.event_bus {
            if let Err(e) = bus.publish_system_event(event).await {
                warn!("Failed to publish preview event: {}", e);
            }
        }
    }
}

/// Build the preview router: `/ws` plus the page routes
pub fn build_router(state: PreviewState, enable_cors: bool) -> Router {
    let router = Router::new()
        .route("/ws", get(websocket_upgrade))
        .fallback(dispatch)
        .with_state(state);

    if enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

async fn websocket_upgrade(ws: WebSocketUpgrade, State(state): State<PreviewState>) -> Response {
    ws.on_upgrade(move |socket| websocket::handle_preview_socket(socket, state))
}

async fn dispatch(State(state): State<PreviewState>, req: Request) -> Response {
    let request = HttpRequest {
        method: req.method().clone(),
        path: req.uri().path().to_string(),
    };

    let handler = match state.routes.resolve(&request.path, &request.method) {
        Ok(handler) => handler,
        Err(status) => {
            debug!("{} {} -> {}", request.method, request.path, status);
            let reason = status.canonical_reason().unwrap_or("Error");
            return HttpResponse::plain(status, reason).into_response();
        }
    };

    let label = format!("{} {}", request.method, request.path);
    match handler.handle(request).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            error!("Preview handler failed for {}: {}", label, e);
            HttpResponse::plain(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
                .into_response()
        }
    }
}

/// Preview server plugin
pub struct PreviewPlugin {
    name: String,
    version: String,
    status: PluginStatus,
    config: Option<PreviewConfig>,
    hub: Arc<PreviewHub>,
    local_addr: Option<SocketAddr>,
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl PreviewPlugin {
    /// Create a plugin serving `hub`, configured from the plugin context
    pub fn new(hub: Arc<PreviewHub>) -> Self {
        Self {
            name: "preview".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: PluginStatus::Loading,
            config: None,
            hub,
            local_addr: None,
            server_handle: None,
        }
    }

    /// Create a plugin with explicit settings that override the context's
    pub fn with_config(config: PreviewConfig, hub: Arc<PreviewHub>) -> Self {
        Self {
            config: Some(config),
            ..Self::new(hub)
        }
    }

    pub fn hub(&self) -> Arc<PreviewHub> {
        self.hub.clone()
    }

    /// Address the server is bound to, once initialized
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

#[async_trait]
impl Plugin for PreviewPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn initialize(&mut self, context: &PluginContext) -> Result<()> {
        let config = self
            .config
            .clone()
            .unwrap_or_else(|| context.config.preview.clone());

        if !config.enabled {
            info!("Preview server disabled by configuration");
            self.status = PluginStatus::Disabled;
            return Ok(());
        }

        let state = PreviewState::new(self.hub.clone(), Some(context.event_bus.clone()));
        let router = build_router(state, config.cors_enabled);

        let addr = format!("{}:{}", config.hostname, config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| FolioError::server(format!("Failed to bind to {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        info!("Starting preview server on http://{}", local_addr);
        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("Preview server error: {}", e);
            }
        });

        self.local_addr = Some(local_addr);
        self.server_handle = Some(server_handle);
        self.status = PluginStatus::Active;

        context
            .event_bus
            .publish_system_event(SystemEvent::server_started(local_addr.to_string()))
            .await?;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<()> {
        if let Some(handle) = self.server_handle.take() {
            info!("Stopping preview server");
            handle.abort();
        }
        self.status = PluginStatus::Stopped;
        Ok(())
    }

    fn status(&self) -> PluginStatus {
        self.status.clone()
    }

    fn provided_services(&self) -> Vec<&str> {
        vec!["preview_server"]
    }
}
