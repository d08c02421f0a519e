//! HTTP handlers serving the preview page and document

use async_trait::async_trait;
use axum::http::StatusCode;
use folio_core::Result;
use std::sync::Arc;

use crate::hub::{PreviewDocument, PreviewHub};
use crate::{HttpHandler, HttpRequest, HttpResponse};

/// Serves the preview page with the sandboxed frame
pub struct PreviewPageHandler {
    hub: Arc<PreviewHub>,
}

impl PreviewPageHandler {
    pub fn new(hub: Arc<PreviewHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl HttpHandler for PreviewPageHandler {
    fn route(&self) -> &str {
        "/"
    }

    async fn handle(&self, _request: HttpRequest) -> Result<HttpResponse> {
        let document = self.hub.current().await;
        Ok(HttpResponse::html(&render_preview_page(&document)))
    }
}

/// Serves the bare document markup shown in the frame
pub struct PreviewDocumentHandler {
    hub: Arc<PreviewHub>,
}

impl PreviewDocumentHandler {
    pub fn new(hub: Arc<PreviewHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl HttpHandler for PreviewDocumentHandler {
    fn route(&self) -> &str {
        "/preview"
    }

    async fn handle(&self, _request: HttpRequest) -> Result<HttpResponse> {
        let document = self.hub.current().await;
        if document.filename.is_none() && document.html.is_empty() {
            return Ok(HttpResponse::plain(
                StatusCode::NOT_FOUND,
                "No document loaded",
            ));
        }
        Ok(HttpResponse::html(&document.html))
    }
}

/// Serves the preview state as JSON
pub struct PreviewApiHandler {
    hub: Arc<PreviewHub>,
}

impl PreviewApiHandler {
    pub fn new(hub: Arc<PreviewHub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl HttpHandler for PreviewApiHandler {
    fn route(&self) -> &str {
        "/api/preview"
    }

    async fn handle(&self, _request: HttpRequest) -> Result<HttpResponse> {
        HttpResponse::json(&self.hub.current().await)
    }
}

/// Build the preview page for `document`
pub fn render_preview_page(document: &PreviewDocument) -> String {
    let title = match &document.filename {
        Some(name) => format!("Folio preview: {}", name),
        None => "Folio preview".to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>
        html, body {{ margin: 0; height: 100%; font-family: sans-serif; }}
        #bar {{ padding: 4px 8px; font-size: 12px; background: #f3f3f3; border-bottom: 1px solid #ddd; }}
        #page {{ border: 0; width: 100%; height: calc(100% - 26px); }}
    </style>
</head>
<body>
    <div id="bar"><span id="name">{name}</span> <span id="state">revision {revision}</span></div>
    <iframe id="page" sandbox="" srcdoc="{srcdoc}"></iframe>
    <script>
        (function () {{
            var frame = document.getElementById("page");
            var state = document.getElementById("state");
            var name = document.getElementById("name");
            var revision = {revision};

            function connect() {{
                var protocol = location.protocol === "https:" ? "wss:" : "ws:";
                var socket = new WebSocket(protocol + "//" + location.host + "/ws");
                var ping = null;

                socket.onopen = function () {{
                    state.textContent = "revision " + revision;
                    ping = setInterval(function () {{
                        socket.send(JSON.stringify({{ type: "ping" }}));
                    }}, 30000);
                }};
                socket.onmessage = function (event) {{
                    var message = JSON.parse(event.data);
                    if (message.type === "document" && message.revision >= revision) {{
                        revision = message.revision;
                        frame.srcdoc = message.html;
                        name.textContent = message.filename || "";
                        document.title = message.filename ? "Folio preview: " + message.filename : "Folio preview";
                        state.textContent = "revision " + revision;
                    }}
                }};
                socket.onclose = function () {{
                    clearInterval(ping);
                    state.textContent = "disconnected, retrying";
                    setTimeout(connect, 1000);
                }};
            }}

            connect();
        }})();
    </script>
</body>
</html>
"#,
        title = html_escape::encode_text(&title),
        name = html_escape::encode_text(document.filename.as_deref().unwrap_or("")),
        revision = document.revision,
        srcdoc = html_escape::encode_double_quoted_attribute(&document.html),
    )
}
