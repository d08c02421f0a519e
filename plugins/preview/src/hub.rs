//! Shared preview document and its change feed

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

/// The document currently shown in the preview frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewDocument {
    pub filename: Option<String>,
    pub revision: u64,
    pub html: String,
}

/// Messages exchanged over the preview socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PreviewMessage {
    Document {
        filename: Option<String>,
        revision: u64,
        html: String,
    },
    Ping,
    Pong,
}

impl From<PreviewDocument> for PreviewMessage {
    fn from(document: PreviewDocument) -> Self {
        PreviewMessage::Document {
            filename: document.filename,
            revision: document.revision,
            html: document.html,
        }
    }
}

/// Holds the preview document and fans replacements out to every socket
pub struct PreviewHub {
    current: RwLock<PreviewDocument>,
    sender: broadcast::Sender<PreviewDocument>,
}

impl PreviewHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(16);
        Self {
            current: RwLock::new(PreviewDocument::default()),
            sender,
        }
    }

    /// Replace the preview document wholesale.
    ///
    /// Returns the number of connected clients that were notified.
    pub async fn replace_document(
        &self,
        filename: Option<String>,
        html: String,
        revision: u64,
    ) -> usize {
        let document = PreviewDocument {
            filename,
            revision,
            html,
        };
        *self.current.write().await = document.clone();

        match self.sender.send(document) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::trace!("No preview clients connected");
                0
            }
        }
    }

    pub async fn current(&self) -> PreviewDocument {
        self.current.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreviewDocument> {
        self.sender.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PreviewHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_document_notifies_subscribers() {
        let hub = PreviewHub::new();
        let mut updates = hub.subscribe();

        let notified = hub
            .replace_document(Some("a.html".to_string()), "<p>a</p>".to_string(), 1)
            .await;
        assert_eq!(notified, 1);

        let update = updates.recv().await.unwrap();
        assert_eq!(update.html, "<p>a</p>");
        assert_eq!(hub.current().await, update);
    }

    #[tokio::test]
    async fn test_replace_without_clients() {
        let hub = PreviewHub::new();
        let notified = hub.replace_document(None, "x".to_string(), 3).await;
        assert_eq!(notified, 0);
        assert_eq!(hub.current().await.revision, 3);
    }

    #[test]
    fn test_message_wire_format() {
        let message = PreviewMessage::from(PreviewDocument {
            filename: Some("a.html".to_string()),
            revision: 2,
            html: "<b>hi</b>".to_string(),
        });
        let json: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "document");
        assert_eq!(json["filename"], "a.html");
        assert_eq!(json["revision"], 2);

        let ping: PreviewMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, PreviewMessage::Ping);
        assert_eq!(
            serde_json::to_string(&PreviewMessage::Pong).unwrap(),
            r#"{"type":"pong"}"#
        );
    }
}
