//! Preview socket: pushes document replacements to the browser

use axum::extract::ws::{Message, WebSocket};
use folio_core::SystemEvent;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::hub::PreviewMessage;
use crate::PreviewState;

async fn send_message<S>(sink: &mut S, message: &PreviewMessage) -> bool
where
    S: SinkExt<Message> + Unpin,
{
    let text = match serde_json::to_string(message) {
        Ok(text) => text,
        Err(e) => {
            tracing::error!("Failed to encode preview message: {}", e);
            return false;
        }
    };
    sink.send(Message::Text(text)).await.is_ok()
}

/// Serve one preview client until it disconnects
pub(crate) async fn handle_preview_socket(socket: WebSocket, state: PreviewState) {
    let client_id = Uuid::new_v4();
    state
        .publish(SystemEvent::preview_client_connected(client_id))
        .await;

    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.hub.subscribe();

    let initial = PreviewMessage::from(state.hub.current().await);
    if send_message(&mut sender, &initial).await {
        loop {
            tokio::select! {
                update = updates.recv() => {
                    let document = match update {
                        Ok(document) => document,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!("Preview client {} skipped {} updates", client_id, skipped);
                            state.hub.current().await
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if !send_message(&mut sender, &PreviewMessage::from(document)).await {
                        break;
                    }
                }
                incoming = receiver.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<PreviewMessage>(&text) {
                                Ok(PreviewMessage::Ping) => {
                                    if !send_message(&mut sender, &PreviewMessage::Pong).await {
                                        break;
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    tracing::debug!("Ignoring preview client message: {}", e);
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::debug!("Preview socket error: {}", e);
                            break;
                        }
                    }
                }
            }
        }
    }

    state
        .publish(SystemEvent::preview_client_disconnected(client_id))
        .await;
}
