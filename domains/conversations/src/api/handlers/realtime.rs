//! Transport adapter
//!
//! One task per socket reads client frames and feeds them through the same
//! `Messenger` the HTTP handlers use. A second task drains the connection's
//! outbound queue into the socket, so broadcasts never wait on a slow peer.

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use staybook_auth::SocketUser;
use staybook_common::{Error, Result};
use uuid::Uuid;

use crate::api::middleware::ConversationsState;
use crate::realtime::events::{MarkMessagesRead, SendMessage, Typing};
use crate::realtime::{ClientEvent, ConnectionId, ServerEvent};

/// Upgrade to the transport. The caller's personal room is joined immediately.
pub async fn connect(
    SocketUser(identity): SocketUser,
    State(state): State<ConversationsState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(state, identity.user_id, socket))
}

async fn serve_socket(state: ConversationsState, user_id: Uuid, socket: WebSocket) {
    let (connection_id, mut outbound) = state.gateway.connect(user_id);
    tracing::info!(connection_id = %connection_id, user_id = %user_id, "Socket connected");

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode server event");
                    continue;
                }
            };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let session = ClientSession::new(state.clone(), connection_id, user_id);

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => session.handle_frame(text.as_str()).await,
            Ok(WsMessage::Close(_)) => break,
            // ping/pong handled by the transport
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Socket read failed");
                break;
            }
        }
    }

    state.gateway.disconnect(connection_id);
    writer.abort();
    tracing::info!(connection_id = %connection_id, user_id = %user_id, "Socket disconnected");
}

/// The per-connection event handler, independent of the socket itself
pub struct ClientSession {
    state: ConversationsState,
    connection_id: ConnectionId,
    user_id: Uuid,
}

impl ClientSession {
    pub fn new(state: ConversationsState, connection_id: ConnectionId, user_id: Uuid) -> Self {
        Self {
            state,
            connection_id,
            user_id,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Parse and dispatch one text frame. Failures are reported to this
    /// connection only.
    pub async fn handle_frame(&self, text: &str) {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                self.reply_error(
                    &Error::Validation(format!("Malformed event: {}", e)),
                    None,
                );
                return;
            }
        };

        let name = event.name();
        if let Err(e) = self.handle_event(event).await {
            tracing::debug!(
                connection_id = %self.connection_id,
                event = name,
                error = %e,
                "Event rejected"
            );
            self.reply_error(&e, Some(name));
        }
    }

    pub async fn handle_event(&self, event: ClientEvent) -> Result<()> {
        match event {
            ClientEvent::JoinConversation(conversation_id) => {
                self.state
                    .messenger
                    .service()
                    .get_for_participant(conversation_id, self.user_id)
                    .await?;
                self.state
                    .gateway
                    .join_conversation(self.connection_id, conversation_id);
                Ok(())
            }
            ClientEvent::LeaveConversation(conversation_id) => {
                self.state
                    .gateway
                    .leave_conversation(self.connection_id, conversation_id);
                Ok(())
            }
            ClientEvent::SendMessage(SendMessage {
                conversation_id,
                message,
                sender_id,
            }) => {
                self.check_identity(sender_id)?;
                self.state
                    .messenger
                    .send_message(conversation_id, self.user_id, &message)
                    .await?;
                Ok(())
            }
            ClientEvent::TypingStart(typing) => self.relay_typing(typing, true),
            ClientEvent::TypingStop(typing) => self.relay_typing(typing, false),
            ClientEvent::MarkMessagesRead(MarkMessagesRead {
                conversation_id,
                user_id,
            }) => {
                self.check_identity(user_id)?;
                self.state
                    .messenger
                    .mark_read(conversation_id, self.user_id)
                    .await?;
                Ok(())
            }
        }
    }

    fn relay_typing(&self, typing: Typing, is_typing: bool) -> Result<()> {
        self.check_identity(typing.user_id)?;
        if !self
            .state
            .gateway
            .is_joined(self.connection_id, typing.conversation_id)
        {
            return Err(Error::Authorization(
                "Join the conversation before sending typing events".to_string(),
            ));
        }
        self.state
            .gateway
            .broadcast_typing(typing.conversation_id, self.user_id, is_typing);
        Ok(())
    }

    fn check_identity(&self, claimed: Option<Uuid>) -> Result<()> {
        match claimed {
            Some(user_id) if user_id != self.user_id => Err(Error::Authorization(
                "Event user does not match the connection".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn reply_error(&self, error: &Error, event: Option<&str>) {
        self.state
            .gateway
            .send_to(self.connection_id, ServerEvent::error(error, event));
    }
}
