//! Event router between sessions, the message store and the conversation directory.

use std::collections::BTreeSet;
use std::sync::Arc;

use database::validation::{require_opt, validate_content};
use database::{conversation, message, Conversation, Database, Message, MessageStatus, NewMessage};
use tracing::{debug, error, info};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::events::{
    ClientEvent, ErrorNotice, JoinChat, MessageNotification, SendMessage, ServerEvent, StatusAck,
    StatusUpdate, Typing, TypingIndicator,
};
use crate::registry::{SessionHandle, SessionId, SessionRegistry};

/// Entry point a send came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOrigin {
    /// `send_message` over a realtime session.
    Realtime(SessionId),
    /// The synchronous HTTP endpoint.
    Rest,
}

/// Routes client events: validate, persist, then broadcast.
///
/// Cheap to clone; clones share the database pool and the registry.
#[derive(Clone)]
pub struct Gateway {
    db: Database,
    registry: Arc<SessionRegistry>,
    config: GatewayConfig,
}

impl Gateway {
    pub fn new(db: Database, registry: Arc<SessionRegistry>, config: GatewayConfig) -> Self {
        Self {
            db,
            registry,
            config,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Register a connection, placing it in its personal room when a phone
    /// number was supplied.
    pub async fn connect(&self, phone_number: Option<&str>) -> SessionHandle {
        let handle = self.registry.register().await;

        match phone_number.map(str::trim).filter(|p| !p.is_empty()) {
            Some(phone) => {
                self.registry.join_personal(handle.id, phone).await;
                info!(session = %handle.id, phone = %phone, "Session connected");
            }
            None => info!(session = %handle.id, "Session connected without phone number"),
        }

        handle
    }

    /// Release every room held by a session. Persisted state is untouched.
    pub async fn disconnect(&self, session: SessionId) {
        self.registry.drop_session(session).await;
    }

    /// Decode and handle one text frame. Failures are logged, and reported
    /// back to the session when `report_errors` is enabled.
    pub async fn handle_frame(&self, session: SessionId, frame: &str) {
        let event = match ClientEvent::from_frame(frame) {
            Ok(event) => event,
            Err(err) => {
                self.reject(session, "unknown", &GatewayError::Malformed(err.to_string()))
                    .await;
                return;
            }
        };

        if self.handle_event(session, event).await.is_ok() {
            debug!(session = %session, "Frame handled");
        }
    }

    /// Handle one decoded event.
    ///
    /// Nothing is broadcast for a rejected or failed event.
    pub async fn handle_event(&self, session: SessionId, event: ClientEvent) -> Result<()> {
        let name = event.name();
        let result = match event {
            ClientEvent::JoinChat(join) => self.join_chat(session, join).await,
            ClientEvent::SendMessage(send) => self.send_message(session, send).await.map(|_| ()),
            ClientEvent::MessageDelivered(ack) => {
                self.acknowledge(ack, MessageStatus::Delivered).await
            }
            ClientEvent::MessageRead(ack) => self.acknowledge(ack, MessageStatus::Read).await,
            ClientEvent::Typing(typing) => self.typing(session, typing).await,
        };

        if let Err(ref err) = result {
            self.reject(session, name, err).await;
        }
        result
    }

    /// Persist a message, update the conversation summary and, for realtime
    /// sends (and REST sends when `fanout_rest_sends` is set), broadcast it.
    ///
    /// This is the single send path shared by every entry point.
    pub async fn submit_message(&self, draft: NewMessage, origin: SendOrigin) -> Result<Message> {
        let (message, chat) = message::append_with_summary(self.db.pool(), &draft).await?;

        let fan_out = match origin {
            SendOrigin::Realtime(_) => true,
            SendOrigin::Rest => self.config.fanout_rest_sends,
        };
        if fan_out {
            self.fan_out(&chat, &message).await;
        }

        info!(
            message_id = %message.id,
            chat_id = %message.chat_id,
            sender = %message.sender,
            kind = %message.kind,
            origin = ?origin,
            "Message accepted"
        );
        Ok(message)
    }

    async fn join_chat(&self, session: SessionId, join: JoinChat) -> Result<()> {
        let chat_id = require_opt("chatId", join.chat_id.as_deref())?;

        if self.config.enforce_membership {
            let chat = conversation::get_conversation(self.db.pool(), chat_id).await?;
            let phone = self
                .registry
                .phone_number(session)
                .await
                .ok_or_else(|| GatewayError::Forbidden("session has no phone number".to_string()))?;
            if !chat.has_participant(&phone) {
                return Err(GatewayError::Forbidden(format!(
                    "{} is not a participant of {}",
                    phone, chat_id
                )));
            }
        }

        if !self.registry.join_conversation(session, chat_id).await {
            return Err(GatewayError::UnknownSession(session));
        }
        Ok(())
    }

    async fn send_message(&self, session: SessionId, send: SendMessage) -> Result<Message> {
        let chat_id = require_opt("chatId", send.chat_id.as_deref())?;
        let sender = require_opt("sender", send.sender.as_deref())?;
        let kind = require_opt("type", send.kind.as_deref())?;
        let content = validate_content(send.content.as_deref().unwrap_or_default())?;

        if self.config.enforce_membership {
            self.require_identity(session, sender).await?;
            let chat = conversation::get_conversation(self.db.pool(), chat_id).await?;
            if !chat.has_participant(sender) {
                return Err(GatewayError::Forbidden(format!(
                    "{} is not a participant of {}",
                    sender, chat_id
                )));
            }
        }

        let draft = NewMessage {
            chat_id: chat_id.to_string(),
            sender: sender.to_string(),
            kind: kind.to_string(),
            content: content.to_string(),
            meta: send.meta,
        };
        self.submit_message(draft, SendOrigin::Realtime(session)).await
    }

    async fn acknowledge(&self, ack: StatusAck, status: MessageStatus) -> Result<()> {
        let message_id = require_opt("messageId", ack.message_id.as_deref())?;

        let change = message::advance_status(self.db.pool(), message_id, status)
            .await?
            .ok_or_else(|| GatewayError::MessageNotFound(message_id.to_string()))?;

        // The stored status is reported, so a stale acknowledgement never
        // shows up as a regression.
        let update = ServerEvent::MessageStatus(StatusUpdate {
            message_id: change.message.id.clone(),
            status: change.message.status,
            by: ack.by.filter(|b| !b.trim().is_empty()),
        });
        let reached = self
            .registry
            .broadcast_to_conversation(&change.message.chat_id, &update, None)
            .await;

        debug!(
            message_id = %change.message.id,
            status = %change.message.status,
            advanced = change.advanced,
            reached,
            "Status broadcast"
        );
        Ok(())
    }

    async fn typing(&self, session: SessionId, typing: Typing) -> Result<()> {
        let chat_id = require_opt("chatId", typing.chat_id.as_deref())?;
        let sender = require_opt("sender", typing.sender.as_deref())?;

        if self.config.enforce_membership {
            self.require_identity(session, sender).await?;
        }

        let indicator = ServerEvent::Typing(TypingIndicator {
            chat_id: chat_id.to_string(),
            sender: sender.to_string(),
            is_typing: typing.is_typing.unwrap_or(false),
        });
        self.registry
            .broadcast_to_conversation(chat_id, &indicator, Some(session))
            .await;
        Ok(())
    }

    async fn fan_out(&self, chat: &Conversation, message: &Message) {
        let reached = self
            .registry
            .broadcast_to_conversation(&chat.id, &ServerEvent::Message(message.clone()), None)
            .await;

        let notice = ServerEvent::NewMessageNotification(MessageNotification {
            chat_id: chat.id.clone(),
            message: message.clone(),
        });
        let mut notified = 0;
        let participants: BTreeSet<&str> = chat.participants.iter().map(String::as_str).collect();
        for participant in participants {
            notified += self.registry.broadcast_to_personal(participant, &notice).await;
        }

        debug!(
            message_id = %message.id,
            chat_id = %chat.id,
            reached,
            notified,
            "Message fanned out"
        );
    }

    async fn require_identity(&self, session: SessionId, claimed: &str) -> Result<()> {
        match self.registry.phone_number(session).await {
            Some(phone) if phone == claimed => Ok(()),
            Some(phone) => Err(GatewayError::Forbidden(format!(
                "session of {} cannot act as {}",
                phone, claimed
            ))),
            None => Err(GatewayError::Forbidden(
                "session has no phone number".to_string(),
            )),
        }
    }

    async fn reject(&self, session: SessionId, event: &str, err: &GatewayError) {
        if err.is_client_error() {
            debug!(session = %session, event = %event, error = %err, "Dropped event");
        } else {
            error!(session = %session, event = %event, error = %err, "Event failed");
        }

        if self.config.report_errors {
            self.registry
                .send_to(
                    session,
                    ServerEvent::Error(ErrorNotice {
                        event: event.to_string(),
                        message: err.to_string(),
                    }),
                )
                .await;
        }
    }
}
