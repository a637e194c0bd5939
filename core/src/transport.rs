//! Chat surface abstraction.
//!
//! RULE: presentation failures (edit, delete) are logged and swallowed.
//! They never abort a flow transition.

use crate::{
    error::{DeskError, DeskResult},
    types::{ChatId, FileRef, MessageId},
    workflow::Action,
};
use async_trait::async_trait;
use log::warn;
use serde::Serialize;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Button {
    pub label:  String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Rows of buttons.
pub type Keyboard = Vec<Vec<Button>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub text:     String,
    pub keyboard: Keyboard,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text:     text.into(),
            keyboard: Vec::new(),
        }
    }

    pub fn with_row(mut self, row: Vec<Button>) -> Self {
        if !row.is_empty() {
            self.keyboard.push(row);
        }
        self
    }

    pub fn has_action(&self, action: &Action) -> bool {
        self.keyboard.iter().flatten().any(|b| &b.action == action)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, message: &OutboundMessage) -> DeskResult<MessageId>;

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: &OutboundMessage,
    ) -> DeskResult<()>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> DeskResult<()>;

    async fn send_album(
        &self,
        chat_id: ChatId,
        files: &[FileRef],
        caption: Option<&str>,
    ) -> DeskResult<Vec<MessageId>>;
}

/// Edit `message_id` in place, falling back to a fresh message when the
/// edit fails. Returns the id of the message now showing `message`.
pub async fn safe_edit(
    transport: &dyn Transport,
    chat_id: ChatId,
    message_id: MessageId,
    message: &OutboundMessage,
) -> Option<MessageId> {
    match transport.edit_text(chat_id, message_id, message).await {
        Ok(()) => Some(message_id),
        Err(e) => {
            warn!("edit of message {message_id} in chat {chat_id} failed: {e}");
            safe_send(transport, chat_id, message).await
        }
    }
}

pub async fn safe_send(
    transport: &dyn Transport,
    chat_id: ChatId,
    message: &OutboundMessage,
) -> Option<MessageId> {
    match transport.send_text(chat_id, message).await {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("send to chat {chat_id} failed: {e}");
            None
        }
    }
}

pub async fn safe_delete(transport: &dyn Transport, chat_id: ChatId, message_id: MessageId) {
    if let Err(e) = transport.delete_message(chat_id, message_id).await {
        warn!("delete of message {message_id} in chat {chat_id} failed: {e}");
    }
}

// ── Recording transport ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Sent {
    Text {
        chat_id:    ChatId,
        message_id: MessageId,
        message:    OutboundMessage,
    },
    Edit {
        chat_id:    ChatId,
        message_id: MessageId,
        message:    OutboundMessage,
    },
    Delete {
        chat_id:    ChatId,
        message_id: MessageId,
    },
    Album {
        chat_id: ChatId,
        files:   Vec<FileRef>,
        caption: Option<String>,
    },
}

#[derive(Default)]
struct Recorded {
    next_id: MessageId,
    sent:    Vec<Sent>,
}

/// In-memory transport that records every call, for tests.
#[derive(Default)]
pub struct RecordingTransport {
    inner:      Mutex<Recorded>,
    fail_edits: bool,
    fail_chat:  Option<ChatId>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every edit fails, exercising the send fallback.
    pub fn failing_edits() -> Self {
        Self {
            fail_edits: true,
            ..Self::default()
        }
    }

    /// Every call addressed to `chat_id` fails.
    pub fn unreachable_chat(chat_id: ChatId) -> Self {
        Self {
            fail_chat: Some(chat_id),
            ..Self::default()
        }
    }

    fn record(&self, chat_id: ChatId, build: impl FnOnce(MessageId) -> Sent) -> DeskResult<MessageId> {
        if self.fail_chat == Some(chat_id) {
            return Err(DeskError::Transport(format!("chat {chat_id} unreachable")));
        }
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| DeskError::Transport("recording lock poisoned".into()))?;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.sent.push(build(id));
        Ok(id)
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.inner.lock().map(|i| i.sent.clone()).unwrap_or_default()
    }

    /// Most recent message shown in `chat_id`, whether sent or edited in.
    pub fn last_message(&self, chat_id: ChatId) -> Option<OutboundMessage> {
        self.sent().into_iter().rev().find_map(|s| match s {
            Sent::Text { chat_id: c, message, .. } | Sent::Edit { chat_id: c, message, .. }
                if c == chat_id =>
            {
                Some(message)
            }
            _ => None,
        })
    }

    pub fn last_text(&self, chat_id: ChatId) -> String {
        self.last_message(chat_id).map(|m| m.text).unwrap_or_default()
    }

    /// All texts shown in `chat_id`, oldest first.
    pub fn texts(&self, chat_id: ChatId) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Text { chat_id: c, message, .. } | Sent::Edit { chat_id: c, message, .. }
                    if c == chat_id =>
                {
                    Some(message.text)
                }
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&self, chat_id: ChatId, message: &OutboundMessage) -> DeskResult<MessageId> {
        self.record(chat_id, |message_id| Sent::Text {
            chat_id,
            message_id,
            message: message.clone(),
        })
    }

    async fn edit_text(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        message: &OutboundMessage,
    ) -> DeskResult<()> {
        if self.fail_edits {
            return Err(DeskError::Transport("message is not modified".into()));
        }
        self.record(chat_id, |_| Sent::Edit {
            chat_id,
            message_id,
            message: message.clone(),
        })?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> DeskResult<()> {
        self.record(chat_id, |_| Sent::Delete { chat_id, message_id })?;
        Ok(())
    }

    async fn send_album(
        &self,
        chat_id: ChatId,
        files: &[FileRef],
        caption: Option<&str>,
    ) -> DeskResult<Vec<MessageId>> {
        let id = self.record(chat_id, |_| Sent::Album {
            chat_id,
            files: files.to_vec(),
            caption: caption.map(str::to_string),
        })?;
        Ok(vec![id])
    }
}
