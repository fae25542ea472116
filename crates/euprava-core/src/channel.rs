//! # Notification Channels
//!
//! Append-only message threads between prosecutors and investigators.
//! Messages are never edited or deleted. The sender role comes from the
//! caller's verified identity.

use crate::identity::Role;
use crate::storage::{RecordReader, RecordStore};
use crate::{EupravaError, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: RecordId,
    #[serde(rename = "ime")]
    pub name: String,
    #[serde(rename = "opis")]
    pub description: String,
    #[serde(rename = "kreiran")]
    pub created_at: DateTime<Utc>,
}

crate::impl_record!(Channel, "channels", "channel");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: RecordId,
    #[serde(rename = "kanalId")]
    pub channel_id: RecordId,
    #[serde(rename = "posiljalac")]
    pub sender: Role,
    #[serde(rename = "sadrzaj")]
    pub content: String,
    #[serde(rename = "datum")]
    pub sent_at: DateTime<Utc>,
}

crate::impl_record!(Message, "messages", "message");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChannel {
    #[serde(rename = "ime")]
    pub name: String,
    #[serde(rename = "opis", default)]
    pub description: String,
}

/// Message body. Any sender field in the request is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    #[serde(rename = "sadrzaj")]
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Channels {
    store: Arc<RecordStore>,
}

impl Channels {
    #[must_use]
    pub fn new(store: Arc<RecordStore>) -> Self {
        Self { store }
    }

    pub fn create_channel(
        &self,
        new: NewChannel,
        now: DateTime<Utc>,
    ) -> Result<Channel, EupravaError> {
        if new.name.trim().is_empty() {
            return Err(EupravaError::InvalidRequest("ime is required".into()));
        }
        let mut channel = Channel {
            id: RecordId::UNASSIGNED,
            name: new.name,
            description: new.description,
            created_at: now,
        };
        self.store.write(|scope| scope.insert(&mut channel))?;
        Ok(channel)
    }

    pub fn channels(&self) -> Result<Vec<Channel>, EupravaError> {
        self.store.list()
    }

    /// Append a message. Fails with `ChannelNotFound` for an unknown channel.
    pub fn post_message(
        &self,
        channel_id: RecordId,
        sender: Role,
        new: NewMessage,
        now: DateTime<Utc>,
    ) -> Result<Message, EupravaError> {
        if new.content.trim().is_empty() {
            return Err(EupravaError::InvalidRequest("sadrzaj is required".into()));
        }
        self.store.write(|scope| {
            if scope.get::<Channel>(channel_id)?.is_none() {
                return Err(EupravaError::ChannelNotFound(channel_id));
            }
            let mut message = Message {
                id: RecordId::UNASSIGNED,
                channel_id,
                sender,
                content: new.content,
                sent_at: now,
            };
            scope.insert(&mut message)?;
            Ok(message)
        })
    }

    /// Messages of a channel, oldest first.
    pub fn list_messages(&self, channel_id: RecordId) -> Result<Vec<Message>, EupravaError> {
        self.store.read(|scope| {
            if scope.get::<Channel>(channel_id)?.is_none() {
                return Err(EupravaError::ChannelNotFound(channel_id));
            }
            let mut messages: Vec<Message> = scope
                .list::<Message>()?
                .into_iter()
                .filter(|message| message.channel_id == channel_id)
                .collect();
            messages.sort_by_key(|message| (message.sent_at, message.id));
            Ok(messages)
        })
    }
}
