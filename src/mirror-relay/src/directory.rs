//! Lookups against the source platform.
//!
//! The markup transcoder resolves mentions synchronously, so handlers first
//! collect the ids a message references and resolve them here into a
//! [`MentionTable`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use mirror_markup::{MentionResolver, MentionTable, collect_mentions};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{RelayError, RelayResult};
use crate::message::SourceMessage;
use crate::store::DEFAULT_TTL_HOURS;

/// Read access to messages and names on the source platform.
#[async_trait]
pub trait SourceDirectory: Send + Sync {
    /// Fetch a message by id, used to mirror forwarded messages.
    async fn fetch_message(&self, channel_id: &str, message_id: &str)
    -> RelayResult<SourceMessage>;

    async fn user_name(&self, user_id: &str) -> Option<String>;

    async fn channel_name(&self, channel_id: &str) -> Option<String>;

    async fn role_name(&self, role_id: &str) -> Option<String>;
}

/// Resolve every mention in `message` that the directory knows about.
pub async fn resolve_mentions(
    directory: &dyn SourceDirectory,
    message: &SourceMessage,
) -> MentionTable {
    let mut ids = mirror_markup::MentionIds::default();
    for text in message.texts() {
        let found = collect_mentions(text);
        ids.users.extend(found.users);
        ids.channels.extend(found.channels);
        ids.roles.extend(found.roles);
    }
    ids.users.sort();
    ids.users.dedup();
    ids.channels.sort();
    ids.channels.dedup();
    ids.roles.sort();
    ids.roles.dedup();

    let mut table = MentionTable::default();
    for id in ids.users {
        if let Some(name) = directory.user_name(&id).await {
            table.users.insert(id, name);
        }
    }
    for id in ids.channels {
        if let Some(name) = directory.channel_name(&id).await {
            table.channels.insert(id, name);
        }
    }
    for id in ids.roles {
        if let Some(name) = directory.role_name(&id).await {
            table.roles.insert(id, name);
        }
    }
    debug!(
        message_id = %message.id,
        users = table.users.len(),
        channels = table.channels.len(),
        roles = table.roles.len(),
        "Resolved mentions"
    );
    table
}

/// In-memory directory backed by a fixed name table and the messages seen
/// recently. Messages are kept for the same TTL as correlations.
#[derive(Debug)]
pub struct StaticDirectory {
    names: MentionTable,
    messages: RwLock<HashMap<String, Remembered>>,
    ttl: TimeDelta,
}

#[derive(Debug)]
struct Remembered {
    message: SourceMessage,
    expiry: DateTime<Utc>,
}

impl Default for StaticDirectory {
    fn default() -> Self {
        Self::new(MentionTable::default())
    }
}

impl StaticDirectory {
    pub fn new(names: MentionTable) -> Self {
        Self::with_ttl(names, TimeDelta::hours(DEFAULT_TTL_HOURS))
    }

    pub fn with_ttl(names: MentionTable, ttl: TimeDelta) -> Self {
        Self {
            names,
            messages: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Make `message` available to [`SourceDirectory::fetch_message`],
    /// dropping messages whose TTL has elapsed.
    pub fn remember(&self, message: &SourceMessage) {
        self.remember_at(message, Utc::now());
    }

    pub fn remember_at(&self, message: &SourceMessage, now: DateTime<Utc>) {
        let expiry = now
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut messages = self.messages.write();
        let before = messages.len();
        messages.retain(|_, remembered| remembered.expiry > now);
        let evicted = before - messages.len();
        if evicted > 0 {
            debug!(evicted, remaining = messages.len(), "Evicted remembered messages");
        }
        messages.insert(
            message.id.clone(),
            Remembered {
                message: message.clone(),
                expiry,
            },
        );
    }

    /// Drop `message_id`, e.g. after the source deleted it.
    pub fn forget(&self, message_id: &str) -> bool {
        self.messages.write().remove(message_id).is_some()
    }

    /// Number of remembered messages, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    fn lookup_at(&self, message_id: &str, now: DateTime<Utc>) -> Option<SourceMessage> {
        self.messages
            .read()
            .get(message_id)
            .filter(|remembered| remembered.expiry > now)
            .map(|remembered| remembered.message.clone())
    }
}

#[async_trait]
impl SourceDirectory for StaticDirectory {
    async fn fetch_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> RelayResult<SourceMessage> {
        self.lookup_at(message_id, Utc::now()).ok_or_else(|| {
            RelayError::Source(format!(
                "message {message_id} in channel {channel_id} is unknown"
            ))
        })
    }

    async fn user_name(&self, user_id: &str) -> Option<String> {
        self.names.user(user_id)
    }

    async fn channel_name(&self, channel_id: &str) -> Option<String> {
        self.names.channel(channel_id)
    }

    async fn role_name(&self, role_id: &str) -> Option<String> {
        self.names.role(role_id)
    }
}
