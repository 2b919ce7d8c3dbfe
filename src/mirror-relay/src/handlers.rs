//! Create, update and delete handlers, and the pipelines that wrap them.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::directory::{SourceDirectory, resolve_mentions};
use crate::error::{RelayError, RelayResult, TargetError, TargetErrorKind};
use crate::events::{MessageCreate, MessageDelete, MessageUpdate, SourceEvent};
use crate::message::{HasAuthor, ReferenceKind, SourceMessage};
use crate::pipeline::{
    BoxHandler, Handler, Middleware, Retrier, RetryPolicy, Skip, SkipPredicate, Skipper, chain,
};
use crate::sendable::{Sendable, shape};
use crate::store::CorrelationStore;
use crate::target::{TargetClient, TargetMessage};

/// Behavior switches shared by the handlers.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    /// Only messages from this channel are mirrored. Nothing is mirrored
    /// while unset.
    pub source_channel_id: Option<String>,
    /// Id of the mirroring account, whose own messages are ignored.
    pub self_user_id: Option<String>,
    /// Ignore messages from non-bot authors.
    pub only_bots: bool,
    /// Ignore messages starting with any of these.
    pub skip_prefixes: Vec<String>,
    /// Attempts and delay; each pipeline adds its own ignorable errors.
    pub retry: RetryPolicy,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        Self {
            source_channel_id: None,
            self_user_id: None,
            only_bots: true,
            skip_prefixes: Vec::new(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Everything a handler needs.
pub struct MirrorContext {
    pub store: Arc<CorrelationStore>,
    pub target: Arc<dyn TargetClient>,
    pub directory: Arc<dyn SourceDirectory>,
    pub settings: HandlerSettings,
}

impl MirrorContext {
    /// Whether events for `channel_id` should be acted upon at all.
    fn accepts(&self, channel_id: &str, message_id: &str) -> bool {
        let Some(source) = self.settings.source_channel_id.as_deref() else {
            warn!(message_id, "Source channel not configured, ignoring event");
            return false;
        };
        if !self.target.is_configured() {
            warn!(message_id, "Target chat not configured, ignoring event");
            return false;
        }
        if source != channel_id {
            debug!(message_id, channel_id, "Event from another channel, ignoring");
            return false;
        }
        true
    }

    async fn shape(&self, message: &SourceMessage) -> Option<Sendable> {
        let names = resolve_mentions(self.directory.as_ref(), message).await;
        shape(message, &names)
    }
}

fn report(action: &str, message_id: &str, payload: &Sendable, err: TargetError) -> RelayError {
    error!(message_id, action, error = %err, "Target platform rejected message");
    RelayError::Target(err.with_rendered(payload.text()))
}

/// Mirrors newly posted messages.
pub struct CreateHandler {
    ctx: Arc<MirrorContext>,
}

impl CreateHandler {
    pub fn new(ctx: Arc<MirrorContext>) -> Self {
        Self { ctx }
    }

    /// The message whose content should be mirrored, and the mirrored
    /// message to reply to, if any.
    async fn resolve_reference(
        &self,
        message: &SourceMessage,
    ) -> RelayResult<(Option<SourceMessage>, Option<TargetMessage>)> {
        let Some(reference) = &message.reference else {
            return Ok((None, None));
        };
        match reference.kind {
            ReferenceKind::Forward => {
                let channel_id = reference
                    .channel_id
                    .as_deref()
                    .unwrap_or(&message.channel_id);
                let forwarded = self
                    .ctx
                    .directory
                    .fetch_message(channel_id, &reference.message_id)
                    .await?;
                debug!(
                    message_id = %message.id,
                    forwarded_id = %forwarded.id,
                    "Mirroring forwarded message"
                );
                Ok((Some(forwarded), None))
            }
            ReferenceKind::Reply => match self.ctx.store.get(&reference.message_id) {
                Some(entry) => Ok((None, Some(entry.target))),
                None => {
                    warn!(
                        message_id = %message.id,
                        reply_to = %reference.message_id,
                        "Replied-to message is not tracked, sending without reply"
                    );
                    Ok((None, None))
                }
            },
        }
    }
}

#[async_trait]
impl Handler<MessageCreate> for CreateHandler {
    async fn call(&self, event: &MessageCreate) -> RelayResult<()> {
        let message = &event.message;
        if !self.ctx.accepts(&message.channel_id, &message.id) {
            return Ok(());
        }

        let (forwarded, reply_to) = self.resolve_reference(message).await?;
        let content = forwarded.as_ref().unwrap_or(message);
        let Some(payload) = self.ctx.shape(content).await else {
            warn!(message_id = %message.id, "Nothing to send");
            return Ok(());
        };

        let sent = self
            .ctx
            .target
            .send(&payload, reply_to.as_ref())
            .await
            .map_err(|e| report("send", &message.id, &payload, e))?;
        self.ctx.store.set(message, sent);
        info!(
            message_id = %message.id,
            target_id = sent.message_id,
            author = %event.username(),
            "Message forwarded"
        );
        Ok(())
    }
}

/// Re-renders edited messages onto their mirrors.
pub struct UpdateHandler {
    ctx: Arc<MirrorContext>,
}

impl UpdateHandler {
    pub fn new(ctx: Arc<MirrorContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Handler<MessageUpdate> for UpdateHandler {
    async fn call(&self, event: &MessageUpdate) -> RelayResult<()> {
        let message = &event.message;
        if !self.ctx.accepts(&message.channel_id, &message.id) {
            return Ok(());
        }
        let Some(entry) = self.ctx.store.get(&message.id) else {
            debug!(message_id = %message.id, "Edited message is not tracked");
            return Ok(());
        };
        let Some(payload) = self.ctx.shape(message).await else {
            warn!(message_id = %message.id, "Edited message has nothing to send");
            return Ok(());
        };

        let edited = self
            .ctx
            .target
            .edit(&entry.target, &payload)
            .await
            .map_err(|e| report("edit", &message.id, &payload, e))?;
        self.ctx.store.set(message, edited);
        info!(message_id = %message.id, target_id = edited.message_id, "Message edited");
        Ok(())
    }
}

/// Removes mirrors of deleted messages.
pub struct DeleteHandler {
    ctx: Arc<MirrorContext>,
}

impl DeleteHandler {
    pub fn new(ctx: Arc<MirrorContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Handler<MessageDelete> for DeleteHandler {
    async fn call(&self, event: &MessageDelete) -> RelayResult<()> {
        if !self.ctx.accepts(&event.channel_id, &event.id) {
            return Ok(());
        }
        let Some(entry) = self.ctx.store.get(&event.id) else {
            debug!(message_id = %event.id, "Deleted message is not tracked");
            return Ok(());
        };

        match self.ctx.target.delete(&entry.target).await {
            Ok(()) => {}
            Err(e) if e.kind == TargetErrorKind::NotFound => {
                // Already gone on the target side.
                self.ctx.store.unset(&event.id);
                return Err(e.into());
            }
            Err(e) => {
                error!(message_id = %event.id, error = %e, "Failed to delete mirrored message");
                return Err(e.into());
            }
        }
        self.ctx.store.unset(&event.id);
        info!(message_id = %event.id, target_id = entry.target.message_id, "Message deleted");
        Ok(())
    }
}

/// Skip messages written by the mirroring account.
pub fn skip_self<E: HasAuthor + 'static>(self_user_id: impl Into<String>) -> SkipPredicate<E> {
    let self_user_id = self_user_id.into();
    Arc::new(move |event: &E| match event.author_user() {
        Some(user) if user.id == self_user_id => Err(Skip::new("authored by the mirroring account")),
        _ => Ok(()),
    })
}

/// Skip messages whose author is known and not a bot.
pub fn only_bots<E: HasAuthor + 'static>() -> SkipPredicate<E> {
    Arc::new(|event: &E| match event.author_user() {
        Some(user) if !user.bot => Err(Skip::new(format!(
            "author {} is not a bot",
            user.username
        ))),
        _ => Ok(()),
    })
}

/// Skip messages whose content starts with any of `prefixes`.
pub fn skip_prefixes(prefixes: Vec<String>) -> SkipPredicate<MessageCreate> {
    Arc::new(move |event: &MessageCreate| {
        match prefixes
            .iter()
            .find(|prefix| event.message.content.starts_with(prefix.as_str()))
        {
            Some(prefix) => Err(Skip::new(format!("content starts with {prefix:?}"))),
            None => Ok(()),
        }
    })
}

/// The three wrapped handlers the runtime dispatches to.
pub struct Pipelines {
    pub create: BoxHandler<MessageCreate>,
    pub update: BoxHandler<MessageUpdate>,
    pub delete: BoxHandler<MessageDelete>,
}

impl Pipelines {
    /// Build the standard pipelines for `ctx`.
    ///
    /// - create: skip self-authored, non-bot (if enabled) and prefixed
    ///   messages, retry ignoring empty payloads
    /// - update: retry ignoring unchanged and too-old edits
    /// - delete: retry ignoring already-deleted mirrors
    pub fn new(ctx: Arc<MirrorContext>) -> Self {
        let settings = &ctx.settings;
        let base = RetryPolicy {
            ignorable: Vec::new(),
            ..settings.retry.clone()
        };

        let mut predicates: Vec<SkipPredicate<MessageCreate>> = Vec::new();
        if let Some(self_id) = &settings.self_user_id {
            predicates.push(skip_self(self_id.clone()));
        }
        if settings.only_bots {
            predicates.push(only_bots());
        }
        if !settings.skip_prefixes.is_empty() {
            predicates.push(skip_prefixes(settings.skip_prefixes.clone()));
        }

        let create_middleware: Vec<Box<dyn Middleware<MessageCreate>>> = vec![
            Box::new(Skipper::new(predicates)),
            Box::new(Retrier::new(base.clone().with_ignorable([
                TargetErrorKind::EmptyText,
                TargetErrorKind::EmptyMessage,
            ]))),
        ];
        let update_middleware: Vec<Box<dyn Middleware<MessageUpdate>>> =
            vec![Box::new(Retrier::new(base.clone().with_ignorable([
                TargetErrorKind::NotModified,
                TargetErrorKind::TooOldToEdit,
            ])))];
        let delete_middleware: Vec<Box<dyn Middleware<MessageDelete>>> = vec![Box::new(
            Retrier::new(base.with_ignorable([TargetErrorKind::NotFound])),
        )];

        let create: BoxHandler<MessageCreate> = Arc::new(CreateHandler::new(ctx.clone()));
        let update: BoxHandler<MessageUpdate> = Arc::new(UpdateHandler::new(ctx.clone()));
        let delete: BoxHandler<MessageDelete> = Arc::new(DeleteHandler::new(ctx));
        Self {
            create: chain(create, create_middleware),
            update: chain(update, update_middleware),
            delete: chain(delete, delete_middleware),
        }
    }

    /// Route `event` to its pipeline.
    pub async fn dispatch(&self, event: &SourceEvent) -> RelayResult<()> {
        match event {
            SourceEvent::Create(event) => self.create.call(event).await,
            SourceEvent::Update(event) => self.update.call(event).await,
            SourceEvent::Delete(event) => self.delete.call(event).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::User;
    use pretty_assertions::assert_eq;

    fn create(content: &str, user_id: &str, bot: bool) -> MessageCreate {
        let mut message = SourceMessage::new("1", "c");
        message.content = content.to_string();
        message.author = Some(User {
            id: user_id.to_string(),
            username: format!("user{user_id}"),
            global_name: None,
            bot,
        });
        MessageCreate { message }
    }

    #[test]
    fn test_skip_self() {
        let predicate = skip_self::<MessageCreate>("42");
        assert!(predicate(&create("hi", "42", true)).is_err());
        assert!(predicate(&create("hi", "7", true)).is_ok());
    }

    #[test]
    fn test_only_bots() {
        let predicate = only_bots::<MessageCreate>();
        assert!(predicate(&create("hi", "7", true)).is_ok());
        let skip = predicate(&create("hi", "7", false)).unwrap_err();
        assert_eq!(skip.0, "author user7 is not a bot");

        let anonymous = MessageCreate {
            message: SourceMessage::new("1", "c"),
        };
        assert!(predicate(&anonymous).is_ok());
    }

    #[test]
    fn test_skip_prefixes() {
        let predicate = skip_prefixes(vec!["!".to_string(), "//".to_string()]);
        assert!(predicate(&create("!ping", "7", true)).is_err());
        assert!(predicate(&create("// note", "7", true)).is_err());
        assert!(predicate(&create("hello !", "7", true)).is_ok());
    }
}
