//! Target platform seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TargetResult;
use crate::sendable::Sendable;

/// Handle of a message posted on the target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetMessage {
    pub message_id: i64,
    pub chat_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<i64>,
}

/// Sends, edits and deletes mirrored messages.
#[async_trait]
pub trait TargetClient: Send + Sync {
    /// Whether a destination chat is configured. Handlers skip events while
    /// this is false.
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(
        &self,
        payload: &Sendable,
        reply_to: Option<&TargetMessage>,
    ) -> TargetResult<TargetMessage>;

    async fn edit(&self, target: &TargetMessage, payload: &Sendable) -> TargetResult<TargetMessage>;

    async fn delete(&self, target: &TargetMessage) -> TargetResult<()>;
}
