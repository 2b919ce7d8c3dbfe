//! Discord to Telegram message relay.
//!
//! This crate owns everything between an incoming source event and a call
//! to the target platform:
//! - [`message`] and [`events`]: the source message model
//! - [`sendable`]: shaping a message into one target payload
//! - [`store`]: the TTL correlation store and its persistence
//! - [`pipeline`]: handler middleware (skip predicates, retries)
//! - [`handlers`]: create, update and delete handlers
//! - [`relay`]: the concurrent runtime with graceful shutdown
//! - [`config`]: TOML and environment configuration
//!
//! The target platform itself sits behind [`TargetClient`].

pub mod config;
pub mod directory;
pub mod error;
pub mod events;
pub mod handlers;
pub mod message;
pub mod pipeline;
pub mod relay;
pub mod sendable;
pub mod store;
pub mod target;

pub use config::RelayConfig;
pub use directory::{SourceDirectory, StaticDirectory, resolve_mentions};
pub use error::{RelayError, RelayResult, TargetError, TargetErrorKind, TargetResult};
pub use events::{MessageCreate, MessageDelete, MessageUpdate, SourceEvent};
pub use handlers::{HandlerSettings, MirrorContext, Pipelines};
pub use message::{HasAuthor, SourceMessage, User};
pub use pipeline::{BoxHandler, Handler, Middleware, Retrier, RetryPolicy, Skip, Skipper, chain};
pub use relay::{Relay, RelayOptions, RunSummary};
pub use sendable::{Sendable, shape};
pub use store::{CorrelationStore, TrackedEntry};
pub use target::{TargetClient, TargetMessage};
