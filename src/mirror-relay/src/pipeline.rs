//! Composable handler middleware.
//!
//! A [`Handler`] processes one event. A [`Middleware`] wraps a handler in
//! another handler. [`chain`] applies middlewares so the first one listed is
//! the outermost: `chain(h, [a, b])` runs `a(b(h))`.
//!
//! Two middlewares are provided:
//! - [`Skipper`] drops events matching any predicate before they reach the
//!   inner handler.
//! - [`Retrier`] re-runs the inner handler on failure, treating a configured
//!   set of target errors as success.

use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::error::{RelayResult, TargetErrorKind};

/// Processes events of type `E`.
#[async_trait]
pub trait Handler<E: Send + Sync>: Send + Sync {
    async fn call(&self, event: &E) -> RelayResult<()>;
}

pub type BoxHandler<E> = Arc<dyn Handler<E>>;

/// Wraps a handler in additional behavior.
pub trait Middleware<E: Send + Sync>: Send + Sync {
    fn wrap(&self, inner: BoxHandler<E>) -> BoxHandler<E>;
}

/// Apply `middlewares` to `handler`, first listed outermost.
pub fn chain<E: Send + Sync + 'static>(
    handler: BoxHandler<E>,
    middlewares: Vec<Box<dyn Middleware<E>>>,
) -> BoxHandler<E> {
    middlewares
        .iter()
        .rev()
        .fold(handler, |inner, middleware| middleware.wrap(inner))
}

/// Reason an event was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip(pub String);

impl Skip {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl std::fmt::Display for Skip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Predicate returning `Err(Skip)` for events that must not be handled.
pub type SkipPredicate<E> = Arc<dyn Fn(&E) -> Result<(), Skip> + Send + Sync>;

/// Drops events for which any predicate signals a skip.
pub struct Skipper<E> {
    predicates: Arc<Vec<SkipPredicate<E>>>,
}

impl<E> Skipper<E> {
    pub fn new(predicates: Vec<SkipPredicate<E>>) -> Self {
        Self {
            predicates: Arc::new(predicates),
        }
    }
}

impl<E: Send + Sync + 'static> Middleware<E> for Skipper<E> {
    fn wrap(&self, inner: BoxHandler<E>) -> BoxHandler<E> {
        Arc::new(SkipHandler {
            predicates: self.predicates.clone(),
            inner,
        })
    }
}

struct SkipHandler<E> {
    predicates: Arc<Vec<SkipPredicate<E>>>,
    inner: BoxHandler<E>,
}

#[async_trait]
impl<E: Send + Sync + 'static> Handler<E> for SkipHandler<E> {
    async fn call(&self, event: &E) -> RelayResult<()> {
        for predicate in self.predicates.iter() {
            if let Err(skip) = predicate(event) {
                debug!(event_type = type_name::<E>(), reason = %skip, "Skipping event");
                return Ok(());
            }
        }
        self.inner.call(event).await
    }
}

/// Retry policy for [`Retrier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
    /// Target errors that end the loop as success.
    pub ignorable: Vec<TargetErrorKind>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
            ignorable: Vec::new(),
        }
    }
}

impl RetryPolicy {
    pub fn with_ignorable(mut self, kinds: impl IntoIterator<Item = TargetErrorKind>) -> Self {
        self.ignorable.extend(kinds);
        self
    }
}

/// Re-runs the inner handler until it succeeds or the budget runs out.
pub struct Retrier {
    policy: RetryPolicy,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl<E: Send + Sync + 'static> Middleware<E> for Retrier {
    fn wrap(&self, inner: BoxHandler<E>) -> BoxHandler<E> {
        Arc::new(RetryHandler {
            policy: self.policy.clone(),
            inner,
        })
    }
}

struct RetryHandler<E> {
    policy: RetryPolicy,
    inner: BoxHandler<E>,
}

#[async_trait]
impl<E: Send + Sync + 'static> Handler<E> for RetryHandler<E> {
    async fn call(&self, event: &E) -> RelayResult<()> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match self.inner.call(event).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };

            if let Some(kind) = err.target_kind()
                && self.policy.ignorable.contains(&kind)
            {
                warn!(
                    event_type = type_name::<E>(),
                    error = %err,
                    "Error marked as ignorable, not retrying"
                );
                return Ok(());
            }

            if attempt >= max_attempts {
                error!(
                    event_type = type_name::<E>(),
                    attempts = attempt,
                    error = %err,
                    "Failed to handle event after retries"
                );
                return Err(err);
            }

            warn!(
                event_type = type_name::<E>(),
                attempt,
                max_attempts,
                delay_ms = self.policy.delay.as_millis() as u64,
                error = %err,
                "Failed to handle event, retrying"
            );
            sleep(self.policy.delay).await;
        }
    }
}
