//! Outbound notifier with bounded retry.
//!
//! Every accepted broker event becomes one delivery task. A task walks the
//! states `Pending → Retrying(n) → Delivered | Dropped`, waiting for the
//! outcome of each attempt before scheduling the next one:
//!
//! - Attempt 1: immediate
//! - Attempt 2: after `initial_backoff`
//! - Attempt 3: after `initial_backoff * 2`, and so on, capped at `max_backoff`
//!
//! Delivery is best-effort. After `max_attempts` failures the event is dropped
//! with an error diagnostic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::ports::{HubClient, HubNotification};

/// Retry bound and backoff for hub notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt`
    pub fn backoff(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(multiplier)
            .min(self.max_backoff)
    }
}

/// Lifecycle of one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    /// Not attempted yet
    Pending,
    /// Previous attempts failed, the payload is the attempt about to run
    Retrying(u32),
    Delivered,
    Dropped,
}

impl DeliveryState {
    /// Whether the delivery reached a final state
    pub fn is_final(&self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::Dropped)
    }
}

/// Cumulative delivery counters shared by all tasks.
#[derive(Debug, Default)]
pub struct NotifierStats {
    delivered: AtomicU64,
    dropped: AtomicU64,
    retries: AtomicU64,
}

/// Point-in-time copy of [`NotifierStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryCounts {
    pub delivered: u64,
    pub dropped: u64,
    pub retries: u64,
}

impl NotifierStats {
    pub fn snapshot(&self) -> DeliveryCounts {
        DeliveryCounts {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
        }
    }
}

/// Schedules hub notifications off the event-handling path.
#[derive(Clone)]
pub struct Notifier {
    client: Arc<dyn HubClient>,
    policy: RetryPolicy,
    stats: Arc<NotifierStats>,
}

impl Notifier {
    /// Create a notifier posting through `client`
    pub fn new(client: Arc<dyn HubClient>, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            stats: Arc::new(NotifierStats::default()),
        }
    }

    /// Retry policy applied to every delivery
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Counters accumulated since the notifier was created
    pub fn stats(&self) -> DeliveryCounts {
        self.stats.snapshot()
    }

    /// Spawn a delivery task and return immediately.
    ///
    /// Returns `None` without spawning when no callback address is known.
    pub fn dispatch(
        &self,
        callback: &str,
        notification: HubNotification,
    ) -> Option<JoinHandle<DeliveryState>> {
        if callback.is_empty() {
            tracing::warn!(
                device = %notification.name,
                attribute = %notification.attribute,
                "No hub callback registered, dropping notification"
            );
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let client = Arc::clone(&self.client);
        let stats = Arc::clone(&self.stats);
        let policy = self.policy;
        let callback = callback.to_string();

        Some(tokio::spawn(async move {
            deliver(client.as_ref(), &policy, &stats, &callback, &notification).await
        }))
    }
}

/// Drive one notification to a final state.
async fn deliver(
    client: &dyn HubClient,
    policy: &RetryPolicy,
    stats: &NotifierStats,
    callback: &str,
    notification: &HubNotification,
) -> DeliveryState {
    let max_attempts = policy.max_attempts.max(1);
    let mut state = DeliveryState::Pending;

    while !state.is_final() {
        let attempt = match state {
            DeliveryState::Retrying(n) => n,
            _ => 1,
        };

        state = match client.notify(callback, notification).await {
            Ok(()) => {
                tracing::debug!(
                    callback = %callback,
                    device = %notification.name,
                    attribute = %notification.attribute,
                    attempt,
                    "Notified hub"
                );
                stats.delivered.fetch_add(1, Ordering::Relaxed);
                DeliveryState::Delivered
            }
            Err(e) if attempt >= max_attempts => {
                tracing::error!(
                    callback = %callback,
                    device = %notification.name,
                    attribute = %notification.attribute,
                    attempts = attempt,
                    error = %e,
                    "Giving up on hub notification"
                );
                stats.dropped.fetch_add(1, Ordering::Relaxed);
                DeliveryState::Dropped
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    callback = %callback,
                    device = %notification.name,
                    attempt,
                    max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Hub notification failed"
                );
                stats.retries.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(delay).await;
                DeliveryState::Retrying(attempt + 1)
            }
        };
    }

    state
}
