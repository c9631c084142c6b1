//! SequenceAllocator - 房间内订单号分配
//!
//! One counter document per room (`rooms/{room}/meta/orderSeq`) holds the next
//! number to hand out. Allocation is an optimistic read-modify-write: read the
//! counter and its version, write `n + 1` only if the version is unchanged,
//! otherwise start over. No client-side locking; the store's conditional
//! write is the only mutual exclusion.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde_json::{Map, Value};
use shared::models::{RoomId, SequenceCounter, format_order_no};
use shared::{AppError, AppResult, ErrorCode};

use crate::store::{CasOutcome, DocPath, DocumentStore, StoreError, StoreResult, WriteMode};

/// Bounded retry for the counter transaction
///
/// Exponential backoff with full jitter: after attempt `k` the wait is drawn
/// uniformly from `0..=min(max_delay, base_delay * 2^(k-1))`, so contending
/// clients spread out instead of colliding again in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Backoff window after the first failed attempt
    pub base_delay: Duration,
    /// Upper bound of the backoff window
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(320),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Backoff window after `attempt` (1-based) failed
    pub fn window(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay)
    }

    /// Random wait in `0..=window(attempt)`
    pub fn delay(&self, attempt: u32) -> Duration {
        let window_us = self.window(attempt).as_micros() as u64;
        if window_us == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::thread_rng().gen_range(0..=window_us))
    }
}

/// Outcome of a retried transaction
#[derive(Debug)]
pub enum TxnOutcome<T> {
    Success(T),
    /// Every attempt hit a conflicting writer or a transient failure
    ExhaustedRetries { attempts: u32 },
    Fatal(StoreError),
}

impl<T> TxnOutcome<T> {
    pub fn into_result(self) -> AppResult<T> {
        match self {
            TxnOutcome::Success(v) => Ok(v),
            TxnOutcome::ExhaustedRetries { attempts } => Err(AppError::with_message(
                ErrorCode::SequenceExhausted,
                format!("Order number allocation gave up after {} attempts", attempts),
            )
            .with_detail("attempts", attempts)),
            TxnOutcome::Fatal(e) => Err(e.into()),
        }
    }
}

/// Hands out strictly increasing per-room order numbers
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn DocumentStore>,
    policy: RetryPolicy,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn DocumentStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Reserve the next number for `room`
    pub async fn allocate(&self, room: &RoomId) -> TxnOutcome<u64> {
        let doc = DocPath::sequence_counter(room);
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.try_allocate(&doc).await {
                Ok(Some(n)) => {
                    tracing::debug!(room = %room, n, attempt, "Order number allocated");
                    return TxnOutcome::Success(n);
                }
                Ok(None) => {
                    tracing::debug!(room = %room, attempt, "Counter write conflicted");
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!(room = %room, attempt, "Counter transaction failed, retrying: {e}");
                }
                Err(e) => {
                    tracing::error!(room = %room, attempt, "Counter transaction failed: {e}");
                    return TxnOutcome::Fatal(e);
                }
            }
            if attempt < max_attempts {
                tokio::time::sleep(self.policy.delay(attempt)).await;
            }
        }

        tracing::warn!(room = %room, attempts = max_attempts, "Order number allocation exhausted retries");
        TxnOutcome::ExhaustedRetries {
            attempts: max_attempts,
        }
    }

    /// Reserve the next number and format it as `A-%03d`
    pub async fn next_number(&self, room: &RoomId) -> AppResult<String> {
        self.allocate(room).await.into_result().map(format_order_no)
    }

    /// Number the next allocation would return, without reserving it
    pub async fn peek(&self, room: &RoomId) -> AppResult<u64> {
        let doc = DocPath::sequence_counter(room);
        let counter = match self.store.get(&doc).await? {
            Some(d) => d.decode::<SequenceCounter>()?,
            None => SequenceCounter::default(),
        };
        Ok(counter.next_number())
    }

    /// One read-modify-write; `None` on conflict
    async fn try_allocate(&self, doc: &DocPath) -> StoreResult<Option<u64>> {
        let current = self.store.get(doc).await?;
        let (expected, n) = match &current {
            Some(d) => (Some(d.version), d.decode::<SequenceCounter>()?.next_number()),
            None => (None, SequenceCounter::default().next_number()),
        };

        let mut fields = Map::new();
        fields.insert("n".into(), Value::from(n + 1));
        fields.insert("updatedAt".into(), Value::from(shared::util::now_iso()));

        match self
            .store
            .compare_and_set(doc, expected, fields, WriteMode::Merge)
            .await?
        {
            CasOutcome::Committed { .. } => Ok(Some(n)),
            CasOutcome::Conflict { .. } => Ok(None),
        }
    }
}
