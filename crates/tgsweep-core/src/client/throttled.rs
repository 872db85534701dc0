use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    client::{
        port::GroupClient,
        types::{DialogSummary, MessageFilter, RawParticipant},
    },
    domain::{EntityRef, MessageId, MessageRecord, UserKey},
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* two remote calls. Telegram's flood limits are
    /// per account and shared by every method.
    pub min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(50),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// GroupClient decorator that spaces out outbound calls.
///
/// Best-effort defense against FLOOD_WAIT errors. The engine's own pauses (drain
/// pages, settle) still apply on top of this.
pub struct ThrottledClient {
    inner: Arc<dyn GroupClient>,
    limiter: Mutex<IntervalLimiter>,
}

impl ThrottledClient {
    pub fn new(inner: Arc<dyn GroupClient>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            limiter: Mutex::new(IntervalLimiter::new(cfg.min_interval)),
        }
    }

    async fn throttle(&self) {
        let wait = { self.limiter.lock().await.reserve() };
        if wait > Duration::ZERO {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl GroupClient for ThrottledClient {
    async fn self_id(&self) -> Result<UserKey> {
        self.throttle().await;
        self.inner.self_id().await
    }

    async fn list_dialogs(&self, limit: usize) -> Result<Vec<DialogSummary>> {
        self.throttle().await;
        self.inner.list_dialogs(limit).await
    }

    async fn get_messages(
        &self,
        entity: &EntityRef,
        filter: MessageFilter,
    ) -> Result<Vec<MessageRecord>> {
        self.throttle().await;
        self.inner.get_messages(entity, filter).await
    }

    async fn delete_messages(&self, entity: &EntityRef, ids: &[MessageId]) -> Result<usize> {
        self.throttle().await;
        self.inner.delete_messages(entity, ids).await
    }

    async fn get_participants(
        &self,
        entity: &EntityRef,
        limit: usize,
    ) -> Result<Vec<RawParticipant>> {
        self.throttle().await;
        self.inner.get_participants(entity, limit).await
    }

    async fn get_full_group_participants(
        &self,
        entity: &EntityRef,
    ) -> Result<Vec<RawParticipant>> {
        self.throttle().await;
        self.inner.get_full_group_participants(entity).await
    }

    async fn get_self_participant(&self, entity: &EntityRef) -> Result<Option<RawParticipant>> {
        self.throttle().await;
        self.inner.get_self_participant(entity).await
    }

    async fn ban_participant(
        &self,
        entity: &EntityRef,
        participant: &RawParticipant,
    ) -> Result<()> {
        self.throttle().await;
        self.inner.ban_participant(entity, participant).await
    }

    async fn remove_chat_user(
        &self,
        entity: &EntityRef,
        participant: &RawParticipant,
    ) -> Result<()> {
        self.throttle().await;
        self.inner.remove_chat_user(entity, participant).await
    }

    async fn delete_channel(&self, entity: &EntityRef) -> Result<()> {
        self.throttle().await;
        self.inner.delete_channel(entity).await
    }

    async fn delete_basic_group(&self, entity: &EntityRef) -> Result<()> {
        self.throttle().await;
        self.inner.delete_basic_group(entity).await
    }

    async fn leave(&self, entity: &EntityRef) -> Result<()> {
        self.throttle().await;
        self.inner.leave(entity).await
    }

    async fn leave_channel(&self, entity: &EntityRef) -> Result<()> {
        self.throttle().await;
        self.inner.leave_channel(entity).await
    }

    async fn remove_self_from_chat(&self, entity: &EntityRef) -> Result<()> {
        self.throttle().await;
        self.inner.remove_self_from_chat(entity).await
    }

    async fn clear_history(&self, entity: &EntityRef) -> Result<()> {
        self.throttle().await;
        self.inner.clear_history(entity).await
    }
}
