use std::sync::Arc;

use tracing::warn;

use crate::{
    audit::{AuditEvent, AuditLogger},
    catalog::{self, InactiveGroups, ScannedGroup, SessionStore},
    client::{port::GroupClient, types::MessageFilter},
    config::EngineConfig,
    domain::{GroupHandle, MessageRecord, Role},
    lifecycle::{self, ConfirmFn, Intent, Outcome},
    primitives::ProgressFn,
    role, Result,
};

/// The surface the CLI talks to.
///
/// Owns the client and the engine knobs; per-session state lives in the
/// [`SessionStore`] the caller passes in.
pub struct Engine {
    client: Arc<dyn GroupClient>,
    cfg: EngineConfig,
    audit: Option<AuditLogger>,
}

impl Engine {
    pub fn new(client: Arc<dyn GroupClient>, cfg: EngineConfig) -> Self {
        Self {
            client,
            cfg,
            audit: None,
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Groups with own messages that this session hasn't handled yet.
    pub async fn scan_with_messages(
        &self,
        store: &mut SessionStore,
        force: bool,
    ) -> Result<Vec<ScannedGroup>> {
        let fresh = force || !store.has_scan();
        let all =
            catalog::load_groups_with_messages(self.client.as_ref(), &self.cfg, store, force)
                .await?;
        if fresh {
            self.audit_reload(store);
        }
        Ok(catalog::pending_with_messages(store, all))
    }

    /// Groups and channels without own messages that this session hasn't handled yet.
    pub async fn scan_inactive(
        &self,
        store: &mut SessionStore,
        force: bool,
    ) -> Result<InactiveGroups> {
        let fresh = force || !store.has_scan();
        let all =
            catalog::load_inactive_groups(self.client.as_ref(), &self.cfg, store, force).await?;
        if fresh {
            self.audit_reload(store);
        }
        Ok(catalog::pending_inactive(store, all))
    }

    pub async fn resolve_role(&self, handle: &GroupHandle) -> Role {
        role::resolve_role(self.client.as_ref(), handle, self.cfg.participant_limit).await
    }

    /// Newest own messages in the group, for display before a delete.
    pub async fn preview_own_messages(
        &self,
        handle: &GroupHandle,
        limit: usize,
    ) -> Result<Vec<MessageRecord>> {
        self.client
            .get_messages(&handle.entity, MessageFilter::own(limit, None))
            .await
    }

    /// Run the leave/delete state machine for `handle` and mark it processed.
    pub async fn run_leave_or_delete_flow(
        &self,
        store: &mut SessionStore,
        handle: &GroupHandle,
        intent: Intent,
        confirm: &mut ConfirmFn<'_>,
        on_progress: &mut ProgressFn<'_>,
    ) -> Outcome {
        let outcome = lifecycle::run_flow(
            self.client.as_ref(),
            &self.cfg,
            handle,
            intent,
            confirm,
            on_progress,
        )
        .await;

        store.mark_processed(handle.id);
        if let Some(audit) = &self.audit {
            if let Err(e) = audit.write(AuditEvent::flow(handle, intent, &outcome)) {
                warn!("audit write failed: {e}");
            }
        }
        outcome
    }

    fn audit_reload(&self, store: &SessionStore) {
        let Some(audit) = &self.audit else {
            return;
        };
        if let Err(e) = audit.write(AuditEvent::reload(store.scanned_count())) {
            warn!("audit write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::DialogKind;
    use crate::domain::{GroupId, GroupKind};
    use crate::fake::{participant, FakeClient};
    use crate::lifecycle::Prompt;

    fn engine_with(fake: Arc<FakeClient>) -> Engine {
        Engine::new(fake, EngineConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn processed_groups_are_not_offered_again_until_reload() {
        let fake = Arc::new(FakeClient::new(1));
        fake.add_dialog(10, DialogKind::BasicGroup, Some(1));
        fake.add_dialog(11, DialogKind::Channel, Some(2));
        fake.set_participants(11, vec![participant("channelParticipant", 1)]);
        let engine = engine_with(fake.clone());
        let mut store = SessionStore::new();

        let inactive = engine.scan_inactive(&mut store, false).await.unwrap();
        assert_eq!(inactive.len(), 2);
        let target = inactive.channels[0].clone();

        let outcome = engine
            .run_leave_or_delete_flow(
                &mut store,
                &target,
                Intent::Leave,
                &mut |p| p == Prompt::Leave,
                &mut |_| {},
            )
            .await;
        assert_eq!(outcome.label(), "left");
        assert!(store.is_processed(GroupId(11)));

        let inactive = engine.scan_inactive(&mut store, false).await.unwrap();
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive.groups[0].kind, GroupKind::BasicGroup);

        let inactive = engine.scan_inactive(&mut store, true).await.unwrap();
        assert_eq!(inactive.len(), 2);
        assert_eq!(fake.calls_named("list_dialogs"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn declined_flow_is_still_processed_and_audited() {
        let fake = Arc::new(FakeClient::new(1));
        fake.add_dialog(10, DialogKind::BasicGroup, Some(1));
        fake.add_messages(10, 5, 5);

        let path = std::env::temp_dir().join(format!(
            "tgsweep-engine-audit-{}-{}.log",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        let engine = engine_with(fake.clone()).with_audit(AuditLogger::new(&path, true));
        let mut store = SessionStore::new();

        let groups = engine.scan_with_messages(&mut store, false).await.unwrap();
        assert_eq!(groups.len(), 1);
        let target = groups[0].handle.clone();

        let outcome = engine
            .run_leave_or_delete_flow(
                &mut store,
                &target,
                Intent::DeleteMessagesThenMaybeLeave,
                &mut |_| false,
                &mut |_| {},
            )
            .await;
        assert_eq!(outcome.label(), "aborted");
        assert_eq!(fake.mutating_calls(), 0);
        assert!(engine
            .scan_with_messages(&mut store, false)
            .await
            .unwrap()
            .is_empty());

        let preview = engine.preview_own_messages(&target, 3).await.unwrap();
        assert_eq!(preview.len(), 3);
        assert_eq!(preview[0].id.0, 5);

        let log = std::fs::read_to_string(&path).unwrap();
        let events: Vec<serde_json::Value> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "reload");
        assert_eq!(events[0]["groups_scanned"], 1);
        assert_eq!(events[1]["outcome"], "aborted");
        assert_eq!(events[1]["intent"], "delete_messages");
    }
}
