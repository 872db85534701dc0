//! Group classification cache.
//!
//! One scan pass (dialog list + own-message probe per group) feeds two views:
//! groups where the caller has posted, and groups/channels where they have not.
//! The pass is memoized in a [`SessionStore`] together with the set of groups the
//! session already resolved.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    client::{port::GroupClient, types::MessageFilter},
    config::EngineConfig,
    domain::{GroupHandle, GroupId, GroupKind},
    Result,
};

#[derive(Clone, Debug, PartialEq)]
pub struct ScannedGroup {
    pub handle: GroupHandle,
    /// Capped at the probe limit: 100 means "100 or more".
    pub own_messages: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct InactiveGroups {
    pub groups: Vec<GroupHandle>,
    pub channels: Vec<GroupHandle>,
}

impl InactiveGroups {
    pub fn len(&self) -> usize {
        self.groups.len() + self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-session state: the memoized scan and the processed marker.
#[derive(Debug, Default)]
pub struct SessionStore {
    scan: Option<Vec<ScannedGroup>>,
    processed: HashSet<GroupId>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_scan(&self) -> bool {
        self.scan.is_some()
    }

    /// Drop the memoized scan and forget every processed group.
    pub fn invalidate(&mut self) {
        self.scan = None;
        self.processed.clear();
    }

    /// Returns false if the group was already marked.
    pub fn mark_processed(&mut self, id: GroupId) -> bool {
        self.processed.insert(id)
    }

    pub fn is_processed(&self, id: GroupId) -> bool {
        self.processed.contains(&id)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Groups and channels in the memoized scan, 0 before the first pass.
    pub fn scanned_count(&self) -> usize {
        self.scan.as_ref().map_or(0, Vec::len)
    }
}

/// Run one scan pass: list dialogs, keep groups and channels, probe each one.
///
/// A failing probe drops that dialog from both views.
pub async fn scan_pass(client: &dyn GroupClient, cfg: &EngineConfig) -> Result<Vec<ScannedGroup>> {
    let dialogs = client.list_dialogs(cfg.dialog_limit).await?;
    let mut out = Vec::new();

    for handle in dialogs.into_iter().filter_map(|d| d.into_group_handle()) {
        let filter = MessageFilter::own(cfg.probe_limit, None);
        match client.get_messages(&handle.entity, filter).await {
            Ok(msgs) => {
                debug!(group = handle.id.0, "{}: {} own messages", handle.title, msgs.len());
                out.push(ScannedGroup {
                    own_messages: msgs.len().min(cfg.probe_limit),
                    handle,
                });
            }
            Err(e) => {
                warn!(group = handle.id.0, "skipping {}: probe failed: {e}", handle.title);
            }
        }
    }

    info!("scanned {} groups/channels", out.len());
    Ok(out)
}

async fn ensure_scan<'s>(
    client: &dyn GroupClient,
    cfg: &EngineConfig,
    store: &'s mut SessionStore,
    force: bool,
) -> Result<&'s [ScannedGroup]> {
    if force {
        store.invalidate();
    }
    if store.scan.is_none() {
        store.scan = Some(scan_pass(client, cfg).await?);
    }
    Ok(store.scan.as_deref().unwrap_or_default())
}

/// Groups with at least one own message, oldest activity first.
pub async fn load_groups_with_messages(
    client: &dyn GroupClient,
    cfg: &EngineConfig,
    store: &mut SessionStore,
    force: bool,
) -> Result<Vec<ScannedGroup>> {
    let scan = ensure_scan(client, cfg, store, force).await?;
    Ok(with_messages_view(scan))
}

/// Groups and channels without own messages, each oldest activity first.
pub async fn load_inactive_groups(
    client: &dyn GroupClient,
    cfg: &EngineConfig,
    store: &mut SessionStore,
    force: bool,
) -> Result<InactiveGroups> {
    let scan = ensure_scan(client, cfg, store, force).await?;
    Ok(inactive_view(scan))
}

pub fn with_messages_view(scan: &[ScannedGroup]) -> Vec<ScannedGroup> {
    let mut out: Vec<ScannedGroup> = scan
        .iter()
        .filter(|g| g.own_messages > 0)
        .cloned()
        .collect();
    // `None < Some(_)`: unknown activity sorts as oldest.
    out.sort_by_key(|g| g.handle.last_activity);
    out
}

pub fn inactive_view(scan: &[ScannedGroup]) -> InactiveGroups {
    let mut view = InactiveGroups::default();
    for g in scan.iter().filter(|g| g.own_messages == 0) {
        match g.handle.kind {
            GroupKind::BasicGroup => view.groups.push(g.handle.clone()),
            GroupKind::Channel => view.channels.push(g.handle.clone()),
        }
    }
    view.groups.sort_by_key(|h| h.last_activity);
    view.channels.sort_by_key(|h| h.last_activity);
    view
}

/// [`with_messages_view`] minus groups already handled this session.
pub fn pending_with_messages(store: &SessionStore, groups: Vec<ScannedGroup>) -> Vec<ScannedGroup> {
    groups
        .into_iter()
        .filter(|g| !store.is_processed(g.handle.id))
        .collect()
}

pub fn pending_inactive(store: &SessionStore, view: InactiveGroups) -> InactiveGroups {
    InactiveGroups {
        groups: view
            .groups
            .into_iter()
            .filter(|h| !store.is_processed(h.id))
            .collect(),
        channels: view
            .channels
            .into_iter()
            .filter(|h| !store.is_processed(h.id))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::DialogKind;
    use crate::fake::{Fail, FakeClient};

    fn scripted() -> FakeClient {
        let fake = FakeClient::new(1);
        // id, kind, last activity, own messages
        let rows = [
            (10, DialogKind::BasicGroup, Some(300), 5),
            (11, DialogKind::Channel, None, 0),
            (12, DialogKind::Channel, Some(100), 250),
            (13, DialogKind::BasicGroup, Some(50), 0),
            (14, DialogKind::User, Some(10), 3),
            (15, DialogKind::Channel, Some(20), 0),
            (16, DialogKind::BasicGroup, None, 1),
            (17, DialogKind::BasicGroup, Some(5), 0),
        ];
        for (id, kind, at, own) in rows {
            fake.add_dialog(id, kind, at);
            fake.add_messages(id, own + 2, own);
        }
        fake
    }

    fn ids(handles: &[GroupHandle]) -> Vec<i64> {
        handles.iter().map(|h| h.id.0).collect()
    }

    #[tokio::test]
    async fn views_partition_the_scan_by_probe_result() {
        let fake = scripted();
        let cfg = EngineConfig::default();
        let mut store = SessionStore::new();

        let active = load_groups_with_messages(&fake, &cfg, &mut store, false)
            .await
            .unwrap();
        let inactive = load_inactive_groups(&fake, &cfg, &mut store, false)
            .await
            .unwrap();

        let active_ids: Vec<i64> = active.iter().map(|g| g.handle.id.0).collect();
        assert_eq!(active_ids, vec![16, 12, 10]);
        assert!(active.iter().all(|g| g.own_messages > 0));
        assert_eq!(active[1].own_messages, 100, "probe is capped");

        assert_eq!(ids(&inactive.groups), vec![17, 13]);
        assert_eq!(ids(&inactive.channels), vec![11, 15]);

        // Private chats never show up, and both views came from one pass.
        assert_eq!(fake.calls_named("list_dialogs"), 1);
        assert_eq!(fake.calls_named("get_messages"), 7);
    }

    #[tokio::test]
    async fn memoized_until_forced_and_force_clears_processed() {
        let fake = scripted();
        let cfg = EngineConfig::default();
        let mut store = SessionStore::new();

        load_groups_with_messages(&fake, &cfg, &mut store, false)
            .await
            .unwrap();
        store.mark_processed(GroupId(10));
        load_inactive_groups(&fake, &cfg, &mut store, false)
            .await
            .unwrap();
        assert_eq!(fake.calls_named("list_dialogs"), 1);
        assert!(store.is_processed(GroupId(10)));

        load_inactive_groups(&fake, &cfg, &mut store, true)
            .await
            .unwrap();
        assert_eq!(fake.calls_named("list_dialogs"), 2);
        assert_eq!(store.processed_count(), 0);
    }

    #[tokio::test]
    async fn failed_probe_excludes_the_group_from_both_views() {
        let fake = scripted();
        // Probes run in dialog order; the 1st probe is group 10.
        fake.fail_on_call("get_messages", 1, Fail::Forbidden);
        let cfg = EngineConfig::default();
        let mut store = SessionStore::new();

        let active = load_groups_with_messages(&fake, &cfg, &mut store, false)
            .await
            .unwrap();
        let inactive = load_inactive_groups(&fake, &cfg, &mut store, false)
            .await
            .unwrap();
        assert!(active.iter().all(|g| g.handle.id.0 != 10));
        assert!(!ids(&inactive.groups).contains(&10));
    }

    #[tokio::test]
    async fn dialog_listing_failure_is_an_error_and_nothing_is_memoized() {
        let fake = scripted();
        fake.fail_on_call("list_dialogs", 1, Fail::Remote);
        let cfg = EngineConfig::default();
        let mut store = SessionStore::new();

        assert!(load_groups_with_messages(&fake, &cfg, &mut store, false)
            .await
            .is_err());
        assert!(!store.has_scan());
        assert!(load_groups_with_messages(&fake, &cfg, &mut store, false)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn pending_views_hide_processed_groups() {
        let fake = scripted();
        let cfg = EngineConfig::default();
        let mut store = SessionStore::new();
        let active = load_groups_with_messages(&fake, &cfg, &mut store, false)
            .await
            .unwrap();
        let inactive = load_inactive_groups(&fake, &cfg, &mut store, false)
            .await
            .unwrap();

        store.mark_processed(GroupId(12));
        store.mark_processed(GroupId(11));
        let active: Vec<i64> = pending_with_messages(&store, active)
            .iter()
            .map(|g| g.handle.id.0)
            .collect();
        assert_eq!(active, vec![16, 10]);
        let inactive = pending_inactive(&store, inactive);
        assert_eq!(ids(&inactive.channels), vec![15]);
        assert_eq!(inactive.len(), 3);
    }

    #[test]
    fn mark_processed_reports_first_insert_only() {
        let mut store = SessionStore::new();
        assert!(store.mark_processed(GroupId(1)));
        assert!(!store.mark_processed(GroupId(1)));
    }
}
