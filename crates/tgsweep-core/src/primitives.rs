//! Destructive bulk operations.
//!
//! None of these return an error: batch items fail individually (logged as
//! warnings) and the caller gets the count of what actually happened.

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    client::{port::GroupClient, types::MessageFilter},
    config::EngineConfig,
    domain::{EntityRef, GroupKind, MessageId},
    participant::classify_all,
    strategy::{run_removal_chain, Removal},
};

/// One step of a lifecycle flow, used for progress and failure reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    DeleteOwnMessages,
    DrainMessages,
    KickMembers,
    DeleteGroup,
    ClearHistory,
    Leave,
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Step::DeleteOwnMessages => "delete own messages",
            Step::DrainMessages => "delete all messages",
            Step::KickMembers => "remove members",
            Step::DeleteGroup => "delete group",
            Step::ClearHistory => "clear history",
            Step::Leave => "leave",
        }
    }
}

/// Incremental progress, reported while a batch runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    StepStarted(Step),
    PageDeleted {
        step: Step,
        page: usize,
        deleted: usize,
        total: usize,
    },
    PageFailed {
        step: Step,
        page: usize,
    },
    MemberRemoved {
        removed: usize,
        of: usize,
    },
    MemberFailed {
        of: usize,
    },
}

pub type ProgressFn<'a> = dyn FnMut(Progress) + Send + 'a;

/// Delete every message in the group (not only ours), page by page, oldest cursor
/// last. Returns how many were deleted.
pub async fn drain_all_messages(
    client: &dyn GroupClient,
    cfg: &EngineConfig,
    entity: &EntityRef,
    on_progress: &mut ProgressFn<'_>,
) -> usize {
    delete_in_pages(client, cfg, entity, Step::DrainMessages, on_progress).await
}

/// Same paging as [`drain_all_messages`] restricted to the caller's own messages.
pub async fn delete_own_messages(
    client: &dyn GroupClient,
    cfg: &EngineConfig,
    entity: &EntityRef,
    on_progress: &mut ProgressFn<'_>,
) -> usize {
    delete_in_pages(client, cfg, entity, Step::DeleteOwnMessages, on_progress).await
}

async fn delete_in_pages(
    client: &dyn GroupClient,
    cfg: &EngineConfig,
    entity: &EntityRef,
    step: Step,
    on_progress: &mut ProgressFn<'_>,
) -> usize {
    on_progress(Progress::StepStarted(step));

    let from_self = step == Step::DeleteOwnMessages;
    let mut cursor: Option<MessageId> = None;
    let mut total = 0usize;
    let mut page_no = 0usize;

    loop {
        let filter = MessageFilter {
            from_self,
            limit: cfg.page_size,
            offset_before_id: cursor,
        };
        let page = match client.get_messages(entity, filter).await {
            Ok(page) => page,
            Err(e) => {
                warn!("{}: page fetch failed, stopping after {total}: {e}", step.label());
                break;
            }
        };

        let Some(last) = page.last().map(|m| m.id) else {
            break;
        };
        if cursor.is_some_and(|c| last >= c) {
            warn!(
                "{}: cursor did not advance past {last:?}, stopping",
                step.label()
            );
            break;
        }
        page_no += 1;

        let ids: Vec<MessageId> = page.iter().map(|m| m.id).collect();
        match client.delete_messages(entity, &ids).await {
            Ok(n) => {
                total += n;
                on_progress(Progress::PageDeleted {
                    step,
                    page: page_no,
                    deleted: n,
                    total,
                });
            }
            Err(e) => {
                warn!(
                    "{}: deleting page {page_no} ({} ids) failed: {e}",
                    step.label(),
                    ids.len()
                );
                on_progress(Progress::PageFailed {
                    step,
                    page: page_no,
                });
            }
        }

        cursor = Some(last);
        sleep(cfg.page_delay).await;
    }

    info!("{}: {total} deleted over {page_no} pages", step.label());
    total
}

/// Remove every participant except the caller from one participant snapshot.
/// Returns how many removals succeeded.
pub async fn kick_all_members(
    client: &dyn GroupClient,
    cfg: &EngineConfig,
    entity: &EntityRef,
    kind: GroupKind,
    on_progress: &mut ProgressFn<'_>,
) -> usize {
    on_progress(Progress::StepStarted(Step::KickMembers));

    let list = match client.get_participants(entity, cfg.participant_limit).await {
        Ok(list) => list,
        Err(e) => {
            warn!("participant list unavailable, nobody removed: {e}");
            return 0;
        }
    };
    let me = match client.self_id().await {
        Ok(me) => me,
        Err(e) => {
            warn!("own id unavailable, nobody removed: {e}");
            return 0;
        }
    };

    // Records without an id can't be told apart from us.
    let targets: Vec<_> = classify_all(list)
        .into_iter()
        .filter(|p| p.user().is_some_and(|u| *u != me))
        .collect();
    let of = targets.len();
    let chain = Removal::chain_for(kind);

    let mut removed = 0usize;
    for target in &targets {
        let p = target.participant();
        match run_removal_chain(client, entity, &p.raw, chain).await {
            Ok(_) => {
                removed += 1;
                on_progress(Progress::MemberRemoved { removed, of });
            }
            Err(e) => {
                let who = p.user.as_ref().map(|u| u.to_string()).unwrap_or_default();
                warn!("removing {who} failed: {e}");
                on_progress(Progress::MemberFailed { of });
            }
        }
    }

    info!("removed {removed}/{of} members");
    removed
}

/// Kind-specific permanent delete of the group itself.
pub async fn delete_group_container(
    client: &dyn GroupClient,
    entity: &EntityRef,
    kind: GroupKind,
) -> bool {
    let res = match kind {
        GroupKind::Channel => client.delete_channel(entity).await,
        GroupKind::BasicGroup => client.delete_basic_group(entity).await,
    };
    match res {
        Ok(()) => true,
        Err(e) => {
            warn!("deleting {} failed: {e}", kind.label());
            false
        }
    }
}

/// Best-effort clear of the caller's history view. Never blocks the flow.
pub async fn clear_history(client: &dyn GroupClient, entity: &EntityRef) -> bool {
    match client.clear_history(entity).await {
        Ok(()) => true,
        Err(e) => {
            warn!("clearing history failed (ignored): {e}");
            false
        }
    }
}
