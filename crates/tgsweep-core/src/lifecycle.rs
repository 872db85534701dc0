//! Group lifecycle state machine.
//!
//! `Idle -> RoleResolved -> {Owner | Admin | Member} path -> terminal outcome`.
//! Role is resolved fresh on every run, before anything destructive happens.

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    client::port::GroupClient,
    config::{AdminPolicy, EngineConfig},
    domain::{GroupHandle, Role},
    primitives::{self, Progress, ProgressFn, Step},
    role::resolve_role,
    strategy::{run_leave_chain, LeaveTier},
};

/// What the user asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Leave,
    DeleteMessagesThenMaybeLeave,
}

impl Intent {
    pub fn label(self) -> &'static str {
        match self {
            Intent::Leave => "leave",
            Intent::DeleteMessagesThenMaybeLeave => "delete_messages",
        }
    }
}

/// A decision the flow needs from the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prompt {
    /// Delete my messages in this group?
    DeleteMessages,
    /// Leave this group? (also asked after deleting messages)
    Leave,
    /// Asked instead of [`Prompt::Leave`] when going ahead tears the group down.
    DeleteGroup,
    /// I'm an admin here; go ahead anyway?
    AdminLeave,
}

impl Prompt {
    /// The exit question for `role`: leaving as owner (or as an admin under
    /// [`AdminPolicy::Teardown`]) means deleting the group.
    pub fn exit_for(role: Role, policy: AdminPolicy) -> Self {
        match (role, policy) {
            (Role::Owner, _) | (Role::Admin, AdminPolicy::Teardown) => Prompt::DeleteGroup,
            _ => Prompt::Leave,
        }
    }
}

pub type ConfirmFn<'a> = dyn FnMut(Prompt) -> bool + Send + 'a;

/// What each step achieved before the flow ended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub own_messages_deleted: usize,
    pub messages_drained: usize,
    pub members_removed: usize,
    pub history_cleared: bool,
}

/// A destructive sequence stopped on a fatal step.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error(
    "{} failed after deleting {} own / {} total messages and removing {} members: {cause}",
    .step.label(), .report.own_messages_deleted, .report.messages_drained, .report.members_removed
)]
pub struct FlowFailure {
    pub role: Role,
    pub step: Step,
    pub report: StepReport,
    pub cause: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Left {
        role: Role,
        via: LeaveTier,
        report: StepReport,
    },
    Deleted {
        role: Role,
        report: StepReport,
    },
    /// A confirmation was declined.
    Aborted {
        role: Role,
        at: Prompt,
        report: StepReport,
    },
    PartialFailure(FlowFailure),
}

impl Outcome {
    pub fn role(&self) -> Role {
        match self {
            Outcome::Left { role, .. }
            | Outcome::Deleted { role, .. }
            | Outcome::Aborted { role, .. } => *role,
            Outcome::PartialFailure(f) => f.role,
        }
    }

    pub fn report(&self) -> &StepReport {
        match self {
            Outcome::Left { report, .. }
            | Outcome::Deleted { report, .. }
            | Outcome::Aborted { report, .. } => report,
            Outcome::PartialFailure(f) => &f.report,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Left { .. } => "left",
            Outcome::Deleted { .. } => "deleted",
            Outcome::Aborted { .. } => "aborted",
            Outcome::PartialFailure(_) => "partial_failure",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::PartialFailure(_))
    }
}

/// Run the full flow for one group. Never returns an error: remote failures end
/// up in [`Outcome::PartialFailure`].
pub async fn run_flow(
    client: &dyn GroupClient,
    cfg: &EngineConfig,
    handle: &GroupHandle,
    intent: Intent,
    confirm: &mut ConfirmFn<'_>,
    on_progress: &mut ProgressFn<'_>,
) -> Outcome {
    let role = resolve_role(client, handle, cfg.participant_limit).await;
    info!(
        group = handle.id.0,
        "{} ({}): role {}, intent {}",
        handle.title,
        handle.kind.label(),
        role.label(),
        intent.label()
    );

    let mut report = StepReport::default();
    let exit = Prompt::exit_for(role, cfg.admin_policy);

    match intent {
        Intent::Leave => {
            if !confirm(exit) {
                return aborted(role, exit, report);
            }
        }
        Intent::DeleteMessagesThenMaybeLeave => {
            if !confirm(Prompt::DeleteMessages) {
                return aborted(role, Prompt::DeleteMessages, report);
            }
            report.own_messages_deleted =
                primitives::delete_own_messages(client, cfg, &handle.entity, on_progress).await;
            if !confirm(exit) {
                return aborted(role, exit, report);
            }
        }
    }

    match role {
        Role::Owner => teardown(client, cfg, handle, role, report, on_progress).await,
        Role::Admin => {
            if !confirm(Prompt::AdminLeave) {
                return aborted(role, Prompt::AdminLeave, report);
            }
            match cfg.admin_policy {
                AdminPolicy::Teardown => {
                    teardown(client, cfg, handle, role, report, on_progress).await
                }
                AdminPolicy::Leave => leave(client, cfg, handle, role, report, on_progress).await,
            }
        }
        Role::Member => leave(client, cfg, handle, role, report, on_progress).await,
    }
}

fn aborted(role: Role, at: Prompt, report: StepReport) -> Outcome {
    info!("declined at {at:?}, nothing further done");
    Outcome::Aborted { role, at, report }
}

/// Drain, kick, delete the container, then clear history.
async fn teardown(
    client: &dyn GroupClient,
    cfg: &EngineConfig,
    handle: &GroupHandle,
    role: Role,
    mut report: StepReport,
    on_progress: &mut ProgressFn<'_>,
) -> Outcome {
    report.messages_drained =
        primitives::drain_all_messages(client, cfg, &handle.entity, on_progress).await;
    report.members_removed =
        primitives::kick_all_members(client, cfg, &handle.entity, handle.kind, on_progress).await;

    on_progress(Progress::StepStarted(Step::DeleteGroup));
    if !primitives::delete_group_container(client, &handle.entity, handle.kind).await {
        warn!(group = handle.id.0, "teardown incomplete: {report:?}");
        return Outcome::PartialFailure(FlowFailure {
            role,
            step: Step::DeleteGroup,
            report,
            cause: format!("could not delete {}", handle.kind.label()),
        });
    }
    sleep(cfg.settle_delay).await;

    on_progress(Progress::StepStarted(Step::ClearHistory));
    report.history_cleared = primitives::clear_history(client, &handle.entity).await;

    info!(group = handle.id.0, "deleted {}", handle.title);
    Outcome::Deleted { role, report }
}

/// Clear history, then walk the leave chain.
async fn leave(
    client: &dyn GroupClient,
    cfg: &EngineConfig,
    handle: &GroupHandle,
    role: Role,
    mut report: StepReport,
    on_progress: &mut ProgressFn<'_>,
) -> Outcome {
    on_progress(Progress::StepStarted(Step::ClearHistory));
    report.history_cleared = primitives::clear_history(client, &handle.entity).await;
    sleep(cfg.settle_delay).await;

    on_progress(Progress::StepStarted(Step::Leave));
    match run_leave_chain(client, handle, &LeaveTier::CHAIN).await {
        Ok(via) => Outcome::Left { role, via, report },
        Err(e) => Outcome::PartialFailure(FlowFailure {
            role,
            step: Step::Leave,
            report,
            cause: e.to_string(),
        }),
    }
}
