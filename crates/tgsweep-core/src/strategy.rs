//! Ordered fallback chains.
//!
//! Each tier is a single remote call; a chain tries tiers in order until one
//! succeeds and collects every failure otherwise.

use tracing::{info, warn};

use crate::{
    client::{port::GroupClient, types::RawParticipant},
    domain::{EntityRef, GroupHandle, GroupKind},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaveTier {
    /// High-level "leave dialog".
    Generic,
    /// Channel: leave-channel. Basic group: remove self as chat user.
    KindSpecific,
    /// Leave-channel regardless of kind.
    ChannelLastResort,
}

impl LeaveTier {
    pub const CHAIN: [LeaveTier; 3] = [
        LeaveTier::Generic,
        LeaveTier::KindSpecific,
        LeaveTier::ChannelLastResort,
    ];

    pub fn name(self) -> &'static str {
        match self {
            LeaveTier::Generic => "leave",
            LeaveTier::KindSpecific => "manual leave",
            LeaveTier::ChannelLastResort => "leave channel (last resort)",
        }
    }

    pub async fn attempt(self, client: &dyn GroupClient, handle: &GroupHandle) -> Result<()> {
        match (self, handle.kind) {
            (LeaveTier::Generic, _) => client.leave(&handle.entity).await,
            (LeaveTier::KindSpecific, GroupKind::Channel) => {
                client.leave_channel(&handle.entity).await
            }
            (LeaveTier::KindSpecific, GroupKind::BasicGroup) => {
                client.remove_self_from_chat(&handle.entity).await
            }
            (LeaveTier::ChannelLastResort, _) => client.leave_channel(&handle.entity).await,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Removal {
    /// Permanent ban with all rights revoked (`until_date = 0`).
    Ban,
    RemoveChatUser,
}

impl Removal {
    pub fn chain_for(kind: GroupKind) -> &'static [Removal] {
        match kind {
            GroupKind::Channel => &[Removal::Ban],
            GroupKind::BasicGroup => &[Removal::RemoveChatUser],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Removal::Ban => "ban",
            Removal::RemoveChatUser => "remove chat user",
        }
    }

    pub async fn attempt(
        self,
        client: &dyn GroupClient,
        entity: &EntityRef,
        participant: &RawParticipant,
    ) -> Result<()> {
        match self {
            Removal::Ban => client.ban_participant(entity, participant).await,
            Removal::RemoveChatUser => client.remove_chat_user(entity, participant).await,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierFailure {
    pub tier: &'static str,
    pub error: String,
}

/// Every tier of a chain failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("all {} tiers failed: {}", .failures.len(), describe(.failures))]
pub struct ChainFailure {
    pub failures: Vec<TierFailure>,
}

fn describe(failures: &[TierFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.tier, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

pub async fn run_leave_chain(
    client: &dyn GroupClient,
    handle: &GroupHandle,
    chain: &[LeaveTier],
) -> std::result::Result<LeaveTier, ChainFailure> {
    let mut failures = Vec::new();
    for &tier in chain {
        match tier.attempt(client, handle).await {
            Ok(()) => {
                info!(group = handle.id.0, "left via {}", tier.name());
                return Ok(tier);
            }
            Err(e) => {
                warn!(group = handle.id.0, "{} failed: {e}", tier.name());
                failures.push(TierFailure {
                    tier: tier.name(),
                    error: e.to_string(),
                });
            }
        }
    }
    Err(ChainFailure { failures })
}

pub async fn run_removal_chain(
    client: &dyn GroupClient,
    entity: &EntityRef,
    participant: &RawParticipant,
    chain: &[Removal],
) -> std::result::Result<Removal, ChainFailure> {
    let mut failures = Vec::new();
    for &removal in chain {
        match removal.attempt(client, entity, participant).await {
            Ok(()) => return Ok(removal),
            Err(e) => failures.push(TierFailure {
                tier: removal.name(),
                error: e.to_string(),
            }),
        }
    }
    Err(ChainFailure { failures })
}
