//! Role resolution: owner / admin / member.
//!
//! Total by construction: every failure path degrades to [`Role::Member`].

use tracing::{debug, warn};

use crate::{
    client::{port::GroupClient, types::RawParticipant},
    domain::{GroupHandle, GroupKind, Role, UserKey},
    errors::Error,
    participant::classify_participant,
};

/// Determine the caller's standing in `handle`.
///
/// Tries the kind-specific fast path first (single participant for channels, full
/// chat record for basic groups) and falls back to scanning the participant list.
pub async fn resolve_role(
    client: &dyn GroupClient,
    handle: &GroupHandle,
    participant_limit: usize,
) -> Role {
    let me = match client.self_id().await {
        Ok(k) => k,
        Err(e) => {
            log_lookup_failure(handle, "self id", &e);
            return Role::Member;
        }
    };

    if let Some(role) = fast_path(client, handle, &me).await {
        return role;
    }

    match client
        .get_participants(&handle.entity, participant_limit)
        .await
    {
        Ok(list) => find_role(list, &me).unwrap_or(Role::Member),
        Err(e) => {
            log_lookup_failure(handle, "participant list", &e);
            Role::Member
        }
    }
}

async fn fast_path(client: &dyn GroupClient, handle: &GroupHandle, me: &UserKey) -> Option<Role> {
    match handle.kind {
        GroupKind::Channel => match client.get_self_participant(&handle.entity).await {
            Ok(found) => found.map(|raw| classify_participant(raw).role()),
            Err(e) => {
                log_lookup_failure(handle, "self participant", &e);
                None
            }
        },
        GroupKind::BasicGroup => match client.get_full_group_participants(&handle.entity).await {
            Ok(list) => find_role(list, me),
            Err(e) => {
                log_lookup_failure(handle, "full chat", &e);
                None
            }
        },
    }
}

/// Role of `me` in a participant list, `None` if `me` is not in it.
pub fn find_role(list: Vec<RawParticipant>, me: &UserKey) -> Option<Role> {
    list.into_iter()
        .map(classify_participant)
        .find(|p| p.is_user(me))
        .map(|p| p.role())
}

fn log_lookup_failure(handle: &GroupHandle, what: &str, e: &Error) {
    if e.is_expected_absence() {
        debug!(group = handle.id.0, "{what} not visible: {e}");
    } else {
        warn!(group = handle.id.0, "{what} lookup failed: {e}");
    }
}
