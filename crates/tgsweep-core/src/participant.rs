//! Participant record classification.
//!
//! The platform returns participants in several shapes depending on the group kind
//! and the endpoint (`chatParticipantCreator` vs `channelParticipantCreator`, id
//! under `user_id`, `id`, `user.id` or `peer.user_id`). Everything that probes those
//! shapes lives here; the rest of the engine only sees [`ParticipantRecord`].

use serde_json::Value;

use crate::{
    client::types::RawParticipant,
    domain::{Role, UserKey},
};

const CREATOR_MARKERS: &[&str] = &["channelparticipantcreator", "chatparticipantcreator"];
const ADMIN_MARKERS: &[&str] = &["channelparticipantadmin", "chatparticipantadmin"];

#[derive(Clone, Debug, PartialEq)]
pub enum ParticipantRecord {
    Creator(Participant),
    Admin(Participant),
    Plain(Participant),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Participant {
    pub user: Option<UserKey>,
    pub raw: RawParticipant,
}

impl ParticipantRecord {
    pub fn participant(&self) -> &Participant {
        match self {
            ParticipantRecord::Creator(p)
            | ParticipantRecord::Admin(p)
            | ParticipantRecord::Plain(p) => p,
        }
    }

    pub fn user(&self) -> Option<&UserKey> {
        self.participant().user.as_ref()
    }

    pub fn role(&self) -> Role {
        match self {
            ParticipantRecord::Creator(_) => Role::Owner,
            ParticipantRecord::Admin(_) => Role::Admin,
            ParticipantRecord::Plain(_) => Role::Member,
        }
    }

    pub fn is_user(&self, key: &UserKey) -> bool {
        self.user() == Some(key)
    }
}

/// Turn a raw participant into a tagged record. Unknown or missing markers are
/// plain members.
pub fn classify_participant(raw: RawParticipant) -> ParticipantRecord {
    let marker = raw
        .0
        .get("_")
        .and_then(Value::as_str)
        .map(normalize_marker)
        .unwrap_or_default();
    let p = Participant {
        user: participant_user(&raw.0),
        raw,
    };

    if CREATOR_MARKERS.contains(&marker.as_str()) {
        ParticipantRecord::Creator(p)
    } else if ADMIN_MARKERS.contains(&marker.as_str()) {
        ParticipantRecord::Admin(p)
    } else {
        ParticipantRecord::Plain(p)
    }
}

pub fn classify_all(raw: Vec<RawParticipant>) -> Vec<ParticipantRecord> {
    raw.into_iter().map(classify_participant).collect()
}

/// `types.ChannelParticipantCreator` / `Api.ChatParticipantAdmin` / ... -> bare lowercase.
fn normalize_marker(s: &str) -> String {
    let tail = s.rsplit('.').next().unwrap_or(s);
    tail.trim().to_lowercase()
}

fn participant_user(v: &Value) -> Option<UserKey> {
    if let Some(k) = v.get("user_id").and_then(UserKey::from_json) {
        return Some(k);
    }
    if let Some(k) = v.get("id").and_then(UserKey::from_json) {
        return Some(k);
    }
    if let Some(k) = v
        .get("user")
        .and_then(|u| u.get("id"))
        .and_then(UserKey::from_json)
    {
        return Some(k);
    }
    v.get("peer")
        .and_then(|p| p.get("user_id"))
        .and_then(UserKey::from_json)
}
