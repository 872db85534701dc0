//! Scripted in-memory [`GroupClient`] used by the unit tests.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use serde_json::json;

use crate::{
    client::{
        port::GroupClient,
        types::{DialogKind, DialogSummary, MessageFilter, RawParticipant},
    },
    domain::{EntityRef, GroupHandle, GroupId, GroupKind, MessageId, MessageRecord, UserKey},
    errors::Error,
    Result,
};

const MUTATING: &[&str] = &[
    "delete_messages",
    "ban_participant",
    "remove_chat_user",
    "delete_channel",
    "delete_basic_group",
    "leave",
    "leave_channel",
    "remove_self_from_chat",
    "clear_history",
];

#[derive(Clone, Copy, Debug)]
pub(crate) enum Fail {
    Forbidden,
    Remote,
}

#[derive(Clone, Debug)]
pub(crate) struct Call {
    pub method: &'static str,
    pub group: Option<i64>,
    pub detail: String,
}

#[derive(Default)]
struct FakeGroup {
    /// (id, sent by self), ascending ids.
    messages: Vec<(i32, bool)>,
    participants: Vec<RawParticipant>,
    full_participants: Option<Vec<RawParticipant>>,
    self_participant: Option<RawParticipant>,
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    dialogs: Vec<DialogSummary>,
    groups: HashMap<i64, FakeGroup>,
    /// (method, 1-based call index or every call, mode)
    rules: Vec<(&'static str, Option<usize>, Fail)>,
    /// Serve every history page from the newest message, whatever the cursor.
    ignore_offset: bool,
}

pub(crate) struct FakeClient {
    me: i64,
    state: Mutex<FakeState>,
}

pub(crate) fn entity(id: i64) -> EntityRef {
    EntityRef(json!({ "id": id }))
}

pub(crate) fn handle(id: i64, kind: GroupKind, last_activity: Option<i64>) -> GroupHandle {
    GroupHandle {
        id: GroupId(id),
        title: format!("group {id}"),
        kind,
        last_activity,
        entity: entity(id),
    }
}

pub(crate) fn participant(marker: &str, user_id: i64) -> RawParticipant {
    RawParticipant(json!({ "_": marker, "user_id": user_id }))
}

fn group_of(entity: &EntityRef) -> i64 {
    entity.0.get("id").and_then(|v| v.as_i64()).unwrap_or_default()
}

impl FakeClient {
    pub fn new(me: i64) -> Self {
        Self {
            me,
            state: Mutex::new(FakeState::default()),
        }
    }

    fn st(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add_dialog(&self, id: i64, kind: DialogKind, last_activity: Option<i64>) {
        self.st().dialogs.push(DialogSummary {
            id: GroupId(id),
            title: format!("group {id}"),
            kind,
            last_activity,
            entity: entity(id),
        });
    }

    /// Add `total` messages with ids 1..=total; the first `own` of them are ours.
    pub fn add_messages(&self, group: i64, total: usize, own: usize) {
        let mut st = self.st();
        let g = st.groups.entry(group).or_default();
        let start = g.messages.last().map(|m| m.0).unwrap_or(0);
        for i in 0..total {
            g.messages.push((start + i as i32 + 1, i < own));
        }
    }

    pub fn set_participants(&self, group: i64, participants: Vec<RawParticipant>) {
        self.st().groups.entry(group).or_default().participants = participants;
    }

    pub fn set_full_participants(&self, group: i64, participants: Vec<RawParticipant>) {
        self.st().groups.entry(group).or_default().full_participants = Some(participants);
    }

    pub fn set_self_participant(&self, group: i64, participant: RawParticipant) {
        self.st().groups.entry(group).or_default().self_participant = Some(participant);
    }

    pub fn fail_always(&self, method: &'static str, mode: Fail) {
        self.st().rules.push((method, None, mode));
    }

    pub fn fail_on_call(&self, method: &'static str, nth: usize, mode: Fail) {
        self.st().rules.push((method, Some(nth), mode));
    }

    pub fn ignore_offset(&self) {
        self.st().ignore_offset = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.st().calls.clone()
    }

    pub fn calls_named(&self, method: &str) -> usize {
        self.st().calls.iter().filter(|c| c.method == method).count()
    }

    pub fn methods(&self) -> Vec<&'static str> {
        self.st().calls.iter().map(|c| c.method).collect()
    }

    pub fn mutating_calls(&self) -> usize {
        self.st()
            .calls
            .iter()
            .filter(|c| MUTATING.contains(&c.method))
            .count()
    }

    pub fn remaining_messages(&self, group: i64) -> usize {
        self.st()
            .groups
            .get(&group)
            .map(|g| g.messages.len())
            .unwrap_or(0)
    }

    fn record(
        &self,
        method: &'static str,
        group: Option<i64>,
        detail: impl Into<String>,
    ) -> Result<MutexGuard<'_, FakeState>> {
        let mut st = self.st();
        st.calls.push(Call {
            method,
            group,
            detail: detail.into(),
        });
        let nth = st.calls.iter().filter(|c| c.method == method).count();
        let hit = st
            .rules
            .iter()
            .find(|(m, idx, _)| *m == method && idx.map_or(true, |i| i == nth))
            .map(|(_, _, mode)| *mode);
        match hit {
            Some(Fail::Forbidden) => Err(Error::Forbidden(format!("{method}: CHAT_ADMIN_REQUIRED"))),
            Some(Fail::Remote) => Err(Error::Remote(format!("{method}: INTERNAL"))),
            None => Ok(st),
        }
    }
}

#[async_trait]
impl GroupClient for FakeClient {
    async fn self_id(&self) -> Result<UserKey> {
        self.record("self_id", None, "")?;
        Ok(UserKey::from(self.me))
    }

    async fn list_dialogs(&self, limit: usize) -> Result<Vec<DialogSummary>> {
        let st = self.record("list_dialogs", None, limit.to_string())?;
        Ok(st.dialogs.iter().take(limit).cloned().collect())
    }

    async fn get_messages(
        &self,
        entity: &EntityRef,
        filter: MessageFilter,
    ) -> Result<Vec<MessageRecord>> {
        let gid = group_of(entity);
        let st = self.record("get_messages", Some(gid), format!("{filter:?}"))?;
        let Some(g) = st.groups.get(&gid) else {
            return Ok(Vec::new());
        };
        let before = filter
            .offset_before_id
            .map(|m| m.0)
            .filter(|id| *id > 0 && !st.ignore_offset);
        Ok(g.messages
            .iter()
            .rev()
            .filter(|(id, _)| before.map_or(true, |b| *id < b))
            .filter(|(_, own)| !filter.from_self || *own)
            .take(filter.limit)
            .map(|(id, _)| MessageRecord::new(MessageId(*id), Some("text"), i64::from(*id)))
            .collect())
    }

    async fn delete_messages(&self, entity: &EntityRef, ids: &[MessageId]) -> Result<usize> {
        let gid = group_of(entity);
        let mut st = self.record("delete_messages", Some(gid), ids.len().to_string())?;
        let Some(g) = st.groups.get_mut(&gid) else {
            return Ok(0);
        };
        let before = g.messages.len();
        g.messages.retain(|(id, _)| !ids.contains(&MessageId(*id)));
        Ok(before - g.messages.len())
    }

    async fn get_participants(
        &self,
        entity: &EntityRef,
        limit: usize,
    ) -> Result<Vec<RawParticipant>> {
        let gid = group_of(entity);
        let st = self.record("get_participants", Some(gid), limit.to_string())?;
        Ok(st
            .groups
            .get(&gid)
            .map(|g| g.participants.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_full_group_participants(
        &self,
        entity: &EntityRef,
    ) -> Result<Vec<RawParticipant>> {
        let gid = group_of(entity);
        let st = self.record("get_full_group_participants", Some(gid), "")?;
        Ok(st
            .groups
            .get(&gid)
            .and_then(|g| g.full_participants.clone())
            .unwrap_or_default())
    }

    async fn get_self_participant(&self, entity: &EntityRef) -> Result<Option<RawParticipant>> {
        let gid = group_of(entity);
        let st = self.record("get_self_participant", Some(gid), "")?;
        Ok(st.groups.get(&gid).and_then(|g| g.self_participant.clone()))
    }

    async fn ban_participant(
        &self,
        entity: &EntityRef,
        participant: &RawParticipant,
    ) -> Result<()> {
        let who = participant.0.get("user_id").map(|v| v.to_string()).unwrap_or_default();
        self.record("ban_participant", Some(group_of(entity)), who)?;
        Ok(())
    }

    async fn remove_chat_user(
        &self,
        entity: &EntityRef,
        participant: &RawParticipant,
    ) -> Result<()> {
        let who = participant.0.get("user_id").map(|v| v.to_string()).unwrap_or_default();
        self.record("remove_chat_user", Some(group_of(entity)), who)?;
        Ok(())
    }

    async fn delete_channel(&self, entity: &EntityRef) -> Result<()> {
        self.record("delete_channel", Some(group_of(entity)), "")?;
        Ok(())
    }

    async fn delete_basic_group(&self, entity: &EntityRef) -> Result<()> {
        self.record("delete_basic_group", Some(group_of(entity)), "")?;
        Ok(())
    }

    async fn leave(&self, entity: &EntityRef) -> Result<()> {
        self.record("leave", Some(group_of(entity)), "")?;
        Ok(())
    }

    async fn leave_channel(&self, entity: &EntityRef) -> Result<()> {
        self.record("leave_channel", Some(group_of(entity)), "")?;
        Ok(())
    }

    async fn remove_self_from_chat(&self, entity: &EntityRef) -> Result<()> {
        self.record("remove_self_from_chat", Some(group_of(entity)), "")?;
        Ok(())
    }

    async fn clear_history(&self, entity: &EntityRef) -> Result<()> {
        self.record("clear_history", Some(group_of(entity)), "")?;
        Ok(())
    }
}
