use crate::domain::{EntityRef, GroupHandle, GroupId, GroupKind, MessageId};

/// Dialog category as reported by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialogKind {
    User,
    BasicGroup,
    Channel,
}

impl DialogKind {
    pub fn group_kind(self) -> Option<GroupKind> {
        match self {
            DialogKind::User => None,
            DialogKind::BasicGroup => Some(GroupKind::BasicGroup),
            DialogKind::Channel => Some(GroupKind::Channel),
        }
    }
}

/// One entry of the user's dialog list.
#[derive(Clone, Debug)]
pub struct DialogSummary {
    pub id: GroupId,
    pub title: String,
    pub kind: DialogKind,
    pub last_activity: Option<i64>,
    pub entity: EntityRef,
}

impl DialogSummary {
    /// `None` for private chats; groups and channels become handles.
    pub fn into_group_handle(self) -> Option<GroupHandle> {
        let kind = self.kind.group_kind()?;
        Some(GroupHandle {
            id: self.id,
            title: self.title,
            kind,
            last_activity: self.last_activity,
            entity: self.entity,
        })
    }
}

/// History query. Results come newest first; `offset_before_id` returns only
/// messages older than that id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageFilter {
    pub from_self: bool,
    pub limit: usize,
    pub offset_before_id: Option<MessageId>,
}

impl MessageFilter {
    pub fn all(limit: usize, offset_before_id: Option<MessageId>) -> Self {
        Self {
            from_self: false,
            limit,
            offset_before_id,
        }
    }

    pub fn own(limit: usize, offset_before_id: Option<MessageId>) -> Self {
        Self {
            from_self: true,
            limit,
            offset_before_id,
        }
    }
}

/// A participant exactly as the adapter received it.
///
/// The adapter keeps the platform constructor name under `_` and whatever id fields
/// it saw; [`crate::participant::classify_participant`] is the only reader of the
/// shape. The full value is handed back to the client for removal calls.
#[derive(Clone, Debug, PartialEq)]
pub struct RawParticipant(pub serde_json::Value);
