use serde::{Deserialize, Serialize};

/// Platform-unique group/channel id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub i64);

/// Message id within one group. Monotonic, used as a pagination cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i32);

/// Opaque address of a remote group (or of a participant inside one).
///
/// Adapters put whatever they need to reach the entity again in here. The engine
/// never looks inside, it only hands the value back to the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityRef(pub serde_json::Value);

/// Platform-level group category. Decides which removal/deletion calls are legal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    BasicGroup,
    /// Broadcast channels and supergroups.
    Channel,
}

impl GroupKind {
    pub fn label(self) -> &'static str {
        match self {
            GroupKind::BasicGroup => "group",
            GroupKind::Channel => "channel",
        }
    }
}

/// One group or channel the user belongs to, as seen during a scan pass.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupHandle {
    pub id: GroupId,
    pub title: String,
    pub kind: GroupKind,
    /// Epoch seconds of the last message in the dialog, if known.
    pub last_activity: Option<i64>,
    pub entity: EntityRef,
}

/// Placeholder text for messages without a text body.
pub const MEDIA_PLACEHOLDER: &str = "[Media/File]";

/// Snapshot of one message as fetched from the remote side.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub text: String,
    pub timestamp: i64,
}

impl MessageRecord {
    pub fn new(id: MessageId, text: Option<&str>, timestamp: i64) -> Self {
        let text = match text.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => MEDIA_PLACEHOLDER.to_string(),
        };
        Self {
            id,
            text,
            timestamp,
        }
    }
}

/// The caller's standing in a group. Always recomputed, never cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Member,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
        }
    }
}

/// Canonical string form of a numeric user id.
///
/// Ids may exceed 53-bit precision on some clients, so identities are compared as
/// normalised strings instead of native integers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserKey(String);

impl UserKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let mut s = raw.trim();
        s = s.strip_suffix('n').unwrap_or(s);
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let digits = digits.trim_start_matches('0');
        if digits.is_empty() {
            return Some(Self("0".to_string()));
        }
        if negative {
            Some(Self(format!("-{digits}")))
        } else {
            Some(Self(digits.to_string()))
        }
    }

    /// Read a key from a JSON number or numeric string.
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        if let Some(n) = v.as_i64() {
            return Some(Self(n.to_string()));
        }
        if let Some(n) = v.as_u64() {
            return Some(Self(n.to_string()));
        }
        v.as_str().and_then(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for UserKey {
    fn from(v: i64) -> Self {
        Self(v.to_string())
    }
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
