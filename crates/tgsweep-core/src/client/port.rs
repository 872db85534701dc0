use async_trait::async_trait;

use crate::{
    client::types::{DialogSummary, MessageFilter, RawParticipant},
    domain::{EntityRef, MessageId, MessageRecord, UserKey},
    Result,
};

/// Remote group client port.
///
/// Every group-scoped call is addressed by an [`EntityRef`] taken from a scan, never
/// by a bare id. Implementations are expected to be fallible and rate limited; the
/// engine calls them strictly one at a time.
#[async_trait]
pub trait GroupClient: Send + Sync {
    /// Id of the authenticated account.
    async fn self_id(&self) -> Result<UserKey>;

    async fn list_dialogs(&self, limit: usize) -> Result<Vec<DialogSummary>>;

    async fn get_messages(
        &self,
        entity: &EntityRef,
        filter: MessageFilter,
    ) -> Result<Vec<MessageRecord>>;

    /// Delete for everyone (revoke). Returns how many were actually removed.
    async fn delete_messages(&self, entity: &EntityRef, ids: &[MessageId]) -> Result<usize>;

    async fn get_participants(
        &self,
        entity: &EntityRef,
        limit: usize,
    ) -> Result<Vec<RawParticipant>>;

    /// Participant list embedded in the full chat record. Basic groups only.
    async fn get_full_group_participants(&self, entity: &EntityRef)
        -> Result<Vec<RawParticipant>>;

    /// The caller's own participant record. Channels only.
    async fn get_self_participant(&self, entity: &EntityRef) -> Result<Option<RawParticipant>>;

    /// Permanent ban with every right revoked. Channels only.
    async fn ban_participant(&self, entity: &EntityRef, participant: &RawParticipant)
        -> Result<()>;

    /// Basic groups only.
    async fn remove_chat_user(
        &self,
        entity: &EntityRef,
        participant: &RawParticipant,
    ) -> Result<()>;

    async fn delete_channel(&self, entity: &EntityRef) -> Result<()>;
    async fn delete_basic_group(&self, entity: &EntityRef) -> Result<()>;

    /// High-level "leave this dialog".
    async fn leave(&self, entity: &EntityRef) -> Result<()>;
    async fn leave_channel(&self, entity: &EntityRef) -> Result<()>;
    async fn remove_self_from_chat(&self, entity: &EntityRef) -> Result<()>;

    /// Clear the caller's view of the history.
    async fn clear_history(&self, entity: &EntityRef) -> Result<()>;
}
