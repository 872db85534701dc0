//! Telegram adapter (grammers).
//!
//! This crate implements the `tgsweep-core` GroupClient port over an MTProto user
//! session. Logging in is out of scope: the session file must already be
//! authorized.

use std::path::Path;

use async_trait::async_trait;
use grammers_client::{Client, Config, InitParams};
use grammers_session::{PackedType, Session};
use grammers_tl_types as tl;
use tokio::sync::OnceCell;
use tracing::{debug, info};

pub mod convert;

use convert::{map_err, packed_chat};
use tgsweep_core::{
    client::{
        port::GroupClient,
        types::{DialogSummary, MessageFilter, RawParticipant},
    },
    domain::{EntityRef, GroupId, MessageId, MessageRecord, UserKey},
    errors::Error,
    Result,
};

#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    me: OnceCell<UserKey>,
}

impl TelegramClient {
    /// Connect with an existing, authorized session file.
    pub async fn connect(api_id: i32, api_hash: &str, session_file: &Path) -> Result<Self> {
        let session = Session::load_file_or_create(session_file)?;
        let client = Client::connect(Config {
            session,
            api_id,
            api_hash: api_hash.to_string(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| Error::External(format!("telegram connect failed: {e}")))?;

        if !client.is_authorized().await.map_err(map_err)? {
            return Err(Error::Config(format!(
                "session {} is not logged in",
                session_file.display()
            )));
        }
        client.session().save_to_file(session_file)?;
        info!("connected with session {}", session_file.display());

        Ok(Self {
            client,
            me: OnceCell::new(),
        })
    }

    async fn full_chat_participants(&self, chat_id: i64) -> Result<Vec<RawParticipant>> {
        let tl::enums::messages::ChatFull::Full(full) = self
            .client
            .invoke(&tl::functions::messages::GetFullChat { chat_id })
            .await
            .map_err(map_err)?;
        let hashes = convert::access_hashes(&full.users);

        match full.full_chat {
            tl::enums::ChatFull::Full(chat) => match chat.participants {
                tl::enums::ChatParticipants::Participants(list) => Ok(list
                    .participants
                    .iter()
                    .map(|p| convert::chat_participant(p, &hashes))
                    .collect()),
                tl::enums::ChatParticipants::Forbidden(_) => Err(Error::Forbidden(format!(
                    "participants of chat {chat_id} are hidden"
                ))),
            },
            tl::enums::ChatFull::ChannelFull(_) => {
                Err(Error::Remote(format!("{chat_id} is a channel, not a basic group")))
            }
        }
    }

    async fn delete_chat_user(&self, chat_id: i64, user_id: tl::enums::InputUser) -> Result<()> {
        self.client
            .invoke(&tl::functions::messages::DeleteChatUser {
                revoke_history: false,
                chat_id,
                user_id,
            })
            .await
            .map_err(map_err)?;
        Ok(())
    }
}

#[async_trait]
impl GroupClient for TelegramClient {
    async fn self_id(&self) -> Result<UserKey> {
        let me = self
            .me
            .get_or_try_init(|| async {
                let user = self.client.get_me().await.map_err(map_err)?;
                Ok::<_, Error>(UserKey::from(user.id()))
            })
            .await?;
        Ok(me.clone())
    }

    async fn list_dialogs(&self, limit: usize) -> Result<Vec<DialogSummary>> {
        let mut dialogs = self.client.iter_dialogs();
        let mut out = Vec::new();

        while out.len() < limit {
            let Some(dialog) = dialogs.next().await.map_err(map_err)? else {
                break;
            };
            let chat = dialog.chat();
            let packed = chat.pack();
            out.push(DialogSummary {
                id: GroupId(packed.id),
                title: chat.name().to_string(),
                kind: convert::dialog_kind(packed.ty),
                last_activity: dialog.last_message.as_ref().map(|m| m.date().timestamp()),
                entity: convert::entity_ref(packed.id, packed.access_hash, packed.ty),
            });
        }
        debug!("listed {} dialogs", out.len());
        Ok(out)
    }

    async fn get_messages(
        &self,
        entity: &EntityRef,
        filter: MessageFilter,
    ) -> Result<Vec<MessageRecord>> {
        let chat = packed_chat(entity)?;
        let offset = convert::history_offset(&filter);
        let mut out = Vec::with_capacity(filter.limit);

        // Both iterators yield newest first, strictly older than `offset_id`.
        if filter.from_self {
            let mut iter = self
                .client
                .search_messages(chat)
                .sent_by_self()
                .offset_id(offset)
                .limit(filter.limit);
            while let Some(m) = iter.next().await.map_err(map_err)? {
                out.push(MessageRecord::new(
                    MessageId(m.id()),
                    Some(m.text()),
                    m.date().timestamp(),
                ));
            }
        } else {
            let mut iter = self
                .client
                .iter_messages(chat)
                .offset_id(offset)
                .limit(filter.limit);
            while let Some(m) = iter.next().await.map_err(map_err)? {
                out.push(MessageRecord::new(
                    MessageId(m.id()),
                    Some(m.text()),
                    m.date().timestamp(),
                ));
            }
        }
        Ok(out)
    }

    async fn delete_messages(&self, entity: &EntityRef, ids: &[MessageId]) -> Result<usize> {
        let chat = packed_chat(entity)?;
        let ids: Vec<i32> = ids.iter().map(|m| m.0).collect();
        self.client
            .delete_messages(chat, &ids)
            .await
            .map_err(map_err)
    }

    async fn get_participants(
        &self,
        entity: &EntityRef,
        limit: usize,
    ) -> Result<Vec<RawParticipant>> {
        let chat = packed_chat(entity)?;
        if matches!(chat.ty, PackedType::Chat) {
            let mut list = self.full_chat_participants(chat.id).await?;
            list.truncate(limit);
            return Ok(list);
        }

        let channel = convert::input_channel(&chat)?;
        let mut out: Vec<RawParticipant> = Vec::new();
        let mut total = None;

        while let Some(want) = convert::next_participants_page(out.len(), limit, total) {
            let res = self
                .client
                .invoke(&tl::functions::channels::GetParticipants {
                    channel: channel.clone(),
                    filter: tl::enums::ChannelParticipantsFilter::ChannelParticipantsRecent,
                    offset: out.len() as i32,
                    limit: want as i32,
                    hash: 0,
                })
                .await
                .map_err(map_err)?;

            let tl::enums::channels::ChannelParticipants::Participants(page) = res else {
                break;
            };
            if page.participants.is_empty() {
                break;
            }
            total = Some(page.count.max(0) as usize);
            let hashes = convert::access_hashes(&page.users);
            out.extend(
                page.participants
                    .iter()
                    .map(|p| convert::channel_participant(p, &hashes)),
            );
        }
        debug!("fetched {} participants", out.len());
        Ok(out)
    }

    async fn get_full_group_participants(
        &self,
        entity: &EntityRef,
    ) -> Result<Vec<RawParticipant>> {
        let chat = packed_chat(entity)?;
        self.full_chat_participants(chat.id).await
    }

    async fn get_self_participant(&self, entity: &EntityRef) -> Result<Option<RawParticipant>> {
        let chat = packed_chat(entity)?;
        let Ok(channel) = convert::input_channel(&chat) else {
            return Ok(None);
        };

        let tl::enums::channels::ChannelParticipant::Participant(found) = self
            .client
            .invoke(&tl::functions::channels::GetParticipant {
                channel,
                participant: tl::enums::InputPeer::PeerSelf,
            })
            .await
            .map_err(map_err)?;
        let hashes = convert::access_hashes(&found.users);
        Ok(Some(convert::channel_participant(&found.participant, &hashes)))
    }

    async fn ban_participant(
        &self,
        entity: &EntityRef,
        participant: &RawParticipant,
    ) -> Result<()> {
        let chat = packed_chat(entity)?;
        let (user_id, access_hash) = convert::participant_user(participant)?;
        self.client
            .invoke(&tl::functions::channels::EditBanned {
                channel: convert::input_channel(&chat)?,
                participant: tl::enums::InputPeer::User(tl::types::InputPeerUser {
                    user_id,
                    access_hash,
                }),
                banned_rights: convert::banned_rights(),
            })
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn remove_chat_user(
        &self,
        entity: &EntityRef,
        participant: &RawParticipant,
    ) -> Result<()> {
        let chat = packed_chat(entity)?;
        let (user_id, access_hash) = convert::participant_user(participant)?;
        let user = tl::enums::InputUser::User(tl::types::InputUser {
            user_id,
            access_hash,
        });
        self.delete_chat_user(chat.id, user).await
    }

    async fn delete_channel(&self, entity: &EntityRef) -> Result<()> {
        let chat = packed_chat(entity)?;
        self.client
            .invoke(&tl::functions::channels::DeleteChannel {
                channel: convert::input_channel(&chat)?,
            })
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete_basic_group(&self, entity: &EntityRef) -> Result<()> {
        let chat = packed_chat(entity)?;
        self.client
            .invoke(&tl::functions::messages::DeleteChat { chat_id: chat.id })
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn leave(&self, entity: &EntityRef) -> Result<()> {
        let chat = packed_chat(entity)?;
        self.client.delete_dialog(chat).await.map_err(map_err)
    }

    async fn leave_channel(&self, entity: &EntityRef) -> Result<()> {
        let chat = packed_chat(entity)?;
        self.client
            .invoke(&tl::functions::channels::LeaveChannel {
                channel: convert::input_channel(&chat)?,
            })
            .await
            .map_err(map_err)?;
        Ok(())
    }

    async fn remove_self_from_chat(&self, entity: &EntityRef) -> Result<()> {
        let chat = packed_chat(entity)?;
        self.delete_chat_user(chat.id, tl::enums::InputUser::UserSelf)
            .await
    }

    async fn clear_history(&self, entity: &EntityRef) -> Result<()> {
        let chat = packed_chat(entity)?;
        if let Ok(channel) = convert::input_channel(&chat) {
            self.client
                .invoke(&tl::functions::channels::DeleteHistory {
                    for_everyone: false,
                    channel,
                    max_id: 0,
                })
                .await
                .map_err(map_err)?;
            return Ok(());
        }

        // The server clears in chunks and reports the remainder through `offset`.
        loop {
            let tl::enums::messages::AffectedHistory::History(affected) = self
                .client
                .invoke(&tl::functions::messages::DeleteHistory {
                    just_clear: true,
                    revoke: false,
                    peer: convert::input_peer(&chat),
                    max_id: 0,
                    min_date: None,
                    max_date: None,
                })
                .await
                .map_err(map_err)?;
            if affected.offset <= 0 {
                return Ok(());
            }
        }
    }
}
