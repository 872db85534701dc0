//! Conversions between grammers / TL values and core types.

use std::collections::HashMap;

use grammers_session::{PackedChat, PackedType};
use grammers_tl_types as tl;
use serde_json::json;

use tgsweep_core::{
    client::types::{DialogKind, MessageFilter, RawParticipant},
    domain::EntityRef,
    errors::Error,
    Result,
};

/// Server-side cap for one participants page.
pub const MAX_PARTICIPANTS_PAGE: usize = 200;

/// RPC error names that mean "not allowed / can't see it" rather than a real
/// failure.
const FORBIDDEN_RPC: &[&str] = &[
    "CHAT_ADMIN_REQUIRED",
    "CHANNEL_PRIVATE",
    "CHAT_FORBIDDEN",
    "CHAT_WRITE_FORBIDDEN",
    "USER_NOT_PARTICIPANT",
    "RIGHT_FORBIDDEN",
    "USER_ADMIN_INVALID",
];

pub fn map_err(e: impl std::fmt::Display) -> Error {
    classify_failure(&e.to_string())
}

pub fn classify_failure(msg: &str) -> Error {
    if FORBIDDEN_RPC.iter().any(|name| msg.contains(name)) {
        Error::Forbidden(msg.to_string())
    } else {
        Error::Remote(msg.to_string())
    }
}

pub fn dialog_kind(ty: PackedType) -> DialogKind {
    match ty {
        PackedType::User | PackedType::Bot => DialogKind::User,
        PackedType::Chat => DialogKind::BasicGroup,
        PackedType::Megagroup | PackedType::Broadcast | PackedType::Gigagroup => {
            DialogKind::Channel
        }
    }
}

fn type_name(ty: PackedType) -> &'static str {
    match ty {
        PackedType::User => "user",
        PackedType::Bot => "bot",
        PackedType::Chat => "chat",
        PackedType::Megagroup => "megagroup",
        PackedType::Broadcast => "broadcast",
        PackedType::Gigagroup => "gigagroup",
    }
}

fn parse_type_name(s: &str) -> Option<PackedType> {
    Some(match s {
        "user" => PackedType::User,
        "bot" => PackedType::Bot,
        "chat" => PackedType::Chat,
        "megagroup" => PackedType::Megagroup,
        "broadcast" => PackedType::Broadcast,
        "gigagroup" => PackedType::Gigagroup,
        _ => return None,
    })
}

pub fn entity_ref(id: i64, access_hash: Option<i64>, ty: PackedType) -> EntityRef {
    EntityRef(json!({
        "id": id,
        "access_hash": access_hash,
        "ty": type_name(ty),
    }))
}

pub fn packed_chat(entity: &EntityRef) -> Result<PackedChat> {
    let v = &entity.0;
    let id = v
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| Error::External(format!("entity without id: {v}")))?;
    let ty = v
        .get("ty")
        .and_then(|v| v.as_str())
        .and_then(parse_type_name)
        .ok_or_else(|| Error::External(format!("entity without type: {v}")))?;
    let access_hash = v.get("access_hash").and_then(|v| v.as_i64());
    Ok(PackedChat {
        ty,
        id,
        access_hash,
    })
}

pub fn input_channel(chat: &PackedChat) -> Result<tl::enums::InputChannel> {
    match (chat.ty, chat.access_hash) {
        (PackedType::Megagroup | PackedType::Broadcast | PackedType::Gigagroup, Some(hash)) => {
            Ok(tl::enums::InputChannel::Channel(tl::types::InputChannel {
                channel_id: chat.id,
                access_hash: hash,
            }))
        }
        _ => Err(Error::Remote(format!("{} is not a channel", chat.id))),
    }
}

pub fn input_peer(chat: &PackedChat) -> tl::enums::InputPeer {
    match chat.ty {
        PackedType::Chat => {
            tl::enums::InputPeer::Chat(tl::types::InputPeerChat { chat_id: chat.id })
        }
        PackedType::User | PackedType::Bot => {
            tl::enums::InputPeer::User(tl::types::InputPeerUser {
                user_id: chat.id,
                access_hash: chat.access_hash.unwrap_or(0),
            })
        }
        PackedType::Megagroup | PackedType::Broadcast | PackedType::Gigagroup => {
            tl::enums::InputPeer::Channel(tl::types::InputPeerChannel {
                channel_id: chat.id,
                access_hash: chat.access_hash.unwrap_or(0),
            })
        }
    }
}

/// `(user_id, access_hash)` carried by a participant record.
pub fn participant_user(p: &RawParticipant) -> Result<(i64, i64)> {
    let user_id = p.0.get("user_id").and_then(|v| v.as_i64());
    let access_hash = p.0.get("access_hash").and_then(|v| v.as_i64());
    match (user_id, access_hash) {
        (Some(id), Some(hash)) => Ok((id, hash)),
        (Some(id), None) => Err(Error::Remote(format!("no access hash for user {id}"))),
        _ => Err(Error::Remote("participant without user id".to_string())),
    }
}

pub fn participant_record(
    marker: &str,
    user_id: Option<i64>,
    hashes: &HashMap<i64, i64>,
) -> RawParticipant {
    let access_hash = user_id.and_then(|id| hashes.get(&id).copied());
    RawParticipant(json!({
        "_": marker,
        "user_id": user_id,
        "access_hash": access_hash,
    }))
}

/// `offset_id` for a history or search request: 0 starts from the newest message.
pub fn history_offset(filter: &MessageFilter) -> i32 {
    filter
        .offset_before_id
        .map(|m| m.0)
        .filter(|id| *id > 0)
        .unwrap_or(0)
}

/// Size of the next participants page, `None` once `limit` entries are in or the
/// server has nothing more (`total` as reported by the last page).
pub fn next_participants_page(
    fetched: usize,
    limit: usize,
    total: Option<usize>,
) -> Option<usize> {
    if fetched >= limit || total.is_some_and(|t| fetched >= t) {
        return None;
    }
    Some((limit - fetched).min(MAX_PARTICIPANTS_PAGE))
}

pub fn access_hashes(users: &[tl::enums::User]) -> HashMap<i64, i64> {
    users
        .iter()
        .filter_map(|u| match u {
            tl::enums::User::User(u) => u.access_hash.map(|h| (u.id, h)),
            tl::enums::User::Empty(_) => None,
        })
        .collect()
}

fn peer_user_id(peer: &tl::enums::Peer) -> Option<i64> {
    match peer {
        tl::enums::Peer::User(u) => Some(u.user_id),
        _ => None,
    }
}

pub fn channel_participant(
    p: &tl::enums::ChannelParticipant,
    hashes: &HashMap<i64, i64>,
) -> RawParticipant {
    use tl::enums::ChannelParticipant as P;

    let (marker, user_id) = match p {
        P::Participant(p) => ("channelParticipant", Some(p.user_id)),
        P::Creator(p) => ("channelParticipantCreator", Some(p.user_id)),
        P::Admin(p) => ("channelParticipantAdmin", Some(p.user_id)),
        P::Banned(p) => ("channelParticipantBanned", peer_user_id(&p.peer)),
        P::Left(p) => ("channelParticipantLeft", peer_user_id(&p.peer)),
        // Only ever the caller, who is never a removal target.
        _ => ("channelParticipantSelf", None),
    };
    participant_record(marker, user_id, hashes)
}

pub fn chat_participant(
    p: &tl::enums::ChatParticipant,
    hashes: &HashMap<i64, i64>,
) -> RawParticipant {
    use tl::enums::ChatParticipant as P;

    let (marker, user_id) = match p {
        P::Participant(p) => ("chatParticipant", p.user_id),
        P::Creator(p) => ("chatParticipantCreator", p.user_id),
        P::Admin(p) => ("chatParticipantAdmin", p.user_id),
    };
    participant_record(marker, Some(user_id), hashes)
}

/// Every right revoked, no expiry.
pub fn banned_rights() -> tl::enums::ChatBannedRights {
    tl::enums::ChatBannedRights::Rights(tl::types::ChatBannedRights {
        view_messages: true,
        send_messages: true,
        send_media: true,
        send_stickers: true,
        send_gifs: true,
        send_games: true,
        send_inline: true,
        embed_links: true,
        send_polls: true,
        change_info: true,
        invite_users: true,
        pin_messages: true,
        manage_topics: true,
        send_photos: true,
        send_videos: true,
        send_roundvideos: true,
        send_audios: true,
        send_voices: true,
        send_docs: true,
        send_plain: true,
        until_date: 0,
    })
}
