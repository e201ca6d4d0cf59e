//! Built-in protobuf schemas for the coordinator messages.
//!
//! The schemas are assembled at runtime as descriptor protos and loaded
//! into a [`DescriptorPool`], so no `protoc` step is needed. They use
//! proto3 field rules: scalars carry no presence bit, which means a
//! scalar sent with its default value decodes exactly like one that was
//! never sent.

use std::sync::LazyLock;

use prost_reflect::{DescriptorPool, MessageDescriptor};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto,
    FieldDescriptorProto, FileDescriptorProto,
};

use crate::ProtocolError;

static POOL: LazyLock<DescriptorPool> = LazyLock::new(|| {
    build_pool().expect("built-in coordinator schemas are well-formed")
});

/// The process-wide schema pool.
pub fn pool() -> &'static DescriptorPool {
    &POOL
}

/// Looks up a message schema by full name, e.g. `"CMsgClientHello"`.
pub fn message(name: &str) -> Result<MessageDescriptor, ProtocolError> {
    pool()
        .get_message_by_name(name)
        .ok_or_else(|| ProtocolError::UnknownSchema(name.to_string()))
}

/// Builds a fresh pool containing every coordinator schema.
pub fn build_pool() -> Result<DescriptorPool, ProtocolError> {
    let mut pool = DescriptorPool::new();
    pool.add_file_descriptor_proto(gcsdk_file())?;
    pool.add_file_descriptor_proto(underlords_file())?;
    Ok(pool)
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn field(name: &str, number: i32, label: Label, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn scalar(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    field(name, number, Label::Optional, ty)
}

fn repeated(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    field(name, number, Label::Repeated, ty)
}

fn typed(
    name: &str,
    number: i32,
    label: Label,
    ty: Type,
    type_name: &str,
) -> FieldDescriptorProto {
    FieldDescriptorProto {
        type_name: Some(format!(".{type_name}")),
        ..field(name, number, label, ty)
    }
}

fn nested(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    typed(name, number, Label::Optional, Type::Message, type_name)
}

fn nested_list(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    typed(name, number, Label::Repeated, Type::Message, type_name)
}

fn message_proto(name: &str, fields: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field: fields,
        ..Default::default()
    }
}

fn file(
    name: &str,
    messages: Vec<DescriptorProto>,
    enums: Vec<EnumDescriptorProto>,
) -> FileDescriptorProto {
    FileDescriptorProto {
        name: Some(name.to_string()),
        syntax: Some("proto3".to_string()),
        message_type: messages,
        enum_type: enums,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Coordinator SDK base messages
// ---------------------------------------------------------------------------

fn gcsdk_file() -> FileDescriptorProto {
    let status_enum = EnumDescriptorProto {
        name: Some("GCConnectionStatus".to_string()),
        value: [
            "GCConnectionStatus_HAVE_SESSION",
            "GCConnectionStatus_GC_GOING_DOWN",
            "GCConnectionStatus_NO_SESSION",
            "GCConnectionStatus_NO_SESSION_IN_LOGON_QUEUE",
            "GCConnectionStatus_NO_STEAM",
            "GCConnectionStatus_SUSPENDED",
            "GCConnectionStatus_STEAM_GOING_DOWN",
        ]
        .iter()
        .zip(0..)
        .map(|(name, number)| EnumValueDescriptorProto {
            name: Some((*name).to_string()),
            number: Some(number),
            ..Default::default()
        })
        .collect(),
        ..Default::default()
    };

    let hello = message_proto(
        "CMsgClientHello",
        vec![
            scalar("version", 1, Type::Uint32),
            scalar("client_session_need", 3, Type::Uint32),
            scalar("client_launcher", 4, Type::Uint32),
            scalar("secret_key", 5, Type::String),
            scalar("client_language", 6, Type::Uint32),
            scalar("engine", 7, Type::Uint32),
            scalar("os_type", 11, Type::Int32),
        ],
    );

    let mut welcome = message_proto(
        "CMsgClientWelcome",
        vec![
            scalar("version", 1, Type::Uint32),
            scalar("game_data", 2, Type::Bytes),
            nested("location", 5, "CMsgClientWelcome.Location"),
            scalar("save_game_key", 6, Type::Bytes),
            scalar("items_game_url", 8, Type::String),
            scalar("gc_socache_file_version", 9, Type::Uint32),
            scalar("txn_country_code", 10, Type::String),
            scalar("game_data2", 11, Type::Bytes),
            scalar("rtime32_gc_welcome_timestamp", 12, Type::Uint32),
            scalar("currency", 13, Type::Uint32),
        ],
    );
    welcome.nested_type.push(message_proto(
        "Location",
        vec![
            scalar("latitude", 1, Type::Float),
            scalar("longitude", 2, Type::Float),
            scalar("country", 3, Type::String),
        ],
    ));

    let status = message_proto(
        "CMsgConnectionStatus",
        vec![
            typed("status", 1, Label::Optional, Type::Enum, "GCConnectionStatus"),
            scalar("client_session_need", 2, Type::Uint32),
            scalar("queue_position", 3, Type::Int32),
            scalar("queue_size", 4, Type::Int32),
            scalar("wait_seconds", 5, Type::Int32),
            scalar("estimated_wait_seconds_remaining", 6, Type::Int32),
        ],
    );

    file(
        "gcsdk_gcmessages.proto",
        vec![hello, welcome, status],
        vec![status_enum],
    )
}

// ---------------------------------------------------------------------------
// Underlords client messages
// ---------------------------------------------------------------------------

fn underlords_file() -> FileDescriptorProto {
    let unit = message_proto(
        "CMsgMatchUnit",
        vec![
            scalar("unit_id", 1, Type::Uint32),
            scalar("rank", 2, Type::Uint32),
            scalar("item_id", 3, Type::Uint32),
        ],
    );

    let profile = message_proto(
        "CMsgPlayerProfile",
        vec![
            scalar("account_id", 1, Type::Uint32),
            scalar("level", 2, Type::Uint32),
            scalar("xp", 3, Type::Uint32),
            scalar("rank_tier", 4, Type::Uint32),
            scalar("mmr", 5, Type::Uint32),
            scalar("leaderboard_rank", 6, Type::Uint32),
            scalar("matches_played", 7, Type::Uint32),
            scalar("first_place_finishes", 8, Type::Uint32),
            scalar("top_four_finishes", 9, Type::Uint32),
            repeated("equipped_items", 10, Type::Uint32),
        ],
    );

    let get_profile = message_proto(
        "CMsgClientToGCGetProfile",
        vec![scalar("account_id", 1, Type::Uint32)],
    );
    let get_profile_response = message_proto(
        "CMsgClientToGCGetProfileResponse",
        vec![
            scalar("result", 1, Type::Uint32),
            nested("player_profile", 2, "CMsgPlayerProfile"),
        ],
    );

    let get_match_history = message_proto(
        "CMsgClientToGCGetMatchHistory",
        vec![
            scalar("account_id", 1, Type::Uint32),
            scalar("match_id_cursor", 2, Type::Uint64),
            scalar("request_rows", 3, Type::Uint32),
        ],
    );
    let mut get_match_history_response = message_proto(
        "CMsgClientToGCGetMatchHistoryResponse",
        vec![
            scalar("result", 1, Type::Uint32),
            nested_list(
                "matches",
                2,
                "CMsgClientToGCGetMatchHistoryResponse.Match",
            ),
        ],
    );
    get_match_history_response.nested_type.push(message_proto(
        "Match",
        vec![
            scalar("match_id", 1, Type::Uint64),
            scalar("match_start_time", 2, Type::Uint32),
            scalar("duration", 3, Type::Uint32),
            scalar("final_place", 4, Type::Uint32),
            scalar("rank_tier", 5, Type::Uint32),
            scalar("mmr_change", 6, Type::Sint32),
            scalar("mode", 7, Type::Uint32),
            nested_list("final_units", 8, "CMsgMatchUnit"),
        ],
    ));

    let get_post_match_stats = message_proto(
        "CMsgClientToGCGetPostMatchStats",
        vec![scalar("match_id", 1, Type::Uint64)],
    );
    let mut post_match_stats = message_proto(
        "CMsgPostMatchStats",
        vec![
            scalar("match_id", 1, Type::Uint64),
            scalar("match_start_time", 2, Type::Uint32),
            scalar("duration", 3, Type::Uint32),
            nested_list("players", 4, "CMsgPostMatchStats.Player"),
        ],
    );
    post_match_stats.nested_type.push(message_proto(
        "Player",
        vec![
            scalar("account_id", 1, Type::Uint32),
            scalar("final_place", 2, Type::Uint32),
            scalar("persona_name", 3, Type::String),
            nested_list("final_units", 4, "CMsgMatchUnit"),
            scalar("rank_tier", 5, Type::Uint32),
            scalar("gold_earned", 6, Type::Uint32),
        ],
    ));
    let get_post_match_stats_response = message_proto(
        "CMsgClientToGCGetPostMatchStatsResponse",
        vec![
            scalar("result", 1, Type::Uint32),
            nested("post_match_stats", 2, "CMsgPostMatchStats"),
        ],
    );

    let get_friend_ranks = message_proto("CMsgClientToGCGetFriendRanks", vec![]);
    let mut get_friend_ranks_response = message_proto(
        "CMsgClientToGCGetFriendRanksResponse",
        vec![
            scalar("result", 1, Type::Uint32),
            nested_list(
                "friends",
                2,
                "CMsgClientToGCGetFriendRanksResponse.FriendRank",
            ),
        ],
    );
    get_friend_ranks_response.nested_type.push(message_proto(
        "FriendRank",
        vec![
            scalar("account_id", 1, Type::Uint32),
            scalar("rank_tier", 2, Type::Uint32),
            scalar("leaderboard_rank", 3, Type::Uint32),
            scalar("level", 4, Type::Uint32),
        ],
    ));

    let spectate_user = message_proto(
        "CMsgClientToGCSpectateUser",
        vec![
            scalar("spectate_account_id", 1, Type::Uint32),
            scalar("region_mode", 2, Type::Uint32),
        ],
    );
    let spectate_user_response = message_proto(
        "CMsgClientToGCSpectateUserResponse",
        vec![
            scalar("result", 1, Type::Uint32),
            scalar("lobby_id", 2, Type::Uint64),
            scalar("server_steam_id", 3, Type::Fixed64),
            scalar("spectator_token", 4, Type::Bytes),
        ],
    );

    file(
        "underlords_gcmessages_client.proto",
        vec![
            unit,
            profile,
            get_profile,
            get_profile_response,
            get_match_history,
            get_match_history_response,
            get_post_match_stats,
            post_match_stats,
            get_post_match_stats_response,
            get_friend_ranks,
            get_friend_ranks_response,
            spectate_user,
            spectate_user_response,
        ],
        vec![],
    )
}
