//! The coordinator's message vocabulary.
//!
//! Every coordinator message carries a numeric type (its "opcode"). This
//! module holds the one table that says, for each opcode we know about,
//! what it is called and which protobuf schema its body uses. The table
//! is immutable and built once; lookups work in both directions.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

/// Opcodes this client sends or understands.
///
/// The 4000-range values are the coordinator SDK's base client messages,
/// shared by every Steam game coordinator. The 8000-range values belong
/// to Underlords.
///
/// **Provisional:** the Underlords values (8010–8019) and the matching
/// schemas in [`schema`](crate::schema) have not yet been checked against
/// the game's published message enum and protobuf definitions. Until they
/// are, treat them as placeholders; this table and `schema.rs` are the
/// only places that need to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EMsg {
    ClientWelcome = 4004,
    ClientHello = 4006,
    ClientConnectionStatus = 4009,
    GetProfile = 8010,
    GetProfileResponse = 8011,
    GetMatchHistory = 8012,
    GetMatchHistoryResponse = 8013,
    GetPostMatchStats = 8014,
    GetPostMatchStatsResponse = 8015,
    GetFriendRanks = 8016,
    GetFriendRanksResponse = 8017,
    SpectateUser = 8018,
    SpectateUserResponse = 8019,
}

impl EMsg {
    /// Every known opcode, in table order.
    pub const ALL: [EMsg; 13] = [
        EMsg::ClientWelcome,
        EMsg::ClientHello,
        EMsg::ClientConnectionStatus,
        EMsg::GetProfile,
        EMsg::GetProfileResponse,
        EMsg::GetMatchHistory,
        EMsg::GetMatchHistoryResponse,
        EMsg::GetPostMatchStats,
        EMsg::GetPostMatchStatsResponse,
        EMsg::GetFriendRanks,
        EMsg::GetFriendRanksResponse,
        EMsg::SpectateUser,
        EMsg::SpectateUserResponse,
    ];

    /// The wire value.
    pub fn id(self) -> u32 {
        self as u32
    }

    /// Looks up an opcode by wire value.
    pub fn from_id(id: u32) -> Option<EMsg> {
        MessageTable::global().get(id).map(|t| t.msg)
    }

    /// The table entry for this opcode.
    pub fn message_type(self) -> &'static MessageType {
        // Every variant has an entry; `ALL` and `MESSAGE_TYPES` are
        // checked against each other in tests.
        &MESSAGE_TYPES[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.message_type().name
    }

    /// Full name of the protobuf schema, or `None` for raw messages.
    pub fn schema(self) -> Option<&'static str> {
        self.message_type().schema
    }

    fn index(self) -> usize {
        match self {
            EMsg::ClientWelcome => 0,
            EMsg::ClientHello => 1,
            EMsg::ClientConnectionStatus => 2,
            EMsg::GetProfile => 3,
            EMsg::GetProfileResponse => 4,
            EMsg::GetMatchHistory => 5,
            EMsg::GetMatchHistoryResponse => 6,
            EMsg::GetPostMatchStats => 7,
            EMsg::GetPostMatchStatsResponse => 8,
            EMsg::GetFriendRanks => 9,
            EMsg::GetFriendRanksResponse => 10,
            EMsg::SpectateUser => 11,
            EMsg::SpectateUserResponse => 12,
        }
    }
}

impl fmt::Display for EMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the message type table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType {
    pub msg: EMsg,
    pub name: &'static str,
    /// Protobuf schema for the body; `None` means a raw binary message.
    pub schema: Option<&'static str>,
}

impl MessageType {
    pub fn id(&self) -> u32 {
        self.msg.id()
    }

    pub fn is_protobuf(&self) -> bool {
        self.schema.is_some()
    }
}

const fn proto(msg: EMsg, name: &'static str, schema: &'static str) -> MessageType {
    MessageType {
        msg,
        name,
        schema: Some(schema),
    }
}

static MESSAGE_TYPES: [MessageType; 13] = [
    proto(EMsg::ClientWelcome, "ClientWelcome", "CMsgClientWelcome"),
    proto(EMsg::ClientHello, "ClientHello", "CMsgClientHello"),
    proto(
        EMsg::ClientConnectionStatus,
        "ClientConnectionStatus",
        "CMsgConnectionStatus",
    ),
    proto(EMsg::GetProfile, "GetProfile", "CMsgClientToGCGetProfile"),
    proto(
        EMsg::GetProfileResponse,
        "GetProfileResponse",
        "CMsgClientToGCGetProfileResponse",
    ),
    proto(
        EMsg::GetMatchHistory,
        "GetMatchHistory",
        "CMsgClientToGCGetMatchHistory",
    ),
    proto(
        EMsg::GetMatchHistoryResponse,
        "GetMatchHistoryResponse",
        "CMsgClientToGCGetMatchHistoryResponse",
    ),
    proto(
        EMsg::GetPostMatchStats,
        "GetPostMatchStats",
        "CMsgClientToGCGetPostMatchStats",
    ),
    proto(
        EMsg::GetPostMatchStatsResponse,
        "GetPostMatchStatsResponse",
        "CMsgClientToGCGetPostMatchStatsResponse",
    ),
    proto(
        EMsg::GetFriendRanks,
        "GetFriendRanks",
        "CMsgClientToGCGetFriendRanks",
    ),
    proto(
        EMsg::GetFriendRanksResponse,
        "GetFriendRanksResponse",
        "CMsgClientToGCGetFriendRanksResponse",
    ),
    proto(EMsg::SpectateUser, "SpectateUser", "CMsgClientToGCSpectateUser"),
    proto(
        EMsg::SpectateUserResponse,
        "SpectateUserResponse",
        "CMsgClientToGCSpectateUserResponse",
    ),
];

/// Bidirectional index over the message type table.
#[derive(Debug)]
pub struct MessageTable {
    by_id: HashMap<u32, &'static MessageType>,
    by_name: HashMap<&'static str, u32>,
}

static TABLE: LazyLock<MessageTable> = LazyLock::new(|| {
    let by_id = MESSAGE_TYPES.iter().map(|t| (t.id(), t)).collect();
    let by_name = MESSAGE_TYPES.iter().map(|t| (t.name, t.id())).collect();
    MessageTable { by_id, by_name }
});

impl MessageTable {
    /// The process-wide table.
    pub fn global() -> &'static MessageTable {
        &TABLE
    }

    pub fn get(&self, id: u32) -> Option<&'static MessageType> {
        self.by_id.get(&id).copied()
    }

    /// Opcode for a message name such as `"GetMatchHistory"`.
    pub fn id_of(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// Printable name for any opcode, known or not.
    pub fn name_of(&self, id: u32) -> MessageName {
        match self.get(id) {
            Some(t) => MessageName::Known(t.name),
            None => MessageName::Unknown(id),
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// An opcode's human-readable name, falling back to the raw number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageName {
    Known(&'static str),
    Unknown(u32),
}

impl fmt::Display for MessageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(name) => f.write_str(name),
            Self::Unknown(id) => write!(f, "{id}"),
        }
    }
}

/// The coordinator's verdict on our session, carried by
/// `ClientConnectionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GcConnectionStatus {
    HaveSession,
    GcGoingDown,
    NoSession,
    NoSessionInLogonQueue,
    NoSteam,
    Suspended,
    SteamGoingDown,
    /// A value this client doesn't know, kept verbatim.
    Other(i32),
}

impl GcConnectionStatus {
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::HaveSession,
            1 => Self::GcGoingDown,
            2 => Self::NoSession,
            3 => Self::NoSessionInLogonQueue,
            4 => Self::NoSteam,
            5 => Self::Suspended,
            6 => Self::SteamGoingDown,
            n => Self::Other(n),
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            Self::HaveSession => 0,
            Self::GcGoingDown => 1,
            Self::NoSession => 2,
            Self::NoSessionInLogonQueue => 3,
            Self::NoSteam => 4,
            Self::Suspended => 5,
            Self::SteamGoingDown => 6,
            Self::Other(n) => n,
        }
    }

    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::HaveSession => "HAVE_SESSION",
            Self::GcGoingDown => "GC_GOING_DOWN",
            Self::NoSession => "NO_SESSION",
            Self::NoSessionInLogonQueue => "NO_SESSION_IN_LOGON_QUEUE",
            Self::NoSteam => "NO_STEAM",
            Self::Suspended => "SUSPENDED",
            Self::SteamGoingDown => "STEAM_GOING_DOWN",
            Self::Other(_) => return None,
        })
    }
}

impl fmt::Display for GcConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.as_i32()),
            None => write!(f, "{}", self.as_i32()),
        }
    }
}
