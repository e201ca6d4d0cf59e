//! Typed request arguments.
//!
//! Each request knows its opcode, the event its response arrives as, and
//! how to turn itself into protobuf fields. Building the fields is also
//! where arguments are validated: a request that yields no fields is never
//! sent.

use underlords_protocol::{EMsg, FieldValue};
use underlords_transport::{SteamId, SteamIdError};

use crate::EventKind;

/// A Steam id as a caller may supply it: already parsed, or as text in
/// Steam64, Steam2 or Steam3 form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SteamIdArg {
    Parsed(SteamId),
    Text(String),
}

impl SteamIdArg {
    pub fn resolve(&self) -> Result<SteamId, SteamIdError> {
        match self {
            Self::Parsed(id) => Ok(*id),
            Self::Text(text) => text.parse(),
        }
    }
}

impl From<SteamId> for SteamIdArg {
    fn from(id: SteamId) -> Self {
        Self::Parsed(id)
    }
}

impl From<u64> for SteamIdArg {
    fn from(raw: u64) -> Self {
        Self::Parsed(SteamId::new(raw))
    }
}

impl From<&str> for SteamIdArg {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for SteamIdArg {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// The account id of a player the coordinator will answer about, or
/// `None` for anything but a valid public, individual, desktop id.
fn player_account(arg: &SteamIdArg) -> Option<u32> {
    match arg.resolve() {
        Ok(id) if id.is_public_desktop_individual() => Some(id.account_id()),
        Ok(id) => {
            tracing::debug!(steamid = %id, "rejecting id that is not a public desktop player");
            None
        }
        Err(e) => {
            tracing::debug!(error = %e, "rejecting unparseable steam id");
            None
        }
    }
}

pub(crate) type Fields = Vec<(&'static str, FieldValue)>;

/// A request the client knows how to send.
pub(crate) trait GcRequest {
    const MSG: EMsg;
    const RESPONSE: EventKind;

    /// The body fields, or `None` if the arguments are unacceptable.
    fn fields(&self) -> Option<Fields>;
}

/// Fetch a player's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRequest {
    pub steamid: SteamIdArg,
}

impl ProfileRequest {
    pub fn new(steamid: impl Into<SteamIdArg>) -> Self {
        Self {
            steamid: steamid.into(),
        }
    }
}

impl GcRequest for ProfileRequest {
    const MSG: EMsg = EMsg::GetProfile;
    const RESPONSE: EventKind = EventKind::PlayersProfile;

    fn fields(&self) -> Option<Fields> {
        let account_id = player_account(&self.steamid)?;
        Some(vec![("account_id", FieldValue::U32(account_id))])
    }
}

/// Fetch a page of a player's match history.
///
/// ```rust
/// use underlords::MatchesRequest;
///
/// let req = MatchesRequest::new("76561197960287930").rows(5);
/// assert_eq!(req.rows, 5);
/// assert_eq!(req.match_id_cursor, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchesRequest {
    pub steamid: SteamIdArg,
    /// Page size. Default: 20.
    pub rows: u32,
    /// Return matches older than this id; 0 starts at the newest.
    pub match_id_cursor: u64,
}

impl MatchesRequest {
    pub const DEFAULT_ROWS: u32 = 20;

    pub fn new(steamid: impl Into<SteamIdArg>) -> Self {
        Self {
            steamid: steamid.into(),
            rows: Self::DEFAULT_ROWS,
            match_id_cursor: 0,
        }
    }

    pub fn rows(mut self, rows: u32) -> Self {
        self.rows = rows;
        self
    }

    pub fn match_id_cursor(mut self, cursor: u64) -> Self {
        self.match_id_cursor = cursor;
        self
    }
}

impl GcRequest for MatchesRequest {
    const MSG: EMsg = EMsg::GetMatchHistory;
    const RESPONSE: EventKind = EventKind::MatchList;

    fn fields(&self) -> Option<Fields> {
        let account_id = player_account(&self.steamid)?;
        Some(vec![
            ("account_id", FieldValue::U32(account_id)),
            ("request_rows", FieldValue::U32(self.rows)),
            ("match_id_cursor", FieldValue::U64(self.match_id_cursor)),
        ])
    }
}

/// Fetch the post-match stats of one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRequest {
    pub match_id: u64,
}

impl MatchRequest {
    pub fn new(match_id: u64) -> Self {
        Self { match_id }
    }
}

impl GcRequest for MatchRequest {
    const MSG: EMsg = EMsg::GetPostMatchStats;
    const RESPONSE: EventKind = EventKind::Match;

    fn fields(&self) -> Option<Fields> {
        Some(vec![("match_id", FieldValue::U64(self.match_id))])
    }
}

/// Ranks of the logged-on account's friends. Takes no arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct FriendRanksRequest;

impl GcRequest for FriendRanksRequest {
    const MSG: EMsg = EMsg::GetFriendRanks;
    const RESPONSE: EventKind = EventKind::FriendRanks;

    fn fields(&self) -> Option<Fields> {
        Some(Vec::new())
    }
}

/// Ask for a spectator slot on a player's game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectateRequest {
    pub account_id: u32,
    /// Default: 0.
    pub region_mode: u32,
}

impl SpectateRequest {
    pub fn new(account_id: u32) -> Self {
        Self {
            account_id,
            region_mode: 0,
        }
    }

    pub fn region_mode(mut self, region_mode: u32) -> Self {
        self.region_mode = region_mode;
        self
    }
}

impl GcRequest for SpectateRequest {
    const MSG: EMsg = EMsg::SpectateUser;
    const RESPONSE: EventKind = EventKind::SpectateUser;

    fn fields(&self) -> Option<Fields> {
        Some(vec![
            ("spectate_account_id", FieldValue::U32(self.account_id)),
            ("region_mode", FieldValue::U32(self.region_mode)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use underlords_transport::{AccountType, Universe, instance};

    use super::*;

    const GABEN: &str = "76561197960287930";

    #[test]
    fn test_profile_fields_use_account_id() {
        let fields = ProfileRequest::new(GABEN).fields().unwrap();
        assert_eq!(fields, vec![("account_id", FieldValue::U32(22202))]);
    }

    #[test]
    fn test_profile_accepts_steam2_and_steam3() {
        for text in ["STEAM_0:0:11101", "[U:1:22202]"] {
            let fields = ProfileRequest::new(text).fields();
            assert_eq!(fields, Some(vec![("account_id", FieldValue::U32(22202))]), "{text}");
        }
    }

    #[test]
    fn test_profile_rejects_non_desktop_instance() {
        let web = SteamId::from_parts(Universe::Public, AccountType::Individual, instance::WEB, 22202);
        assert_eq!(ProfileRequest::new(web).fields(), None);
    }

    #[test]
    fn test_profile_rejects_non_public_universe() {
        let beta = SteamId::from_parts(Universe::Beta, AccountType::Individual, instance::DESKTOP, 22202);
        assert_eq!(ProfileRequest::new(beta).fields(), None);
    }

    #[test]
    fn test_profile_rejects_clan_and_garbage() {
        let clan = SteamId::from_parts(Universe::Public, AccountType::Clan, instance::ALL, 4);
        assert_eq!(ProfileRequest::new(clan).fields(), None);
        assert_eq!(ProfileRequest::new("gaben").fields(), None);
        assert_eq!(ProfileRequest::new(0u64).fields(), None);
    }

    #[test]
    fn test_matches_defaults_rows_and_cursor() {
        let req = MatchesRequest::new(GABEN);
        assert_eq!(req.rows, 20);
        assert_eq!(req.match_id_cursor, 0);
        assert_eq!(
            req.fields().unwrap(),
            vec![
                ("account_id", FieldValue::U32(22202)),
                ("request_rows", FieldValue::U32(20)),
                ("match_id_cursor", FieldValue::U64(0)),
            ]
        );
    }

    #[test]
    fn test_spectate_defaults_region_mode_zero() {
        let fields = SpectateRequest::new(123).fields().unwrap();
        assert_eq!(
            fields,
            vec![
                ("spectate_account_id", FieldValue::U32(123)),
                ("region_mode", FieldValue::U32(0)),
            ]
        );
    }

    #[test]
    fn test_request_opcodes_and_response_events() {
        assert_eq!(ProfileRequest::MSG, EMsg::GetProfile);
        assert_eq!(MatchesRequest::RESPONSE, EventKind::MatchList);
        assert_eq!(MatchRequest::RESPONSE, EventKind::Match);
        assert_eq!(FriendRanksRequest::MSG, EMsg::GetFriendRanks);
        assert_eq!(SpectateRequest::RESPONSE, EventKind::SpectateUser);
    }
}
