//! Steam account identifiers.
//!
//! A Steam id packs four fields into 64 bits:
//!
//! ```text
//!  63      56 55  52 51                32 31                      0
//! [universe ][type ][     instance      ][        account id       ]
//! ```
//!
//! The transport reports the logged-on identity as a [`SteamId`], and
//! request methods parse user-supplied ids with [`SteamId::from_str`],
//! which accepts Steam64 (`76561197960287930`), Steam2
//! (`STEAM_0:0:11101`) and Steam3 (`[U:1:22202]`) renderings.

use std::fmt;
use std::str::FromStr;

/// Errors from parsing a textual Steam id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SteamIdError {
    /// The input matched none of the Steam64, Steam2 or Steam3 forms.
    #[error("unrecognized steam id format: {0:?}")]
    Format(String),

    /// A Steam3 id used a type letter we don't know.
    #[error("unknown steam3 type letter {0:?}")]
    TypeLetter(char),
}

/// Which Steam universe an account lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Universe {
    Invalid,
    Public,
    Beta,
    Internal,
    Dev,
    /// Any value outside the known range.
    Other(u8),
}

impl Universe {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Invalid,
            1 => Self::Public,
            2 => Self::Beta,
            3 => Self::Internal,
            4 => Self::Dev,
            n => Self::Other(n),
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Public => 1,
            Self::Beta => 2,
            Self::Internal => 3,
            Self::Dev => 4,
            Self::Other(n) => n,
        }
    }
}

/// The kind of account a Steam id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountType {
    Invalid,
    Individual,
    Multiseat,
    GameServer,
    AnonGameServer,
    Pending,
    ContentServer,
    Clan,
    Chat,
    P2pSuperSeeder,
    AnonUser,
    /// Any value outside the known range.
    Other(u8),
}

impl AccountType {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => Self::Invalid,
            1 => Self::Individual,
            2 => Self::Multiseat,
            3 => Self::GameServer,
            4 => Self::AnonGameServer,
            5 => Self::Pending,
            6 => Self::ContentServer,
            7 => Self::Clan,
            8 => Self::Chat,
            9 => Self::P2pSuperSeeder,
            10 => Self::AnonUser,
            n => Self::Other(n),
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Individual => 1,
            Self::Multiseat => 2,
            Self::GameServer => 3,
            Self::AnonGameServer => 4,
            Self::Pending => 5,
            Self::ContentServer => 6,
            Self::Clan => 7,
            Self::Chat => 8,
            Self::P2pSuperSeeder => 9,
            Self::AnonUser => 10,
            Self::Other(n) => n,
        }
    }

    fn from_letter(letter: char) -> Result<Self, SteamIdError> {
        Ok(match letter {
            'I' | 'i' => Self::Invalid,
            'U' => Self::Individual,
            'M' => Self::Multiseat,
            'G' => Self::GameServer,
            'A' => Self::AnonGameServer,
            'P' => Self::Pending,
            'C' => Self::ContentServer,
            'g' => Self::Clan,
            'T' | 'L' | 'c' => Self::Chat,
            'a' => Self::AnonUser,
            other => return Err(SteamIdError::TypeLetter(other)),
        })
    }

    fn letter(self) -> char {
        match self {
            Self::Individual => 'U',
            Self::Multiseat => 'M',
            Self::GameServer => 'G',
            Self::AnonGameServer => 'A',
            Self::Pending => 'P',
            Self::ContentServer => 'C',
            Self::Clan => 'g',
            Self::Chat => 'T',
            Self::AnonUser => 'a',
            Self::Invalid | Self::P2pSuperSeeder | Self::Other(_) => 'i',
        }
    }
}

/// Instance values used by individual accounts.
pub mod instance {
    /// All instances (clans, game servers).
    pub const ALL: u32 = 0;
    /// The desktop client.
    pub const DESKTOP: u32 = 1;
    /// A console client.
    pub const CONSOLE: u32 = 2;
    /// The web client.
    pub const WEB: u32 = 4;
}

const ACCOUNT_MASK: u64 = 0xFFFF_FFFF;
const INSTANCE_MASK: u64 = 0x000F_FFFF;

/// A 64-bit Steam identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SteamId(u64);

impl SteamId {
    /// Wraps a raw Steam64 value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Assembles an id from its parts.
    pub fn from_parts(
        universe: Universe,
        account_type: AccountType,
        instance: u32,
        account_id: u32,
    ) -> Self {
        let raw = (u64::from(universe.bits()) << 56)
            | (u64::from(account_type.bits() & 0xF) << 52)
            | ((u64::from(instance) & INSTANCE_MASK) << 32)
            | u64::from(account_id);
        Self(raw)
    }

    /// Shorthand for a public, individual, desktop account.
    pub fn individual(account_id: u32) -> Self {
        Self::from_parts(
            Universe::Public,
            AccountType::Individual,
            instance::DESKTOP,
            account_id,
        )
    }

    /// The raw Steam64 value.
    pub fn steam64(self) -> u64 {
        self.0
    }

    /// The low 32 bits: the account id the coordinator keys players by.
    pub fn account_id(self) -> u32 {
        (self.0 & ACCOUNT_MASK) as u32
    }

    pub fn instance(self) -> u32 {
        ((self.0 >> 32) & INSTANCE_MASK) as u32
    }

    pub fn account_type(self) -> AccountType {
        AccountType::from_bits(((self.0 >> 52) & 0xF) as u8)
    }

    pub fn universe(self) -> Universe {
        Universe::from_bits((self.0 >> 56) as u8)
    }

    /// Structural validity, independent of what a caller accepts.
    ///
    /// Individual accounts need a non-zero account id and an instance no
    /// higher than [`instance::WEB`]; clans need instance
    /// [`instance::ALL`]; game servers need a non-zero account id.
    pub fn is_valid(self) -> bool {
        let kind = self.account_type();
        if matches!(kind, AccountType::Invalid | AccountType::Other(_)) {
            return false;
        }
        if !matches!(
            self.universe(),
            Universe::Public | Universe::Beta | Universe::Internal | Universe::Dev
        ) {
            return false;
        }
        match kind {
            AccountType::Individual => self.account_id() != 0 && self.instance() <= instance::WEB,
            AccountType::Clan => self.account_id() != 0 && self.instance() == instance::ALL,
            AccountType::GameServer => self.account_id() != 0,
            _ => true,
        }
    }

    /// Whether this id names an ordinary player on the public universe,
    /// signed in from the desktop client.
    pub fn is_public_desktop_individual(self) -> bool {
        self.is_valid()
            && self.universe() == Universe::Public
            && self.account_type() == AccountType::Individual
            && self.instance() == instance::DESKTOP
    }

    /// Renders the id in Steam3 form, e.g. `[U:1:22202]`.
    pub fn steam3(self) -> String {
        let letter = self.account_type().letter();
        let universe = self.universe().bits();
        let account = self.account_id();
        let default_instance = match self.account_type() {
            AccountType::Individual => instance::DESKTOP,
            _ => instance::ALL,
        };
        if self.instance() == default_instance {
            format!("[{letter}:{universe}:{account}]")
        } else {
            format!("[{letter}:{universe}:{account}:{}]", self.instance())
        }
    }

    fn parse_steam2(text: &str) -> Option<Self> {
        let rest = text.strip_prefix("STEAM_")?;
        let mut parts = rest.split(':');
        let universe: u8 = parts.next()?.parse().ok()?;
        let low_bit: u32 = parts.next()?.parse().ok()?;
        let high: u32 = parts.next()?.parse().ok()?;
        if parts.next().is_some() || low_bit > 1 {
            return None;
        }
        // Steam2 ids written with universe 0 predate the public universe
        // numbering and mean Public.
        let universe = if universe == 0 { 1 } else { universe };
        let account_id = high.checked_mul(2)?.checked_add(low_bit)?;
        Some(Self::from_parts(
            Universe::from_bits(universe),
            AccountType::Individual,
            instance::DESKTOP,
            account_id,
        ))
    }

    fn parse_steam3(text: &str) -> Result<Option<Self>, SteamIdError> {
        let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) else {
            return Ok(None);
        };
        let mut parts = inner.split(':');
        let mut letter_part = parts.next().unwrap_or_default().chars();
        let (Some(letter), None) = (letter_part.next(), letter_part.next()) else {
            return Ok(None);
        };
        let account_type = AccountType::from_letter(letter)?;
        let Some(universe) = parts.next().and_then(|u| u.parse::<u8>().ok()) else {
            return Ok(None);
        };
        let Some(account_id) = parts.next().and_then(|a| a.parse::<u32>().ok()) else {
            return Ok(None);
        };
        let instance = match parts.next() {
            Some(raw) => match raw.parse::<u32>() {
                Ok(i) => i,
                Err(_) => return Ok(None),
            },
            None if account_type == AccountType::Individual => instance::DESKTOP,
            None => instance::ALL,
        };
        if parts.next().is_some() {
            return Ok(None);
        }
        Ok(Some(Self::from_parts(
            Universe::from_bits(universe),
            account_type,
            instance,
            account_id,
        )))
    }
}

impl FromStr for SteamId {
    type Err = SteamIdError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        if let Ok(raw) = text.parse::<u64>() {
            return Ok(Self(raw));
        }
        if let Some(id) = Self::parse_steam2(text) {
            return Ok(id);
        }
        if let Some(id) = Self::parse_steam3(text)? {
            return Ok(id);
        }
        Err(SteamIdError::Format(text.to_string()))
    }
}

impl From<u64> for SteamId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
