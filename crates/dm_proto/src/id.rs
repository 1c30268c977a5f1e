//! Identifiers.
//!
//! An `ID` is the address-derived handle of a user, group or service:
//!
//!   name@address[/terminal]
//!
//! The address body is produced by an external hash-and-encode derivation
//! (out of scope here); its textual form carries the network tag as a two-digit
//! hex prefix so predicates work without consulting that derivation. Two
//! addresses are reserved for broadcast: `anywhere` (any user may decrypt)
//! and `everywhere` (the world group).
//!
//! IDs are immutable value types with structural equality.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ProtoError;

/// Network/type tag carried in an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NetworkType {
    Main = 0x08,
    Group = 0x10,
    Station = 0x88,
    Bot = 0xC8,
}

impl NetworkType {
    pub fn is_user(self) -> bool {
        matches!(self, NetworkType::Main | NetworkType::Station | NetworkType::Bot)
    }

    pub fn is_group(self) -> bool {
        matches!(self, NetworkType::Group)
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x08 => Some(NetworkType::Main),
            0x10 => Some(NetworkType::Group),
            0x88 => Some(NetworkType::Station),
            0xC8 => Some(NetworkType::Bot),
            _ => None,
        }
    }
}

const ANYWHERE: &str = "anywhere";
const EVERYWHERE: &str = "everywhere";

/// Network-tagged address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// Reserved user-shaped broadcast address ("anywhere").
    Anywhere,
    /// Reserved group-shaped broadcast address ("everywhere").
    Everywhere,
    Concrete { network: NetworkType, body: String },
}

impl Address {
    pub fn concrete(network: NetworkType, body: impl Into<String>) -> Self {
        Address::Concrete {
            network,
            body: body.into(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Address::Anywhere | Address::Everywhere)
    }

    pub fn is_user(&self) -> bool {
        match self {
            Address::Anywhere => true,
            Address::Everywhere => false,
            Address::Concrete { network, .. } => network.is_user(),
        }
    }

    pub fn is_group(&self) -> bool {
        match self {
            Address::Anywhere => false,
            Address::Everywhere => true,
            Address::Concrete { network, .. } => network.is_group(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Anywhere => f.write_str(ANYWHERE),
            Address::Everywhere => f.write_str(EVERYWHERE),
            Address::Concrete { network, body } => write!(f, "{:02x}{}", *network as u8, body),
        }
    }
}

impl FromStr for Address {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ANYWHERE => return Ok(Address::Anywhere),
            EVERYWHERE => return Ok(Address::Everywhere),
            _ => {}
        }
        if s.len() < 3 {
            return Err(ProtoError::InvalidId(format!("address too short: {s}")));
        }
        // get() instead of indexing: byte 2 may fall inside a multi-byte
        // character on hostile input.
        let tag = s
            .get(..2)
            .and_then(|prefix| u8::from_str_radix(prefix, 16).ok())
            .ok_or_else(|| ProtoError::InvalidId(format!("bad network tag: {s}")))?;
        let network = NetworkType::from_tag(tag)
            .ok_or_else(|| ProtoError::InvalidId(format!("unknown network tag {tag:#04x}")))?;
        Ok(Address::Concrete {
            network,
            body: s[2..].to_string(),
        })
    }
}

/// Identifier for a user, group or service.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ID {
    pub name: Option<String>,
    pub address: Address,
    pub terminal: Option<String>,
}

impl ID {
    pub fn new(name: Option<&str>, address: Address) -> Self {
        ID {
            name: name.map(str::to_string),
            address,
            terminal: None,
        }
    }

    /// `anyone@anywhere` — any user may decrypt.
    pub fn anyone() -> Self {
        ID::new(Some("anyone"), Address::Anywhere)
    }

    /// `everyone@everywhere` — the world group.
    pub fn everyone() -> Self {
        ID::new(Some("everyone"), Address::Everywhere)
    }

    pub fn is_broadcast(&self) -> bool {
        self.address.is_broadcast()
    }

    pub fn is_user(&self) -> bool {
        self.address.is_user()
    }

    pub fn is_group(&self) -> bool {
        self.address.is_group()
    }
}

impl fmt::Display for ID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{name}@{}", self.address)?;
        } else {
            write!(f, "{}", self.address)?;
        }
        if let Some(terminal) = &self.terminal {
            write!(f, "/{terminal}")?;
        }
        Ok(())
    }
}

impl FromStr for ID {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (main, terminal) = match s.split_once('/') {
            Some((main, term)) => (main, Some(term.to_string())),
            None => (s, None),
        };
        let (name, address) = match main.split_once('@') {
            Some((name, addr)) => (Some(name.to_string()), addr.parse()?),
            None => (None, main.parse()?),
        };
        Ok(ID {
            name,
            address,
            terminal,
        })
    }
}

impl Serialize for ID {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ID {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
