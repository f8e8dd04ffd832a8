//! Entity references passed explicitly through the pipeline

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// External marketplace a target lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Ebay,
    Amazon,
    Walmart,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ebay => "ebay",
            Self::Amazon => "amazon",
            Self::Walmart => "walmart",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ebay" => Ok(Self::Ebay),
            "amazon" => Ok(Self::Amazon),
            "walmart" => Ok(Self::Walmart),
            _ => Err(Error::InvalidTarget {
                value: s.to_string(),
            }),
        }
    }
}

/// Kind of entity a lock or instruction points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Account,
    Listing,
    ListingProduct,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Listing => "listing",
            Self::ListingProduct => "listing_product",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "account" => Ok(Self::Account),
            "listing" => Ok(Self::Listing),
            "listing_product" => Ok(Self::ListingProduct),
            _ => Err(Error::InvalidTarget {
                value: s.to_string(),
            }),
        }
    }
}

/// Reference to an account, listing or listing product on one channel.
///
/// The textual form is `channel:kind:id`, e.g. `walmart:account:42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub channel: Channel,
    pub kind: TargetKind,
    pub id: u64,
}

impl TargetRef {
    pub fn new(channel: Channel, kind: TargetKind, id: u64) -> Self {
        Self { channel, kind, id }
    }

    pub fn account(channel: Channel, id: u64) -> Self {
        Self::new(channel, TargetKind::Account, id)
    }

    pub fn listing(channel: Channel, id: u64) -> Self {
        Self::new(channel, TargetKind::Listing, id)
    }

    pub fn listing_product(channel: Channel, id: u64) -> Self {
        Self::new(channel, TargetKind::ListingProduct, id)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.channel, self.kind, self.id)
    }
}

impl FromStr for TargetRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidTarget {
            value: s.to_string(),
        };

        let mut parts = s.splitn(3, ':');
        let (Some(channel), Some(kind), Some(id)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        Ok(Self {
            channel: channel.parse().map_err(|_| invalid())?,
            kind: kind.parse().map_err(|_| invalid())?,
            id: id.parse().map_err(|_| invalid())?,
        })
    }
}

/// Unique identity of one processing run, used to attribute its locks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderToken(Uuid);

impl HolderToken {
    /// Generate a fresh token
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for HolderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for HolderToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_round_trips_through_text() {
        let target = TargetRef::listing_product(Channel::Ebay, 1017);
        assert_eq!(target.to_string(), "ebay:listing_product:1017");
        assert_eq!("ebay:listing_product:1017".parse::<TargetRef>().unwrap(), target);
    }

    #[test]
    fn malformed_target_is_rejected() {
        for raw in ["ebay", "ebay:account", "etsy:account:1", "ebay:shop:1", "ebay:account:x"] {
            let err = raw.parse::<TargetRef>().unwrap_err();
            assert!(matches!(err, Error::InvalidTarget { value } if value == raw));
        }
    }

    #[test]
    fn holder_tokens_are_unique() {
        assert_ne!(HolderToken::generate(), HolderToken::generate());
    }
}
