//! Shard keys: the closed set of partitions a record can live in.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Partition selector. Seven regional shards plus the aggregate `Global` shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShardKey {
    Africa,
    Asia,
    Europe,
    NorthAmerica,
    SouthAmerica,
    Oceania,
    Antarctica,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShardKeyError {
    #[error("shard key must not be blank")]
    Blank,
    #[error("unknown shard key `{0}`")]
    Unknown(String),
    #[error("shard `{0}` is not registered")]
    Unregistered(ShardKey),
}

impl ShardKey {
    pub const ALL: [ShardKey; 8] = [
        ShardKey::Africa,
        ShardKey::Asia,
        ShardKey::Europe,
        ShardKey::NorthAmerica,
        ShardKey::SouthAmerica,
        ShardKey::Oceania,
        ShardKey::Antarctica,
        ShardKey::Global,
    ];

    pub const REGIONAL: [ShardKey; 7] = [
        ShardKey::Africa,
        ShardKey::Asia,
        ShardKey::Europe,
        ShardKey::NorthAmerica,
        ShardKey::SouthAmerica,
        ShardKey::Oceania,
        ShardKey::Antarctica,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ShardKey::Africa => "africa",
            ShardKey::Asia => "asia",
            ShardKey::Europe => "europe",
            ShardKey::NorthAmerica => "northamerica",
            ShardKey::SouthAmerica => "southamerica",
            ShardKey::Oceania => "oceania",
            ShardKey::Antarctica => "antarctica",
            ShardKey::Global => "global",
        }
    }

    pub fn is_global(self) -> bool {
        matches!(self, ShardKey::Global)
    }

    /// Case-insensitive parse. Blank input is rejected before lookup; no fallback shard.
    pub fn parse(value: &str) -> Result<Self, ShardKeyError> {
        if value.trim().is_empty() {
            return Err(ShardKeyError::Blank);
        }

        Self::ALL
            .into_iter()
            .find(|key| key.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| ShardKeyError::Unknown(value.to_string()))
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShardKey {
    type Err = ShardKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ShardKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ShardKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ShardKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}
