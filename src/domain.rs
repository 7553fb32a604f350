use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::NauticaError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SongId(String);

impl SongId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SongId {
    type Err = NauticaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if !is_valid_id(normalized) {
            return Err(NauticaError::InvalidSongId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Ids coming from the API are opaque; only emptiness is rejected.
impl TryFrom<String> for SongId {
    type Error = NauticaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(NauticaError::InvalidSongId(value));
        }
        Ok(Self(value))
    }
}

impl From<SongId> for String {
    fn from(id: SongId) -> Self {
        id.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = NauticaError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim();
        if !is_valid_id(normalized) {
            return Err(NauticaError::InvalidUserId(value.to_string()));
        }
        Ok(Self(normalized.to_string()))
    }
}

/// Ids coming from the API are opaque; only emptiness is rejected.
impl TryFrom<String> for UserId {
    type Error = NauticaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() {
            return Err(NauticaError::InvalidUserId(value));
        }
        Ok(Self(value))
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

// Ids typed on the command line are held to the shape the site hands out.
fn is_valid_id(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Song {
    pub id: SongId,
    pub title: String,
    pub artist: String,
    #[serde(deserialize_with = "deserialize_uploaded_at")]
    pub uploaded_at: DateTime<Utc>,
    pub user: User,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageLinks {
    #[serde(default)]
    pub next: Option<String>,
}

/// One page of the song listing together with the cursor to the next page.
#[derive(Debug, Clone, Deserialize)]
pub struct SongPage {
    pub data: Vec<Song>,
    #[serde(default)]
    pub links: PageLinks,
}

impl SongPage {
    pub fn next_cursor(&self) -> Option<&str> {
        self.links
            .next
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SongEnvelope {
    pub data: Song,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingScope {
    Catalog,
    User(UserId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    Catalog,
    User(UserId),
    Song(SongId),
}

impl SyncTarget {
    pub fn from_args(song: Option<&str>, user: Option<&str>) -> Result<Self, NauticaError> {
        match (song, user) {
            (Some(_), Some(_)) => Err(NauticaError::ConflictingTargets),
            (Some(song), None) => Ok(SyncTarget::Song(song.parse()?)),
            (None, Some(user)) => Ok(SyncTarget::User(user.parse()?)),
            (None, None) => Ok(SyncTarget::Catalog),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Catalog,
    User,
    Song,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Catalog => write!(f, "catalog"),
            SyncMode::User => write!(f, "user"),
            SyncMode::Song => write!(f, "song"),
        }
    }
}

/// Parses the listing's `uploaded_at` field. Offsets are honored when present;
/// naive timestamps are taken as UTC.
pub fn parse_uploaded_at(value: &str) -> Result<DateTime<Utc>, NauticaError> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(NauticaError::InvalidTimestamp(value.to_string()))
}

fn deserialize_uploaded_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_uploaded_at(&raw).map_err(serde::de::Error::custom)
}
