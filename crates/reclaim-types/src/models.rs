use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

// -- Listings --

/// Whether a listing reports something lost or something found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    Lost,
    Found,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lost => "Lost",
            Self::Found => "Found",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Lost" => Some(Self::Lost),
            "Found" => Some(Self::Found),
            _ => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -- Notifications --

/// What triggered a notification. Stored as text in the `kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewPost,
    Message,
    Claim,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewPost => "new_post",
            Self::Message => "message",
            Self::Claim => "claim",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "new_post" => Some(Self::NewPost),
            "message" => Some(Self::Message),
            "claim" => Some(Self::Claim),
            _ => None,
        }
    }
}

// -- Conversations --

/// Identity of a two-party chat thread about one item.
///
/// The participant pair is normalized so the key comes out identical no
/// matter which side happens to be sender or receiver in a given message.
/// Grouping on the raw (sender, receiver) pair would split every thread
/// into two halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub item_id: i64,
    /// Smaller participant user id.
    pub low: i64,
    /// Larger participant user id.
    pub high: i64,
}

impl ConversationKey {
    pub fn new(item_id: i64, user_a: i64, user_b: i64) -> Self {
        Self {
            item_id,
            low: user_a.min(user_b),
            high: user_a.max(user_b),
        }
    }

    /// The participant who is not `viewer`.
    pub fn other_party(&self, viewer: i64) -> i64 {
        if viewer == self.low { self.high } else { self.low }
    }
}

// -- Shared helpers --

/// Shorten message text for a notification body: the first `max_chars`
/// characters plus an ellipsis when anything was cut. Counts characters,
/// not bytes, so multibyte text is never split mid-character.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

/// Parse a timestamp as stored by SQLite (`datetime('now')` produces
/// "YYYY-MM-DD HH:MM:SS" without timezone; treat it as UTC). RFC 3339
/// input is accepted too. A corrupt value falls back to the epoch with
/// a warning instead of failing the whole listing.
pub fn parse_db_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}
