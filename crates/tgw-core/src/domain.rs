use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Month key used for messages whose timestamp could not be parsed.
pub const UNKNOWN_MONTH: &str = "unknown";

/// Label carried by sentiment entries whose oracle call failed.
pub const ERROR_LABEL: &str = "error";

pub const DEFAULT_PRIMARY: &str = "wholesome";
pub const DEFAULT_SECONDARY: &str = "cozy";

/// One parsed text message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    /// ISO-8601 timestamp as found in the export.
    pub timestamp: String,
    pub sender_id: String,
    pub chat_id: String,
    /// Canonical `YYYY-MM`, or [`UNKNOWN_MONTH`].
    pub month: String,
}

impl Message {
    pub fn new(
        text: impl Into<String>,
        timestamp: impl Into<String>,
        sender_id: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        let timestamp = timestamp.into();
        let month = month_of(&timestamp);
        Self {
            text: text.into(),
            timestamp,
            sender_id: sender_id.into(),
            chat_id: chat_id.into(),
            month,
        }
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

/// Parse an ISO-8601 timestamp. A trailing `Z` and naive (offset-less) forms are accepted.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_with_offset(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Like [`parse_timestamp`] but keeps the offset written in the timestamp; naive
/// forms are read as UTC.
fn parse_with_offset(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc().fixed_offset())
}

/// Canonical month key for a timestamp, in the timestamp's own offset.
pub fn month_of(timestamp: &str) -> String {
    parse_with_offset(timestamp)
        .map(|dt| dt.format("%Y-%m").to_string())
        .unwrap_or_else(|| UNKNOWN_MONTH.to_string())
}

/// Clamp a confidence into `[0, 1]`; NaN becomes 0.
pub fn clamp_confidence(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 1.0)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlySentiment {
    pub month: String,
    pub primary: String,
    pub secondary: String,
    pub confidence: f64,
    pub vibe_summary: String,
}

impl MonthlySentiment {
    /// Entry used when the oracle answered but said nothing usable about the month.
    pub fn default_for(month: impl Into<String>) -> Self {
        Self {
            month: month.into(),
            primary: DEFAULT_PRIMARY.to_string(),
            secondary: DEFAULT_SECONDARY.to_string(),
            confidence: 0.0,
            vibe_summary: String::new(),
        }
    }

    /// Entry used when the oracle call for the month's batch failed.
    pub fn error_marker(month: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            month: month.into(),
            primary: ERROR_LABEL.to_string(),
            secondary: ERROR_LABEL.to_string(),
            confidence: 0.0,
            vibe_summary: detail.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.primary == ERROR_LABEL
    }
}

pub type SentimentByMonth = BTreeMap<String, MonthlySentiment>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: String,
    pub end: String,
}

impl DateRange {
    /// Date part of the earliest and latest timestamps.
    pub fn of(messages: &[Message]) -> Self {
        let mut dates = messages
            .iter()
            .map(|m| m.timestamp.as_str())
            .filter(|t| !t.trim().is_empty());
        let Some(first) = dates.next() else {
            return Self::default();
        };
        let (min, max) = dates.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        let day = |t: &str| t.split('T').next().unwrap_or_default().to_string();
        Self {
            start: day(min),
            end: day(max),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageStats {
    pub total_in_chat: usize,
    pub user_count: usize,
    /// Share of the chat written by the user, in percent with one decimal.
    pub user_percentage: f64,
}

impl MessageStats {
    pub fn new(total_in_chat: usize, user_count: usize) -> Self {
        let user_percentage = if total_in_chat == 0 {
            0.0
        } else {
            (user_count as f64 / total_in_chat as f64 * 1000.0).round() / 10.0
        };
        Self {
            total_in_chat,
            user_count,
            user_percentage,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersonaMatch {
    pub persona_id: String,
    pub persona_name: String,
    pub show: String,
    pub traits: String,
    pub match_reason: String,
    pub confidence: f64,
    pub yearly_vibe: String,
    /// Set when the id did not come from a usable oracle answer.
    pub fallback: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatAnalysisResult {
    pub user_id: String,
    pub chat_ids: Vec<String>,
    pub date_range: DateRange,
    pub message_stats: MessageStats,
    /// Full (untruncated) counts; truncation happens at final output.
    pub word_frequency: BTreeMap<String, u64>,
    pub emoji_frequency: BTreeMap<String, u64>,
    pub wordcloud_image: Option<String>,
    pub sentiment_by_month: SentimentByMonth,
    pub persona: PersonaMatch,
    pub top_words: Vec<String>,
    pub top_emojis: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub user_id: String,
    pub total_chats: usize,
    pub total_messages: usize,
    pub word_frequency: BTreeMap<String, u64>,
    pub emoji_frequency: BTreeMap<String, u64>,
    pub sentiment_by_month: SentimentByMonth,
    pub persona: PersonaMatch,
    pub top_words: Vec<String>,
    pub top_emojis: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiChatReport {
    pub per_chat: Vec<ChatAnalysisResult>,
    pub aggregate: AggregateResult,
}
