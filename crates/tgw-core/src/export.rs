//! Chat export files: `{"data": {"<chat_id>": [{"text", "date", "sender_id"}]}}`.

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{domain::Message, errors::Error, pipeline::ChatInput, Result};

#[derive(Debug, Deserialize)]
struct RawExport {
    data: BTreeMap<String, Vec<RawMessage>>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(default)]
    text: Value,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    sender_id: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserStat {
    pub user_id: String,
    pub message_count: usize,
}

/// One parsed export file. Every chat id in the file belongs to the same chat input.
#[derive(Clone, Debug, Default)]
pub struct ChatExport {
    pub chat_ids: Vec<String>,
    pub messages: Vec<Message>,
}

impl ChatExport {
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| invalid(path, e))?;
        Self::from_json_str(&raw).map_err(|e| match e {
            Error::Json(e) => invalid(path, e),
            other => other,
        })
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let export: RawExport = serde_json::from_str(raw)?;

        let mut out = Self::default();
        let mut skipped = 0usize;
        for (chat_id, msgs) in export.data {
            for m in msgs {
                let text = flatten_text(&m.text);
                let text = text.trim();
                if text.is_empty() {
                    skipped += 1;
                    continue;
                }
                out.messages.push(Message::new(
                    text,
                    m.date.unwrap_or_default(),
                    id_string(&m.sender_id),
                    chat_id.as_str(),
                ));
            }
            out.chat_ids.push(chat_id);
        }

        debug!(
            chats = out.chat_ids.len(),
            messages = out.messages.len(),
            skipped,
            "export parsed"
        );
        Ok(out)
    }

    /// Message counts per sender, busiest first (ties by id).
    pub fn user_stats(&self) -> Vec<UserStat> {
        user_stats(std::slice::from_ref(self))
    }

    pub fn into_chat_input(self) -> ChatInput {
        ChatInput {
            chat_ids: self.chat_ids,
            messages: self.messages,
        }
    }
}

/// Per-sender counts across several exports, busiest first (ties by id).
pub fn user_stats(exports: &[ChatExport]) -> Vec<UserStat> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for m in exports.iter().flat_map(|e| &e.messages) {
        if m.sender_id.is_empty() {
            continue;
        }
        *counts.entry(m.sender_id.as_str()).or_insert(0) += 1;
    }

    let mut stats: Vec<UserStat> = counts
        .into_iter()
        .map(|(user_id, message_count)| UserStat {
            user_id: user_id.to_string(),
            message_count,
        })
        .collect();
    stats.sort_by(|a, b| {
        b.message_count
            .cmp(&a.message_count)
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    stats
}

fn invalid(path: &Path, reason: impl ToString) -> Error {
    Error::InvalidExport {
        path: PathBuf::from(path),
        reason: reason.to_string(),
    }
}

/// Plain string, or the rich-text array form (`["hi ", {"type": "bold", "text": "there"}]`).
fn flatten_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(|p| match p {
                Value::String(s) => s.as_str(),
                Value::Object(o) => o.get("text").and_then(Value::as_str).unwrap_or(""),
                _ => "",
            })
            .collect(),
        _ => String::new(),
    }
}

fn id_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}
