use std::collections::BTreeMap;

use crate::domain::{Message, UNKNOWN_MONTH};

/// One month's excerpt as it goes into a prompt.
#[derive(Clone, Debug, PartialEq)]
pub struct MonthBucket {
    pub month: String,
    /// Capped excerpt, oldest first.
    pub texts: Vec<String>,
    /// Messages seen for the month before capping.
    pub total: usize,
}

/// Months bundled into one oracle request.
#[derive(Clone, Debug, PartialEq)]
pub struct MonthBatch {
    pub months: Vec<MonthBucket>,
}

impl MonthBatch {
    pub fn month_keys(&self) -> Vec<String> {
        self.months.iter().map(|m| m.month.clone()).collect()
    }
}

/// Groups a chat's messages by month and partitions months into batches.
///
/// Truncation keeps the `max_messages_per_month` most recent messages of each month
/// (by parsed timestamp, stable on input order, unparseable timestamps counted as
/// oldest) and presents them oldest first.
#[derive(Clone, Copy, Debug)]
pub struct MonthBatcher {
    pub months_per_batch: usize,
    pub max_messages_per_month: usize,
}

impl Default for MonthBatcher {
    fn default() -> Self {
        Self {
            months_per_batch: 4,
            max_messages_per_month: 150,
        }
    }
}

impl MonthBatcher {
    /// Chronologically sorted month buckets; `unknown` sorts last.
    pub fn buckets(&self, messages: &[Message]) -> Vec<MonthBucket> {
        let mut by_month: BTreeMap<MonthKey<'_>, Vec<&Message>> = BTreeMap::new();
        for msg in messages {
            by_month.entry(MonthKey(&msg.month)).or_default().push(msg);
        }

        by_month
            .into_iter()
            .map(|(MonthKey(month), mut msgs)| {
                let total = msgs.len();
                // Stable sort keeps input order among equal or missing timestamps.
                msgs.sort_by_key(|m| m.sent_at());
                let skip = total.saturating_sub(self.max_messages_per_month);
                MonthBucket {
                    month: month.to_string(),
                    texts: msgs.into_iter().skip(skip).map(|m| m.text.clone()).collect(),
                    total,
                }
            })
            .collect()
    }

    pub fn batches(&self, messages: &[Message]) -> Vec<MonthBatch> {
        let size = self.months_per_batch.max(1);
        let mut out = Vec::new();
        let mut current = Vec::with_capacity(size);
        for bucket in self.buckets(messages) {
            current.push(bucket);
            if current.len() == size {
                out.push(MonthBatch {
                    months: std::mem::take(&mut current),
                });
            }
        }
        if !current.is_empty() {
            out.push(MonthBatch { months: current });
        }
        out
    }
}

/// Orders `YYYY-MM` keys chronologically with `unknown` (and anything malformed) last.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct MonthKey<'a>(&'a str);

impl MonthKey<'_> {
    fn rank(&self) -> (bool, &str) {
        let canonical = self.0 != UNKNOWN_MONTH
            && self.0.len() == 7
            && self.0.as_bytes()[4] == b'-'
            && self.0.bytes().enumerate().all(|(i, b)| i == 4 || b.is_ascii_digit());
        (!canonical, self.0)
    }
}

impl Ord for MonthKey<'_> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for MonthKey<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
