//! Cross-chat reduction.
//!
//! Month merge rules, applied to the non-error entries of a month in input chat
//! order:
//! - primary/secondary: most frequent label; ties go to the label with the highest
//!   single confidence, then to the alphabetically smallest label; `wholesome` /
//!   `cozy` when nothing is left;
//! - confidence: arithmetic mean, 0.0 when nothing is left;
//! - vibe summary: first non-empty one.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::join_all;
use tracing::info;

use crate::{
    context::AnalysisContext,
    domain::{
        clamp_confidence, AggregateResult, ChatAnalysisResult, MonthlySentiment,
        MultiChatReport, SentimentByMonth, DEFAULT_PRIMARY, DEFAULT_SECONDARY,
    },
    frequency::{add_counts, top_k, top_k_keys},
    persona::PersonaMatcher,
    pipeline::{ChatAnalysisPipeline, ChatInput},
};

pub struct MultiChatAggregator<'a> {
    ctx: &'a AnalysisContext,
}

impl<'a> MultiChatAggregator<'a> {
    pub fn new(ctx: &'a AnalysisContext) -> Self {
        Self { ctx }
    }

    /// Analyze every chat (concurrently, sharing the classifier's limiter) and merge.
    /// `per_chat` keeps the order of `chats`.
    pub async fn analyze(&self, chats: &[ChatInput], user_id: &str) -> MultiChatReport {
        let pipeline = ChatAnalysisPipeline::new(self.ctx);
        let per_chat = join_all(chats.iter().map(|c| pipeline.analyze_chat(c, user_id))).await;
        let aggregate = self.aggregate(&per_chat, user_id).await;
        MultiChatReport {
            per_chat,
            aggregate,
        }
    }

    /// Merge finished per-chat results and match the aggregate persona.
    pub async fn aggregate(&self, per_chat: &[ChatAnalysisResult], user_id: &str) -> AggregateResult {
        let settings = &self.ctx.settings;

        let mut words: BTreeMap<String, u64> = BTreeMap::new();
        let mut emojis: BTreeMap<String, u64> = BTreeMap::new();
        for r in per_chat {
            add_counts(&mut words, &r.word_frequency);
            add_counts(&mut emojis, &r.emoji_frequency);
        }

        let sentiment_by_month = merge_sentiment(per_chat.iter().map(|r| &r.sentiment_by_month));
        let persona_terms = top_k_keys(&words, settings.persona_top_terms);
        let persona = PersonaMatcher::new(self.ctx)
            .match_persona(&sentiment_by_month, &persona_terms)
            .await;

        let total_messages: usize = per_chat.iter().map(|r| r.message_stats.user_count).sum();
        info!(
            chats = per_chat.len(),
            total_messages,
            months = sentiment_by_month.len(),
            persona = %persona.persona_id,
            "aggregate built"
        );

        AggregateResult {
            user_id: user_id.to_string(),
            total_chats: per_chat.len(),
            total_messages,
            top_words: top_k_keys(&words, settings.summary_top_words),
            top_emojis: top_k_keys(&emojis, settings.summary_top_emojis),
            word_frequency: top_k(&words, settings.output_top_words).into_iter().collect(),
            emoji_frequency: top_k(&emojis, settings.output_top_emojis)
                .into_iter()
                .collect(),
            sentiment_by_month,
            persona,
        }
    }
}

/// Merge per-chat month maps (in input order) into one entry per month seen.
pub fn merge_sentiment<'s>(
    maps: impl IntoIterator<Item = &'s SentimentByMonth>,
) -> SentimentByMonth {
    let maps: Vec<&SentimentByMonth> = maps.into_iter().collect();
    let months: BTreeSet<&String> = maps.iter().flat_map(|m| m.keys()).collect();

    months
        .into_iter()
        .map(|month| {
            let entries: Vec<&MonthlySentiment> = maps
                .iter()
                .filter_map(|m| m.get(month))
                .filter(|s| !s.is_error())
                .collect();
            (month.clone(), merge_month(month, &entries))
        })
        .collect()
}

/// Merge one month's non-error entries, given in input chat order.
pub fn merge_month(month: &str, entries: &[&MonthlySentiment]) -> MonthlySentiment {
    let primary = vote(
        entries.iter().map(|e| (e.primary.as_str(), e.confidence)),
        DEFAULT_PRIMARY,
    );
    let secondary = vote(
        entries.iter().map(|e| (e.secondary.as_str(), e.confidence)),
        DEFAULT_SECONDARY,
    );

    let confidence = if entries.is_empty() {
        0.0
    } else {
        let sum: f64 = entries.iter().map(|e| clamp_confidence(e.confidence)).sum();
        clamp_confidence(sum / entries.len() as f64)
    };

    let vibe_summary = entries
        .iter()
        .map(|e| e.vibe_summary.trim())
        .find(|v| !v.is_empty())
        .unwrap_or_default()
        .to_string();

    MonthlySentiment {
        month: month.to_string(),
        primary,
        secondary,
        confidence,
        vibe_summary,
    }
}

/// Highest count wins; then highest confidence recorded for the label; then the
/// alphabetically smallest label.
fn vote<'l>(labels: impl Iterator<Item = (&'l str, f64)>, default: &str) -> String {
    // label -> (count, best confidence)
    let mut tally: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
    for (label, conf) in labels {
        let conf = clamp_confidence(conf);
        let slot = tally.entry(label).or_insert((0, 0.0));
        slot.0 += 1;
        slot.1 = slot.1.max(conf);
    }

    // BTreeMap iterates alphabetically; only a strictly better candidate replaces the
    // current best, so the smallest label wins full ties.
    let mut best: Option<(&str, usize, f64)> = None;
    for (label, (count, conf)) in tally {
        let better = match best {
            None => true,
            Some((_, best_count, best_conf)) => {
                count > best_count || (count == best_count && conf > best_conf)
            }
        };
        if better {
            best = Some((label, count, conf));
        }
    }

    best.map(|(l, _, _)| l).unwrap_or(default).to_string()
}
