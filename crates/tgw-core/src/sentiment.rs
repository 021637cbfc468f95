//! Per-month emotion labelling.
//!
//! Response grammar (v1), one block per month:
//!
//! ```text
//! month: 2024-03
//! primary: hype
//! secondary: cozy
//! confidence: 0.8
//! vibe_summary: planning the trip nonstop
//! ```
//!
//! Keys are case-insensitive, bullets and markdown emphasis are ignored, blocks
//! may arrive in any order. Whatever cannot be read keeps its default; months the
//! oracle skipped get [`MonthlySentiment::default_for`].

use std::collections::{BTreeMap, HashSet};

use futures::future::join_all;
use tracing::{debug, warn};

use crate::{
    batcher::MonthBatch,
    catalog::{canonical_emotion, strip_decoration, EMOTIONS},
    context::AnalysisContext,
    domain::{clamp_confidence, Message, MonthlySentiment, SentimentByMonth},
};

pub struct SentimentAnalyzer<'a> {
    ctx: &'a AnalysisContext,
}

impl<'a> SentimentAnalyzer<'a> {
    pub fn new(ctx: &'a AnalysisContext) -> Self {
        Self { ctx }
    }

    /// Label every month present in `messages`.
    ///
    /// All batches are dispatched at once; the shared classifier decides how many
    /// actually run. A failed batch degrades only its own months to error markers.
    pub async fn analyze(&self, messages: &[Message]) -> SentimentByMonth {
        let batches = self.ctx.settings.batcher.batches(messages);
        debug!(batches = batches.len(), "dispatching sentiment batches");

        join_all(batches.iter().map(|b| self.analyze_batch(b)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn analyze_batch(&self, batch: &MonthBatch) -> SentimentByMonth {
        let months = batch.month_keys();
        let prompt = build_sentiment_prompt(batch);
        let settings = &self.ctx.settings;
        let max_tokens = settings
            .sentiment_tokens_per_month
            .saturating_mul(months.len() as u32);

        match self
            .ctx
            .classifier
            .classify(&prompt, settings.sentiment_temperature, max_tokens)
            .await
        {
            Ok(text) => parse_sentiment_response(&text, &months),
            Err(e) => {
                warn!(months = ?months, error = %e, "sentiment batch failed");
                let detail = e.to_string();
                months
                    .iter()
                    .map(|m| (m.clone(), MonthlySentiment::error_marker(m, detail.clone())))
                    .collect()
            }
        }
    }
}

pub fn build_sentiment_prompt(batch: &MonthBatch) -> String {
    let mut out = format!(
        "Analyze the overall vibe of these chat messages, month by month.\n\n\
For EACH month below pick a PRIMARY emotion and a SECONDARY emotion from this list:\n\
{}\n\n\
Also give a confidence score 0.0-1.0 and a short 1-sentence vibe summary.\n\n\
Output ONLY one block per month, in this format:\n\
month: YYYY-MM\n\
primary: [emotion]\n\
secondary: [emotion]\n\
confidence: [0.0-1.0]\n\
vibe_summary: [short summary]\n",
        EMOTIONS.join(", ")
    );

    for bucket in &batch.months {
        out.push_str(&format!("\n=== {} ===\n", bucket.month));
        if bucket.texts.len() < bucket.total {
            out.push_str(&format!(
                "(latest {} of {} messages)\n",
                bucket.texts.len(),
                bucket.total
            ));
        }
        for text in &bucket.texts {
            // One message per line keeps excerpts from looking like answer fields.
            out.push_str(&text.split_whitespace().collect::<Vec<_>>().join(" "));
            out.push('\n');
        }
    }

    out
}

/// Parse a batch response into exactly one entry per requested month.
pub fn parse_sentiment_response(text: &str, months: &[String]) -> SentimentByMonth {
    let wanted: HashSet<&str> = months.iter().map(String::as_str).collect();
    let mut parsed: BTreeMap<String, MonthlySentiment> = BTreeMap::new();
    let mut headers_seen: HashSet<String> = HashSet::new();

    // A single-month batch may be answered without a `month:` header.
    let mut current: Option<String> = match months {
        [only] => Some(only.clone()),
        _ => None,
    };

    for line in text.lines() {
        let Some((key, value)) = split_field(line) else {
            continue;
        };

        if key == "month" {
            let month = strip_decoration(value).to_string();
            if !wanted.contains(month.as_str()) {
                debug!(month = %month, "ignoring block for month outside the batch");
                current = None;
            } else if !headers_seen.insert(month.clone()) {
                debug!(month = %month, "ignoring repeated month block");
                current = None;
            } else {
                current = Some(month);
            }
            continue;
        }

        let Some(month) = current.as_ref() else {
            continue;
        };
        let entry = parsed
            .entry(month.clone())
            .or_insert_with(|| MonthlySentiment::default_for(month.as_str()));

        match key.as_str() {
            "primary" | "primary_emotion" => match canonical_emotion(value) {
                Some(e) => entry.primary = e.to_string(),
                None => debug!(value, "primary emotion outside vocabulary, keeping default"),
            },
            "secondary" | "secondary_emotion" => match canonical_emotion(value) {
                Some(e) => entry.secondary = e.to_string(),
                None => debug!(value, "secondary emotion outside vocabulary, keeping default"),
            },
            "confidence" => {
                if let Some(c) = parse_confidence(value) {
                    entry.confidence = c;
                }
            }
            "vibe_summary" | "vibe" | "summary" => {
                entry.vibe_summary = trim_wrapping(value).to_string();
            }
            _ => {}
        }
    }

    months
        .iter()
        .map(|m| {
            let entry = parsed.remove(m).unwrap_or_else(|| {
                debug!(month = %m, "month missing from oracle response, using default");
                MonthlySentiment::default_for(m.as_str())
            });
            (m.clone(), entry)
        })
        .collect()
}

/// Split a `key: value` line and normalize the key (`**Vibe Summary**` → `vibe_summary`).
pub(crate) fn split_field(line: &str) -> Option<(String, &str)> {
    let (raw_key, value) = line.split_once(':')?;
    let key = raw_key
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '#' | '•') || c.is_whitespace())
        .trim_matches(|c: char| c == '*' || c == '_' || c.is_whitespace())
        .to_lowercase()
        .replace([' ', '-'], "_");
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

/// Accepts `0.8`, `80%`, `80 %`, `0.8 (high)`; out-of-range values are clamped.
pub(crate) fn parse_confidence(value: &str) -> Option<f64> {
    let mut tokens = trim_wrapping(value).split_whitespace();
    let first = tokens.next()?;
    let percent = first.ends_with('%') || tokens.next() == Some("%");
    let v = first.trim_end_matches('%').parse::<f64>().ok()?;
    let v = if percent { v / 100.0 } else { v };
    if v.is_nan() {
        return None;
    }
    Some(clamp_confidence(v))
}

pub(crate) fn trim_wrapping(value: &str) -> &str {
    value
        .trim()
        .trim_matches(|c: char| matches!(c, '[' | ']' | '"'))
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batcher::MonthBatcher,
        catalog::PersonaCatalog,
        context::AnalysisSettings,
        errors::Error,
        frequency::RegexFrequencyCounter,
        oracle::client::{ClassifierClient, ClassifierConfig},
        testing::{answer_every_month, FakeOracle},
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn months(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn ctx_with(oracle: Arc<FakeOracle>, months_per_batch: usize) -> AnalysisContext {
        let cfg = ClassifierConfig {
            max_concurrency: 4,
            max_attempts: 2,
            base_backoff: Duration::from_millis(10),
            call_timeout: Duration::from_secs(5),
        };
        AnalysisContext {
            classifier: Arc::new(ClassifierClient::new(oracle, "test-model", cfg)),
            catalog: Arc::new(PersonaCatalog::builtin()),
            frequency: Arc::new(RegexFrequencyCounter::new()),
            settings: AnalysisSettings {
                batcher: MonthBatcher {
                    months_per_batch,
                    max_messages_per_month: 150,
                },
                ..AnalysisSettings::default()
            },
        }
    }

    fn chat(month_count: u32) -> Vec<Message> {
        (1..=month_count)
            .flat_map(|m| {
                [
                    Message::new("lets gooo", format!("2024-{m:02}-03T10:00:00+00:00"), "1", "c"),
                    Message::new("same", format!("2024-{m:02}-20T10:00:00+00:00"), "2", "c"),
                ]
            })
            .collect()
    }

    #[test]
    fn parses_well_formed_blocks() {
        let text = "month: 2024-01\nprimary: hype\nsecondary: cozy\nconfidence: 0.8\nvibe_summary: big plans\n\n\
month: 2024-02\nprimary: salty\nsecondary: petty\nconfidence: 0.4\nvibe_summary: group beef\n";
        let out = parse_sentiment_response(text, &months(&["2024-01", "2024-02"]));
        assert_eq!(out.len(), 2);
        assert_eq!(out["2024-01"].primary, "hype");
        assert_eq!(out["2024-01"].vibe_summary, "big plans");
        assert_eq!(out["2024-02"].secondary, "petty");
        assert_eq!(out["2024-02"].confidence, 0.4);
        assert_eq!(out["2024-02"].month, "2024-02");
    }

    #[test]
    fn tolerates_order_case_whitespace_and_markdown() {
        let text = "**Month**: 2024-02\n  PRIMARY :  Villain Arc \n- Secondary: [salty]\n\
**Confidence**: 85%\n**Vibe Summary**: \"chaos reigns\"\n\n\
### month: [2024-01]\nprimary: wholesome\nsecondary: cozy\nconfidence: 0.6 (medium)\nvibe-summary: soft era";
        let out = parse_sentiment_response(text, &months(&["2024-01", "2024-02"]));
        assert_eq!(out["2024-02"].primary, "villain arc");
        assert_eq!(out["2024-02"].secondary, "salty");
        assert!((out["2024-02"].confidence - 0.85).abs() < 1e-9);
        assert_eq!(out["2024-02"].vibe_summary, "chaos reigns");
        assert_eq!(out["2024-01"].confidence, 0.6);
        assert_eq!(out["2024-01"].vibe_summary, "soft era");
    }

    #[test]
    fn missing_months_get_defaults_and_strangers_are_ignored() {
        let text = "month: 2024-03\nprimary: hype\nconfidence: 0.9\n\
month: 1999-01\nprimary: unhinged\nconfidence: 1.0\n";
        let out = parse_sentiment_response(text, &months(&["2024-03", "2024-04"]));
        assert_eq!(out.len(), 2);
        assert_eq!(out["2024-03"].primary, "hype");
        assert_eq!(out["2024-04"], MonthlySentiment::default_for("2024-04"));
        assert!(!out.contains_key("1999-01"));
    }

    #[test]
    fn garbage_and_out_of_vocabulary_values_keep_defaults() {
        let text = "month: 2024-05\nprimary: ecstatic\nsecondary: error\nconfidence: very high\n";
        let out = parse_sentiment_response(text, &months(&["2024-05"]));
        let m = &out["2024-05"];
        assert_eq!(m.primary, "wholesome");
        assert_eq!(m.secondary, "cozy");
        assert_eq!(m.confidence, 0.0);
        assert!(!m.is_error());

        let out = parse_sentiment_response("", &months(&["2024-05", "2024-06"]));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn confidence_is_clamped() {
        let text = "month: 2024-05\nconfidence: 7\nmonth: 2024-06\nconfidence: -3\nmonth: 2024-07\nconfidence: NaN\n\
month: 2024-08\nconfidence: 80 %\n";
        let out = parse_sentiment_response(
            text,
            &months(&["2024-05", "2024-06", "2024-07", "2024-08"]),
        );
        assert_eq!(out["2024-05"].confidence, 1.0);
        assert_eq!(out["2024-06"].confidence, 0.0);
        assert_eq!(out["2024-07"].confidence, 0.0);
        assert!((out["2024-08"].confidence - 0.8).abs() < 1e-9);
        assert_eq!(parse_confidence("80 %").map(|c| (c * 100.0).round()), Some(80.0));
        assert_eq!(parse_confidence("0.6 (medium)"), Some(0.6));
    }

    #[test]
    fn repeated_month_block_keeps_the_first() {
        let text = "month: 2024-01\nprimary: hype\nmonth: 2024-01\nprimary: salty\n";
        let out = parse_sentiment_response(text, &months(&["2024-01", "2024-02"]));
        assert_eq!(out["2024-01"].primary, "hype");
    }

    #[test]
    fn single_month_batch_accepts_headerless_answer() {
        let text = "primary: nostalgic\nsecondary: cozy\nconfidence: 0.7\nvibe_summary: old photos";
        let out = parse_sentiment_response(text, &months(&["2024-08"]));
        assert_eq!(out["2024-08"].primary, "nostalgic");
        assert_eq!(out["2024-08"].vibe_summary, "old photos");

        // With several months the same fields have no home.
        let out = parse_sentiment_response(text, &months(&["2024-08", "2024-09"]));
        assert_eq!(out["2024-08"], MonthlySentiment::default_for("2024-08"));
    }

    #[test]
    fn prompt_lists_each_month_and_flattens_messages() {
        let batch = MonthBatch {
            months: vec![crate::batcher::MonthBucket {
                month: "2024-01".into(),
                texts: vec!["line one\nprimary: hype".into()],
                total: 3,
            }],
        };
        let p = build_sentiment_prompt(&batch);
        assert!(p.contains("=== 2024-01 ==="));
        assert!(p.contains("(latest 1 of 3 messages)"));
        assert!(p.contains("line one primary: hype\n"));
        assert!(p.contains("main character vibes"));
    }

    #[tokio::test]
    async fn every_input_month_gets_exactly_one_entry() {
        // The oracle forgets the last month of every batch.
        let oracle = Arc::new(FakeOracle::new(|req, _| {
            let full = answer_every_month(&req.prompt, "hype", 0.9);
            let blocks: Vec<&str> = full.split("\n\n").collect();
            Ok(blocks[..blocks.len() - 1].join("\n\n"))
        }));
        let ctx = ctx_with(oracle.clone(), 4);
        let msgs = chat(9);

        let out = SentimentAnalyzer::new(&ctx).analyze(&msgs).await;
        assert_eq!(out.len(), 9);
        assert_eq!(oracle.calls(), 3);
        assert_eq!(out["2024-01"].primary, "hype");
        assert_eq!(out["2024-04"], MonthlySentiment::default_for("2024-04"));
        assert_eq!(out["2024-09"], MonthlySentiment::default_for("2024-09"));
        assert!(out.values().all(|m| (0.0..=1.0).contains(&m.confidence)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_batch_degrades_only_its_months() {
        let oracle = Arc::new(FakeOracle::new(|req, _| {
            if req.prompt.contains("=== 2024-05 ===") {
                Err(Error::RateLimited("429 slow down".into()))
            } else {
                Ok(answer_every_month(&req.prompt, "hype", 0.7))
            }
        }));
        let ctx = ctx_with(oracle.clone(), 4);

        let out = SentimentAnalyzer::new(&ctx).analyze(&chat(9)).await;
        assert_eq!(out.len(), 9);
        for m in ["2024-05", "2024-06", "2024-07", "2024-08"] {
            assert!(out[m].is_error(), "{m} should carry the error marker");
            assert_eq!(out[m].confidence, 0.0);
            assert!(out[m].vibe_summary.contains("retries exhausted"));
        }
        for m in ["2024-01", "2024-04", "2024-09"] {
            assert_eq!(out[m].primary, "hype");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn batches_run_concurrently() {
        let oracle = Arc::new(
            FakeOracle::new(|req, _| Ok(answer_every_month(&req.prompt, "cozy", 0.5)))
                .with_delay(Duration::from_millis(100)),
        );
        let ctx = ctx_with(oracle.clone(), 2);

        let out = SentimentAnalyzer::new(&ctx).analyze(&chat(6)).await;
        assert_eq!(out.len(), 6);
        assert_eq!(oracle.calls(), 3);
        assert_eq!(oracle.max_in_flight(), 3);
    }

    #[tokio::test]
    async fn no_messages_means_no_calls() {
        let oracle = Arc::new(FakeOracle::new(|_, _| Ok(String::new())));
        let ctx = ctx_with(oracle.clone(), 4);
        assert!(SentimentAnalyzer::new(&ctx).analyze(&[]).await.is_empty());
        assert_eq!(oracle.calls(), 0);
    }
}
