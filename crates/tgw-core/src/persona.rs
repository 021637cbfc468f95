use tracing::{debug, warn};

use crate::{
    catalog::{Persona, PersonaCatalog},
    context::AnalysisContext,
    domain::{PersonaMatch, SentimentByMonth},
    sentiment::{parse_confidence, split_field, trim_wrapping},
};

/// Emotional signal handed to the persona prompt.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PersonaSignal {
    pub primaries: Vec<String>,
    pub secondaries: Vec<String>,
    pub vibes: Vec<String>,
    pub top_terms: Vec<String>,
}

impl PersonaSignal {
    /// Collect non-error labels (chronologically) plus the first `k` terms.
    pub fn collect(sentiment: &SentimentByMonth, top_terms: &[String], k: usize) -> Self {
        let usable = sentiment.values().filter(|m| !m.is_error());
        let mut signal = Self {
            top_terms: top_terms.iter().take(k).cloned().collect(),
            ..Self::default()
        };
        for m in usable {
            signal.primaries.push(m.primary.clone());
            signal.secondaries.push(m.secondary.clone());
            if !m.vibe_summary.trim().is_empty() {
                signal.vibes.push(m.vibe_summary.clone());
            }
        }
        signal
    }

    pub fn is_empty(&self) -> bool {
        self.primaries.is_empty() && self.top_terms.is_empty()
    }
}

pub struct PersonaMatcher<'a> {
    ctx: &'a AnalysisContext,
}

impl<'a> PersonaMatcher<'a> {
    pub fn new(ctx: &'a AnalysisContext) -> Self {
        Self { ctx }
    }

    /// Pick one catalog persona. Never fails: unusable answers and failed calls
    /// resolve to the catalog's default persona with `fallback` set.
    pub async fn match_persona(
        &self,
        sentiment: &SentimentByMonth,
        top_terms: &[String],
    ) -> PersonaMatch {
        let catalog = &self.ctx.catalog;
        let settings = &self.ctx.settings;
        let signal = PersonaSignal::collect(sentiment, top_terms, settings.persona_top_terms);

        if signal.is_empty() {
            debug!("no usable signal for persona matching");
            return fallback_match(catalog, "not enough chat activity to match a persona");
        }

        let prompt = build_persona_prompt(&signal, catalog);
        match self
            .ctx
            .classifier
            .classify(
                &prompt,
                settings.persona_temperature,
                settings.persona_max_tokens,
            )
            .await
        {
            Ok(text) => parse_persona_response(&text, catalog),
            Err(e) => {
                warn!(error = %e, "persona matching failed");
                fallback_match(catalog, &format!("persona matching failed: {e}"))
            }
        }
    }
}

pub fn build_persona_prompt(signal: &PersonaSignal, catalog: &PersonaCatalog) -> String {
    let options = catalog
        .iter()
        .map(|p| format!("- {}: {} ({}) - {}", p.id, p.name, p.show, p.traits))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Based on this person's chat vibe analysis, match them to ONE cartoon character.\n\n\
Primary emotions over time: {}\n\
Secondary emotions over time: {}\n\
Vibe summaries: {}\n\
Most used words: {}\n\n\
PERSONAS (pick ONE by ID):\n\
{options}\n\n\
Output ONLY in this format:\n\
persona_id: [id from list above]\n\
match_reason: [1-2 sentence explanation of why this persona fits]\n\
confidence: [0.0-1.0]\n\
yearly_vibe: [short catchy tagline for their year]\n",
        signal.primaries.join(", "),
        signal.secondaries.join(", "),
        signal.vibes.join("; "),
        signal.top_terms.join(", "),
    )
}

/// Parse a persona answer. An unknown or missing id yields the default persona.
pub fn parse_persona_response(text: &str, catalog: &PersonaCatalog) -> PersonaMatch {
    let mut persona: Option<&Persona> = None;
    let mut reason = String::new();
    let mut confidence = 0.0;
    let mut yearly_vibe = String::new();

    for line in text.lines() {
        let Some((key, value)) = split_field(line) else {
            continue;
        };
        match key.as_str() {
            "persona_id" | "persona" | "id" => {
                if persona.is_none() {
                    persona = catalog.resolve(value);
                    if persona.is_none() {
                        debug!(value, "persona id outside catalog");
                    }
                }
            }
            "match_reason" | "reason" => reason = trim_wrapping(value).to_string(),
            "confidence" => {
                if let Some(c) = parse_confidence(value) {
                    confidence = c;
                }
            }
            "yearly_vibe" | "tagline" => yearly_vibe = trim_wrapping(value).to_string(),
            _ => {}
        }
    }

    match persona {
        Some(p) => PersonaMatch {
            persona_id: p.id.clone(),
            persona_name: p.name.clone(),
            show: p.show.clone(),
            traits: p.traits.clone(),
            match_reason: reason,
            confidence,
            yearly_vibe,
            fallback: false,
        },
        // Unknown id: the default persona, with whatever else the oracle said.
        None => {
            let fallback = fallback_match(catalog, "no recognizable persona in oracle answer");
            PersonaMatch {
                match_reason: if reason.is_empty() {
                    fallback.match_reason.clone()
                } else {
                    reason
                },
                confidence,
                yearly_vibe,
                ..fallback
            }
        }
    }
}

pub fn fallback_match(catalog: &PersonaCatalog, reason: &str) -> PersonaMatch {
    let p = catalog.default_persona();
    PersonaMatch {
        persona_id: p.id.clone(),
        persona_name: p.name.clone(),
        show: p.show.clone(),
        traits: p.traits.clone(),
        match_reason: reason.to_string(),
        confidence: 0.0,
        yearly_vibe: String::new(),
        fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        context::AnalysisSettings,
        domain::MonthlySentiment,
        errors::Error,
        frequency::RegexFrequencyCounter,
        oracle::client::{ClassifierClient, ClassifierConfig},
        testing::FakeOracle,
    };
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx(oracle: Arc<FakeOracle>) -> AnalysisContext {
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
            settings: AnalysisSettings::default(),
        }
    }

    fn sentiment() -> SentimentByMonth {
        let mut s = SentimentByMonth::new();
        s.insert(
            "2024-01".into(),
            MonthlySentiment {
                month: "2024-01".into(),
                primary: "hype".into(),
                secondary: "cozy".into(),
                confidence: 0.8,
                vibe_summary: "new year energy".into(),
            },
        );
        s.insert(
            "2024-02".into(),
            MonthlySentiment::error_marker("2024-02", "oracle retries exhausted"),
        );
        s
    }

    #[test]
    fn parses_catalog_answer() {
        let c = PersonaCatalog::builtin();
        let text = "persona_id: Finn\nmatch_reason: Always on an adventure.\nconfidence: 0.9\nyearly_vibe: Hero era";
        let m = parse_persona_response(text, &c);
        assert_eq!(m.persona_id, "finn");
        assert_eq!(m.persona_name, "Finn the Human");
        assert_eq!(m.match_reason, "Always on an adventure.");
        assert_eq!(m.confidence, 0.9);
        assert_eq!(m.yearly_vibe, "Hero era");
        assert!(!m.fallback);
    }

    #[test]
    fn malformed_id_falls_back_to_default() {
        let c = PersonaCatalog::builtin();
        for text in ["persona_id:", "I think they are like Rick!", ""] {
            let m = parse_persona_response(text, &c);
            assert_eq!(m.persona_id, "jake", "input: {text:?}");
            assert_eq!(m.persona_name, "Jake the Dog");
            assert!(m.fallback);
            assert_eq!(m.confidence, 0.0);
            assert_eq!(m.match_reason, "no recognizable persona in oracle answer");
        }
    }

    #[test]
    fn unknown_id_keeps_the_rest_of_the_answer() {
        let c = PersonaCatalog::builtin();
        let text = "persona_id: homer_simpson\nmatch_reason: loves donuts\nconfidence: 0.9\nyearly_vibe: mmm";
        let m = parse_persona_response(text, &c);
        assert_eq!(m.persona_id, "jake");
        assert!(m.fallback);
        assert_eq!(m.match_reason, "loves donuts");
        assert_eq!(m.confidence, 0.9);
        assert_eq!(m.yearly_vibe, "mmm");
    }

    #[test]
    fn prompt_skips_error_months() {
        let terms = vec!["pizza".to_string(), "exam".to_string()];
        let signal = PersonaSignal::collect(&sentiment(), &terms, 1);
        assert_eq!(signal.primaries, vec!["hype"]);
        assert_eq!(signal.vibes, vec!["new year energy"]);
        assert_eq!(signal.top_terms, vec!["pizza"]);

        let p = build_persona_prompt(&signal, &PersonaCatalog::builtin());
        assert!(!p.contains("retries exhausted"));
        assert!(p.contains("- princess_carolyn: Princess Carolyn (BoJack Horseman)"));
        assert!(p.contains("Most used words: pizza\n"));
    }

    #[tokio::test]
    async fn matches_through_oracle() {
        let oracle = Arc::new(FakeOracle::new(|_, _| {
            Ok("persona_id: zuko\nmatch_reason: growth arc\nconfidence: 1.4\nyearly_vibe: redemption".into())
        }));
        let c = ctx(oracle.clone());
        let m = PersonaMatcher::new(&c)
            .match_persona(&sentiment(), &["honor".to_string()])
            .await;
        assert_eq!(m.persona_id, "zuko");
        assert_eq!(m.confidence, 1.0);
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_call_yields_default_persona() {
        let oracle = Arc::new(FakeOracle::new(|_, _| Err(Error::Oracle("401".into()))));
        let c = ctx(oracle);
        let m = PersonaMatcher::new(&c)
            .match_persona(&sentiment(), &[])
            .await;
        assert_eq!(m.persona_id, "jake");
        assert!(m.fallback);
        assert_eq!(m.confidence, 0.0);
        assert!(m.match_reason.contains("401"));
    }

    #[tokio::test]
    async fn no_signal_skips_the_oracle() {
        let oracle = Arc::new(FakeOracle::new(|_, _| Ok("persona_id: rick".into())));
        let c = ctx(oracle.clone());
        let only_errors: SentimentByMonth = [(
            "2024-01".to_string(),
            MonthlySentiment::error_marker("2024-01", "boom"),
        )]
        .into_iter()
        .collect();

        let m = PersonaMatcher::new(&c).match_persona(&only_errors, &[]).await;
        assert_eq!(m.persona_id, "jake");
        assert!(m.fallback);
        assert_eq!(oracle.calls(), 0);
    }
}
