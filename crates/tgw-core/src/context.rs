use std::sync::Arc;

use crate::{
    batcher::MonthBatcher, catalog::PersonaCatalog, frequency::FrequencyCounter,
    oracle::client::ClassifierClient,
};

/// Tunables for prompts and output shaping.
#[derive(Clone, Copy, Debug)]
pub struct AnalysisSettings {
    pub batcher: MonthBatcher,
    pub sentiment_temperature: f32,
    /// Output budget per month in a batch request.
    pub sentiment_tokens_per_month: u32,
    pub persona_temperature: f32,
    pub persona_max_tokens: u32,
    /// Vocabulary terms handed to the persona prompt.
    pub persona_top_terms: usize,
    pub output_top_words: usize,
    pub output_top_emojis: usize,
    pub summary_top_words: usize,
    pub summary_top_emojis: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            batcher: MonthBatcher::default(),
            sentiment_temperature: 0.7,
            sentiment_tokens_per_month: 160,
            persona_temperature: 0.7,
            persona_max_tokens: 256,
            persona_top_terms: 10,
            output_top_words: 50,
            output_top_emojis: 20,
            summary_top_words: 10,
            summary_top_emojis: 5,
        }
    }
}

/// Process-wide collaborators, built once at startup and passed to every component.
///
/// The classifier (and therefore its concurrency limiter) is shared by every
/// analysis running against this context.
#[derive(Clone)]
pub struct AnalysisContext {
    pub classifier: Arc<ClassifierClient>,
    pub catalog: Arc<PersonaCatalog>,
    pub frequency: Arc<dyn FrequencyCounter>,
    pub settings: AnalysisSettings,
}
