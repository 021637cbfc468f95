use tracing::info;

use crate::{
    context::AnalysisContext,
    domain::{ChatAnalysisResult, DateRange, Message, MessageStats},
    frequency::top_k_keys,
    persona::PersonaMatcher,
    sentiment::SentimentAnalyzer,
};

/// One chat's parsed messages (all senders).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatInput {
    pub chat_ids: Vec<String>,
    pub messages: Vec<Message>,
}

/// Frequency stats → sentiment → persona for one chat.
pub struct ChatAnalysisPipeline<'a> {
    ctx: &'a AnalysisContext,
}

impl<'a> ChatAnalysisPipeline<'a> {
    pub fn new(ctx: &'a AnalysisContext) -> Self {
        Self { ctx }
    }

    /// Analyze `chat` from the point of view of `user_id`.
    ///
    /// Frequencies cover the user's own messages; sentiment reads the whole chat
    /// for context. Oracle failures surface as marked entries in the result.
    pub async fn analyze_chat(&self, chat: &ChatInput, user_id: &str) -> ChatAnalysisResult {
        let settings = &self.ctx.settings;

        let user_texts: Vec<&str> = chat
            .messages
            .iter()
            .filter(|m| m.sender_id == user_id)
            .map(|m| m.text.as_str())
            .collect();
        let freq = self.ctx.frequency.count(&user_texts);

        let sentiment_by_month = SentimentAnalyzer::new(self.ctx)
            .analyze(&chat.messages)
            .await;

        let persona_terms = top_k_keys(&freq.words, settings.persona_top_terms);
        let persona = PersonaMatcher::new(self.ctx)
            .match_persona(&sentiment_by_month, &persona_terms)
            .await;

        let message_stats = MessageStats::new(chat.messages.len(), user_texts.len());
        info!(
            chats = ?chat.chat_ids,
            total = message_stats.total_in_chat,
            user = message_stats.user_count,
            months = sentiment_by_month.len(),
            persona = %persona.persona_id,
            "chat analyzed"
        );

        ChatAnalysisResult {
            user_id: user_id.to_string(),
            chat_ids: chat.chat_ids.clone(),
            date_range: DateRange::of(&chat.messages),
            message_stats,
            top_words: top_k_keys(&freq.words, settings.summary_top_words),
            top_emojis: top_k_keys(&freq.emojis, settings.summary_top_emojis),
            word_frequency: freq.words,
            emoji_frequency: freq.emojis,
            wordcloud_image: freq.wordcloud_image,
            sentiment_by_month,
            persona,
        }
    }
}
