//! Word/emoji counting collaborator.
//!
//! The pipeline only sums these maps; the default implementation is a plain
//! regex counter with no image rendering.

use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;

/// Counts for one user's text plus an optional rendered artifact reference.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrequencyStats {
    pub words: BTreeMap<String, u64>,
    pub emojis: BTreeMap<String, u64>,
    pub wordcloud_image: Option<String>,
}

/// Port for frequency counting. Implementations must be cheap and side-effect free.
pub trait FrequencyCounter: Send + Sync {
    fn count(&self, texts: &[&str]) -> FrequencyStats;
}

/// Top `k` entries by count (descending), ties broken alphabetically.
pub fn top_k(counts: &BTreeMap<String, u64>, k: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = counts.iter().map(|(w, c)| (w.clone(), *c)).collect();
    // BTreeMap iteration is already alphabetical; a stable sort keeps that for ties.
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries.truncate(k);
    entries
}

pub fn top_k_keys(counts: &BTreeMap<String, u64>, k: usize) -> Vec<String> {
    top_k(counts, k).into_iter().map(|(w, _)| w).collect()
}

/// Counter addition: `into[key] += other[key]`.
pub fn add_counts(into: &mut BTreeMap<String, u64>, other: &BTreeMap<String, u64>) {
    for (k, v) in other {
        *into.entry(k.clone()).or_insert(0) += v;
    }
}

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "is", "it", "this", "that", "was", "are", "be", "have", "has", "had", "do", "does",
    "did", "will", "would", "could", "should", "may", "might", "can", "just", "not", "no", "yes",
    "so", "if", "then", "than", "when", "what", "where", "who", "which", "how", "why", "all",
    "each", "every", "both", "few", "more", "most", "other", "some", "such", "only", "own", "same",
    "too", "very", "also", "any", "as", "about", "up", "out", "into", "over", "after", "before",
    "between", "under", "again", "there", "here", "they", "them", "their", "he", "him", "his",
    "she", "her", "we", "us", "our", "you", "your", "my", "me", "i", "am", "been", "being", "get",
    "got", "getting", "go", "going", "went", "come", "coming", "came", "like", "know", "think",
    "want", "see", "look", "make", "take", "say", "said", "well", "back", "now", "way", "even",
    "new", "because", "still", "oh", "ok", "okay", "yeah", "ya", "yea", "really", "actually",
    "dont", "im", "its", "thats", "youre", "were",
    // Telegram / chat filler
    "sticker", "forwarded", "message", "replied", "reply", "photo", "video", "voice", "file",
    "gif", "http", "https", "www", "com", "ah", "eh", "mm", "hmm", "bro", "sis", "dude", "lol",
    "omg", "btw", "idk", "smh", "fyi", "ty", "thx", "np", "yw", "yall", "la", "uh", "uhh",
    "hahaha", "hehe", "haha", "hehehe", "ye",
];

/// Default counter: ASCII words of two or more letters minus stopwords, and
/// emoji counted one scalar at a time.
pub struct RegexFrequencyCounter {
    word_re: Regex,
    emoji_re: Regex,
    stopwords: HashSet<&'static str>,
}

impl RegexFrequencyCounter {
    pub fn new() -> Self {
        Self {
            word_re: Regex::new(r"\b[a-z]{2,}\b").expect("static word regex"),
            emoji_re: Regex::new(
                "[\u{1F600}-\u{1F64F}\u{1F300}-\u{1F5FF}\u{1F680}-\u{1F6FF}\u{1F1E0}-\u{1F1FF}\
\u{2702}-\u{27B0}\u{24C2}\u{1F170}-\u{1F251}\u{1F900}-\u{1F9FF}\u{1FA00}-\u{1FA6F}\u{1FA70}-\u{1FAFF}\
\u{2600}-\u{26FF}]+",
            )
            .expect("static emoji regex"),
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }
}

impl Default for RegexFrequencyCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrequencyCounter for RegexFrequencyCounter {
    fn count(&self, texts: &[&str]) -> FrequencyStats {
        let mut words: HashMap<String, u64> = HashMap::new();
        let mut emojis: HashMap<String, u64> = HashMap::new();

        for text in texts {
            let lower = text.to_lowercase();
            for m in self.word_re.find_iter(&lower) {
                if !self.stopwords.contains(m.as_str()) {
                    *words.entry(m.as_str().to_string()).or_insert(0) += 1;
                }
            }
            for m in self.emoji_re.find_iter(text) {
                for ch in m.as_str().chars() {
                    *emojis.entry(ch.to_string()).or_insert(0) += 1;
                }
            }
        }

        FrequencyStats {
            words: words.into_iter().collect(),
            emojis: emojis.into_iter().collect(),
            wordcloud_image: None,
        }
    }
}
