//! Sentiment inference over cleaned review text.
//!
//! The classifier itself is a black box behind [`SentimentModel`]; the
//! preprocessing that feeds it lives here. Cleaning lowercases the text,
//! strips the company name and its individual tokens, removes everything
//! outside letters/digits (accents preserved), collapses whitespace, and
//! drops short tokens and stop words.
//!
//! The bundled [`LexiconModel`] scores the cleaned tokens against small
//! positive/negative French word lists so the binary works end to end
//! without an external model artifact.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pretrained text → label classifier, consumed through its synchronous
/// call contract only.
pub trait SentimentModel: Send + Sync {
    fn predict(&self, cleaned_text: &str) -> Sentiment;
}

/// French stop words kept out of the cleaned text.
const FR_STOPWORDS: &[&str] = &[
    "alors", "aucun", "aussi", "autre", "avant", "avec", "avoir", "bon", "car", "ces", "cette",
    "ceux", "chaque", "comme", "comment", "dans", "des", "donc", "elle", "elles", "encore", "est",
    "etaient", "etait", "etre", "eux", "fait", "fois", "font", "hors", "ici", "ils", "juste",
    "les", "leur", "mais", "meme", "mes", "mine", "moins", "mon", "mot", "notre", "nous", "par",
    "parce", "pas", "peut", "peu", "plupart", "pour", "pourquoi", "quand", "que", "quel",
    "quelle", "quelles", "quels", "qui", "sans", "ses", "seulement", "sont", "sous", "sur",
    "tandis", "tellement", "tels", "tes", "ton", "tous", "tout", "trop", "tres", "une", "vont",
    "votre", "vous",
];

fn special_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9À-ÿ ]").unwrap())
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// The company name and each of its tokens, used as additional stop words
/// so the entity under review never biases the prediction.
pub fn company_stopwords(company_name: Option<&str>) -> HashSet<String> {
    let mut tokens = HashSet::new();
    if let Some(name) = company_name {
        let name = name.to_lowercase();
        for token in name.split_whitespace() {
            tokens.insert(token.to_string());
        }
        tokens.insert(name);
    }
    tokens
}

/// Clean free text into the token stream the classifier consumes.
pub fn clean_text(text: &str, company_name: Option<&str>) -> String {
    let mut text = text.to_lowercase();

    if let Some(name) = company_name {
        let name = name.to_lowercase();
        text = text.replace(&name, "");
        for token in name.split_whitespace() {
            text = text.replace(token, "");
        }
    }

    let text = special_chars().replace_all(&text, " ");
    let text = whitespace().replace_all(text.trim(), " ");

    let company_tokens = company_stopwords(company_name);
    text.split(' ')
        .filter(|token| token.chars().count() >= 3)
        .filter(|token| !FR_STOPWORDS.contains(token))
        .filter(|token| !company_tokens.contains(*token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Word-list scorer standing in for the trained classifier.
pub struct LexiconModel {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
}

impl Default for LexiconModel {
    fn default() -> Self {
        Self {
            positive: [
                "excellent", "parfait", "super", "rapide", "satisfait", "satisfaite",
                "recommande", "merci", "top", "bien", "génial", "genial", "efficace",
                "agréable", "agreable", "impeccable", "fiable", "content", "contente",
                "ravie", "ravi", "professionnel", "soigné", "qualité", "qualite",
            ]
            .into_iter()
            .collect(),
            negative: [
                "mauvais", "mauvaise", "horrible", "arnaque", "nul", "nulle", "problème",
                "probleme", "retard", "décevant", "decevant", "déçu", "decu", "déçue",
                "jamais", "annulé", "annule", "inadmissible", "catastrophique", "lent",
                "lente", "incompétent", "incompetent", "scandaleux", "injoignable",
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl SentimentModel for LexiconModel {
    fn predict(&self, cleaned_text: &str) -> Sentiment {
        let mut positive = 0usize;
        let mut negative = 0usize;

        for token in cleaned_text.split_whitespace() {
            if self.positive.contains(token) {
                positive += 1;
            } else if self.negative.contains(token) {
                negative += 1;
            }
        }

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }
}

/// Clean, then classify. Returns the label and the cleaned text it was
/// computed from.
pub fn predict_sentiment(
    model: &dyn SentimentModel,
    text: &str,
    company_name: Option<&str>,
) -> (Sentiment, String) {
    let cleaned = clean_text(text, company_name);
    let sentiment = model.predict(&cleaned);
    (sentiment, cleaned)
}
