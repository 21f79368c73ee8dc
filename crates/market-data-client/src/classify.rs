//! Rule-based headline classification for feeds that carry no upstream
//! sentiment. Keyword lists are intentionally small; anything unmatched is
//! neutral rather than guessed.

use credit_core::Sentiment;

const NEGATIVE_KEYWORDS: &[&str] = &[
    "debt",
    "default",
    "restructuring",
    "bankruptcy",
    "downgrade",
    "lawsuit",
    "litigation",
    "investigation",
    "probe",
    "layoff",
    "recall",
    "miss",
    "decline",
    "loss",
    "plunge",
    "warning",
];

const POSITIVE_KEYWORDS: &[&str] = &[
    "acquisition",
    "profit",
    "expansion",
    "growth",
    "beat",
    "upgrade",
    "record",
    "dividend",
    "buyback",
    "surge",
    "rally",
    "outperform",
];

/// Assign a sentiment label from headline keywords. Negative keywords win
/// over positive ones when both appear: a downgrade buried in good news is
/// still a downgrade.
pub fn classify_sentiment(headline: &str) -> Sentiment {
    let lower = headline.to_lowercase();
    if NEGATIVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        Sentiment::Negative
    } else if POSITIVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    }
}

/// Coarse event category for the explanation layer.
pub fn classify_event_type(headline: &str) -> &'static str {
    let lower = headline.to_lowercase();
    if lower.contains("earnings") || lower.contains("profit") || lower.contains("revenue") {
        "earnings_event"
    } else if lower.contains("acquisition") || lower.contains("merger") || lower.contains("buyout")
    {
        "merger_event"
    } else if lower.contains("debt") || lower.contains("default") || lower.contains("restructur")
    {
        "debt_event"
    } else if lower.contains("lawsuit") || lower.contains("litigation") || lower.contains("court")
    {
        "legal_event"
    } else {
        "financial_event"
    }
}

/// Crude named-entity pull: runs of capitalized tokens, skipping the
/// sentence-initial word. Good enough for tagging which organizations a
/// headline mentions.
pub fn extract_entities(headline: &str) -> Vec<String> {
    let mut entities = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for (i, token) in headline.split_whitespace().enumerate() {
        let word = token.trim_matches(|c: char| !c.is_alphanumeric());
        let capitalized = word.chars().next().is_some_and(|c| c.is_uppercase());

        if capitalized && i > 0 {
            current.push(word);
        } else if !current.is_empty() {
            entities.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        entities.push(current.join(" "));
    }
    entities
}
