use crate::model::SeverityTier;

pub const CRITICAL_KEYWORDS: &[&str] = &[
    "suicide",
    "kill myself",
    "self harm",
    "self-harm",
    "cut",
    "cutting",
    "overdose",
    "i want to die",
    "die",
    "hurt myself",
];

pub const HIGH_KEYWORDS: &[&str] = &[
    "panic",
    "anxiety attack",
    "depressed",
    "depression",
    "abuse",
    "violence",
    "addiction",
    "drugs",
    "alcohol",
];

/// Model confidence at or above this promotes an unmatched phrase to HIGH.
pub const HIGH_CONFIDENCE: f64 = 0.85;

/// Map a detected phrase and optional model confidence to a severity tier.
///
/// Keyword lists are checked first (case-insensitive substring match), then
/// the confidence threshold. Anything without a signal is MEDIUM.
pub fn classify(phrase: &str, confidence: Option<f64>) -> SeverityTier {
    let normalized = phrase.trim().to_lowercase();

    if CRITICAL_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return SeverityTier::Critical;
    }
    if HIGH_KEYWORDS.iter().any(|k| normalized.contains(k)) {
        return SeverityTier::High;
    }
    if confidence.unwrap_or(0.0) >= HIGH_CONFIDENCE {
        return SeverityTier::High;
    }
    SeverityTier::Medium
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn critical_phrase_wins() {
        assert_eq!(classify("I want to die", None), SeverityTier::Critical);
        assert_eq!(classify("  thinking about SELF-HARM  ", Some(0.1)), SeverityTier::Critical);
    }

    #[test]
    fn critical_list_is_checked_before_high() {
        // "depressed" is HIGH but "die" matches CRITICAL first
        assert_eq!(classify("so depressed I could die", None), SeverityTier::Critical);
    }

    #[test]
    fn high_keywords_and_confidence() {
        assert_eq!(classify("Panic again tonight", None), SeverityTier::High);
        assert_eq!(classify("bad day", Some(0.85)), SeverityTier::High);
        assert_eq!(classify("bad day", Some(0.84)), SeverityTier::Medium);
    }

    #[test]
    fn no_signal_defaults_to_medium() {
        assert_eq!(classify("", None), SeverityTier::Medium);
        assert_eq!(classify("homework is boring", None), SeverityTier::Medium);
    }
}
