//! Sentiment override policy: the one place raw model output can be
//! contradicted. Runs after prediction, before explanation generation,
//! on the same tally computed during feature composition.

use crate::SentimentTally;

/// Reason string emitted when the tally triggers a downgrade. Part of the
/// external contract; downstream consumers match on this phrasing.
pub const REASON_DOWNGRADED: &str = "downgraded due to highly negative recent news";

/// Reason string emitted when the tally leaves the base score untouched.
pub const REASON_NO_IMPACT: &str = "no significant sentiment impact";

/// Deterministic rule that may force the final score to 0 when recent
/// sentiment is strongly negative.
#[derive(Debug, Clone, Copy)]
pub struct OverridePolicy {
    threshold: SentimentTally,
}

impl OverridePolicy {
    pub const DEFAULT_THRESHOLD: SentimentTally = -3;

    pub fn new(threshold: SentimentTally) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> SentimentTally {
        self.threshold
    }

    /// `(base_score, tally) -> (final_score, reason)`. Pure.
    pub fn apply(&self, base_score: u8, tally: SentimentTally) -> (u8, &'static str) {
        if tally <= self.threshold {
            (0, REASON_DOWNGRADED)
        } else {
            (base_score, REASON_NO_IMPACT)
        }
    }
}

impl Default for OverridePolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downgrades_at_or_below_threshold() {
        let policy = OverridePolicy::default();
        assert_eq!(policy.apply(1, -3), (0, REASON_DOWNGRADED));
        assert_eq!(policy.apply(1, -4), (0, REASON_DOWNGRADED));
        assert_eq!(policy.apply(0, -10), (0, REASON_DOWNGRADED));
    }

    #[test]
    fn passes_base_score_above_threshold() {
        let policy = OverridePolicy::default();
        assert_eq!(policy.apply(1, -2), (1, REASON_NO_IMPACT));
        assert_eq!(policy.apply(0, 0), (0, REASON_NO_IMPACT));
        assert_eq!(policy.apply(1, 5), (1, REASON_NO_IMPACT));
    }

    #[test]
    fn custom_threshold() {
        let policy = OverridePolicy::new(-1);
        assert_eq!(policy.apply(1, -1), (0, REASON_DOWNGRADED));
        assert_eq!(policy.apply(1, 0), (1, REASON_NO_IMPACT));
    }

    #[test]
    fn reason_strings_are_contractual() {
        assert_eq!(
            REASON_DOWNGRADED,
            "downgraded due to highly negative recent news"
        );
        assert_eq!(REASON_NO_IMPACT, "no significant sentiment impact");
    }
}
