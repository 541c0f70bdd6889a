//! Reading-time guardrail
//!
//! Rejects replies whose estimated reading time exceeds the configured
//! limit. The estimate is word count at a fixed reading speed.

use crate::config::GuardrailsSection;
use crate::guardrails::Verdict;
use tracing::debug;

/// Reading-time limit on generated replies
#[derive(Debug, Clone)]
pub struct ReadingTimeGuardrail {
    max_reading_secs: u64,
    words_per_minute: u64,
}

impl ReadingTimeGuardrail {
    pub fn new(settings: &GuardrailsSection) -> Self {
        Self {
            max_reading_secs: settings.max_reading_secs,
            words_per_minute: settings.words_per_minute,
        }
    }

    /// Estimated reading time in seconds (pure function)
    pub fn estimate_secs(&self, text: &str) -> f64 {
        let words = text.split_whitespace().count() as f64;
        words * 60.0 / self.words_per_minute as f64
    }

    /// Check a reply against the limit
    pub fn check(&self, text: &str) -> Verdict {
        let estimate = self.estimate_secs(text);

        debug!(
            estimate_secs = estimate,
            limit_secs = self.max_reading_secs,
            "Reading-time check"
        );

        if estimate > self.max_reading_secs as f64 {
            Verdict::reject(format!(
                "Estimated reading time {estimate:.1}s exceeds limit of {}s",
                self.max_reading_secs
            ))
        } else {
            Verdict::Pass
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> ReadingTimeGuardrail {
        // 15 seconds at 200 wpm => 50 words
        ReadingTimeGuardrail::new(&GuardrailsSection::default())
    }

    #[test]
    fn test_short_reply_passes() {
        let verdict = guard().check("Deploy the API and point the UI at it.");
        assert!(verdict.is_pass());
    }

    #[test]
    fn test_empty_reply_passes() {
        assert!(guard().check("").is_pass());
    }

    #[test]
    fn test_reply_at_limit_passes() {
        let text = vec!["word"; 50].join(" ");
        assert!(guard().check(&text).is_pass());
    }

    #[test]
    fn test_long_reply_rejected() {
        let text = vec!["word"; 51].join(" ");
        let verdict = guard().check(&text);
        match verdict {
            Verdict::Reject { reason } => assert!(reason.contains("exceeds limit")),
            Verdict::Pass => panic!("Expected rejection"),
        }
    }

    #[test]
    fn test_estimate_math() {
        let guard = guard();
        let text = vec!["word"; 100].join(" ");
        // 100 words at 200 wpm = 30 seconds
        assert!((guard.estimate_secs(&text) - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_custom_reading_speed() {
        let settings = GuardrailsSection {
            words_per_minute: 60,
            max_reading_secs: 10,
            ..GuardrailsSection::default()
        };
        let guard = ReadingTimeGuardrail::new(&settings);

        // 11 words at 60 wpm = 11 seconds > 10
        let text = vec!["word"; 11].join(" ");
        assert!(!guard.check(&text).is_pass());
    }
}
