//! Sentiment analysis
//!
//! Scores harvested reviews and buckets them into sentiment categories. The
//! scorer sits behind a trait so the lexicon default can be swapped for an
//! external model without touching the analyzer.

mod insights;

pub use insights::{recommendations, Insights};

use std::fmt;

use tracing::info;

use crate::extract::ReviewRecord;

/// Words ignored during frequency counting and preprocessing.
const STOPWORDS: &[&str] = &[
    "a", "about", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as", "at",
    "be", "because", "been", "before", "being", "both", "but", "by", "can", "could", "did", "do",
    "does", "doing", "down", "during", "each", "few", "for", "from", "further", "had", "has",
    "have", "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if", "in", "into",
    "is", "it", "its", "just", "me", "more", "most", "my", "of", "off", "on", "once", "only",
    "or", "other", "our", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "very", "was", "we", "were", "what", "when",
    "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you", "your",
    "yours",
];

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "awesome", "beautiful", "best", "comfortable", "crisp", "durable", "easy",
    "excellent", "fantastic", "fast", "good", "great", "happy", "helpful", "impressed", "love",
    "loved", "nice", "perfect", "pleased", "quality", "quiet", "recommend", "recommended",
    "reliable", "satisfied", "smooth", "solid", "sturdy", "value", "wonderful", "works", "worth",
];

const NEGATIVE_WORDS: &[&str] = &[
    "awful", "bad", "broke", "broken", "cheap", "crash", "damaged", "defective", "disappointed",
    "disappointing", "fail", "failed", "flimsy", "horrible", "issue", "lag", "missing", "noisy",
    "overpriced", "poor", "problem", "refund", "return", "returned", "slow", "terrible",
    "uncomfortable", "unhelpful", "unreliable", "useless", "waste", "worst",
];

/// Tokens that flip the valence of the following sentiment word.
const NEGATORS: &[&str] = &["not", "no", "never", "hardly", "barely"];

/// Compound polarity scorer: -1 (fully negative) to +1 (fully positive).
pub trait SentimentScorer: Send + Sync {
    fn score(&self, text: &str) -> f64;
}

/// Word-list scorer with VADER-style normalization.
///
/// Counts signed lexicon hits (a preceding negator flips the sign) and
/// squashes the raw sum with `x / sqrt(x^2 + 15)` so a handful of strong
/// words saturates toward +/-1 the same way compound scores do.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconScorer;

impl SentimentScorer for LexiconScorer {
    fn score(&self, text: &str) -> f64 {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return 0.0;
        }

        let mut sum = 0.0_f64;
        for (i, token) in tokens.iter().enumerate() {
            let valence = if POSITIVE_WORDS.contains(&token.as_str()) {
                1.0
            } else if NEGATIVE_WORDS.contains(&token.as_str()) {
                -1.0
            } else {
                continue;
            };

            let negated = i > 0 && NEGATORS.contains(&tokens[i - 1].as_str());
            sum += if negated { -valence } else { valence };
        }

        sum / (sum * sum + 15.0).sqrt()
    }
}

/// Sentiment bucket for one review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Negative => "Negative",
            Self::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A harvested review plus its sentiment verdict.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedReview {
    #[serde(flatten)]
    pub record: ReviewRecord,
    /// Lowercased, punctuation- and stopword-stripped text used for word
    /// frequency counting
    pub processed_text: String,
    pub compound_score: f64,
    pub sentiment: Sentiment,
    pub category: String,
}

/// Scores reviews and assigns sentiment categories.
pub struct ReviewAnalyzer {
    scorer: Box<dyn SentimentScorer>,
}

impl Default for ReviewAnalyzer {
    fn default() -> Self {
        Self::new(LexiconScorer)
    }
}

impl ReviewAnalyzer {
    pub fn new(scorer: impl SentimentScorer + 'static) -> Self {
        Self {
            scorer: Box::new(scorer),
        }
    }

    /// Analyze a batch of harvested reviews.
    pub fn analyze(&self, records: &[ReviewRecord]) -> Vec<AnalyzedReview> {
        info!("Analyzing {} review(s)", records.len());

        records
            .iter()
            .map(|record| {
                // Titles are short but deliberate; bodies carry most signal.
                let title_score = self.scorer.score(&record.title);
                let body_score = self.scorer.score(&record.body);
                let compound = 0.3 * title_score + 0.7 * body_score;

                let (sentiment, category) = categorize(compound, record.rating);

                AnalyzedReview {
                    record: record.clone(),
                    processed_text: preprocess(&record.body),
                    compound_score: compound,
                    sentiment,
                    category: category.to_string(),
                }
            })
            .collect()
    }
}

/// Map a compound score (plus the star rating, when one was found) to a
/// sentiment and specific category label.
///
/// A rating of 0.0 means "no rating found" and never adjusts the verdict;
/// real ratings override the text when they disagree strongly.
pub fn categorize(compound: f64, rating: f32) -> (Sentiment, &'static str) {
    let (mut sentiment, mut category) = if compound >= 0.05 {
        if compound >= 0.75 {
            (Sentiment::Positive, "Highly Satisfactory & Recommended")
        } else {
            (Sentiment::Positive, "Good Design & Quality")
        }
    } else if compound <= -0.05 {
        if compound <= -0.75 {
            (Sentiment::Negative, "Very Poor Quality & Not Recommended")
        } else {
            (Sentiment::Negative, "Poor Quality")
        }
    } else {
        (Sentiment::Neutral, "Mixed Feelings")
    };

    if rating >= 4.0 && sentiment != Sentiment::Positive {
        sentiment = Sentiment::Positive;
        category = "Good Design & Quality";
    } else if rating > 0.0 && rating <= 2.0 && sentiment != Sentiment::Negative {
        sentiment = Sentiment::Negative;
        category = "Poor Quality";
    }

    (sentiment, category)
}

/// Lowercase, strip punctuation and digits, drop stopwords.
pub(crate) fn preprocess(text: &str) -> String {
    tokenize(text)
        .into_iter()
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::extract::SOURCE_LABEL;

    fn record(title: &str, body: &str, rating: f32) -> ReviewRecord {
        ReviewRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            body: body.to_string(),
            date: "2025-03-31".to_string(),
            rating,
            author: "Anonymous".to_string(),
            source: SOURCE_LABEL.to_string(),
        }
    }

    #[test]
    fn lexicon_scorer_signs_match_content() {
        let scorer = LexiconScorer;
        assert!(scorer.score("excellent product, great quality, love it") > 0.05);
        assert!(scorer.score("terrible quality, broken on arrival, waste of money") < -0.05);
        assert_eq!(scorer.score(""), 0.0);
        assert_eq!(scorer.score("the box arrived on tuesday"), 0.0);
    }

    #[test]
    fn negators_flip_valence() {
        let scorer = LexiconScorer;
        assert!(scorer.score("not good at all") < 0.0);
        assert!(scorer.score("never disappointed with this brand") > 0.0);
    }

    #[test]
    fn scores_stay_within_unit_interval() {
        let scorer = LexiconScorer;
        let text = "excellent great perfect amazing wonderful fantastic best love ".repeat(10);
        let score = scorer.score(&text);
        assert!(score > 0.9 && score <= 1.0);
    }

    #[test]
    fn categorization_thresholds() {
        assert_eq!(categorize(0.8, 0.0).1, "Highly Satisfactory & Recommended");
        assert_eq!(categorize(0.3, 0.0).1, "Good Design & Quality");
        assert_eq!(categorize(0.0, 0.0).1, "Mixed Feelings");
        assert_eq!(categorize(-0.3, 0.0).1, "Poor Quality");
        assert_eq!(categorize(-0.8, 0.0).1, "Very Poor Quality & Not Recommended");
    }

    #[test]
    fn strong_ratings_override_neutral_text() {
        // Flat text but five stars.
        let (s, c) = categorize(0.0, 5.0);
        assert_eq!(s, Sentiment::Positive);
        assert_eq!(c, "Good Design & Quality");

        // Flat text but one star.
        let (s, _) = categorize(0.0, 1.0);
        assert_eq!(s, Sentiment::Negative);

        // No rating found: the text verdict stands.
        let (s, _) = categorize(0.0, 0.0);
        assert_eq!(s, Sentiment::Neutral);
    }

    #[test]
    fn analyzer_weights_body_over_title() {
        let analyzer = ReviewAnalyzer::default();
        // Positive title, strongly negative body: the body must win.
        let reviews = analyzer.analyze(&[record(
            "Great expectations",
            "Terrible build, broken hinge, awful support, total waste. Returned it.",
            0.0,
        )]);
        assert_eq!(reviews[0].sentiment, Sentiment::Negative);
    }

    #[test]
    fn preprocess_drops_stopwords_and_digits() {
        assert_eq!(
            preprocess("The battery lasts for 12 hours and I love it!"),
            "battery lasts hours love"
        );
    }
}
