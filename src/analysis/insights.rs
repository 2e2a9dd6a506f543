//! Aggregate insights and recommendations
//!
//! Rolls analyzed reviews up into distributions and word frequencies, then
//! derives plain-language recommendations from threshold rules.

use std::collections::{BTreeMap, HashMap};

use tracing::info;

use super::{AnalyzedReview, Sentiment};

/// Aggregated view over one analyzed batch.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub total_reviews: usize,
    pub average_rating: f64,
    pub sentiment_distribution: BTreeMap<String, usize>,
    pub category_distribution: BTreeMap<String, usize>,
    /// Keyed by the rating value formatted as text, ascending
    pub rating_distribution: BTreeMap<String, usize>,
    /// Top-10 words in positive reviews, most frequent first
    pub top_positive_words: Vec<(String, usize)>,
    /// Top-10 words in negative reviews, most frequent first
    pub top_negative_words: Vec<(String, usize)>,
}

impl Insights {
    pub fn from_reviews(reviews: &[AnalyzedReview]) -> Self {
        if reviews.is_empty() {
            return Self::default();
        }

        let mut sentiment_distribution = BTreeMap::new();
        let mut category_distribution = BTreeMap::new();
        let mut rating_distribution = BTreeMap::new();
        let mut rating_sum = 0.0_f64;

        for review in reviews {
            *sentiment_distribution
                .entry(review.sentiment.as_str().to_string())
                .or_insert(0) += 1;
            *category_distribution
                .entry(review.category.clone())
                .or_insert(0) += 1;
            *rating_distribution
                .entry(format!("{}", review.record.rating))
                .or_insert(0) += 1;
            rating_sum += f64::from(review.record.rating);
        }

        let insights = Self {
            total_reviews: reviews.len(),
            average_rating: rating_sum / reviews.len() as f64,
            sentiment_distribution,
            category_distribution,
            rating_distribution,
            top_positive_words: top_words(reviews, Sentiment::Positive),
            top_negative_words: top_words(reviews, Sentiment::Negative),
        };

        info!(
            "Insights ready: {} review(s), average rating {:.2}",
            insights.total_reviews, insights.average_rating
        );
        insights
    }

    fn sentiment_pct(&self, sentiment: Sentiment) -> f64 {
        if self.total_reviews == 0 {
            return 0.0;
        }
        let count = self
            .sentiment_distribution
            .get(sentiment.as_str())
            .copied()
            .unwrap_or(0);
        count as f64 / self.total_reviews as f64 * 100.0
    }
}

/// Ten most frequent words across processed texts of one sentiment bucket.
fn top_words(reviews: &[AnalyzedReview], sentiment: Sentiment) -> Vec<(String, usize)> {
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for review in reviews.iter().filter(|r| r.sentiment == sentiment) {
        for word in review.processed_text.split_whitespace() {
            *freq.entry(word).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = freq
        .into_iter()
        .map(|(w, c)| (w.to_string(), c))
        .collect();
    // Frequency descending, alphabetical within ties so output is stable.
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(10);
    ranked
}

/// Rule-based business recommendations derived from the insights.
pub fn recommendations(insights: &Insights) -> Vec<String> {
    let mut recs = Vec::new();

    if insights.total_reviews < 5 {
        recs.push("Collect more customer reviews to make meaningful recommendations.".to_string());
        return recs;
    }

    let positive_pct = insights.sentiment_pct(Sentiment::Positive);
    let negative_pct = insights.sentiment_pct(Sentiment::Negative);

    if positive_pct >= 70.0 {
        recs.push(
            "Customer satisfaction is high. Maintain current quality standards and focus on \
             expanding product features."
                .to_string(),
        );
    } else if negative_pct >= 30.0 {
        recs.push(
            "Significant customer dissatisfaction detected. Address common complaints urgently."
                .to_string(),
        );
    }

    if !insights.top_negative_words.is_empty() {
        let themes: Vec<&str> = insights
            .top_negative_words
            .iter()
            .take(5)
            .map(|(w, _)| w.as_str())
            .collect();
        recs.push(format!("Focus on improving these aspects: {}", themes.join(", ")));
    }

    if !insights.top_positive_words.is_empty() {
        let themes: Vec<&str> = insights
            .top_positive_words
            .iter()
            .take(5)
            .map(|(w, _)| w.as_str())
            .collect();
        recs.push(format!(
            "Highlight these strengths in marketing materials: {}",
            themes.join(", ")
        ));
    }

    if insights.average_rating < 3.0 {
        recs.push(
            "Overall rating is below average. Consider a product redesign or feature improvements."
                .to_string(),
        );
    } else if insights.average_rating >= 4.5 {
        recs.push(
            "Excellent product rating. Consider using customer testimonials in marketing \
             campaigns."
                .to_string(),
        );
    }

    info!("Generated {} recommendation(s)", recs.len());
    recs
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::analysis::{ReviewAnalyzer, SentimentScorer};
    use crate::extract::{ReviewRecord, SOURCE_LABEL};

    /// Scorer keyed on a marker word so tests control the verdict exactly.
    struct MarkerScorer;

    impl SentimentScorer for MarkerScorer {
        fn score(&self, text: &str) -> f64 {
            if text.contains("good") {
                0.9
            } else if text.contains("bad") {
                -0.9
            } else {
                0.0
            }
        }
    }

    fn record(body: &str, rating: f32) -> ReviewRecord {
        ReviewRecord {
            id: Uuid::new_v4(),
            title: "No Title".to_string(),
            body: body.to_string(),
            date: "Unknown".to_string(),
            rating,
            author: "Anonymous".to_string(),
            source: SOURCE_LABEL.to_string(),
        }
    }

    fn analyzed(bodies_ratings: &[(&str, f32)]) -> Vec<AnalyzedReview> {
        let records: Vec<ReviewRecord> = bodies_ratings
            .iter()
            .map(|(b, r)| record(b, *r))
            .collect();
        ReviewAnalyzer::new(MarkerScorer).analyze(&records)
    }

    #[test]
    fn distributions_and_average() {
        let reviews = analyzed(&[
            ("good screen", 5.0),
            ("good keyboard", 4.0),
            ("bad battery", 1.0),
        ]);
        let insights = Insights::from_reviews(&reviews);

        assert_eq!(insights.total_reviews, 3);
        assert!((insights.average_rating - 10.0 / 3.0).abs() < 1e-9);
        assert_eq!(insights.sentiment_distribution.get("Positive"), Some(&2));
        assert_eq!(insights.sentiment_distribution.get("Negative"), Some(&1));
        assert_eq!(insights.rating_distribution.get("5"), Some(&1));
    }

    #[test]
    fn empty_batch_yields_default_insights() {
        let insights = Insights::from_reviews(&[]);
        assert_eq!(insights.total_reviews, 0);
        assert!(insights.top_positive_words.is_empty());
    }

    #[test]
    fn top_words_rank_by_frequency() {
        let reviews = analyzed(&[
            ("good screen screen screen screen keyboard", 5.0),
            ("good keyboard keyboard", 4.0),
        ]);
        let insights = Insights::from_reviews(&reviews);
        assert_eq!(insights.top_positive_words[0].0, "screen");
        assert_eq!(insights.top_positive_words[0].1, 4);
        assert_eq!(insights.top_positive_words[1].0, "keyboard");
    }

    #[test]
    fn small_batches_only_ask_for_more_data() {
        let reviews = analyzed(&[("good one", 5.0)]);
        let recs = recommendations(&Insights::from_reviews(&reviews));
        assert_eq!(recs.len(), 1);
        assert!(recs[0].contains("Collect more customer reviews"));
    }

    #[test]
    fn satisfied_batch_gets_quality_and_testimonial_recs() {
        let reviews = analyzed(&[
            ("good a", 5.0),
            ("good b", 5.0),
            ("good c", 4.0),
            ("good d", 5.0),
            ("bad e", 4.0),
        ]);
        let recs = recommendations(&Insights::from_reviews(&reviews));

        assert!(recs.iter().any(|r| r.contains("Customer satisfaction is high")));
        assert!(recs.iter().any(|r| r.contains("Excellent product rating")));
    }

    #[test]
    fn dissatisfied_batch_flags_complaints() {
        let reviews = analyzed(&[
            ("bad hinge", 1.0),
            ("bad battery", 2.0),
            ("bad screen", 1.0),
            ("good price", 4.0),
            ("good size", 4.0),
        ]);
        let recs = recommendations(&Insights::from_reviews(&reviews));

        assert!(recs.iter().any(|r| r.contains("Significant customer dissatisfaction")));
        assert!(recs.iter().any(|r| r.contains("Focus on improving these aspects")));
        assert!(recs.iter().any(|r| r.contains("below average")));
    }
}
