//! Result writers
//!
//! Plain-file outputs for a finished session: raw CSV, analyzed CSV, JSON
//! insights and a human-readable text report. CSV quoting is hand-rolled
//! (quotes doubled, fields wrapped when they carry a comma, quote or
//! newline).

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::analysis::{AnalyzedReview, Insights};
use crate::error::HarvestError;
use crate::extract::ReviewRecord;

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(mut w: W, row: &[String]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

fn raw_columns(record: &ReviewRecord) -> Vec<String> {
    vec![
        record.id.to_string(),
        record.title.clone(),
        record.body.clone(),
        record.date.clone(),
        format!("{}", record.rating),
        record.source.clone(),
        record.author.clone(),
    ]
}

/// Write harvested records as CSV.
pub fn write_raw_csv(path: &Path, records: &[ReviewRecord]) -> Result<(), HarvestError> {
    let mut out = BufWriter::new(File::create(path)?);

    let header: Vec<String> = ["review_id", "title", "review_text", "date", "rating", "source", "reviewer_name"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    write_row(&mut out, &header)?;

    for record in records {
        write_row(&mut out, &raw_columns(record))?;
    }

    out.flush()?;
    info!("Wrote {} raw review(s) to {}", records.len(), path.display());
    Ok(())
}

/// Write analyzed reviews (raw columns plus sentiment verdicts) as CSV.
pub fn write_analyzed_csv(path: &Path, reviews: &[AnalyzedReview]) -> Result<(), HarvestError> {
    let mut out = BufWriter::new(File::create(path)?);

    let header: Vec<String> = [
        "review_id", "title", "review_text", "date", "rating", "source", "reviewer_name",
        "processed_text", "compound_score", "sentiment", "specific_category",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    write_row(&mut out, &header)?;

    for review in reviews {
        let mut row = raw_columns(&review.record);
        row.push(review.processed_text.clone());
        row.push(format!("{:.4}", review.compound_score));
        row.push(review.sentiment.as_str().to_string());
        row.push(review.category.clone());
        write_row(&mut out, &row)?;
    }

    out.flush()?;
    info!("Wrote {} analyzed review(s) to {}", reviews.len(), path.display());
    Ok(())
}

/// Write insights as pretty-printed JSON.
pub fn write_insights_json(path: &Path, insights: &Insights) -> Result<(), HarvestError> {
    let json = serde_json::to_string_pretty(insights)
        .map_err(|e| HarvestError::Configuration(format!("insights not serializable: {}", e)))?;
    std::fs::write(path, json)?;
    info!("Wrote insights to {}", path.display());
    Ok(())
}

/// Write the plaintext analysis report.
pub fn write_report(
    path: &Path,
    product_url: &str,
    insights: &Insights,
    recommendations: &[String],
) -> Result<(), HarvestError> {
    let mut out = BufWriter::new(File::create(path)?);
    let total = insights.total_reviews;
    let pct = |count: usize| {
        if total > 0 {
            count as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    };

    writeln!(out, "BEST BUY CANADA REVIEW ANALYSIS REPORT")?;
    writeln!(out, "{}\n", "=".repeat(50))?;

    writeln!(out, "Product URL: {}", product_url)?;
    writeln!(out, "Total Reviews Analyzed: {}\n", total)?;

    writeln!(out, "REVIEW STATISTICS")?;
    writeln!(out, "{}", "-".repeat(20))?;
    writeln!(out, "Average Rating: {:.2}/5.0\n", insights.average_rating)?;

    writeln!(out, "Rating Distribution:")?;
    for (rating, count) in insights.rating_distribution.iter().rev() {
        writeln!(out, "{} stars: {} reviews ({:.1}%)", rating, count, pct(*count))?;
    }

    writeln!(out, "\nSentiment Distribution:")?;
    for (sentiment, count) in &insights.sentiment_distribution {
        writeln!(out, "{}: {} reviews ({:.1}%)", sentiment, count, pct(*count))?;
    }

    writeln!(out, "\nCategory Distribution:")?;
    for (category, count) in &insights.category_distribution {
        writeln!(out, "{}: {} reviews ({:.1}%)", category, count, pct(*count))?;
    }

    writeln!(out, "\nCOMMON THEMES")?;
    writeln!(out, "{}", "-".repeat(20))?;

    writeln!(out, "Positive Themes:")?;
    for (word, count) in &insights.top_positive_words {
        writeln!(out, "- {}: {} occurrences", word, count)?;
    }

    writeln!(out, "\nNegative Themes:")?;
    for (word, count) in &insights.top_negative_words {
        writeln!(out, "- {}: {} occurrences", word, count)?;
    }

    writeln!(out, "\nBUSINESS RECOMMENDATIONS")?;
    writeln!(out, "{}", "-".repeat(20))?;
    for (i, rec) in recommendations.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, rec)?;
    }

    writeln!(out, "\nHARVESTING CHALLENGES")?;
    writeln!(out, "{}", "-".repeat(20))?;
    writeln!(out, "1. Dynamic content loading and 'Show More' controls.")?;
    writeln!(out, "2. Identity rotation to recover from anti-bot blocks.")?;
    writeln!(out, "3. Randomized pacing between actions to simulate human browsing.")?;
    writeln!(out, "4. Page markup changes over time and may require selector updates.")?;

    writeln!(out, "\n{}", "=".repeat(50))?;
    writeln!(out, "Report generated by Review Harvester")?;

    out.flush()?;
    info!("Wrote report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::analysis::ReviewAnalyzer;
    use crate::extract::SOURCE_LABEL;

    fn record(title: &str, body: &str, rating: f32) -> ReviewRecord {
        ReviewRecord {
            id: Uuid::new_v4(),
            title: title.to_string(),
            body: body.to_string(),
            date: "2025-03-31".to_string(),
            rating,
            author: "Pat L.".to_string(),
            source: SOURCE_LABEL.to_string(),
        }
    }

    #[test]
    fn raw_csv_quotes_commas_and_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.csv");
        let records = vec![record(
            "Good, mostly",
            "The \"Pro\" model is louder\nthan expected.",
            4.0,
        )];

        write_raw_csv(&path, &records).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "review_id,title,review_text,date,rating,source,reviewer_name"
        );
        assert!(text.contains("\"Good, mostly\""));
        assert!(text.contains("\"The \"\"Pro\"\" model is louder"));
    }

    #[test]
    fn analyzed_csv_carries_verdict_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("analyzed.csv");
        let reviews = ReviewAnalyzer::default()
            .analyze(&[record("Great", "Excellent quality, love it.", 5.0)]);

        write_analyzed_csv(&path, &reviews).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert!(text.lines().next().unwrap().ends_with("sentiment,specific_category"));
        assert!(text.contains("Positive"));
    }

    #[test]
    fn insights_json_is_valid_and_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("insights.json");
        let reviews = ReviewAnalyzer::default()
            .analyze(&[record("Great", "Excellent quality, love it.", 5.0)]);
        let insights = Insights::from_reviews(&reviews);

        write_insights_json(&path, &insights).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["totalReviews"], 1);
        assert!(text.contains('\n'));
    }

    #[test]
    fn report_contains_all_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let reviews = ReviewAnalyzer::default().analyze(&[
            record("Great", "Excellent quality, love it.", 5.0),
            record("Bad", "Broken on arrival, terrible.", 1.0),
        ]);
        let insights = Insights::from_reviews(&reviews);
        let recs = vec!["Do something.".to_string()];

        write_report(&path, "https://example.test/p/1", &insights, &recs).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();

        assert!(text.contains("BEST BUY CANADA REVIEW ANALYSIS REPORT"));
        assert!(text.contains("Product URL: https://example.test/p/1"));
        assert!(text.contains("Rating Distribution:"));
        assert!(text.contains("1. Do something."));
    }
}
