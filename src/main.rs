//! Review Harvester CLI
//!
//! Interactive entry point: prompts for a product URL, review cap and sort
//! filter, runs one harvesting session, then analyzes the results and writes
//! the report files.

use std::io::{self, Write};
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use review_harvester::analysis::{recommendations, Insights, ReviewAnalyzer};
use review_harvester::driver::{ChromeDriver, DriverConfig};
use review_harvester::harvest::{FilterOption, HarvestSession};
use review_harvester::identity::{probe_candidates, IdentityPool, ProbeConfig};
use review_harvester::{report, HarvesterConfig};

fn prompt(message: &str) -> io::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn ask_filter() -> io::Result<FilterOption> {
    println!("\nSelect filter option:");
    println!("1: most-helpful");
    println!("2: newest");
    println!("3: highest-rating");
    println!("4: lowest-rating");
    println!("5: most-relevant");

    let choice = prompt("Enter choice (1-5): ")?;
    Ok(choice
        .parse::<usize>()
        .ok()
        .and_then(FilterOption::from_index)
        .unwrap_or_default())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = review_harvester::init_logging();

    info!("Starting review harvesting and analysis");
    if let Some(dir) = review_harvester::log_dir() {
        info!("Log files saved to: {}", dir.display());
    }

    let config = HarvesterConfig::load();

    let product_url = prompt("Enter Best Buy Canada product URL: ")?;
    if product_url.is_empty() {
        anyhow::bail!("No product URL given");
    }

    let max_reviews = prompt("Maximum number of reviews to harvest (leave blank for all): ")?
        .parse::<usize>()
        .ok();
    let filter = ask_filter()?;

    std::fs::create_dir_all(&config.output_dir)?;
    let product_id = url::Url::parse(&product_url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "product".to_string());
    let out = |suffix: &str| config.output_dir.join(format!("bestbuy_{}_{}", product_id, suffix));

    // Proxy pool: probe candidates up front so the session only rotates
    // through endpoints that actually answer.
    let endpoints = if config.proxies.is_empty() {
        info!("No proxies configured, harvesting over a direct connection");
        Vec::new()
    } else {
        let probe = ProbeConfig {
            test_url: config.probe_url.clone(),
            timeout: Duration::from_secs(config.probe_timeout_secs),
            ..Default::default()
        };
        let healthy = probe_candidates(&config.proxies, &probe).await;
        if healthy.is_empty() {
            warn!("All configured proxies failed the probe, falling back to direct connection");
        }
        healthy
    };
    let pool = IdentityPool::new(endpoints);
    let identity = pool.issue_identity();

    let driver_config = DriverConfig::for_session(&Uuid::new_v4().to_string())
        .headless(config.headless)
        .chrome_path(config.chrome_path.clone());
    let driver = ChromeDriver::launch(driver_config, &identity).await?;

    let mut session_config = config.session_config(&product_url);
    session_config.filter = filter;
    session_config.max_reviews = max_reviews;

    let mut session = HarvestSession::new(&driver, &pool, identity, session_config);
    let run_result = session.run().await;
    let records = session.into_records();

    if let Err(e) = driver.close().await {
        warn!("Browser close failed: {}", e);
    }

    // A failed run still surrenders whatever was harvested before the
    // failure, so reporting proceeds on partial data.
    if let Err(e) = run_result {
        error!("Harvest ended early: {}", e);
    }

    if records.is_empty() {
        anyhow::bail!("No reviews were harvested. Check the URL and try again.");
    }

    let raw_csv_path = out("reviews_raw.csv");
    report::write_raw_csv(&raw_csv_path, &records)?;

    let analyzer = ReviewAnalyzer::default();
    let analyzed = analyzer.analyze(&records);
    let analyzed_csv_path = out("reviews_analyzed.csv");
    report::write_analyzed_csv(&analyzed_csv_path, &analyzed)?;

    let insights = Insights::from_reviews(&analyzed);
    let recs = recommendations(&insights);

    let insights_path = out("insights.json");
    report::write_insights_json(&insights_path, &insights)?;
    let report_path = out("report.txt");
    report::write_report(&report_path, &product_url, &insights, &recs)?;

    println!("\nHarvested {} review(s)", insights.total_reviews);
    println!("Average rating: {:.2}/5.0", insights.average_rating);
    for (sentiment, count) in &insights.sentiment_distribution {
        println!("{}: {}", sentiment, count);
    }

    println!("\nRecommendations:");
    for rec in &recs {
        println!("- {}", rec);
    }

    println!("\nResults saved to {}", config.output_dir.display());
    println!("Report: {}", report_path.display());

    Ok(())
}
