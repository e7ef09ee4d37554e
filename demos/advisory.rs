//! Heat advisory for a free-text location.
//!
//! Run with:
//! ```bash
//! export HEATLINE_FUNCTIONS_URL="https://<project>.supabase.co/functions/v1"
//! export HEATLINE_FUNCTIONS_KEY="your-publishable-key"
//! cargo run --example advisory -- "Quezon City" residential
//! ```
//!
//! With only `HEATLINE_GATEWAY_URL` and `HEATLINE_GATEWAY_KEY` set, the
//! gateway is called directly instead.

use heatline::client::Client;
use heatline::model::{AdvisoryQuery, LocationType};
use heatline::options::Settings;
use heatline::providers::{FunctionsClient, GatewayClient};
use heatline::zones::{DashboardStats, HEAT_ZONES};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::from_env()?;
    settings.validate()?;

    let mut args = std::env::args().skip(1);
    let location = args.next().unwrap_or_else(|| "Downtown Business District".to_string());
    let location_type: LocationType = match args.next() {
        Some(kind) => kind.parse()?,
        None => LocationType::Urban,
    };

    if let Some(stats) = DashboardStats::from_zones(&HEAT_ZONES) {
        println!(
            "City: {} extreme, {} high, avg heat index {}°C, max {}°C\n",
            stats.extreme_zones, stats.high_zones, stats.avg_heat_index, stats.max_heat_index
        );
    }

    let client: Box<dyn Client> = if settings.functions.is_some() {
        Box::new(FunctionsClient::from_settings(&settings)?)
    } else {
        Box::new(GatewayClient::from_settings(&settings)?)
    };

    let advisory = client
        .request_advisory(&AdvisoryQuery::new(location.as_str(), location_type))
        .await?;

    println!("{}: {} risk", location, advisory.risk_level);
    println!("{}\n", advisory.risk_level.description());
    println!("{}\n", advisory.predicted_heat_summary);
    for recommendation in &advisory.recommendations {
        println!("{} {}", recommendation.icon, recommendation.text);
    }
    println!("\n{}", advisory.rationale);
    println!(
        "Confidence: {:.0}%{}",
        advisory.confidence_score * 100.0,
        if advisory.used_fallback { " (fallback)" } else { "" }
    );

    Ok(())
}
