//! Streaming chat through the hosted functions.
//!
//! Run with:
//! ```bash
//! export HEATLINE_FUNCTIONS_URL="https://<project>.supabase.co/functions/v1"
//! export HEATLINE_FUNCTIONS_KEY="your-publishable-key"
//! cargo run --example chat -- zone-1 "Is it safe to jog this afternoon?"
//! ```

use std::io::Write;

use heatline::client::ClientError;
use heatline::options::Settings;
use heatline::providers::FunctionsClient;
use heatline::session::{SessionState, StreamConsumer, StreamSession};
use heatline::zones::zone_by_id;
use heatline::{ChatRequest, ZoneContext};
use tracing_subscriber::EnvFilter;

/// Prints deltas to stdout as they arrive.
struct Printer;

impl StreamConsumer for Printer {
    fn on_delta(&mut self, text: &str) {
        print!("{}", text);
        let _ = std::io::stdout().flush();
    }

    fn on_done(&mut self) {
        println!();
    }

    fn on_error(&mut self, error: &ClientError) {
        eprintln!("\nError: {}", error);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::from_env()?;
    settings.validate()?;
    let client = FunctionsClient::from_settings(&settings)?;

    let mut args = std::env::args().skip(1);
    let zone_id = args.next().unwrap_or_else(|| "zone-1".to_string());
    let question = args
        .next()
        .unwrap_or_else(|| "What should I do to stay safe today?".to_string());

    let mut request = ChatRequest::new(question);
    if let Some(zone) = zone_by_id(&zone_id) {
        println!("Zone: {} ({} risk)\n", zone.name, zone.risk_level);
        request = request.with_zone(ZoneContext::from(zone));
    }

    // Ctrl-C abandons the reply; no further output is printed for it.
    let session = StreamSession::new();
    let cancel = session.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let state = session.run(&client, &request, &mut Printer).await;
    if state == SessionState::Cancelled {
        println!("\n[cancelled]");
    }

    Ok(())
}
