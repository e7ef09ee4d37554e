//! Multi-turn chat straight against the gateway.
//!
//! Run with:
//! ```bash
//! export HEATLINE_GATEWAY_KEY="your-api-key"
//! export HEATLINE_GATEWAY_URL="https://ai.gateway.lovable.dev/v1"
//! cargo run --example gateway_chat
//! ```
//!
//! Type a question per line; `/zone <id>` attaches a zone, an empty line quits.

use std::io::Write;

use heatline::assembler::Conversation;
use heatline::model::Role;
use heatline::options::Settings;
use heatline::providers::GatewayClient;
use heatline::session::StreamSession;
use heatline::zones::zone_by_id;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let settings = Settings::from_env()?;
    settings.validate()?;
    let client = GatewayClient::from_settings(&settings)?;

    let mut conversation = Conversation::new();
    let mut updates = conversation.subscribe();
    updates.mark_changed();

    // Prints every message except the user's own, streaming replies as they grow.
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        let mut shown = String::new();
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            for message in snapshot.iter().skip(printed) {
                if message.role == Role::User {
                    printed += 1;
                    continue;
                }
                print!("{}", message.content.get(shown.len()..).unwrap_or_default());
                if message.streaming {
                    shown = message.content.clone();
                    let _ = std::io::stdout().flush();
                    break;
                }
                println!("\n");
                shown.clear();
                printed += 1;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            break;
        }

        if let Some(id) = line.strip_prefix("/zone ") {
            match zone_by_id(id.trim()) {
                Some(zone) => conversation.select_zone(zone),
                None => println!("Unknown zone: {}", id),
            }
            continue;
        }

        conversation.send(&client, line, StreamSession::new()).await?;
        if let Some(error) = conversation.last_error() {
            println!("Error: {}", error);
        }
    }

    drop(conversation);
    let _ = printer.await;
    Ok(())
}
