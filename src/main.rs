use std::path::PathBuf;
use std::sync::Arc;

use gift_hunter::channels::{FeedListener, IntakeSource, StdinListener, spawn_intake};
use gift_hunter::config::{ActionMode, Settings};
use gift_hunter::gateway::HttpGateway;
use gift_hunter::logging;
use gift_hunter::pipeline::processor::GiftProcessor;
use gift_hunter::pipeline::types::{ConsoleSink, GiftGateway};

fn csv_or_any(set: &std::collections::BTreeSet<String>) -> String {
    if set.is_empty() {
        "any".to_string()
    } else {
        set.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_dir = std::env::var_os("GIFT_LOG_DIR").map(PathBuf::from);
    let _log_guard = logging::init(log_dir.as_deref());

    let settings = Settings::from_env()?;
    let filters = &settings.filters;
    let action = &settings.action;

    eprintln!("🎁 Gift Hunter v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Gateway: {}", settings.gateway.base_url);
    eprintln!("   Feed: @{}", settings.gateway.feed_chat);
    eprintln!("   Collections: {}", csv_or_any(&filters.collections));
    eprintln!("   Models: {}", csv_or_any(&filters.models));
    eprintln!("   Backdrops: {}", csv_or_any(&filters.backdrops));
    eprintln!("   Symbols: {}", csv_or_any(&filters.symbols));
    eprintln!("   Message policy: {}", filters.message_meta_policy.as_str());
    match action.mode {
        ActionMode::Print => eprintln!(
            "   Mode: print ({})",
            action.print_destination.as_deref().unwrap_or("console only")
        ),
        ActionMode::Buy => eprintln!(
            "   Mode: buy (pay in {})",
            if action.pay_in_ton.unwrap_or(true) { "TON" } else { "Stars" }
        ),
    }
    eprintln!("   Paste t.me/nft/ links on stdin to check them by hand. Ctrl+C to stop.\n");

    // ── Engine ───────────────────────────────────────────────────────────
    let gateway = Arc::new(HttpGateway::new(&settings.gateway));
    let processor = Arc::new(GiftProcessor::new(
        Arc::clone(&gateway) as Arc<dyn GiftGateway>,
        Arc::new(ConsoleSink::stdout()),
        Arc::new(settings.filters),
        Arc::new(settings.action),
    ));

    // ── Intake sources ───────────────────────────────────────────────────
    let feed = FeedListener::new(Arc::clone(&gateway), &settings.gateway);
    let stdin = StdinListener::new();
    let sources: [&dyn IntakeSource; 2] = [&feed, &stdin];

    let mut handles = Vec::with_capacity(sources.len());
    for source in sources {
        handles.push(spawn_intake(source, Arc::clone(&processor)).await?);
    }

    tokio::signal::ctrl_c().await?;
    eprintln!("\nStopped.");

    for handle in handles {
        handle.abort();
    }
    Ok(())
}
