/// X Engagement Bot
///
/// Runs a single pass and exits. Scheduling is left to the caller
/// (cron, a CI schedule, ...): a pass that stops on a rate limit simply
/// resumes on the next invocation.

use anyhow::Result;
use x_engagement_bot::{config, controller, x_api::XClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load configuration before the logger so RUST_LOG can come from .env
    let cfg = config::Config::from_env();

    // Initialize logger, defaulting to info
    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_filters(&std::env::var("RUST_LOG").unwrap_or_default())
        .init();

    log::info!("Starting X engagement bot run...");

    let client = XClient::new(&cfg)?;

    let report = match controller::run_once(&client, &cfg).await {
        Ok(report) => report,
        Err(e) => {
            log::error!("Run failed: {:#}", e);
            return Err(e);
        }
    };

    log::info!(
        "Bot completed ({}): {} actions taken",
        report.outcome,
        report.stats.actions_taken()
    );
    if let Ok(summary) = serde_json::to_string(&report) {
        log::debug!("Run summary: {}", summary);
    }

    Ok(())
}
