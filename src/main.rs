//! s-ui Panel Bot - Entry Point

use sui_panel_bot::Config;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("s-ui Panel Bot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: sui-panel-bot");
        println!();
        println!("Environment variables (or .env):");
        println!("  TELEGRAM_BOT_TOKEN        Telegram bot token (required)");
        println!("  SUI_PANEL_URL             s-ui panel base URL (required)");
        println!("  SUI_API_TOKEN             s-ui API token (required)");
        println!("  TELEGRAM_ALLOWED_USERS    Comma-separated user ids (default: all)");
        println!("  SUI_REQUEST_TIMEOUT_SECS  Panel request timeout (default: 10)");
        println!("  RUST_LOG                  trace|debug|info|warn|error");
        println!("  BOT_LOG_JSON              1 to log JSON to stderr");
        return Ok(());
    }

    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    let json_logs = std::env::var("BOT_LOG_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    // Missing settings are fatal before anything connects
    let config = Config::from_env()?;

    info!("s-ui Panel Bot v{}", env!("CARGO_PKG_VERSION"));
    sui_panel_bot::telegram::run_telegram_bot(config).await?;

    Ok(())
}
