use std::path::PathBuf;
use std::sync::Arc;

use teloxide::prelude::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use servicebot::bot::{BotSettings, ConsoleOutbox, Incoming, Outbox, Providers, ServiceBot, TelegramClient};
use servicebot::config::{Config, ProviderMode};
use servicebot::telegram_log::TelegramLogLayer;

/// The user the demo session acts as.
const DEMO_USER: (i64, &str) = (123456, "test_user");

#[tokio::main]
async fn main() {
    let mut settings_path: Option<PathBuf> = None;
    let mut demo = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--demo" => demo = true,
            _ => settings_path = Some(PathBuf::from(arg)),
        }
    }

    let config = match Config::load(settings_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Fatal: {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let (non_blocking, _guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(&log_dir, "servicebot.log"));

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    let log_flush = if let Some(log_chat_id) = config.log_chat_id {
        let outbox: Arc<dyn Outbox> = Arc::new(TelegramClient::new(bot.clone()));
        let (layer, handle) = TelegramLogLayer::new(outbox, log_chat_id.0);
        registry.with(layer).init();
        Some(handle)
    } else {
        registry.init();
        None
    };

    info!("🚀 Bot started!");
    info!("🔑 Token: {}", config.token_preview());
    info!("👤 Admin ID: {}", config.admin_id);
    if !config.google_sheet_id.is_empty() {
        info!("📄 Audit sheet: {}", config.google_sheet_id);
    }
    if config.provider_mode == ProviderMode::Live {
        warn!("LIVE provider mode: orders will be placed and paid for");
    }

    let outbox: Arc<dyn Outbox> = if config.deliver_replies {
        Arc::new(TelegramClient::new(bot))
    } else {
        Arc::new(ConsoleOutbox)
    };
    let service = ServiceBot::new(BotSettings::from_config(&config), Providers::from_config(&config));
    info!("✅ Bot ready to receive commands");

    if demo {
        run_demo(&service, outbox.as_ref()).await;
        info!("🎯 Bot working correctly!");
    } else {
        run_console(&service, outbox.as_ref()).await;
    }

    // Pending audit batches go out before the runtime stops.
    if let Some(handle) = log_flush {
        handle.shutdown().await;
    }
}

async fn deliver(service: &ServiceBot, outbox: &dyn Outbox, incoming: &Incoming) {
    let reply = service.dispatch(incoming).await;
    if let Err(e) = outbox.send(incoming.chat_id, &reply).await {
        warn!("Reply to {} not delivered: {e}", incoming.chat_id);
    }
}

/// Start, connect an account, buy a number.
async fn run_demo(service: &ServiceBot, outbox: &dyn Outbox) {
    let (user_id, username) = DEMO_USER;
    for text in ["/start", "/connect", "/phone"] {
        deliver(service, outbox, &Incoming::text(user_id, user_id, username, text)).await;
    }
}

/// One event per stdin line until EOF.
async fn run_console(service: &ServiceBot, outbox: &dyn Outbox) {
    info!("Reading events from stdin: <user_id> <username> <text | cb:<action>>");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match Incoming::from_console_line(&line) {
                Ok(incoming) => deliver(service, outbox, &incoming).await,
                Err(e) => warn!("Ignoring line {line:?}: {e}"),
            },
            Ok(None) => break,
            Err(e) => {
                error!("stdin read failed: {e}");
                break;
            }
        }
    }
    info!("👋 Input closed, shutting down");
}
