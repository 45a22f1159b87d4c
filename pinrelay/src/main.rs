mod updates;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use pinrelay_core::{
    bootstrap::{init_database, init_services, load_config, run_migrations},
    logging,
};
use pinrelay_telegram::{BotClient, TelegramTransport};

use updates::UpdateDispatcher;

#[derive(Parser, Debug)]
#[command(name = "pinrelay")]
#[command(about = "Rotates the latest post of each source channel into pinned messages", long_about = None)]
struct Args {
    /// Path to the YAML config file
    #[arg(short, long, env = "PINRELAY_CONFIG_PATH")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Load and validate configuration
    let config = load_config(args.config.as_deref())?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("PinRelay starting...");

    // 3. Initialize database
    let pool = init_database(&config).await?;

    // 4. Run migrations
    run_migrations(&pool).await?;

    // 5. Connect to the Bot API
    let client = Arc::new(
        BotClient::new(&config.telegram)
            .map_err(|e| anyhow::anyhow!("Failed to build Bot API client: {e}"))?,
    );
    let me = client
        .get_me()
        .await
        .map_err(|e| anyhow::anyhow!("Bot API authentication failed: {e}"))?;
    info!(bot_id = me.id, username = ?me.username, "Authenticated with Bot API");

    let transport = Arc::new(TelegramTransport::new(client.clone(), config.relay.owner_id));

    // 6. Initialize services
    let services = init_services(pool.clone(), &config, transport).await?;

    // 7. Start the update dispatcher
    let cancel = CancellationToken::new();
    let dispatcher = UpdateDispatcher::new(client, services.agent.clone(), me.id);
    let dispatcher_handle = tokio::spawn(dispatcher.run(cancel.clone()));

    info!("PinRelay running. Send /run to start rotating.");
    shutdown_signal().await;

    // 8. Graceful shutdown
    info!("Shutting down...");
    cancel.cancel();
    if let Err(e) = dispatcher_handle.await {
        error!("Update dispatcher ended abnormally: {}", e);
    }
    services.agent.shutdown().await;
    pool.close().await;
    info!("PinRelay stopped");

    Ok(())
}

/// Wait for a shutdown signal (SIGTERM or SIGINT/Ctrl+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C"); }
        () = terminate => { info!("Received SIGTERM"); }
    }
}
