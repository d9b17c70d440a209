use anyhow::Result;
use chargelink::Config;
use chargelink::console::{self, ConsoleExit};
use chargelink::dashboard::Dashboard;
use chargelink::logging::init_logging;
use chargelink::session::SessionManager;
use chargelink::transport::WebSocketTransport;
use tokio::io::BufReader;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path),
        None => Config::load(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    init_logging(&config.logging)?;

    let url = config.controller.url();
    info!(
        "Chargelink {} starting, controller at {}",
        env!("APP_VERSION"),
        url
    );

    let dashboard = Dashboard::new(&config.series)?.shared();
    let manager = SessionManager::new(
        config.session.clone(),
        url,
        WebSocketTransport::new(),
        dashboard.clone(),
    );
    let session = manager.handle();
    let mut session_task = tokio::spawn(manager.run());

    let console = console::run_console(
        BufReader::new(tokio::io::stdin()),
        session.clone(),
        dashboard,
        tokio::io::stdout(),
    );

    tokio::select! {
        exit = console => {
            match exit {
                Ok(ConsoleExit::Quit) => info!("Quit requested"),
                Ok(ConsoleExit::EndOfInput) => {
                    warn!("Console input closed; running until interrupted");
                    tokio::signal::ctrl_c().await?;
                }
                Err(e) => error!("Console failed: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        joined = &mut session_task => {
            return Err(anyhow::anyhow!("Session loop ended unexpectedly: {:?}", joined.err()));
        }
    }

    session.shutdown();
    let manager = session_task.await?;
    info!("Shutdown complete: {:?}", manager.stats());
    Ok(())
}
