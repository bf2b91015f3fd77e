use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    beeper::SpeakerBeeper,
    storage::{config::JsonConfigStore, session_log::SessionLogStorage},
    timer::manager::TimerManager,
    utils::clock::DefaultClock,
};

pub mod args;
pub mod server;
pub mod service;
pub mod shutdown;

pub type DaemonManager = TimerManager<JsonConfigStore, SessionLogStorage, SpeakerBeeper>;

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: &Path, address: &str) -> Result<()> {
    // Resolved before leaving the current directory
    let dir = std::path::absolute(dir)?;
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to listen on {address}"))?;
    std::env::set_current_dir("/")?;

    run_daemon(&dir, listener, CancellationToken::new()).await
}

/// Serves requests from `listener` until the process is interrupted, a client asks to quit or
/// `shutdown_token` is cancelled.
pub async fn run_daemon(
    dir: &Path,
    listener: TcpListener,
    shutdown_token: CancellationToken,
) -> Result<()> {
    info!("Daemon listening on {:?}", listener.local_addr()?);
    let manager = create_manager(dir).await?;
    let (sender, receiver) = mpsc::channel::<service::Envelope>(10);

    let (_, server_result, ()) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        server::serve(listener, sender, shutdown_token.clone()),
        service::run(manager, receiver, shutdown_token.clone()),
    );

    if let Err(server_result) = &server_result {
        error!("Server got an error {:?}", server_result);
    }
    server_result
}

async fn create_manager(dir: &Path) -> Result<DaemonManager> {
    let config = JsonConfigStore::new(dir.join("config.json"));
    let logger = SessionLogStorage::new(dir.join("sessions"));
    let beeper = SpeakerBeeper::new(Arc::new(DefaultClock));
    TimerManager::init(config, logger, beeper, Box::new(DefaultClock))
        .await
        .inspect_err(|e| error!("Failed to initialize the timer manager {e:?}"))
}

#[cfg(test)]
mod daemon_tests {
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    use crate::{
        cli::client::send_request,
        daemon::run_daemon,
        protocol::{Request, Response},
        utils::logging::TEST_LOGGING,
    };

    fn command(raw: serde_json::Value) -> Request {
        Request::Command { command: raw }
    }

    /// Very simple smoke test to check if the daemon answers over a real socket and persists what
    /// it is asked to.
    #[tokio::test]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?.to_string();
        let shutdown_token = CancellationToken::new();

        let (daemon_result, client_result) = tokio::join!(
            run_daemon(dir.path(), listener, shutdown_token.clone()),
            async {
                assert_eq!(send_request(&address, &Request::Ping).await?, Response::ok(None));

                let created = send_request(
                    &address,
                    &command(json!({
                        "command": "ct",
                        "options": { "n": ["tea"], "d": ["3"] },
                    })),
                )
                .await?;
                assert_eq!(created, Response::ok(None));

                let saved =
                    send_request(&address, &command(json!({ "command": "s", "options": {} })))
                        .await?;
                assert!(saved.success);

                let info =
                    send_request(&address, &command(json!({ "command": "i", "options": {} })))
                        .await?;
                assert_eq!(info.data.unwrap()["state"], json!("CREATED"));

                let malformed = send_request(&address, &command(json!("start"))).await?;
                assert!(!malformed.success);
                assert!(malformed.code.is_some());

                assert!(send_request(&address, &Request::Quit).await?.success);
                anyhow::Ok(())
            },
        );
        daemon_result?;
        client_result?;

        let config = std::fs::read_to_string(dir.path().join("config.json"))?;
        let config: serde_json::Value = serde_json::from_str(&config)?;
        assert_eq!(
            config["savedTimers"]["tea"],
            json!({ "name": "tea", "duration": 180_000 })
        );
        Ok(())
    }

    #[tokio::test]
    async fn cancelling_stops_the_daemon() -> Result<()> {
        let dir = tempdir()?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let shutdown_token = CancellationToken::new();
        shutdown_token.cancel();
        run_daemon(dir.path(), listener, shutdown_token).await
    }
}
