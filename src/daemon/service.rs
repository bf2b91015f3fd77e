use serde_json::Value;
use tokio::{
    select,
    sync::{mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    beeper::Beeper,
    protocol::Response,
    storage::{config::ConfigStore, session_log::SessionLog},
    timer::manager::TimerManager,
};

/// A raw command together with the channel its response goes back on.
pub struct Envelope {
    pub command: Value,
    pub reply: oneshot::Sender<Response>,
}

/// Owns the manager and executes commands one at a time. Between commands it waits for the active
/// timer's deadline, so a timer that runs out is finished without anyone asking.
pub async fn run<C: ConfigStore, L: SessionLog, B: Beeper>(
    mut manager: TimerManager<C, L, B>,
    mut receiver: mpsc::Receiver<Envelope>,
    shutdown: CancellationToken,
) {
    loop {
        let deadline = manager.deadline();
        select! {
            _ = shutdown.cancelled() => break,
            envelope = receiver.recv() => {
                let Some(Envelope { command, reply }) = envelope else {
                    break;
                };
                let response = manager.execute_raw(&command).await;
                if reply.send(response).is_err() {
                    warn!("Client left before receiving a response");
                }
            }
            _ = async {
                match deadline {
                    Some(deadline) => manager.clock().sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            } => {
                debug!("Active timer reached its deadline");
                manager.settle().await;
            }
        }
    }
    info!("Timer service stopped");
}
