use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cancels `cancelation` once the process is interrupted. Returns early when something else
/// cancels it first, for example a client asking the daemon to quit.
///
/// On Windows detached processes can't detect signals sent to them, so `prodtimer stop` goes
/// through the socket instead.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => {
                info!("Interrupted, shutting down");
                cancelation.cancel();
            }
            Err(e) => {
                error!("Failed to listen for interrupts {e:?}");
                cancelation.cancelled().await;
            }
        },
        _ = cancelation.cancelled() => (),
    };
}
