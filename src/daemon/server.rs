use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    select,
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::protocol::{Request, Response};

use super::service::Envelope;

/// Longest accepted request line, the newline included.
const MAX_REQUEST_BYTES: u64 = 64 * 1024;
/// Time a client gets to send its request line.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts connections until `shutdown` is cancelled. Every connection is answered on its own task,
/// commands are forwarded to the service loop through `sender`.
pub async fn serve(
    listener: TcpListener,
    sender: mpsc::Sender<Envelope>,
    shutdown: CancellationToken,
) -> Result<()> {
    loop {
        let (stream, address) = select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(v) => v,
                Err(e) => {
                    warn!("Failed to accept a connection {e:?}");
                    continue;
                }
            },
        };
        debug!("Accepted connection from {address}");

        let sender = sender.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, sender, shutdown).await {
                error!("Connection from {address} failed {e:?}");
            }
        });
    }
    info!("Server stopped");
    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    sender: mpsc::Sender<Envelope>,
    shutdown: CancellationToken,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();

    let response = match read_request(reader).await? {
        Ok(line) => match serde_json::from_str::<Request>(&line) {
            Ok(request) => answer(request, &sender, &shutdown).await?,
            Err(e) => {
                warn!("Malformed request {line:?}");
                Response::failure(format!("Malformed request: {e}"))
            }
        },
        Err(failure) => failure,
    };

    let mut text = serde_json::to_string(&response)?;
    text.push('\n');
    writer.write_all(text.as_bytes()).await?;
    writer.shutdown().await?;
    Ok(())
}

/// Reads the request line. A client that is too slow or sends too much gets the failure to
/// answer with instead.
async fn read_request(reader: impl AsyncRead + Unpin) -> Result<Result<String, Response>> {
    let mut line = String::new();
    let mut reader = BufReader::new(reader.take(MAX_REQUEST_BYTES));
    let Ok(read) = timeout(REQUEST_TIMEOUT, reader.read_line(&mut line)).await else {
        warn!("Client sent no request within {REQUEST_TIMEOUT:?}");
        return Ok(Err(Response::failure("Timed out waiting for the request")));
    };
    let read = read?;

    if read as u64 == MAX_REQUEST_BYTES && !line.ends_with('\n') {
        warn!("Request exceeded {MAX_REQUEST_BYTES} bytes");
        return Ok(Err(Response::failure(format!(
            "Request is longer than {MAX_REQUEST_BYTES} bytes"
        ))));
    }
    Ok(Ok(line))
}

async fn answer(
    request: Request,
    sender: &mpsc::Sender<Envelope>,
    shutdown: &CancellationToken,
) -> Result<Response> {
    match request {
        Request::Ping => Ok(Response::ok(None)),
        Request::Quit => {
            info!("Quit requested");
            shutdown.cancel();
            Ok(Response::ok(None))
        }
        Request::Command { command } => {
            let (reply, response) = oneshot::channel();
            sender
                .send(Envelope { command, reply })
                .await
                .ok()
                .context("Timer service is not running")?;
            response.await.context("Timer service dropped the request")
        }
    }
}
