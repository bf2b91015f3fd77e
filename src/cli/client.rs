use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tracing::debug;

use crate::protocol::{Request, Response};

/// Sends a single request to the daemon at `address` and waits for its response.
pub async fn send_request(address: &str, request: &Request) -> Result<Response> {
    let stream = TcpStream::connect(address)
        .await
        .with_context(|| format!("Couldn't reach the daemon at {address}. Is it running?"))?;
    let (reader, mut writer) = stream.into_split();

    let mut text = serde_json::to_string(request)?;
    debug!("Sending {text}");
    text.push('\n');
    writer.write_all(text.as_bytes()).await?;

    let mut line = String::new();
    BufReader::new(reader).read_line(&mut line).await?;
    serde_json::from_str(&line).with_context(|| format!("Invalid response from the daemon {line:?}"))
}
