//! Status request over a real TCP connection.

use std::{net::SocketAddrV4, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};
use tracing::trace;

use crate::processing::{ServerStatus, minecraft::parse_status};

use super::protocols::{Minecraft, ParseResponseError, Protocol};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeResult {
    Success(ServerStatus),
    /// Timed out, closed early, or replied with something that isn't a
    /// minecraft status. Common for ports running other services.
    NoResponse,
}

pub async fn query_status(
    protocol: &Minecraft,
    target: SocketAddrV4,
    status_timeout: Duration,
) -> HandshakeResult {
    match exchange(protocol, target, status_timeout)
        .await
        .as_deref()
        .and_then(parse_status)
    {
        Some(status) => HandshakeResult::Success(status),
        None => HandshakeResult::NoResponse,
    }
}

/// Connect, send the protocol's payload and read until the protocol can parse
/// what was received. Everything, including the connect, has to finish within
/// `status_timeout`.
pub async fn exchange(
    protocol: &dyn Protocol,
    target: SocketAddrV4,
    status_timeout: Duration,
) -> Option<Vec<u8>> {
    match timeout(status_timeout, exchange_inner(protocol, target)).await {
        Ok(data) => data,
        Err(_) => {
            trace!("status request to {target} timed out");
            None
        }
    }
}

async fn exchange_inner(protocol: &dyn Protocol, target: SocketAddrV4) -> Option<Vec<u8>> {
    let mut stream = TcpStream::connect(target).await.ok()?;
    stream.write_all(&protocol.payload(target)).await.ok()?;

    let mut response = Vec::new();
    let mut buf = vec![0; 4096];
    loop {
        let n = stream.read(&mut buf).await.ok()?;
        if n == 0 {
            trace!("{target} closed the connection after {} bytes", response.len());
            return None;
        }
        response.extend_from_slice(&buf[..n]);

        match protocol.parse_response(&response) {
            Ok(data) => return Some(data),
            Err(ParseResponseError::Incomplete) => continue,
            Err(ParseResponseError::Invalid) => return None,
        }
    }
}
