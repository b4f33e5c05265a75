use std::{net::SocketAddrV4, time::Duration};

use tokio::{net::TcpStream, time::timeout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    Open,
    ClosedOrTimeout,
}

/// One TCP connect attempt. The stream is dropped (and the socket closed)
/// before returning, whatever the outcome.
pub async fn probe(target: SocketAddrV4, connect_timeout: Duration) -> ProbeResult {
    match timeout(connect_timeout, TcpStream::connect(target)).await {
        Ok(Ok(_stream)) => ProbeResult::Open,
        Ok(Err(_)) | Err(_) => ProbeResult::ClosedOrTimeout,
    }
}
