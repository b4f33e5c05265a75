use std::{net::SocketAddrV4, time::Duration};

use async_trait::async_trait;

use super::{
    handshake::{self, HandshakeResult},
    probe::{self, ProbeResult},
    protocols::Minecraft,
};

/// The network side of scanning a single host. Implementations are expected
/// to enforce the timeouts they're given.
#[async_trait]
pub trait ScanTransport: Send + Sync {
    async fn probe(&self, target: SocketAddrV4, connect_timeout: Duration) -> ProbeResult;

    async fn query_status(&self, target: SocketAddrV4, status_timeout: Duration)
    -> HandshakeResult;
}

pub struct TcpTransport {
    protocol: Minecraft,
}

impl TcpTransport {
    pub fn new(protocol: Minecraft) -> Self {
        Self { protocol }
    }
}

#[async_trait]
impl ScanTransport for TcpTransport {
    async fn probe(&self, target: SocketAddrV4, connect_timeout: Duration) -> ProbeResult {
        probe::probe(target, connect_timeout).await
    }

    async fn query_status(
        &self,
        target: SocketAddrV4,
        status_timeout: Duration,
    ) -> HandshakeResult {
        handshake::query_status(&self.protocol, target, status_timeout).await
    }
}
