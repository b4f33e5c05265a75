mod minecraft;

use std::net::SocketAddrV4;

pub use minecraft::Minecraft;
#[cfg(test)]
pub(crate) use minecraft::status_packet;

#[derive(Debug, PartialEq, Eq)]
pub enum ParseResponseError {
    /// The peer isn't speaking this protocol.
    Invalid,
    /// More bytes are needed before the response can be parsed.
    Incomplete,
}

pub trait Protocol: Send + Sync {
    /// The bytes sent to the server right after connecting.
    fn payload(&self, address: SocketAddrV4) -> Vec<u8>;
    /// Parse everything received so far. On success returns the status
    /// payload with the framing stripped.
    fn parse_response(&self, response: &[u8]) -> Result<Vec<u8>, ParseResponseError>;
}
