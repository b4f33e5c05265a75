pub mod minecraft;

/// What we keep from a server's status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    /// The description with all formatting removed.
    pub motd: String,
    pub players_online: i64,
    pub players_max: i64,
    pub version: String,
}
