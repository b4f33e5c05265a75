use azalea_chat::FormattedText;
use serde::Deserialize;

use super::ServerStatus;

#[derive(Deserialize)]
struct RawStatus {
    description: Option<serde_json::Value>,
    #[serde(default)]
    players: RawPlayers,
    #[serde(default)]
    version: RawVersion,
}

#[derive(Deserialize, Default)]
struct RawPlayers {
    #[serde(default)]
    online: i64,
    #[serde(default)]
    max: i64,
}

#[derive(Deserialize, Default)]
struct RawVersion {
    #[serde(default)]
    name: String,
}

/// Interpret the json payload of a status response. Returns `None` if it's not
/// from a real minecraft server.
pub fn parse_status(data: &[u8]) -> Option<ServerStatus> {
    let data = String::from_utf8_lossy(data);
    let raw: RawStatus = serde_json::from_str(&data).ok()?;

    // no description, so probably not even a minecraft server
    let description = raw.description?;
    let motd = FormattedText::deserialize(&description)
        .unwrap_or_default()
        .to_string();

    if is_placeholder(&motd, &raw.version.name) {
        return None;
    }

    Some(ServerStatus {
        motd,
        players_online: raw.players.online,
        players_max: raw.players.max,
        version: raw.version.name,
    })
}

/// Hosting providers and proxies that answer for servers that aren't
/// actually running.
fn is_placeholder(motd: &str, version_name: &str) -> bool {
    motd.contains("Craftserve.pl - wydajny hosting Minecraft!")
        || motd.contains("Ochrona DDoS: Przekroczono limit polaczen.")
        || motd.contains("Start the server at FalixNodes.net/start")
        || motd.contains("This server is offline Powered by FalixNodes.net")
        || motd.contains("Serwer jest aktualnie wy")
        || motd.contains("Blad pobierania statusu. Polacz sie bezposrednio!")
        || matches!(
            version_name,
            "COSMIC GUARD" | "TCPShield.com" | "â  Error" | "⚠ Error"
        )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_vanilla_status() {
        let status = parse_status(
            br#"{"version":{"name":"1.21.1","protocol":767},"players":{"max":20,"online":3,"sample":[]},"description":"A Minecraft Server"}"#,
        )
        .unwrap();
        assert_eq!(
            status,
            ServerStatus {
                motd: "A Minecraft Server".to_string(),
                players_online: 3,
                players_max: 20,
                version: "1.21.1".to_string(),
            }
        );
    }

    #[test]
    fn test_component_description_is_flattened() {
        let status = parse_status(
            br#"{"version":{"name":"Paper 1.20.4"},"players":{"max":100,"online":0},"description":{"text":"Hello ","extra":[{"text":"world","color":"gold"}]}}"#,
        )
        .unwrap();
        assert_eq!(status.motd, "Hello world");
        assert_eq!(status.version, "Paper 1.20.4");
    }

    #[test]
    fn test_missing_players_default_to_zero() {
        let status = parse_status(br#"{"version":{"name":"x"},"description":""}"#).unwrap();
        assert_eq!(status.players_online, 0);
        assert_eq!(status.players_max, 0);
    }

    #[test]
    fn test_rejected_payloads() {
        // no description
        assert_eq!(parse_status(br#"{"version":{"name":"1.8.8"}}"#), None);
        // not json
        assert_eq!(parse_status(b"{nope"), None);
        // placeholder
        assert_eq!(
            parse_status(br#"{"version":{"name":"TCPShield.com"},"description":"offline"}"#),
            None
        );
        assert_eq!(
            parse_status(
                br#"{"version":{"name":"1.20"},"description":"This server is offline Powered by FalixNodes.net"}"#
            ),
            None
        );
    }
}
