use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

#[derive(Deserialize, Clone, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Falls back to the `MONGO_URI` environment variable. If neither is set,
    /// results are only kept in memory for the lifetime of the process.
    #[serde(default)]
    pub mongodb_uri: Option<String>,

    /// Defaults to `mcscanner`.
    #[serde(default)]
    pub database_name: Option<String>,

    /// Directory for the rolling tracing log. Nothing is written there if
    /// this is unset.
    #[serde(default)]
    pub logging_dir: Option<String>,

    /// A file of ranges that are never probed, in the same format as a
    /// masscan exclude file.
    #[serde(default)]
    pub exclude_file: Option<String>,

    #[serde(default)]
    pub scanner: ScannerConfig,

    /// The range scanned when the binary is run without a subcommand.
    #[serde(default)]
    pub scan: Option<ScanRangeConfig>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        Ok(toml::from_str(&fs::read_to_string(path)?)?)
    }

    pub fn database_name(&self) -> &str {
        self.database_name.as_deref().unwrap_or("mcscanner")
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields, default)]
pub struct ScannerConfig {
    pub port: u16,

    /// How long a TCP connect may take before the host counts as closed.
    pub connect_timeout_ms: u64,
    /// How long the handshake and status exchange may take once connected.
    /// This is separate from the connect timeout, so a host can take up to
    /// the sum of both.
    pub status_timeout_ms: u64,

    /// Pause between batches. Not applied after the last batch.
    pub batch_pause_ms: u64,

    pub default_batch_size: usize,
    pub max_batch_size: usize,

    /// Sent in the handshake packet. Servers answer status requests for any
    /// version, so this rarely matters.
    pub protocol_version: i32,

    /// The durable scan log, truncated at the start of every scan.
    pub log_file: Option<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            port: 25565,
            connect_timeout_ms: 3000,
            status_timeout_ms: 3000,
            batch_pause_ms: 50,
            default_batch_size: 25,
            max_batch_size: 500,
            protocol_version: 47,
            log_file: Some("scan.log".to_string()),
        }
    }
}

impl ScannerConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct ScanRangeConfig {
    pub start_ip: String,
    pub end_ip: String,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: Config = toml::from_str(
            r#"
            mongodb_uri = "mongodb://localhost:27017"

            [scanner]
            batch_pause_ms = 100

            [scan]
            start_ip = "5.9.0.0"
            end_ip = "5.9.0.255"
            "#,
        )
        .unwrap();

        assert_eq!(config.scanner.port, 25565);
        assert_eq!(config.scanner.batch_pause(), Duration::from_millis(100));
        assert_eq!(config.scanner.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.database_name(), "mcscanner");
        let scan = config.scan.unwrap();
        assert_eq!(scan.start_ip, "5.9.0.0");
        assert_eq!(scan.batch_size, None);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = toml::from_str::<Config>(
            r#"
            [scanner]
            batch_sise = 10
            "#,
        );
        assert!(result.is_err());
    }
}
