pub mod memory;

use std::{fmt, net::Ipv4Addr, str::FromStr};

use async_trait::async_trait;
use bson::{Document, doc};
use chrono::{DateTime, Utc};
use eyre::eyre;
use futures_util::TryStreamExt;
use mongodb::{
    Client, Collection, IndexModel,
    options::{IndexOptions, ReturnDocument},
};
use serde::Deserialize;

pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerKey {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl ServerKey {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Players {
    pub online: i64,
    pub max: i64,
}

/// Everything a scan writes. Each upsert overwrites all of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerFields {
    pub online: bool,
    pub motd: String,
    pub players: Players,
    pub version: String,
    pub last_scanned: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub key: ServerKey,
    pub online: bool,
    pub motd: String,
    pub players: Players,
    pub version: String,
    pub last_scanned: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where scan results end up. Keyed by `(ip, port)`, with at most one record
/// per key. Scanning never deletes anything.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Create the record if it doesn't exist, otherwise overwrite the scan
    /// fields and bump `updated_at`.
    async fn upsert(&self, key: ServerKey, fields: ServerFields) -> eyre::Result<ServerRecord>;

    /// Every record for `ip`, on any port.
    async fn find_by_ip(&self, ip: Ipv4Addr) -> eyre::Result<Vec<ServerRecord>>;

    /// Online servers, most players first.
    async fn list_online(&self, limit: usize) -> eyre::Result<Vec<ServerRecord>>;
}

#[derive(Clone)]
pub struct Database {
    servers: Collection<ServerDocument>,
}

impl Database {
    pub async fn connect(mongodb_uri: &str, database_name: &str) -> eyre::Result<Self> {
        let client = Client::with_uri_str(mongodb_uri).await?;
        let database = client.database(database_name);

        // ping the database to make sure it's up
        database.run_command(doc! {"ping": 1}).await?;

        let servers = database.collection::<ServerDocument>("servers");
        servers
            .create_index(
                IndexModel::builder()
                    .keys(doc! {"ip": 1, "port": 1})
                    .options(IndexOptions::builder().unique(true).build())
                    .build(),
            )
            .await?;

        Ok(Self { servers })
    }
}

#[async_trait]
impl ServerStore for Database {
    async fn upsert(&self, key: ServerKey, fields: ServerFields) -> eyre::Result<ServerRecord> {
        let now = bson::DateTime::now();
        let update = doc! {
            "$set": {
                "online": fields.online,
                "motd": fields.motd,
                "players": {
                    "online": fields.players.online,
                    "max": fields.players.max,
                },
                "version": fields.version,
                "lastScanned": bson::DateTime::from_millis(fields.last_scanned.timestamp_millis()),
                "updatedAt": now,
            },
            "$setOnInsert": {
                "createdAt": now,
            },
        };

        let document = self
            .servers
            .find_one_and_update(key_filter(&key), update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| eyre!("upsert of {key} returned no document"))?;

        document.try_into()
    }

    async fn find_by_ip(&self, ip: Ipv4Addr) -> eyre::Result<Vec<ServerRecord>> {
        let documents: Vec<ServerDocument> = self
            .servers
            .find(doc! {"ip": ip.to_string()})
            .sort(doc! {"port": 1})
            .await?
            .try_collect()
            .await?;

        documents.into_iter().map(ServerRecord::try_from).collect()
    }

    async fn list_online(&self, limit: usize) -> eyre::Result<Vec<ServerRecord>> {
        let documents: Vec<ServerDocument> = self
            .servers
            .find(doc! {"online": true})
            .sort(doc! {"players.online": -1})
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await?
            .try_collect()
            .await?;

        documents.into_iter().map(ServerRecord::try_from).collect()
    }
}

fn key_filter(key: &ServerKey) -> Document {
    doc! {
        "ip": key.ip.to_string(),
        "port": i32::from(key.port),
    }
}

/// A server as it's stored in the `servers` collection.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ServerDocument {
    ip: String,
    port: i32,
    #[serde(default)]
    online: bool,
    #[serde(default)]
    motd: Option<String>,
    #[serde(default)]
    players: Option<PlayersDocument>,
    #[serde(default)]
    version: Option<String>,
    last_scanned: bson::DateTime,
    created_at: bson::DateTime,
    updated_at: bson::DateTime,
}

#[derive(Deserialize, Debug)]
struct PlayersDocument {
    #[serde(default)]
    online: i64,
    #[serde(default)]
    max: i64,
}

impl TryFrom<ServerDocument> for ServerRecord {
    type Error = eyre::Report;

    fn try_from(document: ServerDocument) -> eyre::Result<Self> {
        let ip = Ipv4Addr::from_str(&document.ip)?;
        let port = u16::try_from(document.port)?;
        let players = document
            .players
            .map(|p| Players {
                online: p.online,
                max: p.max,
            })
            .unwrap_or_default();

        Ok(ServerRecord {
            key: ServerKey::new(ip, port),
            online: document.online,
            motd: document.motd.unwrap_or_default(),
            players,
            version: document.version.unwrap_or_default(),
            last_scanned: to_chrono(document.last_scanned)?,
            created_at: to_chrono(document.created_at)?,
            updated_at: to_chrono(document.updated_at)?,
        })
    }
}

fn to_chrono(date: bson::DateTime) -> eyre::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(date.timestamp_millis())
        .ok_or_else(|| eyre!("date out of range: {date}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_document_conversion() {
        let now = bson::DateTime::now();
        let document: ServerDocument = bson::from_document(doc! {
            "_id": bson::oid::ObjectId::new(),
            "ip": "5.9.0.1",
            "port": 25565,
            "online": true,
            "motd": "hello",
            "players": { "online": 3_i64, "max": 20_i64 },
            "version": "1.21.1",
            "lastScanned": now,
            "createdAt": now,
            "updatedAt": now,
            "__v": 0,
        })
        .unwrap();

        let record = ServerRecord::try_from(document).unwrap();
        assert_eq!(record.key, ServerKey::new(Ipv4Addr::new(5, 9, 0, 1), 25565));
        assert_eq!(record.players, Players { online: 3, max: 20 });
        assert_eq!(record.last_scanned.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn test_document_with_bad_ip_is_an_error() {
        let now = bson::DateTime::now();
        let document: ServerDocument = bson::from_document(doc! {
            "ip": "not an ip",
            "port": 25565,
            "lastScanned": now,
            "createdAt": now,
            "updatedAt": now,
        })
        .unwrap();
        assert!(ServerRecord::try_from(document).is_err());
    }
}
