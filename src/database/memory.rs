use std::{
    collections::BTreeMap,
    net::Ipv4Addr,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::{ServerFields, ServerKey, ServerRecord, ServerStore};

/// Keeps results in memory. Used when no MongoDB URI is configured.
#[derive(Default)]
pub struct MemoryStore {
    servers: Mutex<BTreeMap<ServerKey, ServerRecord>>,
    upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of upserts made, including ones that only updated.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.servers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.lock().is_empty()
    }

    pub fn get(&self, key: &ServerKey) -> Option<ServerRecord> {
        self.servers.lock().get(key).cloned()
    }
}

#[async_trait]
impl ServerStore for MemoryStore {
    async fn upsert(&self, key: ServerKey, fields: ServerFields) -> eyre::Result<ServerRecord> {
        self.upserts.fetch_add(1, Ordering::Relaxed);

        let now = Utc::now();
        let mut servers = self.servers.lock();
        let record = servers.entry(key).or_insert_with(|| ServerRecord {
            key,
            online: fields.online,
            motd: String::new(),
            players: Default::default(),
            version: String::new(),
            last_scanned: fields.last_scanned,
            created_at: now,
            updated_at: now,
        });

        record.online = fields.online;
        record.motd = fields.motd;
        record.players = fields.players;
        record.version = fields.version;
        record.last_scanned = fields.last_scanned;
        record.updated_at = now;

        Ok(record.clone())
    }

    async fn find_by_ip(&self, ip: Ipv4Addr) -> eyre::Result<Vec<ServerRecord>> {
        Ok(self
            .servers
            .lock()
            .range(ServerKey::new(ip, 0)..=ServerKey::new(ip, u16::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn list_online(&self, limit: usize) -> eyre::Result<Vec<ServerRecord>> {
        let mut online = self
            .servers
            .lock()
            .values()
            .filter(|record| record.online)
            .cloned()
            .collect::<Vec<_>>();
        online.sort_by(|a, b| b.players.online.cmp(&a.players.online));
        online.truncate(limit);
        Ok(online)
    }
}
