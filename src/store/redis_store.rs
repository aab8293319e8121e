// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! Redis 嵌入存储
//!
//! Records live in one list (`{prefix}:records`, JSON per element) and the set
//! of report ids in `{prefix}:reports`. `{prefix}:dimension` pins the vector
//! dimension on first append. Only compiled with the `redis` feature.

use super::{EmbeddingStore, Snapshot, records_for_append};
use crate::domain::EmbeddingRecord;
use crate::error::AppError;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::{Arc, LazyLock};
use tokio::sync::Mutex;

/// Check the pinned dimension and append in one server-side step.
/// Returns -1 on success, otherwise the stored dimension.
static APPEND_SCRIPT: LazyLock<redis::Script> = LazyLock::new(|| {
    redis::Script::new(
        r"
local stored = redis.call('GET', KEYS[1])
if not stored then
    local first = redis.call('LINDEX', KEYS[2], 0)
    if first then
        stored = tostring(#cjson.decode(first)['vector'])
    end
end
if stored and stored ~= ARGV[1] then
    return tonumber(stored)
end
redis.call('SET', KEYS[1], ARGV[1])
for i = 3, #ARGV do
    redis.call('RPUSH', KEYS[2], ARGV[i])
end
redis.call('SADD', KEYS[3], ARGV[2])
return -1
",
    )
});

pub struct RedisStore {
    manager: Arc<Mutex<ConnectionManager>>,
    prefix: String,
}

impl RedisStore {
    pub async fn connect(url: &str, prefix: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::StoreError(format!("Failed to create Redis client: {}", e)))?;
        let manager = client.get_connection_manager().await.map_err(|e| {
            AppError::StoreError(format!("Failed to create connection manager: {}", e))
        })?;

        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
            prefix: prefix.to_string(),
        })
    }

    fn records_key(&self) -> String {
        format!("{}:records", self.prefix)
    }

    fn reports_key(&self) -> String {
        format!("{}:reports", self.prefix)
    }

    fn dimension_key(&self) -> String {
        format!("{}:dimension", self.prefix)
    }
}

/// Interpret the append script's reply.
fn check_append_reply(reply: i64, incoming: &[EmbeddingRecord]) -> Result<(), AppError> {
    if reply < 0 {
        return Ok(());
    }
    let dimension = incoming.first().map(|r| r.vector.len()).unwrap_or(0);
    Err(AppError::InvalidInput(format!(
        "vector dimension {} does not match stored dimension {}",
        dimension, reply
    )))
}

fn store_err(e: redis::RedisError) -> AppError {
    AppError::StoreError(format!("redis: {}", e))
}

#[async_trait]
impl EmbeddingStore for RedisStore {
    async fn append(&self, report_id: &str, vectors: &[Vec<f32>]) -> Result<usize, AppError> {
        let incoming = records_for_append(report_id, vectors)?;
        if incoming.is_empty() {
            return Ok(0);
        }

        let lines = incoming
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| AppError::StoreError(e.to_string()))?;

        let dimension = incoming[0].vector.len();
        let mut conn = self.manager.lock().await;
        let reply: i64 = APPEND_SCRIPT
            .key(self.dimension_key())
            .key(self.records_key())
            .key(self.reports_key())
            .arg(dimension)
            .arg(report_id)
            .arg(lines)
            .invoke_async(&mut *conn)
            .await
            .map_err(store_err)?;
        check_append_reply(reply, &incoming)?;

        Ok(incoming.len())
    }

    async fn scan_all(&self) -> Result<Snapshot, AppError> {
        let mut conn = self.manager.lock().await;
        let raw: Vec<String> = conn
            .lrange(self.records_key(), 0, -1)
            .await
            .map_err(store_err)?;
        drop(conn);

        let records = raw
            .iter()
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str::<EmbeddingRecord>(line).map_err(|e| {
                    AppError::StoreError(format!("store corrupt: record {}: {}", i, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Snapshot::from_records(records)
    }

    async fn contains_report(&self, report_id: &str) -> Result<bool, AppError> {
        let mut conn = self.manager.lock().await;
        conn.sismember(self.reports_key(), report_id)
            .await
            .map_err(store_err)
    }

    async fn len(&self) -> Result<usize, AppError> {
        let mut conn = self.manager.lock().await;
        conn.llen(self.records_key()).await.map_err(store_err)
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
