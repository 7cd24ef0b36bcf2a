//! Redis-backed document store for match documents.
//!
//! Each document is a JSON string under `matches:doc:<uuid>`; the list
//! `matches:ids` keeps insertion order, which is the store's default ordering.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::{apply_update, DocumentId, DocumentStore, DocumentUpdate, MatchFilter, StoredDocument};
use crate::error::GatewayError;
use crate::model::MatchDocument;

const IDS_KEY: &str = "matches:ids";

fn doc_key(id: DocumentId) -> String {
    format!("matches:doc:{}", id.0)
}

pub struct RedisDocumentStore {
    redis: redis::aio::ConnectionManager,
}

impl RedisDocumentStore {
    pub async fn connect(url: &str, max_retries: u32) -> Result<Self> {
        let redis = Self::connect_redis_with_retry(url, max_retries).await?;
        Ok(Self { redis })
    }

    async fn connect_redis_with_retry(url: &str, max_retries: u32) -> Result<redis::aio::ConnectionManager> {
        let mut attempt = 0;
        loop {
            let outcome = match redis::Client::open(url) {
                Ok(client) => redis::aio::ConnectionManager::new(client).await,
                Err(e) => Err(e),
            };
            match outcome {
                Ok(conn) => {
                    info!("Connected to Redis");
                    return Ok(conn);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries {
                        return Err(anyhow!("Failed to connect to Redis after {} attempts: {}", max_retries, e));
                    }
                    warn!("Redis connection attempt {} failed: {}. Retrying...", attempt, e);
                    tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                }
            }
        }
    }
}

#[async_trait]
impl DocumentStore for RedisDocumentStore {
    async fn insert_many(&self, docs: &[MatchDocument]) -> Result<Vec<DocumentId>, GatewayError> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.redis.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();

        let mut ids = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = DocumentId(Uuid::new_v4());
            let payload = serde_json::to_string(doc)?;
            pipe.set(doc_key(id), payload)
                .ignore()
                .rpush(IDS_KEY, id.0.to_string())
                .ignore();
            ids.push(id);
        }

        let _: () = pipe.query_async(&mut conn).await?;
        info!("Inserted {} match documents into Redis", ids.len());
        Ok(ids)
    }

    async fn find(&self, filter: &MatchFilter, limit: Option<usize>) -> Result<Vec<StoredDocument>, GatewayError> {
        let mut conn = self.redis.clone();
        let raw_ids: Vec<String> = conn.lrange(IDS_KEY, 0, -1).await?;
        if raw_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(raw_ids.len());
        for raw in &raw_ids {
            let uuid = Uuid::parse_str(raw)
                .map_err(|e| GatewayError::Other(format!("corrupt document id '{}': {}", raw, e)))?;
            ids.push(DocumentId(uuid));
        }

        let keys: Vec<String> = ids.iter().map(|id| doc_key(*id)).collect();
        let bodies: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;

        let mut out = Vec::new();
        for (id, body) in ids.into_iter().zip(bodies) {
            let Some(body) = body else { continue };
            let document: MatchDocument = serde_json::from_str(&body)?;
            if filter.matches(&document) {
                out.push(StoredDocument { id, document });
                if limit.is_some_and(|l| out.len() >= l) {
                    break;
                }
            }
        }
        Ok(out)
    }

    async fn update_one(&self, id: DocumentId, update: &DocumentUpdate) -> Result<bool, GatewayError> {
        let mut conn = self.redis.clone();
        let key = doc_key(id);
        let body: Option<String> = conn.get(&key).await?;
        let Some(body) = body else {
            return Ok(false);
        };

        let mut value: Value = serde_json::from_str(&body)?;
        apply_update(&mut value, update)?;
        serde_json::from_value::<MatchDocument>(value.clone())?;

        let _: () = conn.set(&key, serde_json::to_string(&value)?).await?;
        Ok(true)
    }
}
