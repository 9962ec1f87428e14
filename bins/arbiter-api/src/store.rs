// Run record storage behind the API

use arbiter_common::redis;
use arbiter_common::types::RunRecord;
use async_trait::async_trait;
use ::redis::aio::ConnectionManager;
use ::redis::RedisResult;
use uuid::Uuid;

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn save(&self, record: &RunRecord) -> RedisResult<()>;
    async fn load(&self, run_id: &Uuid) -> RedisResult<Option<RunRecord>>;
}

/// Records expire after `ttl_seconds`
pub struct RedisRunStore {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisRunStore {
    pub fn new(conn: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { conn, ttl_seconds }
    }
}

#[async_trait]
impl RunStore for RedisRunStore {
    async fn save(&self, record: &RunRecord) -> RedisResult<()> {
        let mut conn = self.conn.clone();
        redis::store_run(&mut conn, record, self.ttl_seconds).await
    }

    async fn load(&self, run_id: &Uuid) -> RedisResult<Option<RunRecord>> {
        let mut conn = self.conn.clone();
        redis::get_run(&mut conn, run_id).await
    }
}
