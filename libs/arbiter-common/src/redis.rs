use crate::types::{RunRecord, RunStatus};
use redis::{AsyncCommands, RedisResult};

/// Redis key semantics for stored runs
/// API and CLI share these so keys stay deterministic

pub const RUN_PREFIX: &str = "arbiter:run";
pub const STATUS_PREFIX: &str = "arbiter:status";

/// Generate record key for a run
pub fn run_key(run_id: &uuid::Uuid) -> String {
    format!("{}:{}", RUN_PREFIX, run_id)
}

/// Generate status key for a run
pub fn status_key(run_id: &uuid::Uuid) -> String {
    format!("{}:{}", STATUS_PREFIX, run_id)
}

fn serialization_error(e: serde_json::Error) -> redis::RedisError {
    redis::RedisError::from((redis::ErrorKind::TypeError, "serialization error", e.to_string()))
}

/// Store a run record with the given TTL
pub async fn store_run(
    conn: &mut redis::aio::ConnectionManager,
    record: &RunRecord,
    ttl_seconds: u64,
) -> RedisResult<()> {
    let key = run_key(&record.run_id);
    let payload = serde_json::to_string(record).map_err(serialization_error)?;
    let _: () = conn.set_ex(&key, payload, ttl_seconds).await?;

    // Status is stored separately for cheap lookups
    let status = serde_json::to_string(&record.status).map_err(serialization_error)?;
    let _: () = conn.set_ex(status_key(&record.run_id), status, ttl_seconds).await?;

    Ok(())
}

/// Retrieve a run record
pub async fn get_run(
    conn: &mut redis::aio::ConnectionManager,
    run_id: &uuid::Uuid,
) -> RedisResult<Option<RunRecord>> {
    let payload: Option<String> = conn.get(run_key(run_id)).await?;

    match payload {
        Some(data) => {
            let record: RunRecord = serde_json::from_str(&data).map_err(|e| {
                redis::RedisError::from((
                    redis::ErrorKind::TypeError,
                    "deserialization error",
                    e.to_string(),
                ))
            })?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

/// Retrieve only the status of a run
pub async fn get_status(
    conn: &mut redis::aio::ConnectionManager,
    run_id: &uuid::Uuid,
) -> RedisResult<Option<RunStatus>> {
    let payload: Option<String> = conn.get(status_key(run_id)).await?;
    Ok(payload.and_then(|s| serde_json::from_str(&s).ok()))
}
