//! Networked cache store backed by Redis.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, Script};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::store::{CacheError, CacheStore};

const BACKEND: &str = "redis";
const SCAN_BATCH: usize = 200;

// KEYS[1] entry, KEYS[2] counter; ARGV[1] payload, ARGV[2] ttl ms, ARGV[3] expected
const SET_IF_GENERATION: &str = r"
if tonumber(redis.call('GET', KEYS[2]) or '0') ~= tonumber(ARGV[3]) then
    return 0
end
redis.call('SET', KEYS[1], ARGV[1], 'PX', ARGV[2])
return 1
";

/// Redis-backed store.
///
/// The connection is established on first use, so a missing Redis never
/// blocks startup. Every round-trip is bounded by `operation_timeout`.
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    operation_timeout: Duration,
    set_if_generation: Script,
}

impl RedisStore {
    pub fn new(url: &str, operation_timeout: Duration) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(backend_error)?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            operation_timeout,
            set_if_generation: Script::new(SET_IF_GENERATION),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheError> {
        let manager = self
            .connection
            .get_or_try_init(|| {
                self.bounded("connect", async {
                    let manager = self.client.get_connection_manager().await?;
                    info!(backend = BACKEND, "Connected to cache backend");
                    Ok::<_, RedisError>(manager)
                })
            })
            .await?;
        Ok(manager.clone())
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result.map_err(backend_error),
            Err(_) => Err(CacheError::Timeout {
                backend: BACKEND,
                op,
                after: self.operation_timeout,
            }),
        }
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<Vec<u8>> = self
            .bounded("get", redis::cmd("GET").arg(key).query_async(&mut conn))
            .await?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return self.remove(key).await;
        }
        let millis = ttl_millis(ttl);
        let mut conn = self.connection().await?;
        let _: () = self
            .bounded(
                "set",
                redis::cmd("SET")
                    .arg(key)
                    .arg(value.as_ref())
                    .arg("PX")
                    .arg(millis)
                    .query_async(&mut conn),
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _: u64 = self
            .bounded("del", redis::cmd("DEL").arg(key).query_async(&mut conn))
            .await?;
        Ok(())
    }

    async fn remove_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let pattern = format!("{}*", escape_glob(prefix));
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = self
                .bounded(
                    "scan",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn),
                )
                .await?;

            if !keys.is_empty() {
                let deleted: u64 = self
                    .bounded("del", redis::cmd("DEL").arg(&keys).query_async(&mut conn))
                    .await?;
                removed += deleted;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(backend = BACKEND, prefix, removed, "Removed keys by prefix");
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection().await?;
        let count: u64 = self
            .bounded("exists", redis::cmd("EXISTS").arg(key).query_async(&mut conn))
            .await?;
        Ok(count > 0)
    }

    async fn generation(&self, counter: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection().await?;
        let value: Option<u64> = self
            .bounded("get", redis::cmd("GET").arg(counter).query_async(&mut conn))
            .await?;
        Ok(value.unwrap_or(0))
    }

    async fn bump_generation(&self, counter: &str) -> Result<u64, CacheError> {
        let mut conn = self.connection().await?;
        self.bounded("incr", redis::cmd("INCR").arg(counter).query_async(&mut conn))
            .await
    }

    async fn set_if_generation(
        &self,
        key: &str,
        value: Bytes,
        ttl: Duration,
        counter: &str,
        expected: u64,
    ) -> Result<bool, CacheError> {
        if ttl.is_zero() {
            self.remove(key).await?;
            return Ok(false);
        }
        let mut conn = self.connection().await?;
        let mut invocation = self.set_if_generation.prepare_invoke();
        invocation
            .key(key)
            .key(counter)
            .arg(value.as_ref())
            .arg(ttl_millis(ttl))
            .arg(expected);
        let stored: u8 = self
            .bounded("set_if_generation", invocation.invoke_async(&mut conn))
            .await?;
        Ok(stored == 1)
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn backend_error(err: RedisError) -> CacheError {
    CacheError::backend(BACKEND, err.to_string())
}

/// Escapes glob metacharacters so a key prefix matches literally in `SCAN MATCH`.
fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
