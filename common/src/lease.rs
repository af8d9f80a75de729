// Per-config run lease on Redis

use crate::db::RedisPool;
use crate::errors::LeaseError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Grants exclusive execution of a monitoring run per config.
///
/// Acquisition is single-attempt: if the lease is held the caller aborts its
/// run instead of waiting. The TTL covers crashed holders.
#[async_trait]
pub trait LeaseRegistry: Send + Sync {
    async fn try_acquire(
        &self,
        config_name: &str,
        ttl: Duration,
    ) -> Result<LeaseGuard, LeaseError>;

    /// Non-destructive check, used to answer manual triggers quickly
    async fn is_held(&self, config_name: &str) -> Result<bool, LeaseError>;
}

/// Lease guard that releases the lease when dropped
pub struct LeaseGuard {
    resource: String,
    on_release: Option<Box<dyn FnOnce() + Send>>,
}

impl LeaseGuard {
    pub fn new(resource: String, on_release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            resource,
            on_release: Some(Box::new(on_release)),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for LeaseGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseGuard")
            .field("resource", &self.resource)
            .finish()
    }
}

/// Redis-backed lease registry using SET NX EX with check-and-delete release
pub struct RedisLeaseRegistry {
    pool: RedisPool,
}

impl RedisLeaseRegistry {
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    fn key(config_name: &str) -> String {
        format!("run:{}", config_name)
    }
}

#[async_trait]
impl LeaseRegistry for RedisLeaseRegistry {
    #[instrument(skip(self), fields(config_name = %config_name, ttl_seconds = ttl.as_secs()))]
    async fn try_acquire(
        &self,
        config_name: &str,
        ttl: Duration,
    ) -> Result<LeaseGuard, LeaseError> {
        let mut conn = self.pool.get_connection();
        let key = Self::key(config_name);
        let holder_id = Uuid::new_v4().to_string();

        // SET NX EX: atomically claim the key only if nobody holds it
        let result: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&holder_id)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| LeaseError::Backend(format!("Failed to acquire lease: {}", e)))?;

        if result.is_none() {
            debug!(config_name = %config_name, "Lease already held");
            return Err(LeaseError::AlreadyHeld {
                resource: key,
            });
        }

        debug!(config_name = %config_name, holder_id = %holder_id, "Lease acquired");

        let pool = self.pool.clone();
        let release_key = key.clone();
        let release_holder = holder_id;
        Ok(LeaseGuard::new(key, move || {
            tokio::spawn(async move {
                if let Err(e) = release_lease(&pool, &release_key, &release_holder).await {
                    warn!(resource = %release_key, error = %e, "Failed to release lease on drop");
                }
            });
        }))
    }

    #[instrument(skip(self))]
    async fn is_held(&self, config_name: &str) -> Result<bool, LeaseError> {
        let mut conn = self.pool.get_connection();
        let exists: bool = redis::cmd("EXISTS")
            .arg(Self::key(config_name))
            .query_async(&mut conn)
            .await
            .map_err(|e| LeaseError::Backend(format!("Failed to check lease: {}", e)))?;
        Ok(exists)
    }
}

/// Release only if we still hold the lease, via an atomic Lua check-and-delete
async fn release_lease(pool: &RedisPool, key: &str, holder_id: &str) -> Result<(), LeaseError> {
    let mut conn = pool.get_connection();

    let script = redis::Script::new(
        r#"
        if redis.call("GET", KEYS[1]) == ARGV[1] then
            return redis.call("DEL", KEYS[1])
        else
            return 0
        end
        "#,
    );

    let deleted: i32 = script
        .key(key)
        .arg(holder_id)
        .invoke_async(&mut conn)
        .await
        .map_err(|e| LeaseError::Backend(format!("Failed to release lease: {}", e)))?;

    if deleted == 1 {
        debug!(resource = %key, "Lease released");
    } else {
        debug!(resource = %key, "Lease already expired or taken over");
    }

    Ok(())
}
