//! Leader election for the processor framework (spec.md §4.5), backed by
//! PostgreSQL advisory locks on a dedicated connection -- the lock is held
//! for the lifetime of that connection, so losing the connection always
//! releases it, even on a crash.
use std::collections::HashMap;

use async_trait::async_trait;
use eventline::{EventStoreError, LeaderElector};
use md5::{Digest, Md5};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;

use crate::Error;

/// Derives a stable advisory lock key from a processor name. Two different
/// processor names hashing to the same key would merge their leadership --
/// collisions are accepted as astronomically unlikely for the handful of
/// named processors a deployment registers, the same tradeoff the teacher
/// makes hashing snapshot keys with MD5.
fn lock_key(processor_name: &str) -> i64 {
    let digest = Md5::digest(processor_name.as_bytes());
    i64::from_be_bytes(digest[0..8].try_into().expect("md5 digest is 16 bytes"))
}

/// One [`PgLeaderElector`] instance holds its advisory locks on dedicated
/// connections checked out from `pool`, keyed by processor name so a single
/// process can lead several processors concurrently.
pub struct PgLeaderElector {
    pool: PgPool,
    held: Mutex<HashMap<String, PoolConnection<Postgres>>>,
    instance_id: String,
}

impl PgLeaderElector {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            held: Mutex::new(HashMap::new()),
            instance_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[async_trait]
impl LeaderElector for PgLeaderElector {
    async fn try_acquire(&self, processor_name: &str) -> Result<bool, EventStoreError> {
        let mut held = self.held.lock().await;
        if held.contains_key(processor_name) {
            return Ok(true);
        }

        let mut conn = self.pool.acquire().await.map_err(Error::Database)?;
        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(lock_key(processor_name))
            .fetch_one(&mut *conn)
            .await
            .map_err(Error::Database)?;

        if acquired {
            held.insert(processor_name.to_string(), conn);
        }
        Ok(acquired)
    }

    async fn release(&self, processor_name: &str) -> Result<(), EventStoreError> {
        let mut held = self.held.lock().await;
        if let Some(mut conn) = held.remove(processor_name) {
            let _ = sqlx::query("SELECT pg_advisory_unlock($1)")
                .bind(lock_key(processor_name))
                .execute(&mut *conn)
                .await;
        }
        Ok(())
    }

    fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_key_is_stable_for_the_same_name() {
        assert_eq!(lock_key("outbox"), lock_key("outbox"));
        assert_ne!(lock_key("outbox"), lock_key("views"));
    }
}
