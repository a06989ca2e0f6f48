//! State persistence
//!
//! Snapshots of breaker state, weights, positions and trade history, saved
//! periodically and on shutdown so a restart resumes where it left off.

mod json_file;
mod types;

pub use json_file::JsonFileStore;
pub use types::{PersistenceError, StateSnapshot, SNAPSHOT_VERSION};

use async_trait::async_trait;
use std::time::Duration;

/// Durable home for the state snapshot
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Latest snapshot, or `None` if nothing was saved yet
    async fn load(&self) -> anyhow::Result<Option<StateSnapshot>>;
    async fn save(&self, snapshot: &StateSnapshot) -> Result<(), PersistenceError>;
}

/// Load the snapshot, treating any failure as a cold start
pub async fn load_or_default(store: &dyn StateStore) -> Option<StateSnapshot> {
    match store.load().await {
        Ok(Some(snapshot)) => {
            tracing::info!(
                cycle_id = snapshot.cycle_id,
                positions = snapshot.positions.len(),
                saved_at = %snapshot.saved_at,
                "Restored state snapshot"
            );
            Some(snapshot)
        }
        Ok(None) => {
            tracing::info!("No state snapshot found, starting fresh");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "State snapshot unreadable, starting fresh");
            None
        }
    }
}

/// Save, retrying once after `backoff`
pub async fn save_with_retry(
    store: &dyn StateStore,
    snapshot: &StateSnapshot,
    backoff: Duration,
) -> Result<(), PersistenceError> {
    match store.save(snapshot).await {
        Ok(()) => return Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "State save failed, retrying");
        }
    }
    tokio::time::sleep(backoff).await;
    store
        .save(snapshot)
        .await
        .map_err(|e| PersistenceError::SaveFailed {
            attempts: 2,
            last_error: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{BreakerLevel, CircuitBreakerState};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn snapshot() -> StateSnapshot {
        let now = Utc::now();
        StateSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: now,
            cycle_id: 7,
            breaker: CircuitBreakerState {
                level: BreakerLevel::Caution,
                trading_day: now.date_naive(),
                day_open_equity: dec!(3000),
                daily_pnl_pct: dec!(-0.06),
                cooldown_until: None,
            },
            weights: vec![],
            last_rebalance: now,
            positions: vec![],
            realized_pnl: dec!(-180),
            trades: vec![],
        }
    }

    /// Fails the first `failures` saves
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl StateStore for Flaky {
        async fn load(&self) -> anyhow::Result<Option<StateSnapshot>> {
            anyhow::bail!("corrupt")
        }

        async fn save(&self, _: &StateSnapshot) -> Result<(), PersistenceError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(PersistenceError::Io(std::io::Error::other("disk full")));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_json_store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested").join("state.json"));
        assert!(store.load().await.unwrap().is_none());

        let saved = snapshot();
        store.save(&saved).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();
        let store = JsonFileStore::new(&path);
        assert_err!(store.load().await);
        assert!(load_or_default(&store).await.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state.json"));
        let mut future = snapshot();
        future.version = SNAPSHOT_VERSION + 1;
        assert_ok!(store.save(&future).await);
        assert_err!(store.load().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_single_failure() {
        let store = Flaky {
            failures: 1,
            calls: AtomicU32::new(0),
        };
        save_with_retry(&store, &snapshot(), Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_second_failure() {
        let store = Flaky {
            failures: 5,
            calls: AtomicU32::new(0),
        };
        let err = save_with_retry(&store, &snapshot(), Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::SaveFailed { attempts: 2, .. }));
        assert!(load_or_default(&store).await.is_none());
    }
}
