// src/exam/ticker.rs

use std::time::Duration;

use sqlx::SqlitePool;
use tokio::{sync::watch, task::JoinHandle, time::interval};

use super::{record, registry::SessionRegistry};

/// Spawns the one-second clock that drives every live session until `shutdown` flips to true.
pub fn spawn(
    pool: SqlitePool,
    registry: SessionRegistry,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut clock = interval(Duration::from_secs(1));
        // The first tick of a tokio interval completes immediately.
        clock.tick().await;

        loop {
            tokio::select! {
                _ = clock.tick() => {
                    run_tick(&pool, &registry).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Exam clock stopped");
                        break;
                    }
                }
            }
        }
    })
}

/// One clock step: tick all sessions, then record and evict the completed ones.
/// A session whose result cannot be saved stays registered and is retried on the next tick.
/// Returns how many results were recorded.
pub async fn run_tick(pool: &SqlitePool, registry: &SessionRegistry) -> usize {
    let mut recorded = 0;

    for shared in registry.tick_all().await {
        let mut live = shared.lock().await;
        // A submit may have stored it while this tick waited for the lock.
        if !live.awaiting_record() {
            continue;
        }
        match record::persist(pool, registry, &mut live).await {
            Ok(_) => recorded += 1,
            Err(e) => {
                tracing::error!(session_id = %live.id, "Failed to record completed exam: {}", e)
            }
        }
    }

    recorded
}
