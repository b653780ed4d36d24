//! Cooperative sync scheduling: periodic timer plus foreground triggers
//!
//! Every trigger funnels through the engine's single-flight guard, so a
//! tick landing mid-sync is simply dropped. The loop never dies on sync
//! errors; they are already recorded by the engine.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::engine::{SyncEngine, SyncOutcome};

/// Default periodic sync interval
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(2 * 60);

#[derive(Debug)]
enum SchedulerEvent {
    Foreground,
    Shutdown,
}

/// Handle to the background sync loop
pub struct SyncScheduler {
    events: mpsc::UnboundedSender<SchedulerEvent>,
    task: JoinHandle<()>,
}

impl SyncScheduler {
    /// Spawn the sync loop; the first attempt fires immediately, then every
    /// `interval`
    #[must_use]
    pub fn start(engine: SyncEngine, interval: Duration) -> Self {
        let (events, mut receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => attempt(&engine, "timer").await,
                    event = receiver.recv() => match event {
                        Some(SchedulerEvent::Foreground) => attempt(&engine, "foreground").await,
                        Some(SchedulerEvent::Shutdown) | None => break,
                    }
                }
            }
            tracing::debug!("sync scheduler stopped");
        });
        Self { events, task }
    }

    /// Trigger an immediate sync attempt, as on app foreground
    pub fn notify_foreground(&self) {
        let _ = self.events.send(SchedulerEvent::Foreground);
    }

    /// Stop the loop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.events.send(SchedulerEvent::Shutdown);
        let _ = self.task.await;
    }
}

async fn attempt(engine: &SyncEngine, trigger: &str) {
    match engine.sync_now().await {
        Ok(SyncOutcome::Completed) => tracing::debug!(trigger, "scheduled sync completed"),
        Ok(SyncOutcome::AlreadyInFlight) => {
            tracing::debug!(trigger, "sync already in flight, trigger dropped");
        }
        Ok(SyncOutcome::NotConnected) => {}
        // Already recorded on the engine for display
        Err(error) => tracing::warn!(trigger, %error, "scheduled sync failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use crate::storage::MemoryStorage;
    use crate::store::LocalStore;
    use std::sync::Arc;

    async fn connected_engine() -> (SyncEngine, Arc<MemoryRemote>) {
        let storage = Arc::new(MemoryStorage::new());
        let remote = Arc::new(MemoryRemote::new());
        let store = LocalStore::open(storage.clone()).await.unwrap();
        let engine = SyncEngine::new(store, remote.clone(), remote.clone(), storage);
        engine.load().await.unwrap();
        engine
            .create_farm("smith-farm", "Smith Farm", "Sam", None)
            .await
            .unwrap();
        (engine, remote)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn periodic_timer_keeps_syncing() {
        let (engine, remote) = connected_engine().await;
        let scheduler = SyncScheduler::start(engine, Duration::from_millis(25));

        tokio::time::sleep(Duration::from_millis(200)).await;
        scheduler.shutdown().await;

        assert!(remote.select_calls() >= 2, "expected repeated pulls");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn foreground_trigger_forces_an_attempt() {
        let (engine, remote) = connected_engine().await;
        let scheduler = SyncScheduler::start(engine, Duration::from_secs(3600));

        // Let the immediate first tick finish, then trigger manually
        tokio::time::sleep(Duration::from_millis(100)).await;
        let after_first = remote.select_calls();
        scheduler.notify_foreground();
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown().await;

        assert!(remote.select_calls() > after_first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn loop_survives_remote_failures() {
        let (engine, remote) = connected_engine().await;
        remote.set_failing(true);
        let scheduler = SyncScheduler::start(engine.clone(), Duration::from_millis(25));

        tokio::time::sleep(Duration::from_millis(100)).await;
        remote.set_failing(false);
        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.shutdown().await;

        // Recovered after the outage
        assert_eq!(engine.status().await.last_error, None);
        assert!(engine.status().await.last_sync_at.is_some());
    }
}
