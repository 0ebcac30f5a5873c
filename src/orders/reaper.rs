use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;

use crate::orders::store::OrderStore;

/// Periodic eviction task for the order store.
///
/// Runs as an independent tokio task; a `watch` channel from `main` stops
/// it during graceful shutdown. A reap cycle never fails, so the loop has
/// no error path to propagate.
pub struct ReaperWorker {
    store: Arc<dyn OrderStore>,
    interval: Duration,
}

impl ReaperWorker {
    pub fn new(store: Arc<dyn OrderStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "order store reaper started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    let removed = self.store.reap().await;
                    if removed > 0 {
                        info!(removed, "evicted stale orders");
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("order store reaper stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::store::InMemoryOrderStore;
    use crate::orders::types::{NewOrder, OrderPatch, OrderStatus};

    #[tokio::test]
    async fn reaper_stops_on_shutdown_signal() {
        let store = Arc::new(InMemoryOrderStore::new(Duration::from_secs(60)));
        let worker = ReaperWorker::new(store, Duration::from_secs(3600));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(worker.run(rx));
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should exit promptly")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_evicts_on_interval() {
        let store = Arc::new(InMemoryOrderStore::new(Duration::from_secs(60)));
        store.insert("done", NewOrder::default()).await.unwrap();
        store
            .update("done", OrderPatch::status(OrderStatus::Paid))
            .await
            .unwrap();

        let worker = ReaperWorker::new(store.clone(), Duration::from_secs(300));
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(worker.run(rx));

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(store.get("done").await.is_none());

        tx.send(true).unwrap();
        let _ = handle.await;
    }
}
