//! Store watchdog.
//!
//! Logs readiness of both stores and reconnects the relational store after
//! it reports a lost connection, after a fixed delay. One reconnect loop runs
//! at a time; it retries at the same delay until the store comes back.

use super::{Core, EventTable, Module};
use crate::db::Database;
use crate::error::ModuleError;
use crate::store::{StoreEvent, StoreEventKind, StoreFailure, StoreKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Default)]
pub struct ModelModule {
    /// Set while a reconnect loop is running.
    reconnecting: Arc<AtomicBool>,
    /// Cleared on unload so a running loop stops.
    active: Arc<AtomicBool>,
}

impl ModelModule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for ModelModule {
    fn name(&self) -> &'static str {
        "model"
    }

    fn load(&mut self, core: &Arc<Core>) -> Result<EventTable, ModuleError> {
        self.active.store(true, Ordering::SeqCst);
        let db = core.db.clone();
        let delay = core.config.database.reconnect_delay();
        let reconnecting = self.reconnecting.clone();
        let active = self.active.clone();

        Ok(EventTable::new()
            .on_store(StoreEventKind::Error, move |event| {
                let StoreEvent::Error(kind, failure) = event else {
                    return;
                };
                match (kind, failure) {
                    (StoreKind::Relational, StoreFailure::ConnectionLost(reason)) => {
                        error!(reason = %reason, "Database connection lost");
                        if !reconnecting.swap(true, Ordering::SeqCst) {
                            tokio::spawn(reconnect_loop(
                                db.clone(),
                                delay,
                                reconnecting.clone(),
                                active.clone(),
                            ));
                        }
                    }
                    (kind, failure) => {
                        warn!(store = ?kind, failure = ?failure, "Store error");
                    }
                }
            })
            .on_store(StoreEventKind::Ready, |event| {
                if let StoreEvent::Ready(kind) = event {
                    info!(store = ?kind, "Store ready");
                }
            }))
    }

    fn unload(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

async fn reconnect_loop(
    db: Database,
    delay: Duration,
    reconnecting: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
) {
    loop {
        tokio::time::sleep(delay).await;
        if !active.load(Ordering::SeqCst) {
            break;
        }
        crate::metrics::record_store_reconnect();
        match db.reconnect().await {
            Ok(()) => break,
            Err(e) => warn!(error = %e, delay_secs = delay.as_secs(), "Database reconnect failed, retrying"),
        }
    }
    reconnecting.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::ModuleHost;
    use crate::modules::testing::TestCore;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_connection_loss_triggers_reconnect() {
        let fixture = TestCore::new().await;
        let mut host = ModuleHost::new(fixture.core.clone(), vec![Box::new(ModelModule::new())]);
        host.load_all().unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        fixture.core.store_events.add_listener(
            StoreEventKind::Ready,
            Arc::new(move |event: &StoreEvent| {
                let _ = tx.send(event.clone());
            }),
        );

        fixture.core.db.pool().close().await;
        assert!(fixture.core.db.accounts().login("alice").await.is_err());

        let ready = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ready, StoreEvent::Ready(StoreKind::Relational));
        assert!(!fixture.core.db.accounts().login("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_query_errors_do_not_reconnect() {
        let fixture = TestCore::new().await;
        let mut host = ModuleHost::new(fixture.core.clone(), vec![Box::new(ModelModule::new())]);
        host.load_all().unwrap();

        let readies = Arc::new(Mutex::new(0));
        let r = readies.clone();
        fixture.core.store_events.add_listener(
            StoreEventKind::Ready,
            Arc::new(move |_: &StoreEvent| *r.lock() += 1),
        );

        fixture.core.store_events.emit(&StoreEvent::Error(
            StoreKind::Relational,
            StoreFailure::Query("syntax error".into()),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*readies.lock(), 0);
    }
}
