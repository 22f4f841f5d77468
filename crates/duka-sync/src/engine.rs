//! # Sync Engine
//!
//! Background reconciliation loop: drains the queue toward the remote
//! authority (push) and merges authoritative snapshots back into the
//! local store (pull).
//!
//! ## Engine Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          SyncEngine                                     │
//! │                                                                         │
//! │   push interval ──┐                                                     │
//! │   pull interval ──┼──▶ tokio::select! ──▶ flush() / pull()             │
//! │   commands ───────┘      (TriggerPush, TriggerPull, Shutdown)          │
//! │                                                                         │
//! │   flush():                                                             │
//! │     1. skip while AuthRequired or inside a backoff window              │
//! │     2. probe if offline; bail if still unreachable                     │
//! │     3. peek a FIFO batch, POST it as ONE ordered request               │
//! │     4. ack confirmed ops, requeue the rest IN PLACE                    │
//! │     5. on success: reset backoff, pull corrections                     │
//! │        on failure: exponential backoff (500ms → 60s, x2)               │
//! │                                                                         │
//! │   The queue itself never leaves FIFO order; a batch that fails         │
//! │   retries from the same position, so a customer creation always        │
//! │   lands before the balance update that references it.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Instant;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use duka_core::SyncOperation;

use crate::client::{PushResponse, RemoteAuthority};
use crate::config::SyncSettings;
use crate::connection::{ConnectionMonitor, ConnectionState};
use crate::queue::SyncQueue;
use crate::store::LocalStore;

// =============================================================================
// Engine Commands
// =============================================================================

/// Commands accepted by a running engine.
#[derive(Debug)]
enum EngineCommand {
    /// Flush the queue now, ignoring any backoff window.
    TriggerPush,

    /// Pull a snapshot now.
    TriggerPull,

    /// Stop the loop.
    Shutdown,
}

// =============================================================================
// Engine Handle
// =============================================================================

/// Handle for nudging a running [`SyncEngine`] from outside.
#[derive(Debug, Clone)]
pub struct SyncEngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

impl SyncEngineHandle {
    /// Asks the engine to flush immediately. Non-blocking; if the
    /// command channel is full a flush is already queued up, so
    /// dropping the nudge loses nothing.
    pub fn trigger_push(&self) {
        let _ = self.cmd_tx.try_send(EngineCommand::TriggerPush);
    }

    /// Asks the engine to pull a snapshot immediately.
    pub fn trigger_pull(&self) {
        let _ = self.cmd_tx.try_send(EngineCommand::TriggerPull);
    }

    /// Signals the engine to stop gracefully.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown).await;
    }
}

// =============================================================================
// Sync Engine
// =============================================================================

/// The reconciliation actor. Create with [`SyncEngine::new`], then hand
/// the engine to `tokio::spawn(engine.run())` and keep the handle.
pub struct SyncEngine {
    store: Arc<LocalStore>,
    queue: Arc<SyncQueue>,
    monitor: Arc<ConnectionMonitor>,
    remote: Arc<dyn RemoteAuthority>,
    settings: SyncSettings,

    cmd_rx: mpsc::Receiver<EngineCommand>,

    /// Reset after every successful flush.
    backoff: ExponentialBackoff,

    /// Interval-driven flushes are skipped until this instant after a
    /// failure. Manual triggers bypass it.
    deferred_until: Option<Instant>,
}

impl SyncEngine {
    /// Creates an engine and its control handle.
    pub fn new(
        store: Arc<LocalStore>,
        queue: Arc<SyncQueue>,
        monitor: Arc<ConnectionMonitor>,
        remote: Arc<dyn RemoteAuthority>,
        settings: SyncSettings,
    ) -> (Self, SyncEngineHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(8);

        let backoff = ExponentialBackoff {
            initial_interval: settings.initial_backoff(),
            max_interval: settings.max_backoff(),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let engine = SyncEngine {
            store,
            queue,
            monitor,
            remote,
            settings,
            cmd_rx,
            backoff,
            deferred_until: None,
        };

        (engine, SyncEngineHandle { cmd_tx })
    }

    /// Main loop. Runs until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!(
            push_interval_secs = self.settings.push_interval_secs,
            pull_interval_secs = self.settings.pull_interval_secs,
            batch_size = self.settings.batch_size,
            "Sync engine started"
        );

        let mut push_tick = tokio::time::interval(self.settings.push_interval());
        push_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut pull_tick = tokio::time::interval(self.settings.pull_interval());
        pull_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = push_tick.tick() => {
                    self.flush(false).await;
                }

                _ = pull_tick.tick() => {
                    self.pull().await;
                }

                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(EngineCommand::TriggerPush) => self.flush(true).await,
                        Some(EngineCommand::TriggerPull) => self.pull().await,
                        Some(EngineCommand::Shutdown) | None => break,
                    }
                }
            }
        }

        info!("Sync engine stopped");
    }

    // =========================================================================
    // Push
    // =========================================================================

    /// Attempts to push one batch. `force` bypasses the backoff window
    /// (an operator tapping "sync now" should not wait it out).
    async fn flush(&mut self, force: bool) {
        if self.queue.is_empty().await {
            return;
        }

        if !force {
            if let Some(until) = self.deferred_until {
                if Instant::now() < until {
                    debug!("Flush deferred by backoff window");
                    return;
                }
            }
        }

        if self.monitor.state() == ConnectionState::AuthRequired {
            debug!("Flush skipped: credential rejected, waiting for reconnect");
            return;
        }

        if !self.monitor.is_online() && !self.monitor.probe(self.remote.as_ref()).await {
            return;
        }

        let batch = self.queue.peek_batch(self.settings.batch_size).await;
        if batch.is_empty() {
            return;
        }

        match self.remote.push_operations(&batch).await {
            Ok(response) => {
                self.monitor.mark_online();
                self.backoff.reset();
                self.deferred_until = None;

                self.settle_batch(&batch, response).await;

                // The authority may have adjusted what we pushed (stale
                // balances, price corrections). Pull right away so the
                // local view converges.
                self.pull().await;
            }

            Err(e) => {
                if e.is_auth_error() {
                    self.monitor.mark_auth_required();
                } else {
                    self.monitor.mark_offline();
                }

                for op in &batch {
                    self.queue.requeue(&op.id).await;
                }

                let delay = self
                    .backoff
                    .next_backoff()
                    .unwrap_or_else(|| self.settings.max_backoff());
                self.deferred_until = Some(Instant::now() + delay);

                warn!(
                    count = batch.len(),
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Push failed, batch requeued"
                );
            }
        }
    }

    /// Acknowledges what the authority confirmed and requeues the rest.
    async fn settle_batch(&self, batch: &[SyncOperation], response: PushResponse) {
        match response.results {
            // Per-operation outcomes: follow them. An op the authority
            // did not mention is unconfirmed and stays queued.
            Some(results) => {
                let mut confirmed = std::collections::HashSet::new();
                for outcome in &results {
                    if outcome.success {
                        self.queue.acknowledge(&outcome.id).await;
                        confirmed.insert(outcome.id.clone());
                    } else {
                        warn!(
                            id = %outcome.id,
                            error = outcome.error.as_deref().unwrap_or("unspecified"),
                            "Operation rejected by remote, keeping queued"
                        );
                    }
                }

                for op in batch {
                    if !confirmed.contains(&op.id) {
                        self.queue.requeue(&op.id).await;
                    }
                }
            }

            // Bare acknowledgement covers the whole batch.
            None if response.success => {
                for op in batch {
                    self.queue.acknowledge(&op.id).await;
                }
                debug!(count = batch.len(), "Batch acknowledged");
            }

            None => {
                for op in batch {
                    self.queue.requeue(&op.id).await;
                }
                warn!(count = batch.len(), "Batch rejected without detail, requeued");
            }
        }
    }

    // =========================================================================
    // Pull
    // =========================================================================

    /// Fetches the authoritative snapshot and merges it, protecting
    /// entities with pending queue operations.
    async fn pull(&mut self) {
        if self.monitor.state() == ConnectionState::AuthRequired {
            debug!("Pull skipped: credential rejected");
            return;
        }

        match self.remote.fetch_snapshot().await {
            Ok(snapshot) => {
                self.monitor.mark_online();
                let protected = self.queue.pending_entity_ids().await;
                self.store.apply_remote(snapshot, &protected).await;
            }

            Err(e) => {
                if e.is_auth_error() {
                    self.monitor.mark_auth_required();
                } else {
                    self.monitor.mark_offline();
                }
                debug!(error = %e, "Pull failed");
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    use duka_core::{ClosingReport, CreditCustomer, SyncOperationKind, Transaction};
    use duka_db::{Database, DbConfig};

    use crate::client::{OperationOutcome, RemoteSnapshot};
    use crate::error::{SyncError, SyncResult};

    /// Scripted remote: records pushed batches, answers from a queue of
    /// canned results (defaulting to a whole-batch ack).
    #[derive(Default)]
    struct FakeRemote {
        pushes: Mutex<Vec<Vec<SyncOperation>>>,
        push_results: Mutex<VecDeque<SyncResult<PushResponse>>>,
        snapshot: Mutex<RemoteSnapshot>,
    }

    impl FakeRemote {
        async fn script_push(&self, result: SyncResult<PushResponse>) {
            self.push_results.lock().await.push_back(result);
        }

        async fn pushed_batches(&self) -> Vec<Vec<SyncOperation>> {
            self.pushes.lock().await.clone()
        }

        async fn set_snapshot(&self, snapshot: RemoteSnapshot) {
            *self.snapshot.lock().await = snapshot;
        }
    }

    #[async_trait]
    impl RemoteAuthority for FakeRemote {
        async fn probe(&self) -> SyncResult<()> {
            Ok(())
        }

        async fn fetch_snapshot(&self) -> SyncResult<RemoteSnapshot> {
            Ok(self.snapshot.lock().await.clone())
        }

        async fn push_operations(&self, operations: &[SyncOperation]) -> SyncResult<PushResponse> {
            self.pushes.lock().await.push(operations.to_vec());
            self.push_results
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(PushResponse::default()))
        }

        async fn print_receipt(&self, _: &Transaction) -> SyncResult<()> {
            Ok(())
        }

        async fn print_report(&self, _: &ClosingReport) -> SyncResult<()> {
            Ok(())
        }
    }

    async fn test_engine(remote: Arc<FakeRemote>) -> (SyncEngine, Arc<SyncQueue>, Arc<LocalStore>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = Arc::new(LocalStore::load(db.clone()).await.unwrap());
        let queue = Arc::new(SyncQueue::load(db).await.unwrap());
        let monitor = Arc::new(ConnectionMonitor::new());

        let (engine, _handle) = SyncEngine::new(
            store.clone(),
            queue.clone(),
            monitor,
            remote,
            SyncSettings::default(),
        );

        (engine, queue, store)
    }

    fn op(kind: SyncOperationKind, entity_id: &str) -> SyncOperation {
        SyncOperation::new(kind, entity_id, json!({ "id": entity_id }))
    }

    #[tokio::test]
    async fn test_successful_flush_acknowledges_whole_batch() {
        let remote = Arc::new(FakeRemote::default());
        let (mut engine, queue, _) = test_engine(remote.clone()).await;

        queue.enqueue(op(SyncOperationKind::CreateTransaction, "t1")).await;
        queue.enqueue(op(SyncOperationKind::CreateTransaction, "t2")).await;

        engine.flush(true).await;

        assert!(queue.is_empty().await);
        assert!(engine.monitor.is_online());

        let batches = remote.pushed_batches().await;
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[tokio::test]
    async fn test_failed_flush_requeues_batch_in_order() {
        let remote = Arc::new(FakeRemote::default());
        remote
            .script_push(Err(SyncError::Unreachable("connection refused".into())))
            .await;

        let (mut engine, queue, _) = test_engine(remote.clone()).await;

        let a = op(SyncOperationKind::AddCreditCustomer, "c1");
        let b = op(SyncOperationKind::UpdateCreditCustomer, "c1");
        queue.enqueue(a.clone()).await;
        queue.enqueue(b.clone()).await;

        engine.flush(true).await;

        let pending = queue.peek_batch(10).await;
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, a.id);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[1].id, b.id);
        assert_eq!(engine.monitor.state(), ConnectionState::Offline);
        assert!(engine.deferred_until.is_some());
    }

    #[tokio::test]
    async fn test_per_operation_outcomes_ack_partially() {
        let remote = Arc::new(FakeRemote::default());
        let (mut engine, queue, _) = test_engine(remote.clone()).await;

        let a = op(SyncOperationKind::CreateTransaction, "t1");
        let b = op(SyncOperationKind::UpdateCreditCustomer, "c1");
        let c = op(SyncOperationKind::CreateTransaction, "t2");
        queue.enqueue(a.clone()).await;
        queue.enqueue(b.clone()).await;
        queue.enqueue(c.clone()).await;

        remote
            .script_push(Ok(PushResponse {
                success: false,
                results: Some(vec![
                    OperationOutcome { id: a.id.clone(), success: true, error: None },
                    OperationOutcome {
                        id: b.id.clone(),
                        success: false,
                        error: Some("stale balance".into()),
                    },
                    OperationOutcome { id: c.id.clone(), success: true, error: None },
                ]),
            }))
            .await;

        engine.flush(true).await;

        let pending = queue.peek_batch(10).await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b.id);
        assert_eq!(pending[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_auth_rejection_halts_pushing_until_reconnect() {
        let remote = Arc::new(FakeRemote::default());
        remote.script_push(Err(SyncError::AuthRequired)).await;

        let (mut engine, queue, _) = test_engine(remote.clone()).await;
        queue.enqueue(op(SyncOperationKind::CreateTransaction, "t1")).await;

        engine.flush(true).await;
        assert_eq!(engine.monitor.state(), ConnectionState::AuthRequired);
        assert_eq!(queue.pending_count().await, 1);

        // Further flushes do not hit the network while AuthRequired.
        engine.flush(true).await;
        assert_eq!(remote.pushed_batches().await.len(), 1);
    }

    #[tokio::test]
    async fn test_backoff_defers_interval_flushes_but_not_manual() {
        let remote = Arc::new(FakeRemote::default());
        remote
            .script_push(Err(SyncError::Unreachable("down".into())))
            .await;

        let (mut engine, queue, _) = test_engine(remote.clone()).await;
        queue.enqueue(op(SyncOperationKind::CreateTransaction, "t1")).await;

        engine.flush(true).await;
        assert_eq!(remote.pushed_batches().await.len(), 1);

        // Interval-driven flush inside the backoff window is a no-op.
        engine.flush(false).await;
        assert_eq!(remote.pushed_batches().await.len(), 1);

        // A manual trigger goes through anyway.
        engine.flush(true).await;
        let batches = remote.pushed_batches().await;
        assert_eq!(batches.len(), 2);
        assert!(queue.is_empty().await);

        // The retry pushes the very same operation: same id, same
        // payload. Only the attempt counter moved.
        assert_eq!(batches[1].len(), 1);
        assert_eq!(batches[1][0].id, batches[0][0].id);
        assert_eq!(batches[1][0].payload, batches[0][0].payload);
        assert_eq!(batches[1][0].attempts, batches[0][0].attempts + 1);
    }

    #[tokio::test]
    async fn test_empty_queue_never_hits_the_network() {
        let remote = Arc::new(FakeRemote::default());
        let (mut engine, _, _) = test_engine(remote.clone()).await;

        engine.flush(true).await;
        assert!(remote.pushed_batches().await.is_empty());
    }

    #[tokio::test]
    async fn test_pull_protects_entities_with_pending_operations() {
        let remote = Arc::new(FakeRemote::default());
        let (mut engine, queue, store) = test_engine(remote.clone()).await;

        let local = CreditCustomer {
            id: "c1".to_string(),
            name: "Wanjiku".to_string(),
            phone: None,
            balance: 600,
            created_at: chrono::Utc::now(),
        };
        store.add_credit_customer(local.clone()).await;
        queue.enqueue(op(SyncOperationKind::UpdateCreditCustomer, "c1")).await;

        // The authority still holds the pre-update balance.
        remote
            .set_snapshot(RemoteSnapshot {
                credit_customers: vec![CreditCustomer { balance: 100, ..local }],
                ..Default::default()
            })
            .await;

        engine.pull().await;

        let merged = store.get_credit_customer("c1").await.unwrap();
        assert_eq!(merged.balance, 600);
    }

    #[tokio::test]
    async fn test_successful_flush_pulls_corrections() {
        let remote = Arc::new(FakeRemote::default());
        let (mut engine, queue, store) = test_engine(remote.clone()).await;

        remote
            .set_snapshot(RemoteSnapshot {
                credit_customers: vec![CreditCustomer {
                    id: "c9".to_string(),
                    name: "Otieno".to_string(),
                    phone: None,
                    balance: 1200,
                    created_at: chrono::Utc::now(),
                }],
                ..Default::default()
            })
            .await;

        queue.enqueue(op(SyncOperationKind::CreateTransaction, "t1")).await;
        engine.flush(true).await;

        // The post-push pull landed the authority's state locally.
        assert!(store.get_credit_customer("c9").await.is_some());
    }
}
