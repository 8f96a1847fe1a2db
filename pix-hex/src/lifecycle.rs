//! Transaction Lifecycle Coordinator
//!
//! Owns the state of one PIX transaction from creation until it is paid,
//! expires, fails or is refunded, and runs the payer-facing countdown.
//!
//! Gateway calls never hold the state lock, so a slow processor cannot
//! stall the countdown. Creation is exclusive and polls are serialized.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use pix_types::{
    DEFAULT_VALIDITY_SECS, GatewayError, PaymentRequest, PixGateway, PixTransaction,
    TransactionStatus, ValidationErrors,
};

use crate::countdown::Countdown;

/// Where the checkout stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Nothing created yet, or the payer went back to the form.
    #[default]
    Idle,
    WaitingPayment,
    Paid,
    Expired,
    Failed,
    Refunded,
}

impl From<TransactionStatus> for Phase {
    fn from(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::WaitingPayment | TransactionStatus::Pending => Phase::WaitingPayment,
            TransactionStatus::Paid => Phase::Paid,
            TransactionStatus::Expired => Phase::Expired,
            TransactionStatus::Failed => Phase::Failed,
            TransactionStatus::Refunded => Phase::Refunded,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::WaitingPayment => "waiting_payment",
            Phase::Paid => "paid",
            Phase::Expired => "expired",
            Phase::Failed => "failed",
            Phase::Refunded => "refunded",
        };
        f.write_str(s)
    }
}

/// Observable state of the coordinator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LifecycleSnapshot {
    pub phase: Phase,
    pub remaining_secs: u64,
    pub transaction: Option<PixTransaction>,
    /// Why the last creation failed.
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("A PIX transaction is already being created")]
    CreateInFlight,

    #[error("A PIX transaction is already awaiting payment")]
    AlreadyActive,

    #[error("No active PIX transaction")]
    NotActive,

    #[error("The PIX code has expired. Generate a new one.")]
    Expired,

    #[error("The checkout was reset before the request completed")]
    Abandoned,

    #[error("The processor returned the charge as {0}, not awaiting payment")]
    NotPayable(TransactionStatus),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

#[derive(Default)]
struct State {
    phase: Phase,
    remaining_secs: u64,
    transaction: Option<PixTransaction>,
    error: Option<String>,
    countdown: Option<Countdown>,
    /// Bumped on every start and reset; stale ticks and replies compare against it.
    epoch: u64,
}

impl State {
    fn snapshot(&self) -> LifecycleSnapshot {
        LifecycleSnapshot {
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            transaction: self.transaction.clone(),
            error: self.error.clone(),
        }
    }

    fn stop_countdown(&mut self) {
        self.countdown = None;
    }
}

struct Shared {
    state: Mutex<State>,
    updates: watch::Sender<LifecycleSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &State) -> LifecycleSnapshot {
        let snapshot = state.snapshot();
        self.updates.send_replace(snapshot.clone());
        snapshot
    }
}

/// Coordinates one PIX transaction at a time against a gateway.
///
/// Dropping the coordinator stops any running countdown.
pub struct TransactionLifecycle<G: PixGateway> {
    gateway: G,
    shared: Arc<Shared>,
    creating: tokio::sync::Mutex<()>,
    polling: tokio::sync::Mutex<()>,
}

impl<G: PixGateway> TransactionLifecycle<G> {
    pub fn new(gateway: G) -> Self {
        let (updates, _) = watch::channel(LifecycleSnapshot::default());
        Self {
            gateway,
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                updates,
            }),
            creating: tokio::sync::Mutex::new(()),
            polling: tokio::sync::Mutex::new(()),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Current state.
    pub fn snapshot(&self) -> LifecycleSnapshot {
        self.shared.lock().snapshot()
    }

    /// Receiver notified on every state change, countdown ticks included.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Creates a transaction and starts the countdown.
    ///
    /// A failed creation leaves the coordinator in `Failed`; it is never
    /// retried here. Calling `start` again creates a new transaction.
    #[instrument(skip(self, request), fields(amount = request.amount.cents()))]
    pub async fn start(&self, request: PaymentRequest) -> Result<PixTransaction, LifecycleError> {
        let _creating = self
            .creating
            .try_lock()
            .map_err(|_| LifecycleError::CreateInFlight)?;

        let epoch = {
            let mut state = self.shared.lock();
            if state.phase == Phase::WaitingPayment {
                return Err(LifecycleError::AlreadyActive);
            }
            state.epoch += 1;
            state.epoch
        };

        let result = self.gateway.create_pix_transaction(&request).await;

        let mut state = self.shared.lock();
        if state.epoch != epoch {
            warn!("Checkout reset while the transaction was being created");
            return Err(LifecycleError::Abandoned);
        }

        match result {
            Ok(tx) if !tx.status().is_awaiting_payment() => {
                let err = LifecycleError::NotPayable(tx.status());
                warn!(transaction_id = %tx.id(), status = %tx.status(), "Created charge is not payable");
                state.phase = Phase::Failed;
                state.transaction = None;
                state.remaining_secs = 0;
                state.error = Some(err.to_string());
                state.stop_countdown();
                self.shared.publish(&state);
                Err(err)
            }
            Ok(tx) => {
                let validity = u64::try_from((tx.expires_at() - tx.created_at()).num_seconds())
                    .unwrap_or(u64::from(DEFAULT_VALIDITY_SECS))
                    .max(1);

                state.phase = Phase::WaitingPayment;
                state.remaining_secs = validity;
                state.transaction = Some(tx.clone());
                state.error = None;
                state.countdown = Some(Countdown::start(
                    Duration::from_secs(validity),
                    tick_handler(Arc::downgrade(&self.shared), epoch),
                ));
                self.shared.publish(&state);

                info!(transaction_id = %tx.id(), validity, "Awaiting PIX payment");
                Ok(tx)
            }
            Err(err) => {
                warn!(error = %err, "PIX transaction creation failed");
                state.phase = Phase::Failed;
                state.transaction = None;
                state.remaining_secs = 0;
                state.error = Some(err.to_string());
                state.stop_countdown();
                self.shared.publish(&state);
                Err(err.into())
            }
        }
    }

    /// Asks the gateway for the current status and adopts it.
    ///
    /// Only one query runs at a time; concurrent callers wait their turn.
    #[instrument(skip(self))]
    pub async fn check_status(&self) -> Result<LifecycleSnapshot, LifecycleError> {
        let _polling = self.polling.lock().await;

        let (id, epoch) = {
            let state = self.shared.lock();
            match (state.phase, state.transaction.as_ref()) {
                (Phase::WaitingPayment, Some(tx)) => (tx.id().clone(), state.epoch),
                (Phase::Expired, _) => return Err(LifecycleError::Expired),
                (Phase::Idle, _) | (_, None) => return Err(LifecycleError::NotActive),
                _ => return Ok(state.snapshot()),
            }
        };

        let snapshot = self.gateway.get_transaction(&id).await?;

        let mut state = self.shared.lock();
        if state.epoch != epoch {
            return Err(LifecycleError::Abandoned);
        }
        match state.phase {
            Phase::WaitingPayment => {}
            Phase::Expired => return Err(LifecycleError::Expired),
            _ => return Ok(state.snapshot()),
        }

        let Some(tx) = state.transaction.as_mut() else {
            return Err(LifecycleError::NotActive);
        };
        if let Err(err) = tx.apply(&snapshot) {
            warn!(error = %err, "Ignoring upstream status");
            return Ok(state.snapshot());
        }

        let status = tx.status();
        if !status.is_awaiting_payment() {
            state.phase = Phase::from(status);
            state.stop_countdown();
            info!(%status, remaining_secs = state.remaining_secs, "Transaction settled");
        }
        Ok(self.shared.publish(&state))
    }

    /// Cancels the transaction upstream.
    #[instrument(skip(self))]
    pub async fn cancel(&self) -> Result<LifecycleSnapshot, LifecycleError> {
        let (id, epoch) = {
            let state = self.shared.lock();
            match (state.phase, state.transaction.as_ref()) {
                (Phase::WaitingPayment | Phase::Paid, Some(tx)) => (tx.id().clone(), state.epoch),
                (Phase::Expired, _) => return Err(LifecycleError::Expired),
                _ => return Err(LifecycleError::NotActive),
            }
        };

        let snapshot = self.gateway.cancel_transaction(&id).await?;

        let mut state = self.shared.lock();
        if state.epoch != epoch {
            return Err(LifecycleError::Abandoned);
        }
        if let Some(tx) = state.transaction.as_mut() {
            if let Err(err) = tx.apply(&snapshot) {
                warn!(error = %err, "Cancel reply did not apply");
            }
        }
        state.phase = Phase::Refunded;
        state.stop_countdown();
        info!(transaction_id = %id, "Transaction refunded");
        Ok(self.shared.publish(&state))
    }

    /// Abandons the current transaction locally, without telling the
    /// gateway, and accepts a new `start`.
    #[instrument(skip(self))]
    pub fn reset(&self) {
        let mut state = self.shared.lock();
        state.epoch += 1;
        state.stop_countdown();
        if let Some(tx) = state.transaction.take() {
            info!(transaction_id = %tx.id(), "Transaction abandoned");
        }
        state.phase = Phase::Idle;
        state.remaining_secs = 0;
        state.error = None;
        self.shared.publish(&state);
    }
}

fn tick_handler(weak: Weak<Shared>, epoch: u64) -> impl FnMut(u64) -> ControlFlow<()> + Send + 'static {
    move |remaining| {
        let Some(shared) = weak.upgrade() else {
            return ControlFlow::Break(());
        };
        let mut state = shared.lock();
        if state.epoch != epoch || state.phase != Phase::WaitingPayment {
            return ControlFlow::Break(());
        }

        state.remaining_secs = remaining;
        if remaining > 0 {
            shared.publish(&state);
            return ControlFlow::Continue(());
        }

        let status = match state.transaction.as_mut() {
            Some(tx) => match tx.transition_to(TransactionStatus::Expired) {
                Ok(()) => TransactionStatus::Expired,
                Err(err) => {
                    warn!(error = %err, "Could not mark transaction expired");
                    tx.status()
                }
            },
            None => TransactionStatus::Expired,
        };
        state.phase = Phase::from(status);
        // This is the running task's own handle; it is released after the lock.
        let countdown = state.countdown.take();
        shared.publish(&state);
        drop(state);
        drop(countdown);

        info!(%status, "Countdown finished");
        ControlFlow::Break(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service_tests::tests::{MockGateway, payment_request};
    use std::sync::atomic::Ordering;

    fn lifecycle() -> TransactionLifecycle<Arc<MockGateway>> {
        TransactionLifecycle::new(Arc::new(MockGateway::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_enters_waiting_payment() {
        let lc = lifecycle();
        let tx = lc.start(payment_request()).await.unwrap();

        let snap = lc.snapshot();
        assert_eq!(snap.phase, Phase::WaitingPayment);
        assert_eq!(snap.remaining_secs, 900);
        assert_eq!(snap.transaction.as_ref().map(|t| t.id()), Some(tx.id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_after_validity_window() {
        let lc = lifecycle();
        lc.start(payment_request()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(899_500)).await;
        assert_eq!(lc.snapshot().phase, Phase::WaitingPayment);
        assert_eq!(lc.snapshot().remaining_secs, 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let snap = lc.snapshot();
        assert_eq!(snap.phase, Phase::Expired);
        assert_eq!(snap.remaining_secs, 0);
        assert_eq!(
            snap.transaction.map(|t| t.status()),
            Some(TransactionStatus::Expired)
        );

        // no further ticks
        let mut rx = lc.subscribe();
        rx.borrow_and_update();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(!rx.has_changed().unwrap());

        assert!(matches!(lc.check_status().await, Err(LifecycleError::Expired)));
        assert_eq!(lc.gateway().polls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paid_stops_countdown() {
        let lc = lifecycle();
        lc.start(payment_request()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500_500)).await;
        lc.gateway().set_status(TransactionStatus::Paid);
        let snap = lc.check_status().await.unwrap();

        assert_eq!(snap.phase, Phase::Paid);
        assert_eq!(snap.remaining_secs, 400);
        assert!(snap.transaction.unwrap().paid_at().is_some());

        tokio::time::sleep(Duration::from_secs(1000)).await;
        let snap = lc.snapshot();
        assert_eq!(snap.phase, Phase::Paid);
        assert_eq!(snap.remaining_secs, 400);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiting_status_keeps_counting() {
        let lc = lifecycle();
        lc.start(payment_request()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10_500)).await;
        let snap = lc.check_status().await.unwrap();
        assert_eq!(snap.phase, Phase::WaitingPayment);
        assert_eq!(snap.remaining_secs, 890);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(lc.snapshot().remaining_secs, 880);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_create_starts_countdown() {
        let lc = lifecycle();
        lc.gateway().set_create_status(TransactionStatus::Pending);
        lc.start(payment_request()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        let snap = lc.snapshot();
        assert_eq!(snap.phase, Phase::WaitingPayment);
        assert_eq!(snap.remaining_secs, 898);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_not_awaiting_payment_is_rejected() {
        for status in [
            TransactionStatus::Paid,
            TransactionStatus::Failed,
            TransactionStatus::Expired,
        ] {
            let lc = lifecycle();
            lc.gateway().set_create_status(status);

            let result = lc.start(payment_request()).await;
            assert!(
                matches!(result, Err(LifecycleError::NotPayable(s)) if s == status),
                "create returning {} must not be payable",
                status
            );

            let snap = lc.snapshot();
            assert_eq!(snap.phase, Phase::Failed);
            assert_eq!(snap.remaining_secs, 0);
            assert!(snap.transaction.is_none());
            assert!(snap.error.is_some());

            // no countdown was started
            let mut rx = lc.subscribe();
            rx.borrow_and_update();
            tokio::time::sleep(Duration::from_secs(901)).await;
            assert!(!rx.has_changed().unwrap());
            assert_eq!(lc.snapshot().phase, Phase::Failed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_final_status_stops_countdown() {
        for (status, phase) in [
            (TransactionStatus::Failed, Phase::Failed),
            (TransactionStatus::Expired, Phase::Expired),
            (TransactionStatus::Refunded, Phase::Refunded),
        ] {
            let lc = lifecycle();
            lc.start(payment_request()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(3_500)).await;

            lc.gateway().set_status(status);
            let snap = lc.check_status().await.unwrap();
            assert_eq!(snap.phase, phase);
            assert_eq!(snap.remaining_secs, 897);
            assert_eq!(snap.transaction.map(|t| t.status()), Some(status));

            tokio::time::sleep(Duration::from_secs(10)).await;
            let snap = lc.snapshot();
            assert_eq!(snap.phase, phase);
            assert_eq!(snap.remaining_secs, 897);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_create_abandons_it() {
        let lc = TransactionLifecycle::new(Arc::new(
            MockGateway::new().with_delay(Duration::from_secs(2)),
        ));

        let reset_later = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            lc.reset();
        };
        let (result, _) = tokio::join!(lc.start(payment_request()), reset_later);

        assert!(matches!(result, Err(LifecycleError::Abandoned)));
        let snap = lc.snapshot();
        assert_eq!(snap.phase, Phase::Idle);
        assert!(snap.transaction.is_none());
        assert_eq!(snap.remaining_secs, 0);

        let mut rx = lc.subscribe();
        rx.borrow_and_update();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!rx.has_changed().unwrap());

        // the checkout accepts a new charge
        lc.start(payment_request()).await.unwrap();
        assert_eq!(lc.snapshot().phase, Phase::WaitingPayment);
        assert_eq!(lc.gateway().creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_releases_countdown() {
        let lc = lifecycle();
        lc.start(payment_request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10_500)).await;

        lc.reset();
        let mut rx = lc.subscribe();
        assert_eq!(rx.borrow_and_update().phase, Phase::Idle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!rx.has_changed().unwrap());

        // a fresh start is accepted and nothing was cancelled upstream
        lc.start(payment_request()).await.unwrap();
        assert_eq!(lc.snapshot().remaining_secs, 900);
        assert_eq!(lc.gateway().creates.load(Ordering::SeqCst), 2);
        assert_eq!(lc.gateway().cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_start_rejected() {
        let lc = TransactionLifecycle::new(Arc::new(
            MockGateway::new().with_delay(Duration::from_secs(2)),
        ));

        let (first, second) = tokio::join!(
            lc.start(payment_request()),
            lc.start(payment_request())
        );

        assert!(first.is_ok());
        assert!(matches!(second, Err(LifecycleError::CreateInFlight)));
        assert_eq!(lc.gateway().creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_active_rejected() {
        let lc = lifecycle();
        lc.start(payment_request()).await.unwrap();

        let result = lc.start(payment_request()).await;
        assert!(matches!(result, Err(LifecycleError::AlreadyActive)));
        assert_eq!(lc.gateway().creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_create_is_not_retried() {
        let lc = lifecycle();
        lc.gateway().fail_next_create(422);

        let result = lc.start(payment_request()).await;
        assert!(matches!(
            result,
            Err(LifecycleError::Gateway(GatewayError::UpstreamRejected { status: 422, .. }))
        ));

        let snap = lc.snapshot();
        assert_eq!(snap.phase, Phase::Failed);
        assert!(snap.error.is_some());
        assert!(snap.transaction.is_none());
        assert_eq!(lc.gateway().creates.load(Ordering::SeqCst), 1);

        // explicit resubmission creates a new transaction
        lc.start(payment_request()).await.unwrap();
        assert_eq!(lc.snapshot().phase, Phase::WaitingPayment);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_refunds_and_stops_countdown() {
        let lc = lifecycle();
        lc.start(payment_request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5_500)).await;

        let snap = lc.cancel().await.unwrap();
        assert_eq!(snap.phase, Phase::Refunded);
        assert_eq!(
            snap.transaction.map(|t| t.status()),
            Some(TransactionStatus::Refunded)
        );

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(lc.snapshot().remaining_secs, 895);
    }

    #[tokio::test(start_paused = true)]
    async fn test_operations_without_transaction() {
        let lc = lifecycle();
        assert!(matches!(lc.check_status().await, Err(LifecycleError::NotActive)));
        assert!(matches!(lc.cancel().await, Err(LifecycleError::NotActive)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_are_serialized() {
        let lc = TransactionLifecycle::new(Arc::new(
            MockGateway::new().with_delay(Duration::from_secs(3)),
        ));
        lc.start(payment_request()).await.unwrap();

        let (a, b, c) = tokio::join!(lc.check_status(), lc.check_status(), lc.check_status());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(lc.gateway().polls.load(Ordering::SeqCst), 3);
        assert_eq!(lc.gateway().max_concurrent_polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_poll_does_not_stall_countdown() {
        let lc = TransactionLifecycle::new(Arc::new(
            MockGateway::new().with_delay(Duration::from_secs(8)),
        ));
        lc.start(payment_request()).await.unwrap();
        let started = tokio::time::Instant::now();
        let mut rx = lc.subscribe();

        let poll = lc.check_status();
        let watcher = async {
            rx.changed().await.unwrap();
            started.elapsed()
        };
        let (_, first_tick) = tokio::join!(poll, watcher);
        assert!(first_tick < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_countdown() {
        let lc = lifecycle();
        lc.start(payment_request()).await.unwrap();
        let rx = lc.subscribe();

        drop(lc);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.has_changed().is_err());
    }
}
