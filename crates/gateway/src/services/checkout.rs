//! Capture coordinator: the two-phase capture-then-grant workflow.
//!
//! There is no transaction spanning the processor call and the store update,
//! so the coordinator brackets the flow with a durable capture log and an
//! in-process per-order guard:
//!
//! 1. acquire the per-order guard (rejects concurrent double-submits)
//! 2. record `capture_requested` in the log (rejects repeat submissions,
//!    detects grant-pending attempts to reconcile)
//! 3. capture with the processor
//! 4. advance the log, grant the entitlement, advance the log again
//!
//! The ordering invariant - entitlement is never granted without a prior
//! successful capture for the same order, and capture is never submitted
//! twice for one order - is upheld here, not in the HTTP layer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use planora_core::{CapturePhase, OrderId, UserEntitlement, UserId};

use crate::db::{BeginCapture, CaptureLogEntry, RepositoryError};
use crate::paypal::{CaptureResult, PayPalError};

/// Processor-side capture call, as the coordinator sees it.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Finalize the monetary capture for an approved order.
    async fn capture_order(&self, order_id: &OrderId) -> Result<CaptureResult, PayPalError>;
}

/// Durable store operations the coordinator drives.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Start a capture attempt, or report the phase already on record.
    ///
    /// A `capture_failed` row is reclaimed rather than reported: no money
    /// moved, so a fresh capture is legitimate, and the row returns to
    /// `capture_requested` bound to the new submitter. Without the re-bind,
    /// a retry by a different user would capture their money but leave the
    /// row pointing at the original submitter, stranding the grant.
    async fn begin_capture(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
    ) -> Result<BeginCapture, RepositoryError>;

    /// Fetch the capture log entry for an order.
    async fn capture_log(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<CaptureLogEntry>, RepositoryError>;

    /// Record a confirmed capture with its raw processor payload.
    async fn mark_captured(
        &self,
        order_id: &OrderId,
        payload: &serde_json::Value,
        captured_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Record terminal success.
    async fn mark_granted(&self, order_id: &OrderId) -> Result<(), RepositoryError>;

    /// Record a processor-side capture failure.
    async fn mark_capture_failed(&self, order_id: &OrderId) -> Result<(), RepositoryError>;

    /// Flip the user's entitlement on. Must be idempotent by user id.
    async fn grant_subscription(
        &self,
        user_id: &UserId,
        expires_at: DateTime<Utc>,
    ) -> Result<UserEntitlement, RepositoryError>;
}

/// Errors from the capture-then-grant flow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Another request is capturing this order right now.
    #[error("capture already in flight for order {0}")]
    CaptureInFlight(OrderId),

    /// The capture log already holds a record for this order.
    #[error("order {order_id} already processed (phase: {phase})")]
    DuplicateCapture {
        order_id: OrderId,
        phase: CapturePhase,
    },

    /// The order on record belongs to a different user.
    #[error("order {0} was submitted for a different user")]
    UserMismatch(OrderId),

    /// Processor rejected or failed the capture. No money moved, no
    /// entitlement touched.
    #[error("capture failed: {0}")]
    Capture(#[from] PayPalError),

    /// Money was captured but the entitlement update failed. Requires
    /// reconciliation (grant retry only - never re-capture).
    #[error("payment captured but entitlement grant failed: {source}")]
    GrantFailed {
        capture: CaptureResult,
        source: RepositoryError,
    },

    /// Store failure before any capture was submitted. Fails closed.
    #[error("store error: {0}")]
    Store(#[from] RepositoryError),
}

/// Composite result of a completed flow.
#[derive(Debug)]
pub struct CheckoutSuccess {
    /// The processor capture, raw payload included.
    pub payment: CaptureResult,
    /// The updated entitlement record.
    pub entitlement: UserEntitlement,
}

/// In-process guard serializing capture attempts per order id.
///
/// Held only for the duration of one flow invocation; the durable dedup
/// record is the capture log. This guard exists to close the double-submit
/// race between two concurrent requests on the same instance.
#[derive(Clone, Default)]
pub struct OrderGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl OrderGuard {
    /// Create an empty guard.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim an order id. Returns `None` if a claim is already held.
    #[must_use]
    pub fn try_acquire(&self, order_id: &OrderId) -> Option<OrderPermit> {
        let mut held = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !held.insert(order_id.as_str().to_owned()) {
            return None;
        }
        Some(OrderPermit {
            guard: Arc::clone(&self.in_flight),
            order_id: order_id.as_str().to_owned(),
        })
    }
}

/// RAII claim on an order id; released on drop.
pub struct OrderPermit {
    guard: Arc<Mutex<HashSet<String>>>,
    order_id: String,
}

impl Drop for OrderPermit {
    fn drop(&mut self) {
        self.guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.order_id);
    }
}

/// The capture coordinator.
#[derive(Clone)]
pub struct CheckoutService<P, S> {
    processor: P,
    store: S,
    guard: OrderGuard,
}

impl<P, S> CheckoutService<P, S>
where
    P: PaymentProcessor,
    S: EntitlementStore,
{
    /// Create a new coordinator.
    pub fn new(processor: P, store: S) -> Self {
        Self {
            processor,
            store,
            guard: OrderGuard::new(),
        }
    }

    /// The entitlement store behind this coordinator.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run the capture-then-grant flow for an approved order.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`]. `GrantFailed` is the partial-failure case the
    /// HTTP boundary must report distinctly.
    pub async fn capture_and_grant(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
    ) -> Result<CheckoutSuccess, CheckoutError> {
        let _permit = self
            .guard
            .try_acquire(order_id)
            .ok_or_else(|| CheckoutError::CaptureInFlight(order_id.clone()))?;

        match self.store.begin_capture(order_id, user_id).await? {
            BeginCapture::Started => {}
            BeginCapture::AlreadyRecorded(phase) => match phase {
                // A previous attempt captured but never recorded the grant.
                // Retry the grant only; re-capturing would move money twice.
                CapturePhase::CapturedGrantPending => {
                    return self.reconcile_pending_grant(order_id, user_id).await;
                }
                // Failed attempts are reclaimed by `begin_capture` (the row
                // re-binds to the new submitter), so any phase still on
                // record is a duplicate. Fails closed.
                CapturePhase::CaptureRequested
                | CapturePhase::EntitlementGranted
                | CapturePhase::CaptureFailed => {
                    return Err(CheckoutError::DuplicateCapture {
                        order_id: order_id.clone(),
                        phase,
                    });
                }
            },
        }

        let capture = match self.processor.capture_order(order_id).await {
            Ok(capture) => capture,
            Err(e) => {
                if let Err(log_err) = self.store.mark_capture_failed(order_id).await {
                    tracing::warn!(
                        order_id = %order_id,
                        error = %log_err,
                        "failed to record capture failure"
                    );
                }
                return Err(CheckoutError::Capture(e));
            }
        };

        // From here on money has moved. Log bookkeeping failures must not
        // abort the grant; the log row is advanced best-effort and the grant
        // outcome decides the response.
        if let Err(e) = self
            .store
            .mark_captured(order_id, &capture.raw, capture.captured_at)
            .await
        {
            tracing::error!(
                order_id = %order_id,
                error = %e,
                "capture succeeded but capture log was not advanced"
            );
        }

        self.grant(order_id, user_id, capture).await
    }

    /// Grant the entitlement for a confirmed capture and close out the log.
    async fn grant(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
        capture: CaptureResult,
    ) -> Result<CheckoutSuccess, CheckoutError> {
        let expires_at = UserEntitlement::period_end(capture.captured_at);

        let entitlement = match self.store.grant_subscription(user_id, expires_at).await {
            Ok(entitlement) => entitlement,
            Err(source) => {
                tracing::error!(
                    order_id = %order_id,
                    user_id = %user_id,
                    error = %source,
                    "payment captured but entitlement grant failed - needs reconciliation"
                );
                return Err(CheckoutError::GrantFailed { capture, source });
            }
        };

        if let Err(e) = self.store.mark_granted(order_id).await {
            tracing::warn!(
                order_id = %order_id,
                error = %e,
                "entitlement granted but capture log was not closed"
            );
        }

        tracing::info!(
            order_id = %order_id,
            user_id = %user_id,
            "checkout complete, entitlement granted"
        );

        Ok(CheckoutSuccess {
            payment: capture,
            entitlement,
        })
    }

    /// Resume an attempt stuck in `captured_grant_pending`.
    ///
    /// Uses the payload recorded at capture time; the processor is not called
    /// again.
    async fn reconcile_pending_grant(
        &self,
        order_id: &OrderId,
        user_id: &UserId,
    ) -> Result<CheckoutSuccess, CheckoutError> {
        let entry = self
            .store
            .capture_log(order_id)
            .await?
            .ok_or(CheckoutError::Store(RepositoryError::NotFound))?;

        if entry.user_id != *user_id {
            return Err(CheckoutError::UserMismatch(order_id.clone()));
        }

        let capture = CaptureResult {
            order_id: order_id.clone(),
            raw: entry.processor_payload.unwrap_or(serde_json::Value::Null),
            captured_at: entry.captured_at.unwrap_or(entry.updated_at),
        };

        tracing::info!(
            order_id = %order_id,
            user_id = %user_id,
            "retrying entitlement grant for a previously captured order"
        );

        self.grant(order_id, user_id, capture).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    type CallLog = Arc<StdMutex<Vec<String>>>;

    fn order() -> OrderId {
        OrderId::new("5O190127TN364715T")
    }

    fn user() -> UserId {
        UserId::new("u-123")
    }

    fn capture_payload() -> serde_json::Value {
        serde_json::json!({"id": "5O190127TN364715T", "status": "COMPLETED"})
    }

    /// Processor double that records calls and can fail or stall.
    struct FakeProcessor {
        calls: CallLog,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl PaymentProcessor for FakeProcessor {
        async fn capture_order(&self, order_id: &OrderId) -> Result<CaptureResult, PayPalError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.lock().unwrap().push("capture".to_string());
            if self.fail {
                return Err(PayPalError::Api {
                    status: 422,
                    message: "ORDER_NOT_APPROVED".to_string(),
                });
            }
            Ok(CaptureResult {
                order_id: order_id.clone(),
                raw: capture_payload(),
                captured_at: Utc::now(),
            })
        }
    }

    /// In-memory store double backed by the same phase machine as the real log.
    struct FakeStore {
        calls: CallLog,
        log: StdMutex<std::collections::HashMap<String, CaptureLogEntry>>,
        grant_fails: AtomicBool,
    }

    impl FakeStore {
        fn new(calls: CallLog) -> Self {
            Self {
                calls,
                log: StdMutex::new(std::collections::HashMap::new()),
                grant_fails: AtomicBool::new(false),
            }
        }

        fn entry(order_id: &OrderId, user_id: &UserId, phase: CapturePhase) -> CaptureLogEntry {
            CaptureLogEntry {
                order_id: order_id.clone(),
                user_id: user_id.clone(),
                phase,
                processor_payload: None,
                captured_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }
        }

        fn seed(&self, entry: CaptureLogEntry) {
            self.log
                .lock()
                .unwrap()
                .insert(entry.order_id.as_str().to_owned(), entry);
        }
    }

    #[async_trait]
    impl EntitlementStore for FakeStore {
        async fn begin_capture(
            &self,
            order_id: &OrderId,
            user_id: &UserId,
        ) -> Result<BeginCapture, RepositoryError> {
            let mut log = self.log.lock().unwrap();
            if let Some(existing) = log.get_mut(order_id.as_str()) {
                if existing.phase == CapturePhase::CaptureFailed {
                    existing.phase = CapturePhase::CaptureRequested;
                    existing.user_id = user_id.clone();
                    existing.updated_at = Utc::now();
                    return Ok(BeginCapture::Started);
                }
                return Ok(BeginCapture::AlreadyRecorded(existing.phase));
            }
            log.insert(
                order_id.as_str().to_owned(),
                Self::entry(order_id, user_id, CapturePhase::CaptureRequested),
            );
            Ok(BeginCapture::Started)
        }

        async fn capture_log(
            &self,
            order_id: &OrderId,
        ) -> Result<Option<CaptureLogEntry>, RepositoryError> {
            Ok(self.log.lock().unwrap().get(order_id.as_str()).cloned())
        }

        async fn mark_captured(
            &self,
            order_id: &OrderId,
            payload: &serde_json::Value,
            captured_at: DateTime<Utc>,
        ) -> Result<(), RepositoryError> {
            let mut log = self.log.lock().unwrap();
            let entry = log
                .get_mut(order_id.as_str())
                .ok_or(RepositoryError::NotFound)?;
            entry.phase = CapturePhase::CapturedGrantPending;
            entry.processor_payload = Some(payload.clone());
            entry.captured_at = Some(captured_at);
            Ok(())
        }

        async fn mark_granted(&self, order_id: &OrderId) -> Result<(), RepositoryError> {
            let mut log = self.log.lock().unwrap();
            let entry = log
                .get_mut(order_id.as_str())
                .ok_or(RepositoryError::NotFound)?;
            entry.phase = CapturePhase::EntitlementGranted;
            Ok(())
        }

        async fn mark_capture_failed(&self, order_id: &OrderId) -> Result<(), RepositoryError> {
            let mut log = self.log.lock().unwrap();
            let entry = log
                .get_mut(order_id.as_str())
                .ok_or(RepositoryError::NotFound)?;
            entry.phase = CapturePhase::CaptureFailed;
            Ok(())
        }

        async fn grant_subscription(
            &self,
            user_id: &UserId,
            expires_at: DateTime<Utc>,
        ) -> Result<UserEntitlement, RepositoryError> {
            self.calls.lock().unwrap().push("grant".to_string());
            if self.grant_fails.load(Ordering::SeqCst) {
                return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(UserEntitlement {
                id: user_id.clone(),
                subs: true,
                subs_expires_at: Some(expires_at),
            })
        }
    }

    fn service(
        processor: FakeProcessor,
        store: FakeStore,
    ) -> CheckoutService<FakeProcessor, FakeStore> {
        CheckoutService::new(processor, store)
    }

    #[tokio::test]
    async fn test_happy_path_captures_then_grants() {
        let calls: CallLog = Arc::default();
        let processor = FakeProcessor {
            calls: Arc::clone(&calls),
            fail: false,
            delay: None,
        };
        let store = FakeStore::new(Arc::clone(&calls));

        let svc = service(processor, store);
        let result = svc.capture_and_grant(&order(), &user()).await.unwrap();

        assert!(result.entitlement.subs);
        assert_eq!(result.payment.order_id, order());
        assert!(result.entitlement.subs_expires_at.is_some());

        // Ordering invariant: capture strictly before grant.
        assert_eq!(*calls.lock().unwrap(), vec!["capture", "grant"]);
    }

    #[tokio::test]
    async fn test_capture_failure_never_touches_entitlement() {
        let calls: CallLog = Arc::default();
        let processor = FakeProcessor {
            calls: Arc::clone(&calls),
            fail: true,
            delay: None,
        };
        let store = FakeStore::new(Arc::clone(&calls));

        let svc = service(processor, store);
        let err = svc.capture_and_grant(&order(), &user()).await.unwrap_err();

        assert!(matches!(err, CheckoutError::Capture(_)));
        assert_eq!(*calls.lock().unwrap(), vec!["capture"]);

        // The log records the terminal failure.
        let entry = svc.store.capture_log(&order()).await.unwrap().unwrap();
        assert_eq!(entry.phase, CapturePhase::CaptureFailed);
    }

    #[tokio::test]
    async fn test_grant_failure_reported_as_partial_success() {
        let calls: CallLog = Arc::default();
        let processor = FakeProcessor {
            calls: Arc::clone(&calls),
            fail: false,
            delay: None,
        };
        let store = FakeStore::new(Arc::clone(&calls));
        store.grant_fails.store(true, Ordering::SeqCst);

        let svc = service(processor, store);
        let err = svc.capture_and_grant(&order(), &user()).await.unwrap_err();

        let CheckoutError::GrantFailed { capture, .. } = err else {
            panic!("expected GrantFailed, got {err:?}");
        };
        assert_eq!(capture.order_id, order());

        // Attempt remains resumable: captured, grant still pending.
        let entry = svc.store.capture_log(&order()).await.unwrap().unwrap();
        assert_eq!(entry.phase, CapturePhase::CapturedGrantPending);
    }

    #[tokio::test]
    async fn test_already_granted_order_is_rejected() {
        let calls: CallLog = Arc::default();
        let processor = FakeProcessor {
            calls: Arc::clone(&calls),
            fail: false,
            delay: None,
        };
        let store = FakeStore::new(Arc::clone(&calls));
        store.seed(FakeStore::entry(
            &order(),
            &user(),
            CapturePhase::EntitlementGranted,
        ));

        let svc = service(processor, store);
        let err = svc.capture_and_grant(&order(), &user()).await.unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::DuplicateCapture {
                phase: CapturePhase::EntitlementGranted,
                ..
            }
        ));
        // Neither the processor nor the entitlement row was touched.
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_grant_pending_order_retries_grant_without_recapture() {
        let calls: CallLog = Arc::default();
        let processor = FakeProcessor {
            calls: Arc::clone(&calls),
            fail: false,
            delay: None,
        };
        let store = FakeStore::new(Arc::clone(&calls));
        let mut entry = FakeStore::entry(&order(), &user(), CapturePhase::CapturedGrantPending);
        entry.processor_payload = Some(capture_payload());
        entry.captured_at = Some(Utc::now());
        store.seed(entry);

        let svc = service(processor, store);
        let result = svc.capture_and_grant(&order(), &user()).await.unwrap();

        assert!(result.entitlement.subs);
        // Grant only - the processor was never called again.
        assert_eq!(*calls.lock().unwrap(), vec!["grant"]);

        let entry = svc.store.capture_log(&order()).await.unwrap().unwrap();
        assert_eq!(entry.phase, CapturePhase::EntitlementGranted);
    }

    #[tokio::test]
    async fn test_grant_pending_order_rejects_different_user() {
        let calls: CallLog = Arc::default();
        let processor = FakeProcessor {
            calls: Arc::clone(&calls),
            fail: false,
            delay: None,
        };
        let store = FakeStore::new(Arc::clone(&calls));
        store.seed(FakeStore::entry(
            &order(),
            &user(),
            CapturePhase::CapturedGrantPending,
        ));

        let svc = service(processor, store);
        let err = svc
            .capture_and_grant(&order(), &UserId::new("u-456"))
            .await
            .unwrap_err();

        assert!(matches!(err, CheckoutError::UserMismatch(_)));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_captures_grant_at_most_once() {
        let calls: CallLog = Arc::default();
        let processor = FakeProcessor {
            calls: Arc::clone(&calls),
            fail: false,
            delay: Some(Duration::from_millis(20)),
        };
        let store = FakeStore::new(Arc::clone(&calls));

        let svc = Arc::new(service(processor, store));
        let (order_id, user_id) = (order(), user());
        let (a, b) = tokio::join!(
            svc.capture_and_grant(&order_id, &user_id),
            svc.capture_and_grant(&order_id, &user_id),
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one capture must win");

        let loser = if a.is_err() { a } else { b };
        assert!(matches!(
            loser.unwrap_err(),
            CheckoutError::CaptureInFlight(_)
        ));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| *c == "grant").count(), 1);
        assert_eq!(calls.iter().filter(|c| *c == "capture").count(), 1);
    }

    #[tokio::test]
    async fn test_failed_capture_can_be_retried() {
        let calls: CallLog = Arc::default();
        let processor = FakeProcessor {
            calls: Arc::clone(&calls),
            fail: false,
            delay: None,
        };
        let store = FakeStore::new(Arc::clone(&calls));
        store.seed(FakeStore::entry(
            &order(),
            &user(),
            CapturePhase::CaptureFailed,
        ));

        let svc = service(processor, store);
        let result = svc.capture_and_grant(&order(), &user()).await.unwrap();

        assert!(result.entitlement.subs);
        assert_eq!(*calls.lock().unwrap(), vec!["capture", "grant"]);
    }

    #[tokio::test]
    async fn test_failed_capture_retried_by_another_user_rebinds_the_attempt() {
        let calls: CallLog = Arc::default();
        let processor = FakeProcessor {
            calls: Arc::clone(&calls),
            fail: false,
            delay: None,
        };
        let store = FakeStore::new(Arc::clone(&calls));
        store.seed(FakeStore::entry(
            &order(),
            &user(),
            CapturePhase::CaptureFailed,
        ));
        store.grant_fails.store(true, Ordering::SeqCst);

        let svc = service(processor, store);
        let payer = UserId::new("u-456");

        // The retry captures the payer's money, then the grant fails.
        let err = svc.capture_and_grant(&order(), &payer).await.unwrap_err();
        assert!(matches!(err, CheckoutError::GrantFailed { .. }));

        // The attempt must now belong to the user who actually paid.
        let entry = svc.store.capture_log(&order()).await.unwrap().unwrap();
        assert_eq!(entry.phase, CapturePhase::CapturedGrantPending);
        assert_eq!(entry.user_id, payer);

        // Their grant retry reconciles instead of being rejected as a
        // mismatch against the original submitter.
        svc.store.grant_fails.store(false, Ordering::SeqCst);
        let result = svc.capture_and_grant(&order(), &payer).await.unwrap();

        assert!(result.entitlement.subs);
        assert_eq!(result.entitlement.id, payer);
        // One capture, two grant attempts; never a second capture.
        assert_eq!(*calls.lock().unwrap(), vec!["capture", "grant", "grant"]);
    }
}
