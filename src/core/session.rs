//! Provisioning session bookkeeping
//!
//! At most one session exists per process. A session is opened by a
//! provisioning flow, shared with the event translator through the
//! [`SessionSlot`], and destroyed when the flow's [`SessionGuard`] drops.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU8, Ordering},
};

use tokio::sync::{Notify, mpsc};
use tracing::{debug, info};

use crate::core::{
    error::{ServiceError, ServiceResult},
    events::SmartConfigEvent,
    types::{ProvisioningFlow, SessionFlag, SessionId},
};

/// An active provisioning flow
#[derive(Debug)]
pub struct ProvisioningSession {
    id: SessionId,
    flow: ProvisioningFlow,
    flags: AtomicU8,
    changed: Notify,
    events: Option<mpsc::UnboundedSender<SmartConfigEvent>>,
}

impl ProvisioningSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn flow(&self) -> ProvisioningFlow {
        self.flow
    }

    /// Set a completion flag, returning `true` only on the unset to set edge
    pub fn mark(&self, flag: SessionFlag) -> bool {
        let bit = flag as u8;
        let previous = self.flags.fetch_or(bit, Ordering::AcqRel);
        let newly_set = previous & bit == 0;
        if newly_set {
            self.changed.notify_waiters();
        }
        newly_set
    }

    pub fn is_set(&self, flag: SessionFlag) -> bool {
        self.flags.load(Ordering::Acquire) & flag as u8 != 0
    }

    /// Resolve once `flag` is set
    pub async fn flagged(&self, flag: SessionFlag) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent mark is not missed
            notified.as_mut().enable();
            if self.is_set(flag) {
                return;
            }
            notified.await;
        }
    }

    /// Hand a decoder event to the flow's task
    ///
    /// Returns `false` when the flow does not consume events or its task
    /// has already exited.
    pub fn forward(&self, event: SmartConfigEvent) -> bool {
        match &self.events {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

/// Shared holder of the single active session
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    inner: Arc<Mutex<Option<Arc<ProvisioningSession>>>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `flow`
    ///
    /// Fails with [`ServiceError::SessionActive`] while another session is
    /// alive.
    pub fn open(
        &self,
        flow: ProvisioningFlow,
        events: Option<mpsc::UnboundedSender<SmartConfigEvent>>,
    ) -> ServiceResult<SessionGuard> {
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(active) = slot.as_ref() {
            return Err(ServiceError::SessionActive {
                active: active.flow,
            });
        }

        let session = Arc::new(ProvisioningSession {
            id: SessionId::new(),
            flow,
            flags: AtomicU8::new(0),
            changed: Notify::new(),
            events,
        });
        info!(session = %session.id, %flow, "Provisioning session opened");
        *slot = Some(Arc::clone(&session));

        Ok(SessionGuard {
            slot: self.clone(),
            session,
        })
    }

    /// The active session, if any
    pub fn current(&self) -> Option<Arc<ProvisioningSession>> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn release(&self, id: SessionId) {
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|s| s.id == id) {
            *slot = None;
            debug!(session = %id, "Provisioning session closed");
        }
    }
}

/// Keeps a session alive; the slot is cleared on drop
#[derive(Debug)]
pub struct SessionGuard {
    slot: SessionSlot,
    session: Arc<ProvisioningSession>,
}

impl SessionGuard {
    pub fn session(&self) -> &Arc<ProvisioningSession> {
        &self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.slot.release(self.session.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_one_session_at_a_time() {
        let slot = SessionSlot::new();

        let guard = slot.open(ProvisioningFlow::SoftAp, None).unwrap();
        let second = slot.open(ProvisioningFlow::SmartConfig, None);
        assert!(matches!(
            second,
            Err(ServiceError::SessionActive {
                active: ProvisioningFlow::SoftAp
            })
        ));

        drop(guard);
        assert!(slot.current().is_none());
        assert!(slot.open(ProvisioningFlow::SmartConfig, None).is_ok());
    }

    #[test]
    fn test_flags_set_exactly_once() {
        let slot = SessionSlot::new();
        let guard = slot.open(ProvisioningFlow::SmartConfig, None).unwrap();
        let session = guard.session();

        assert!(!session.is_set(SessionFlag::HandshakeAcknowledged));
        assert!(session.mark(SessionFlag::HandshakeAcknowledged));
        assert!(!session.mark(SessionFlag::HandshakeAcknowledged));
        assert!(session.is_set(SessionFlag::HandshakeAcknowledged));
        assert!(!session.is_set(SessionFlag::ScanComplete));
    }

    #[tokio::test]
    async fn test_flagged_wakes_on_mark() {
        let slot = SessionSlot::new();
        let guard = slot.open(ProvisioningFlow::SoftAp, None).unwrap();
        let session = Arc::clone(guard.session());

        let waiter = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.flagged(SessionFlag::CredentialsReceived).await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        session.mark(SessionFlag::ScanComplete);
        session.mark(SessionFlag::CredentialsReceived);
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter woken")
            .unwrap();

        // Already set resolves immediately
        session.flagged(SessionFlag::CredentialsReceived).await;
    }

    #[test]
    fn test_forward_without_consumer() {
        let slot = SessionSlot::new();
        let guard = slot.open(ProvisioningFlow::SoftAp, None).unwrap();
        assert!(!guard.session().forward(SmartConfigEvent::ScanDone));
    }

    #[tokio::test]
    async fn test_forward_to_consumer() {
        let slot = SessionSlot::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let guard = slot.open(ProvisioningFlow::SmartConfig, Some(tx)).unwrap();

        assert!(guard.session().forward(SmartConfigEvent::AckDone));
        assert_eq!(rx.recv().await, Some(SmartConfigEvent::AckDone));
    }
}
