//! Process-wide registry for host bridge callback hooks.
//!
//! The host platform delivers callbacks to whichever hooks are currently
//! registered. At most one bridge engine may hold the registration; it gets
//! a [`HookSubscription`] on start and the hooks are unregistered when that
//! subscription is dropped.
//!
//! A stop request from the engine travels down the same channel as the host
//! callbacks, so the pump sees it in arrival order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::BridgeCallback;
use crate::error::DictationError;

/// Item delivered to the registered hooks
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    Callback(BridgeCallback),
    /// The owning engine asked to stop; callbacks queued ahead of this
    /// arrived before the stop
    StopRequested,
}

struct Registration {
    token: u64,
    hooks: mpsc::UnboundedSender<HookEvent>,
}

#[derive(Default)]
pub struct HookRegistry {
    slot: Mutex<Option<Registration>>,
    next_token: AtomicU64,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Registration>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register hooks. Fails if another subscription still holds them.
    pub fn acquire(
        self: &Arc<Self>,
    ) -> Result<(HookSubscription, mpsc::UnboundedReceiver<HookEvent>), DictationError> {
        let mut slot = self.slot();
        if slot.is_some() {
            return Err(DictationError::BackendUnavailable(
                "host bridge hooks are held by another session".to_string(),
            ));
        }

        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(Registration { token, hooks: tx });
        debug!(token, "Bridge hooks registered");

        let subscription = HookSubscription {
            registry: Arc::clone(self),
            token,
        };
        Ok((subscription, rx))
    }

    /// Deliver a host callback to the registered hooks.
    ///
    /// Returns `false` when nothing is registered and the callback was dropped.
    pub fn dispatch(&self, callback: BridgeCallback) -> bool {
        let slot = self.slot();
        match slot.as_ref() {
            Some(registration) => {
                if registration.hooks.send(HookEvent::Callback(callback)).is_err() {
                    warn!(token = registration.token, "Bridge hooks receiver is gone");
                    return false;
                }
                true
            }
            None => {
                debug!(?callback, "No bridge hooks registered, dropping callback");
                false
            }
        }
    }

    pub fn is_registered(&self) -> bool {
        self.slot().is_some()
    }

    fn mark_stop(&self, token: u64) -> bool {
        let slot = self.slot();
        match slot.as_ref() {
            Some(registration) if registration.token == token => {
                registration.hooks.send(HookEvent::StopRequested).is_ok()
            }
            _ => false,
        }
    }

    fn release(&self, token: u64) {
        let mut slot = self.slot();
        if slot.as_ref().map(|r| r.token) == Some(token) {
            *slot = None;
            debug!(token, "Bridge hooks unregistered");
        }
    }
}

/// Ownership of the registered hooks. Dropping it unregisters them.
pub struct HookSubscription {
    registry: Arc<HookRegistry>,
    token: u64,
}

impl HookSubscription {
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Queue a stop marker behind every callback dispatched so far.
    ///
    /// Returns `false` if the receiving side is already gone.
    pub fn request_stop(&self) -> bool {
        self.registry.mark_stop(self.token)
    }
}

impl Drop for HookSubscription {
    fn drop(&mut self) {
        self.registry.release(self.token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_exclusive() {
        let registry = Arc::new(HookRegistry::new());
        let (first, _rx) = registry.acquire().unwrap();

        assert!(registry.acquire().is_err());

        drop(first);
        assert!(!registry.is_registered());
        assert!(registry.acquire().is_ok());
    }

    #[test]
    fn test_dispatch_reaches_registered_hooks() {
        let registry = Arc::new(HookRegistry::new());
        assert!(!registry.dispatch(BridgeCallback::Started));

        let (_subscription, mut rx) = registry.acquire().unwrap();
        assert!(registry.dispatch(BridgeCallback::Started));
        assert_eq!(rx.try_recv().unwrap(), HookEvent::Callback(BridgeCallback::Started));
    }

    #[test]
    fn test_stop_marker_follows_queued_callbacks() {
        let registry = Arc::new(HookRegistry::new());
        let (subscription, mut rx) = registry.acquire().unwrap();

        registry.dispatch(BridgeCallback::Started);
        assert!(subscription.request_stop());
        registry.dispatch(BridgeCallback::Started);

        assert_eq!(rx.try_recv().unwrap(), HookEvent::Callback(BridgeCallback::Started));
        assert_eq!(rx.try_recv().unwrap(), HookEvent::StopRequested);
        assert_eq!(rx.try_recv().unwrap(), HookEvent::Callback(BridgeCallback::Started));
    }
}
