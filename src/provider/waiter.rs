//! ProviderWaiter - wait for the selected provider, then authorize it
//!
//! ```text
//!             Polled{false} (attempts < budget)
//!              ┌──────┐
//!              ▼      │
//!          Searching ─┘── Polled{false} at budget ──▶ Failed(Timeout)
//!              │
//!        Polled{true}  → CheckEnabled
//!              ▼
//!            Found ── EnabledChecked{true}  → Enable{prompt:false} ──▶ Authorized
//!              │
//!     EnabledChecked{false} → Enable{prompt:true}
//!              ▼
//!       AwaitingConsent ── ConsentGranted ──▶ Authorized
//!              └───────── ConsentRejected ──▶ Failed(ConsentDenied)
//!
//!  any non-terminal ── Cancel ──▶ Cancelled
//! ```
//!
//! `Authorized`, `Failed` and `Cancelled` are terminal. The one exception is a
//! silent attach: `Authorized` reached through `EnabledChecked{true}` still
//! waits on its `enable()` call, and only `ConsentGranted`, `ConsentRejected`
//! or `Cancel` can settle it.
//!
//! `advance` is the only transition function; `run` is the timer driver that
//! feeds it. `Enable` is emitted at most once per waiter.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::{ProviderRegistry, WalletApi, WalletProvider};
use crate::config::BridgeConfig;
use crate::core::paths::timing;
use crate::error::{BridgeError, ProviderError};
use crate::runtime::Shutdown;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitFailure {
    Timeout { attempts: u32 },
    ConsentDenied(ProviderError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaiterState {
    Searching { attempts: u32 },
    Found,
    AwaitingConsent,
    Authorized,
    Failed(WaitFailure),
    Cancelled,
}

impl WaiterState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WaiterState::Authorized | WaiterState::Failed(_) | WaiterState::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaiterEvent {
    Polled { present: bool },
    EnabledChecked { already: bool },
    ConsentGranted,
    ConsentRejected(ProviderError),
    Cancel,
}

/// What the driver must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterAction {
    None,
    CheckEnabled,
    /// Call `enable()`. `prompt` is false when the provider already trusts this origin.
    Enable { prompt: bool },
}

pub struct ProviderWaiter {
    state: WaiterState,
    max_attempts: u32,
    interval: Duration,
    enable_requested: bool,
    /// `enable()` without a prompt is still outstanding
    silent_attach: bool,
}

impl ProviderWaiter {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            state: WaiterState::Searching { attempts: 0 },
            max_attempts,
            interval: interval.max(Duration::from_millis(timing::MIN_TICK_MS)),
            enable_requested: false,
            silent_attach: false,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.max_attempts, config.poll_interval())
    }

    pub fn state(&self) -> &WaiterState { &self.state }

    /// Selection channel that never changes, for callers that already know the key.
    pub fn fixed_selection(key: impl Into<String>) -> watch::Receiver<Option<String>> {
        watch::channel(Some(key.into())).1
    }

    fn request_enable(&mut self, prompt: bool) -> WaiterAction {
        if self.enable_requested {
            return WaiterAction::None;
        }
        self.enable_requested = true;
        WaiterAction::Enable { prompt }
    }

    pub fn advance(&mut self, event: WaiterEvent) -> WaiterAction {
        use WaiterEvent as E;
        use WaiterState as S;

        if self.state.is_terminal() && !self.silent_attach {
            return WaiterAction::None;
        }
        if event == E::Cancel {
            self.silent_attach = false;
            self.state = S::Cancelled;
            return WaiterAction::None;
        }

        let (next, action) = match (&self.state, event) {
            (S::Searching { .. }, E::Polled { present: true }) => (S::Found, WaiterAction::CheckEnabled),
            (S::Searching { attempts }, E::Polled { present: false }) => {
                let attempts = attempts + 1;
                if attempts >= self.max_attempts {
                    (S::Failed(WaitFailure::Timeout { attempts }), WaiterAction::None)
                } else {
                    (S::Searching { attempts }, WaiterAction::None)
                }
            }
            (S::Found, E::EnabledChecked { already: true }) => {
                let action = self.request_enable(false);
                self.silent_attach = action != WaiterAction::None;
                (S::Authorized, action)
            }
            (S::Found, E::EnabledChecked { already: false }) => (S::AwaitingConsent, self.request_enable(true)),
            (S::AwaitingConsent, E::ConsentGranted) => (S::Authorized, WaiterAction::None),
            (S::Authorized, E::ConsentGranted) => {
                self.silent_attach = false;
                (S::Authorized, WaiterAction::None)
            }
            (S::AwaitingConsent | S::Authorized, E::ConsentRejected(reason)) => {
                self.silent_attach = false;
                (S::Failed(WaitFailure::ConsentDenied(reason)), WaiterAction::None)
            }
            (state, _) => (state.clone(), WaiterAction::None),
        };
        self.state = next;
        action
    }

    fn cancel(&mut self) -> BridgeError {
        self.advance(WaiterEvent::Cancel);
        info!("provider wait cancelled");
        BridgeError::Cancelled
    }

    /// Drive the state machine until the selected provider is authorized or the
    /// wait fails. The selection is re-read on every tick.
    pub async fn run(
        &mut self,
        registry: &ProviderRegistry,
        selection: &watch::Receiver<Option<String>>,
        shutdown: &Shutdown,
    ) -> Result<Arc<dyn WalletApi>, BridgeError> {
        let mut cancelled = shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let (key, provider): (String, Arc<dyn WalletProvider>) = loop {
            if shutdown.is_triggered().await {
                return Err(self.cancel());
            }
            tokio::select! {
                biased;
                _ = cancelled.recv() => return Err(self.cancel()),
                _ = ticker.tick() => {}
            }

            let selected = selection.borrow().clone();
            let found = selected.as_deref().and_then(|key| registry.find(key));
            let action = self.advance(WaiterEvent::Polled { present: found.is_some() });
            match (action, found) {
                (WaiterAction::CheckEnabled, Some(provider)) => {
                    break (selected.unwrap_or_default(), provider);
                }
                _ => {
                    if let WaiterState::Failed(WaitFailure::Timeout { attempts }) = self.state {
                        return Err(BridgeError::ProviderNotFound { provider: selected.unwrap_or_default(), attempts });
                    }
                    if let WaiterState::Searching { attempts } = self.state {
                        if attempts % 50 == 0 {
                            debug!(attempts, selected = ?selected, "still waiting for provider");
                        }
                    }
                }
            }
        };
        info!(provider = %key, "provider found");

        let already = tokio::select! {
            biased;
            _ = cancelled.recv() => return Err(self.cancel()),
            enabled = provider.is_enabled() => enabled.unwrap_or_else(|e| {
                debug!(provider = %key, error = %e, "isEnabled failed, asking for consent");
                false
            }),
        };

        let prompt = match self.advance(WaiterEvent::EnabledChecked { already }) {
            WaiterAction::Enable { prompt } => prompt,
            _ => return Err(self.cancel()),
        };
        if prompt {
            info!(provider = %key, "requesting wallet authorization");
        }

        let enabled = tokio::select! {
            biased;
            _ = cancelled.recv() => return Err(self.cancel()),
            enabled = provider.enable() => enabled,
        };
        match enabled {
            Ok(api) => {
                self.advance(WaiterEvent::ConsentGranted);
                info!(provider = %key, "wallet authorized");
                Ok(api)
            }
            Err(reason) => {
                self.advance(WaiterEvent::ConsentRejected(reason.clone()));
                Err(BridgeError::ConsentDenied { provider: key, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{MemorySource, StaticProvider};
    use std::sync::atomic::Ordering;

    fn waiter(budget: u32) -> ProviderWaiter {
        ProviderWaiter::new(budget, Duration::from_millis(100))
    }

    #[test]
    fn searching_counts_attempts_until_budget() {
        let mut w = waiter(3);
        assert_eq!(w.advance(WaiterEvent::Polled { present: false }), WaiterAction::None);
        assert_eq!(w.state(), &WaiterState::Searching { attempts: 1 });
        w.advance(WaiterEvent::Polled { present: false });
        w.advance(WaiterEvent::Polled { present: false });
        assert_eq!(w.state(), &WaiterState::Failed(WaitFailure::Timeout { attempts: 3 }));
        // terminal: nothing moves it
        assert_eq!(w.advance(WaiterEvent::Polled { present: true }), WaiterAction::None);
        assert!(w.state().is_terminal());
    }

    #[test]
    fn already_enabled_goes_straight_to_authorized() {
        let mut w = waiter(10);
        assert_eq!(w.advance(WaiterEvent::Polled { present: true }), WaiterAction::CheckEnabled);
        assert_eq!(w.state(), &WaiterState::Found);
        assert_eq!(w.advance(WaiterEvent::EnabledChecked { already: true }), WaiterAction::Enable { prompt: false });
        assert_eq!(w.state(), &WaiterState::Authorized);
    }

    #[test]
    fn consent_flow() {
        let mut w = waiter(10);
        w.advance(WaiterEvent::Polled { present: true });
        assert_eq!(w.advance(WaiterEvent::EnabledChecked { already: false }), WaiterAction::Enable { prompt: true });
        assert_eq!(w.state(), &WaiterState::AwaitingConsent);
        w.advance(WaiterEvent::ConsentGranted);
        assert_eq!(w.state(), &WaiterState::Authorized);
    }

    #[test]
    fn consent_rejection_fails() {
        let mut w = waiter(10);
        w.advance(WaiterEvent::Polled { present: true });
        w.advance(WaiterEvent::EnabledChecked { already: false });
        w.advance(WaiterEvent::ConsentRejected(ProviderError::new("declined")));
        assert_eq!(
            w.state(),
            &WaiterState::Failed(WaitFailure::ConsentDenied(ProviderError::new("declined")))
        );
    }

    #[test]
    fn enable_is_requested_once() {
        let mut w = waiter(10);
        w.advance(WaiterEvent::Polled { present: true });
        assert!(matches!(w.advance(WaiterEvent::EnabledChecked { already: false }), WaiterAction::Enable { .. }));
        // a stray second check cannot produce another Enable
        assert_eq!(w.advance(WaiterEvent::EnabledChecked { already: false }), WaiterAction::None);
    }

    #[test]
    fn cancel_from_any_live_state() {
        let mut w = waiter(10);
        w.advance(WaiterEvent::Polled { present: true });
        w.advance(WaiterEvent::Cancel);
        assert_eq!(w.state(), &WaiterState::Cancelled);
        assert_eq!(w.advance(WaiterEvent::Polled { present: true }), WaiterAction::None);
    }

    #[test]
    fn authorized_is_final_once_consent_is_in() {
        let mut w = waiter(10);
        w.advance(WaiterEvent::Polled { present: true });
        w.advance(WaiterEvent::EnabledChecked { already: false });
        w.advance(WaiterEvent::ConsentGranted);
        assert!(w.state().is_terminal());

        w.advance(WaiterEvent::Cancel);
        w.advance(WaiterEvent::ConsentRejected(ProviderError::new("late")));
        assert_eq!(w.state(), &WaiterState::Authorized);
    }

    #[test]
    fn silent_attach_settles_once() {
        let mut w = waiter(10);
        w.advance(WaiterEvent::Polled { present: true });
        w.advance(WaiterEvent::EnabledChecked { already: true });
        w.advance(WaiterEvent::ConsentGranted);
        w.advance(WaiterEvent::Cancel);
        assert_eq!(w.state(), &WaiterState::Authorized);

        // a silent enable that fails still ends the wait as a denial
        let mut w = waiter(10);
        w.advance(WaiterEvent::Polled { present: true });
        w.advance(WaiterEvent::EnabledChecked { already: true });
        w.advance(WaiterEvent::ConsentRejected(ProviderError::new("revoked")));
        assert!(matches!(w.state(), WaiterState::Failed(WaitFailure::ConsentDenied(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_is_floored() {
        let registry = ProviderRegistry::new(Arc::new(MemorySource::default()));
        let mut w = ProviderWaiter::new(5, Duration::ZERO);
        let err = w.run(&registry, &ProviderWaiter::fixed_selection("nami"), &Shutdown::new()).await.err().unwrap();
        assert!(matches!(err, BridgeError::ProviderNotFound { attempts: 5, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn run_times_out_when_provider_never_appears() {
        let registry = ProviderRegistry::new(Arc::new(MemorySource::default()));
        let selection = ProviderWaiter::fixed_selection("nami");
        let mut w = waiter(30);
        let err = w.run(&registry, &selection, &Shutdown::new()).await.err().unwrap();
        assert!(matches!(err, BridgeError::ProviderNotFound { attempts: 30, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn run_authorizes_with_single_enable_call() {
        let provider = Arc::new(StaticProvider::new("nami"));
        let source = MemorySource::with(vec![provider.clone() as Arc<dyn WalletProvider>]);
        let registry = ProviderRegistry::new(Arc::new(source));
        let mut w = waiter(30);
        let api = w.run(&registry, &ProviderWaiter::fixed_selection("nami"), &Shutdown::new()).await;
        assert!(api.is_ok());
        assert_eq!(w.state(), &WaiterState::Authorized);
        assert_eq!(provider.enable_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_when_cancelled() {
        let registry = ProviderRegistry::new(Arc::new(MemorySource::default()));
        let shutdown = Shutdown::new();
        shutdown.trigger().await;
        let mut w = waiter(30);
        let err = w.run(&registry, &ProviderWaiter::fixed_selection("nami"), &shutdown).await.err().unwrap();
        assert!(matches!(err, BridgeError::Cancelled));
        assert_eq!(w.state(), &WaiterState::Cancelled);
    }
}
