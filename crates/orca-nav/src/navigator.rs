use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use orca_core::error::Result;
use orca_core::event::EventBus;
use orca_core::location::{self, LocationHost};
use orca_core::types::{NavigationState, UiEvent};

/// The only writer of the navigation state.
///
/// Every change goes to the location host first, then to subscribers, so a
/// restart rehydrates exactly what was last shown.
pub struct Navigator {
    tx: watch::Sender<NavigationState>,
    host: Arc<dyn LocationHost>,
    bus: Arc<EventBus>,
}

impl Navigator {
    /// Rehydrate from whatever token the host currently holds.
    pub fn new(host: Arc<dyn LocationHost>, bus: Arc<EventBus>) -> Self {
        let initial = location::parse(&host.read());
        info!(token = %initial, "Rehydrated navigation state");
        let (tx, _) = watch::channel(initial);
        Self { tx, host, bus }
    }

    pub fn current(&self) -> NavigationState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NavigationState> {
        self.tx.subscribe()
    }

    /// Move to `next`, returning the state it replaced. Navigating to the
    /// current state is a no-op.
    pub fn navigate(&self, next: NavigationState) -> Result<NavigationState> {
        let current = self.current();
        if current == next {
            return Ok(current);
        }

        let token = location::serialize(&next);
        self.host.write(&token)?;
        debug!(from = %current, to = %token, "Navigate");

        let previous = self.tx.send_replace(next);
        self.bus.publish(UiEvent::Navigated { token });
        Ok(previous)
    }

    /// Parse `raw` and move there. Returns the resulting state.
    pub fn navigate_token(&self, raw: &str) -> Result<NavigationState> {
        let next = location::parse(raw);
        self.navigate(next.clone())?;
        Ok(next)
    }

    /// Drop the deepest selected field.
    pub fn up(&self) -> Result<NavigationState> {
        let next = self.current().parent();
        self.navigate(next.clone())?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orca_core::location::MemoryLocation;

    fn navigator(token: &str) -> (Navigator, Arc<MemoryLocation>, Arc<EventBus>) {
        let host = Arc::new(MemoryLocation::new(token));
        let bus = Arc::new(EventBus::default());
        (Navigator::new(host.clone(), bus.clone()), host, bus)
    }

    #[test]
    fn rehydrates_from_host() {
        let (nav, _, _) = navigator("orders@r1");
        assert_eq!(nav.current().run_id(), Some("r1"));
    }

    #[test]
    fn rehydrating_a_gap_keeps_the_prefix() {
        let (nav, _, _) = navigator("orders@@A.log");
        assert_eq!(nav.current().to_string(), "orders");
    }

    #[tokio::test]
    async fn navigate_writes_host_and_notifies() {
        let (nav, host, bus) = navigator("");
        let mut rx = nav.subscribe();
        let mut events = bus.subscribe();

        let next = NavigationState::workflow("orders").unwrap();
        let previous = nav.navigate(next.clone()).unwrap();

        assert!(previous.is_empty());
        assert_eq!(host.read(), "orders");
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), next);
        match events.recv().await.unwrap() {
            UiEvent::Navigated { token } => assert_eq!(token, "orders"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn navigating_to_same_state_is_silent() {
        let (nav, _, _) = navigator("orders");
        let mut rx = nav.subscribe();
        nav.navigate_token("orders").unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn up_walks_towards_unset() {
        let (nav, host, _) = navigator("orders@r1@A.log");
        assert_eq!(nav.up().unwrap().to_string(), "orders@r1");
        assert_eq!(nav.up().unwrap().to_string(), "orders");
        assert_eq!(host.read(), "orders");
        assert!(nav.up().unwrap().is_empty());
        assert!(nav.up().unwrap().is_empty());
    }

    #[test]
    fn navigate_token_degrades_malformed_input() {
        let (nav, host, _) = navigator("orders");
        let s = nav.navigate_token("@x").unwrap();
        assert!(s.is_empty());
        assert_eq!(host.read(), "");
    }
}
