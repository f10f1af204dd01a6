use crate::types::UiEvent;

/// Event bus using tokio broadcast channel.
/// All subscribers receive all events.
pub struct EventBus {
    tx: tokio::sync::broadcast::Sender<UiEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: UiEvent) {
        // Ignore error if no receivers
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<UiEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Panel;

    #[tokio::test]
    async fn subscribers_see_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(UiEvent::PanelCleared { panel: Panel::Log });
        match rx.recv().await.unwrap() {
            UiEvent::PanelCleared { panel } => assert_eq!(panel, Panel::Log),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.publish(UiEvent::Navigated { token: "orders".into() });
    }
}
