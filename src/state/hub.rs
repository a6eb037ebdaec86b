use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::dto::events::UiEvent;

/// Broadcast hub fanning UI events out to every subscriber.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<UiEvent>,
}

impl EventHub {
    /// Construct a hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream; lagging subscribers see `Err` items instead of blocking senders.
    pub fn stream(&self) -> BroadcastStream<UiEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: UiEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio_stream::StreamExt;

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_sent_after_subscribing() {
        let hub = EventHub::new(4);
        hub.broadcast(UiEvent::json("lost", &json!({})).unwrap());

        let mut stream = hub.stream();
        hub.broadcast(UiEvent::json("theme.changed", &json!({"theme": "dark"})).unwrap());

        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.event, "theme.changed");
        assert_eq!(event.data["theme"], "dark");
    }
}
