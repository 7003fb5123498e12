use async_trait::async_trait;
use keel_core::{CoreError, Disposable, ServiceResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::AdapterError;

const DEFAULT_CAPACITY: usize = 1024;

/// Published event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub topic: String,
    pub payload: Value,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            payload,
        }
    }
}

/// Publish/subscribe capability
#[async_trait]
pub trait EventBus: Disposable {
    /// Publish an event, returning how many subscribers received it
    async fn publish(&self, event: Event) -> ServiceResult<usize>;

    /// Subscribe to one topic, or to every topic with `"*"`
    fn subscribe(&self, topic: &str) -> ServiceResult<EventSubscription>;
}

/// Receiving end of a topic subscription
#[derive(Debug)]
pub struct EventSubscription {
    topic: String,
    receiver: broadcast::Receiver<Event>,
}

impl EventSubscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next event on the subscribed topic; `None` once the bus is closed
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.topic == "*" || event.topic == self.topic => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %self.topic, skipped, "Event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Broadcast-channel event bus within one process
#[derive(Debug)]
pub struct InMemoryEventBus {
    sender: Mutex<Option<broadcast::Sender<Event>>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }

    fn sender(&self) -> Result<broadcast::Sender<Event>, AdapterError> {
        self.sender
            .lock()
            .clone()
            .ok_or_else(|| AdapterError::Closed("event bus".to_string()))
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, event: Event) -> ServiceResult<usize> {
        let sender = match self.sender() {
            Ok(sender) => sender,
            Err(err) => return err.into(),
        };

        tracing::debug!(topic = %event.topic, event_id = %event.id, "Publishing event");
        // Publishing with no live subscribers is not an error.
        ServiceResult::ok_with(sender.send(event).unwrap_or(0))
    }

    fn subscribe(&self, topic: &str) -> ServiceResult<EventSubscription> {
        match self.sender() {
            Ok(sender) => ServiceResult::ok_with(EventSubscription {
                topic: topic.to_string(),
                receiver: sender.subscribe(),
            }),
            Err(err) => err.into(),
        }
    }
}

#[async_trait]
impl Disposable for InMemoryEventBus {
    async fn dispose(&self) -> Result<(), CoreError> {
        if self.sender.lock().take().is_some() {
            tracing::debug!("Closed in-memory event bus");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_topic_filtering() {
        let bus = InMemoryEventBus::new();
        let mut orders = bus.subscribe("orders").into_result().unwrap().unwrap();
        let mut everything = bus.subscribe("*").into_result().unwrap().unwrap();

        bus.publish(Event::new("users", json!({"id": 1}))).await;
        bus.publish(Event::new("orders", json!({"id": 2}))).await;

        let order = orders.recv().await.unwrap();
        assert_eq!(order.topic, "orders");
        assert_eq!(order.payload["id"], 2);
        assert_eq!(everything.recv().await.unwrap().topic, "users");
        assert_eq!(everything.recv().await.unwrap().topic, "orders");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = InMemoryEventBus::new();
        assert_eq!(bus.publish(Event::new("noop", Value::Null)).await.data(), Some(&0));
    }

    #[tokio::test]
    async fn test_dispose_closes_subscriptions() {
        let bus = InMemoryEventBus::new();
        let mut subscription = bus.subscribe("orders").into_result().unwrap().unwrap();

        bus.dispose().await.unwrap();

        assert!(subscription.recv().await.is_none());
        assert!(bus.is_closed());
        let result = bus.publish(Event::new("orders", Value::Null)).await;
        assert_eq!(result.error().unwrap().code, "ADAPTER_CLOSED");
    }
}
