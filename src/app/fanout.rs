use serde_json::Value;

use crate::infra::realtime::RealtimePublisher;

pub const WARNINGS_CHANNEL: &str = "warnings";

/// Channel a single user's dashboard session subscribes to.
pub fn user_channel(user_id: &str) -> String {
    format!("user-{}", user_id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub channel: String,
    pub event: &'static str,
    pub payload: Value,
}

/// Realtime pushes captured inside a transaction, sent only once it has committed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fanout {
    deliveries: Vec<Delivery>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, channel: impl Into<String>, event: &'static str, payload: Value) -> Self {
        self.deliveries.push(Delivery {
            channel: channel.into(),
            event,
            payload,
        });
        self
    }

    pub fn deliveries(&self) -> &[Delivery] {
        &self.deliveries
    }
}

/// Best-effort, at-most-once delivery. Failures are logged and dropped.
pub async fn deliver(publisher: &dyn RealtimePublisher, fanout: &Fanout) {
    for delivery in &fanout.deliveries {
        if let Err(err) = publisher
            .trigger(&delivery.channel, delivery.event, &delivery.payload)
            .await
        {
            tracing::warn!(
                error = ?err,
                channel = %delivery.channel,
                event = delivery.event,
                "failed to publish realtime notification"
            );
        }
    }
}
