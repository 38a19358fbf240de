//! Messages crossing the channel API

use bytes::Bytes;
use ferrumq_wire::BasicProperties;

/// An outbound message for `basic_publish`.
#[derive(Debug, Clone, Default)]
pub struct Publish {
    pub exchange: String,
    pub routing_key: String,
    /// Return the message via `basic.return` when it cannot be routed
    pub mandatory: bool,
    /// Legacy flag; RabbitMQ rejects `immediate = true`
    pub immediate: bool,
    pub properties: BasicProperties,
    pub body: Bytes,
}

impl Publish {
    pub fn new(
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            body: body.into(),
            ..Default::default()
        }
    }

    pub fn properties(mut self, properties: BasicProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }
}

/// A message pushed to a consumer by `basic.deliver`.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub properties: BasicProperties,
    pub body: Bytes,
}

/// An unroutable publish handed back by `basic.return`.
#[derive(Debug, Clone)]
pub struct ReturnedMessage {
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
    pub properties: BasicProperties,
    pub body: Bytes,
}

/// A message pulled with `basic_get`.
#[derive(Debug, Clone)]
pub struct GetMessage {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    /// Messages left on the queue after this one
    pub message_count: u32,
    pub properties: BasicProperties,
    pub body: Bytes,
}

/// One publisher-confirm outcome on a channel in confirm mode.
///
/// `multiple` covers every unconfirmed sequence number up to and including
/// `delivery_tag`; `nacked` marks the broker's refusal (`basic.nack`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub delivery_tag: u64,
    pub multiple: bool,
    pub nacked: bool,
}

/// What a consumer stream yields.
#[derive(Debug, Clone)]
pub enum ConsumerMessage {
    Delivery(Delivery),
    /// The broker cancelled the consumer (queue deleted, node failover)
    Cancelled,
}
