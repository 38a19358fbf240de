//! The receiving half of `basic_consume`

use tokio::sync::mpsc;

use crate::message::ConsumerMessage;

/// A registered consumer: its tag and the queue of deliveries routed to it.
///
/// The stream ends (`recv` returns `None`) after the consumer is cancelled
/// or its channel closes.
#[derive(Debug)]
pub struct Consumer {
    tag: String,
    deliveries: mpsc::UnboundedReceiver<ConsumerMessage>,
}

impl Consumer {
    pub(crate) fn new(tag: String, deliveries: mpsc::UnboundedReceiver<ConsumerMessage>) -> Self {
        Self { tag, deliveries }
    }

    /// The consumer tag, server-generated unless one was supplied.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub async fn recv(&mut self) -> Option<ConsumerMessage> {
        self.deliveries.recv().await
    }
}
