//! The channel: public API over the per-channel state machine
//!
//! Synchronous methods write their request and resolve when the matching
//! reply (or a close) arrives; one call is in flight per channel at a time
//! and concurrent callers queue FIFO behind it inside the multiplexer.

use tokio::sync::{mpsc, oneshot};

use ferrumq_wire::methods::{basic, exchange, queue, tx, Method};
use ferrumq_wire::registry::class;
use ferrumq_wire::FieldTable;

use crate::consumer::Consumer;
use crate::control::{ChannelOp, Command, OpenedChannel};
use crate::error::Error;
use crate::message::{Confirmation, GetMessage, Publish, ReturnedMessage};

pub(crate) mod mux;

const EXCHANGE_DECLARE_OK: &[(u16, u16)] = &[(class::EXCHANGE, 11)];
const EXCHANGE_DELETE_OK: &[(u16, u16)] = &[(class::EXCHANGE, 21)];
const EXCHANGE_BIND_OK: &[(u16, u16)] = &[(class::EXCHANGE, 31)];
const EXCHANGE_UNBIND_OK: &[(u16, u16)] = &[(class::EXCHANGE, 51)];
const QUEUE_DECLARE_OK: &[(u16, u16)] = &[(class::QUEUE, 11)];
const QUEUE_BIND_OK: &[(u16, u16)] = &[(class::QUEUE, 21)];
const QUEUE_PURGE_OK: &[(u16, u16)] = &[(class::QUEUE, 31)];
const QUEUE_DELETE_OK: &[(u16, u16)] = &[(class::QUEUE, 41)];
const QUEUE_UNBIND_OK: &[(u16, u16)] = &[(class::QUEUE, 51)];
const BASIC_QOS_OK: &[(u16, u16)] = &[(class::BASIC, 11)];
const BASIC_RECOVER_OK: &[(u16, u16)] = &[(class::BASIC, 111)];
const TX_SELECT_OK: &[(u16, u16)] = &[(class::TX, 11)];
const TX_COMMIT_OK: &[(u16, u16)] = &[(class::TX, 21)];
const TX_ROLLBACK_OK: &[(u16, u16)] = &[(class::TX, 31)];

/// Options for [`Channel::exchange_declare`].
#[derive(Debug, Clone, Default)]
pub struct ExchangeDeclareOptions {
    /// Check for existence without creating
    pub passive: bool,
    pub durable: bool,
    pub auto_delete: bool,
    /// Not directly publishable; bind targets only
    pub internal: bool,
    pub arguments: FieldTable,
}

/// Options for [`Channel::queue_declare`].
#[derive(Debug, Clone, Default)]
pub struct QueueDeclareOptions {
    pub passive: bool,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub arguments: FieldTable,
}

/// Options for [`Channel::queue_delete`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueDeleteOptions {
    pub if_unused: bool,
    pub if_empty: bool,
}

/// Options for [`Channel::basic_consume`].
#[derive(Debug, Clone, Default)]
pub struct ConsumeOptions {
    /// Empty asks the broker to generate a tag
    pub consumer_tag: String,
    pub no_local: bool,
    /// Deliveries need no acknowledgement
    pub no_ack: bool,
    pub exclusive: bool,
    pub arguments: FieldTable,
}

/// A logical session multiplexed over the connection.
#[derive(Debug)]
pub struct Channel {
    id: u16,
    commands: mpsc::Sender<Command>,
    returned: Option<mpsc::UnboundedReceiver<ReturnedMessage>>,
}

impl Channel {
    pub(crate) fn new(opened: OpenedChannel, commands: mpsc::Sender<Command>) -> Self {
        Self {
            id: opened.id,
            commands,
            returned: Some(opened.returned),
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    /// The stream of `basic.return` messages bounced back by the broker.
    /// Can be taken once.
    pub fn returned_messages(&mut self) -> Option<mpsc::UnboundedReceiver<ReturnedMessage>> {
        self.returned.take()
    }

    /* --------------------------- exchange ----------------------------- */

    pub async fn exchange_declare(
        &self,
        name: &str,
        exchange_type: &str,
        options: ExchangeDeclareOptions,
    ) -> Result<(), Error> {
        let request = exchange::Declare {
            ticket: 0,
            exchange: name.into(),
            exchange_type: exchange_type.into(),
            passive: options.passive,
            durable: options.durable,
            auto_delete: options.auto_delete,
            internal: options.internal,
            nowait: false,
            arguments: options.arguments,
        };
        self.call(request.into(), EXCHANGE_DECLARE_OK).await?;
        Ok(())
    }

    pub async fn exchange_delete(&self, name: &str, if_unused: bool) -> Result<(), Error> {
        let request = exchange::Delete {
            ticket: 0,
            exchange: name.into(),
            if_unused,
            nowait: false,
        };
        self.call(request.into(), EXCHANGE_DELETE_OK).await?;
        Ok(())
    }

    /// Exchange-to-exchange binding (RabbitMQ extension).
    pub async fn exchange_bind(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let request = exchange::Bind {
            ticket: 0,
            destination: destination.into(),
            source: source.into(),
            routing_key: routing_key.into(),
            nowait: false,
            arguments,
        };
        self.call(request.into(), EXCHANGE_BIND_OK).await?;
        Ok(())
    }

    pub async fn exchange_unbind(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let request = exchange::Unbind {
            ticket: 0,
            destination: destination.into(),
            source: source.into(),
            routing_key: routing_key.into(),
            nowait: false,
            arguments,
        };
        self.call(request.into(), EXCHANGE_UNBIND_OK).await?;
        Ok(())
    }

    /* ----------------------------- queue ------------------------------ */

    /// Declares a queue; an empty name asks the broker to generate one.
    /// Returns the declared name and its message/consumer counts.
    pub async fn queue_declare(
        &self,
        name: &str,
        options: QueueDeclareOptions,
    ) -> Result<queue::DeclareOk, Error> {
        let request = queue::Declare {
            ticket: 0,
            queue: name.into(),
            passive: options.passive,
            durable: options.durable,
            exclusive: options.exclusive,
            auto_delete: options.auto_delete,
            nowait: false,
            arguments: options.arguments,
        };
        match self.call(request.into(), QUEUE_DECLARE_OK).await? {
            Method::QueueDeclareOk(ok) => Ok(ok),
            other => Err(unexpected_reply(&other)),
        }
    }

    pub async fn queue_bind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let request = queue::Bind {
            ticket: 0,
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            nowait: false,
            arguments,
        };
        self.call(request.into(), QUEUE_BIND_OK).await?;
        Ok(())
    }

    pub async fn queue_unbind(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
        arguments: FieldTable,
    ) -> Result<(), Error> {
        let request = queue::Unbind {
            ticket: 0,
            queue: queue.into(),
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            arguments,
        };
        self.call(request.into(), QUEUE_UNBIND_OK).await?;
        Ok(())
    }

    /// Drops the queue's ready messages, returning how many were purged.
    pub async fn queue_purge(&self, queue: &str) -> Result<u32, Error> {
        let request = queue::Purge {
            ticket: 0,
            queue: queue.into(),
            nowait: false,
        };
        match self.call(request.into(), QUEUE_PURGE_OK).await? {
            Method::QueuePurgeOk(ok) => Ok(ok.message_count),
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Deletes the queue, returning the number of messages it still held.
    pub async fn queue_delete(
        &self,
        queue: &str,
        options: QueueDeleteOptions,
    ) -> Result<u32, Error> {
        let request = queue::Delete {
            ticket: 0,
            queue: queue.into(),
            if_unused: options.if_unused,
            if_empty: options.if_empty,
            nowait: false,
        };
        match self.call(request.into(), QUEUE_DELETE_OK).await? {
            Method::QueueDeleteOk(ok) => Ok(ok.message_count),
            other => Err(unexpected_reply(&other)),
        }
    }

    /* ----------------------------- basic ------------------------------ */

    pub async fn basic_qos(
        &self,
        prefetch_size: u32,
        prefetch_count: u16,
        global: bool,
    ) -> Result<(), Error> {
        let request = basic::Qos {
            prefetch_size,
            prefetch_count,
            global,
        };
        self.call(request.into(), BASIC_QOS_OK).await?;
        Ok(())
    }

    /// Registers a consumer and returns the stream of its deliveries.
    pub async fn basic_consume(
        &self,
        queue: &str,
        options: ConsumeOptions,
    ) -> Result<Consumer, Error> {
        let request = basic::Consume {
            ticket: 0,
            queue: queue.into(),
            consumer_tag: options.consumer_tag,
            no_local: options.no_local,
            no_ack: options.no_ack,
            exclusive: options.exclusive,
            nowait: false,
            arguments: options.arguments,
        };
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::Consume { request, responder }).await?;
        let started = reply.await.map_err(|_| engine_gone())??;
        Ok(Consumer::new(started.consumer_tag, started.deliveries))
    }

    /// Cancels a consumer and waits for `cancel-ok`; its stream then ends.
    pub async fn basic_cancel(&self, consumer_tag: &str) -> Result<(), Error> {
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::Cancel {
            consumer_tag: consumer_tag.into(),
            responder,
        })
        .await?;
        reply.await.map_err(|_| engine_gone())?
    }

    /// Publishes a message. In confirm mode the broker's verdict arrives on
    /// the stream from [`Channel::confirm_select`] under the returned
    /// sequence number.
    pub async fn basic_publish(&self, publish: Publish) -> Result<Option<u64>, Error> {
        let request = basic::Publish {
            ticket: 0,
            exchange: publish.exchange,
            routing_key: publish.routing_key,
            mandatory: publish.mandatory,
            immediate: publish.immediate,
        };
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::Publish {
            request,
            properties: publish.properties,
            body: publish.body,
            responder,
        })
        .await?;
        reply.await.map_err(|_| engine_gone())?
    }

    /// Polls one message off a queue; `None` when it is empty.
    pub async fn basic_get(&self, queue: &str, no_ack: bool) -> Result<Option<GetMessage>, Error> {
        let request = basic::Get {
            ticket: 0,
            queue: queue.into(),
            no_ack,
        };
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::Get { request, responder }).await?;
        reply.await.map_err(|_| engine_gone())?
    }

    /// Acknowledges one delivery, or with `multiple` every outstanding
    /// delivery up to and including the tag.
    pub async fn basic_ack(&self, delivery_tag: u64, multiple: bool) -> Result<(), Error> {
        let request = basic::Ack {
            delivery_tag,
            multiple,
        };
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::Ack { request, responder }).await?;
        reply.await.map_err(|_| engine_gone())?
    }

    pub async fn basic_nack(
        &self,
        delivery_tag: u64,
        multiple: bool,
        requeue: bool,
    ) -> Result<(), Error> {
        let request = basic::Nack {
            delivery_tag,
            multiple,
            requeue,
        };
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::Nack { request, responder }).await?;
        reply.await.map_err(|_| engine_gone())?
    }

    pub async fn basic_reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        let request = basic::Reject {
            delivery_tag,
            requeue,
        };
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::Reject { request, responder }).await?;
        reply.await.map_err(|_| engine_gone())?
    }

    /// Asks the broker to redeliver unacknowledged messages.
    pub async fn basic_recover(&self, requeue: bool) -> Result<(), Error> {
        let request = basic::Recover { requeue };
        self.call(request.into(), BASIC_RECOVER_OK).await?;
        Ok(())
    }

    /* ------------------------ confirms, tx, flow ----------------------- */

    /// Puts the channel into publisher-confirm mode and returns the stream
    /// of broker confirmations.
    pub async fn confirm_select(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<Confirmation>, Error> {
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::ConfirmSelect { responder }).await?;
        reply.await.map_err(|_| engine_gone())?
    }

    /// How many publishes are still awaiting a broker confirmation.
    pub async fn unconfirmed_count(&self) -> Result<usize, Error> {
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::UnconfirmedCount { responder }).await?;
        reply.await.map_err(|_| engine_gone())?
    }

    /// Requests a flow change; resolves with the broker-acknowledged state.
    pub async fn flow(&self, active: bool) -> Result<bool, Error> {
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::Flow { active, responder }).await?;
        reply.await.map_err(|_| engine_gone())?
    }

    pub async fn tx_select(&self) -> Result<(), Error> {
        self.call(tx::Select.into(), TX_SELECT_OK).await?;
        Ok(())
    }

    pub async fn tx_commit(&self) -> Result<(), Error> {
        self.call(tx::Commit.into(), TX_COMMIT_OK).await?;
        Ok(())
    }

    pub async fn tx_rollback(&self) -> Result<(), Error> {
        self.call(tx::Rollback.into(), TX_ROLLBACK_OK).await?;
        Ok(())
    }

    /// Performs the channel close handshake.
    pub async fn close(self) -> Result<(), Error> {
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::Close { responder }).await?;
        reply.await.map_err(|_| engine_gone())?
    }

    /* ----------------------------- plumbing ---------------------------- */

    async fn call(
        &self,
        request: Method,
        expected: &'static [(u16, u16)],
    ) -> Result<Method, Error> {
        let (responder, reply) = oneshot::channel();
        self.send_op(ChannelOp::Call {
            request,
            expected,
            responder,
        })
        .await?;
        reply.await.map_err(|_| engine_gone())?
    }

    async fn send_op(&self, op: ChannelOp) -> Result<(), Error> {
        self.commands
            .send(Command::Channel {
                id: self.id,
                op,
            })
            .await
            .map_err(|_| engine_gone())
    }
}

fn engine_gone() -> Error {
    Error::ConnectionClosed {
        reply_code: 0,
        reply_text: "connection is closed".into(),
    }
}

fn unexpected_reply(method: &Method) -> Error {
    Error::ProtocolViolation(format!("unexpected reply {}", method.name()))
}
