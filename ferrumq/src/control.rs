//! Commands flowing from the public handles into the connection engine

use bytes::Bytes;
use ferrumq_wire::methods::{basic, Method};
use ferrumq_wire::BasicProperties;
use tokio::sync::{mpsc, oneshot};

use crate::error::Error;
use crate::message::{Confirmation, ConsumerMessage, GetMessage, ReturnedMessage};
use crate::signal::CaughtSignal;

pub(crate) type Responder<T> = oneshot::Sender<Result<T, Error>>;

/// Depth of the command channel feeding the engine.
pub(crate) const COMMAND_BUFFER: usize = 128;

/// Out-of-band notifications surfaced to the application.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The broker stopped accepting publishes (`connection.blocked`)
    Blocked { reason: String },
    /// The broker resumed (`connection.unblocked`)
    Unblocked,
    /// A process signal was observed during a wait; only emitted when
    /// signal dispatch is enabled on the builder
    SignalCaught(CaughtSignal),
}

/// Everything a freshly opened channel hands back to its public handle.
#[derive(Debug)]
pub(crate) struct OpenedChannel {
    pub id: u16,
    pub returned: mpsc::UnboundedReceiver<ReturnedMessage>,
}

/// A consumer registration confirmed by `basic.consume-ok`.
#[derive(Debug)]
pub(crate) struct ConsumeStarted {
    pub consumer_tag: String,
    pub deliveries: mpsc::UnboundedReceiver<ConsumerMessage>,
}

pub(crate) enum Command {
    OpenChannel {
        responder: Responder<OpenedChannel>,
    },
    CloseConnection {
        responder: Responder<()>,
    },
    Channel {
        id: u16,
        op: ChannelOp,
    },
}

pub(crate) enum ChannelOp {
    /// A synchronous method with a registry-known reply
    Call {
        request: Method,
        expected: &'static [(u16, u16)],
        responder: Responder<Method>,
    },
    Consume {
        request: basic::Consume,
        responder: Responder<ConsumeStarted>,
    },
    Cancel {
        consumer_tag: String,
        responder: Responder<()>,
    },
    Get {
        request: basic::Get,
        responder: Responder<Option<GetMessage>>,
    },
    Publish {
        request: basic::Publish,
        properties: BasicProperties,
        body: Bytes,
        /// Resolves with the publish sequence number in confirm mode
        responder: Responder<Option<u64>>,
    },
    Ack {
        request: basic::Ack,
        responder: Responder<()>,
    },
    Nack {
        request: basic::Nack,
        responder: Responder<()>,
    },
    Reject {
        request: basic::Reject,
        responder: Responder<()>,
    },
    Flow {
        active: bool,
        responder: Responder<bool>,
    },
    ConfirmSelect {
        responder: Responder<mpsc::UnboundedReceiver<Confirmation>>,
    },
    UnconfirmedCount {
        responder: Responder<usize>,
    },
    Close {
        responder: Responder<()>,
    },
}

impl ChannelOp {
    /// Fails whichever responder this operation carries.
    pub(crate) fn fail(self, err: Error) {
        match self {
            ChannelOp::Call { responder, .. } => drop(responder.send(Err(err))),
            ChannelOp::Consume { responder, .. } => drop(responder.send(Err(err))),
            ChannelOp::Cancel { responder, .. } => drop(responder.send(Err(err))),
            ChannelOp::Get { responder, .. } => drop(responder.send(Err(err))),
            ChannelOp::Publish { responder, .. } => drop(responder.send(Err(err))),
            ChannelOp::Ack { responder, .. } => drop(responder.send(Err(err))),
            ChannelOp::Nack { responder, .. } => drop(responder.send(Err(err))),
            ChannelOp::Reject { responder, .. } => drop(responder.send(Err(err))),
            ChannelOp::Flow { responder, .. } => drop(responder.send(Err(err))),
            ChannelOp::ConfirmSelect { responder } => drop(responder.send(Err(err))),
            ChannelOp::UnconfirmedCount { responder } => drop(responder.send(Err(err))),
            ChannelOp::Close { responder } => drop(responder.send(Err(err))),
        }
    }
}
