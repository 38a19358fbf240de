//! Per-channel state machine
//!
//! The connection engine owns one `ChannelMux` per open channel and drives it
//! with decoded frames and application commands. The mux enforces the
//! synchronous-call discipline (one in flight, FIFO behind it), assembles
//! content, routes deliveries, and tracks acknowledgement and confirm state.
//! It never touches the transport: frames to emit are pushed into the
//! caller's outbox, which the engine writes contiguously.

use std::collections::{BTreeSet, HashMap, VecDeque};

use bytes::{Bytes, BytesMut};
use ferrumq_wire::methods::{basic, channel, Method};
use ferrumq_wire::registry::class;
use ferrumq_wire::{BasicProperties, ContentHeader, WireDialect, Writer};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::control::{ChannelOp, ConsumeStarted, OpenedChannel, Responder};
use crate::error::Error;
use crate::frames::{split_body, Frame};
use crate::message::{
    Confirmation, ConsumerMessage, Delivery, GetMessage, ReturnedMessage,
};

const OPEN_OK: &[(u16, u16)] = &[(class::CHANNEL, 11)];
const CLOSE_OK: &[(u16, u16)] = &[(class::CHANNEL, 41)];
const FLOW_OK: &[(u16, u16)] = &[(class::CHANNEL, 21)];
const CONSUME_OK: &[(u16, u16)] = &[(class::BASIC, 21)];
const CANCEL_OK: &[(u16, u16)] = &[(class::BASIC, 31)];
const GET_REPLIES: &[(u16, u16)] = &[(class::BASIC, 71), (class::BASIC, 72)];
const CONFIRM_SELECT_OK: &[(u16, u16)] = &[(class::CONFIRM, 11)];

/// What the engine should do with the channel after handling a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MuxEvent {
    Continue,
    /// Close handshake finished; drop the mux from the channel map
    Remove,
}

enum WaiterKind {
    Open(Responder<OpenedChannel>),
    Method(Responder<Method>),
    Consume {
        no_ack: bool,
        responder: Responder<ConsumeStarted>,
    },
    Cancel {
        tag: String,
        responder: Responder<()>,
    },
    Get {
        no_ack: bool,
        responder: Responder<Option<GetMessage>>,
    },
    Flow(Responder<bool>),
    ConfirmSelect(Responder<mpsc::UnboundedReceiver<Confirmation>>),
    Close(Responder<()>),
}

impl WaiterKind {
    fn fail(self, err: Error) {
        match self {
            WaiterKind::Open(r) => drop(r.send(Err(err))),
            WaiterKind::Method(r) => drop(r.send(Err(err))),
            WaiterKind::Consume { responder, .. } => drop(responder.send(Err(err))),
            WaiterKind::Cancel { responder, .. } => drop(responder.send(Err(err))),
            WaiterKind::Get { responder, .. } => drop(responder.send(Err(err))),
            WaiterKind::Flow(r) => drop(r.send(Err(err))),
            WaiterKind::ConfirmSelect(r) => drop(r.send(Err(err))),
            WaiterKind::Close(r) => drop(r.send(Err(err))),
        }
    }
}

struct PendingCall {
    /// The request, still queued behind the in-flight call; `None` once it
    /// is on the wire
    request: Option<Method>,
    expected: &'static [(u16, u16)],
    kind: WaiterKind,
}

struct Assembly {
    method: Method,
    header: Option<ContentHeader>,
    body: BytesMut,
}

struct ConsumerEntry {
    tx: mpsc::UnboundedSender<ConsumerMessage>,
    no_ack: bool,
}

struct ConfirmState {
    next_seq: u64,
    unconfirmed: BTreeSet<u64>,
    listener: mpsc::UnboundedSender<Confirmation>,
}

type HeldPublish = (basic::Publish, BasicProperties, Bytes, Responder<Option<u64>>);

pub(crate) struct ChannelMux {
    id: u16,
    dialect: WireDialect,
    frame_max: u32,
    fail_on_paused_flow: bool,

    pending: VecDeque<PendingCall>,
    assembly: Option<Assembly>,
    consumers: HashMap<String, ConsumerEntry>,

    returned_tx: mpsc::UnboundedSender<ReturnedMessage>,
    returned_rx: Option<mpsc::UnboundedReceiver<ReturnedMessage>>,

    last_delivery_tag: u64,
    outstanding: BTreeSet<u64>,

    flow_active: bool,
    held: VecDeque<HeldPublish>,

    confirm: Option<ConfirmState>,
}

impl ChannelMux {
    pub fn new(id: u16, dialect: WireDialect, frame_max: u32, fail_on_paused_flow: bool) -> Self {
        let (returned_tx, returned_rx) = mpsc::unbounded_channel();
        Self {
            id,
            dialect,
            frame_max,
            fail_on_paused_flow,
            pending: VecDeque::new(),
            assembly: None,
            consumers: HashMap::new(),
            returned_tx,
            returned_rx: Some(returned_rx),
            last_delivery_tag: 0,
            outstanding: BTreeSet::new(),
            flow_active: true,
            held: VecDeque::new(),
            confirm: None,
        }
    }

    /// Emits `channel.open` and parks the opener until `open-ok`.
    pub fn begin_open(&mut self, responder: Responder<OpenedChannel>, out: &mut Vec<Frame>) {
        self.pending.push_back(PendingCall {
            request: None,
            expected: OPEN_OK,
            kind: WaiterKind::Open(responder),
        });
        out.push(Frame::method(self.id, channel::Open::default()));
    }

    /* ---------------------------- commands ---------------------------- */

    pub fn handle_op(&mut self, op: ChannelOp, out: &mut Vec<Frame>) {
        match op {
            ChannelOp::Call {
                request,
                expected,
                responder,
            } => self.submit(request, expected, WaiterKind::Method(responder), out),
            ChannelOp::Consume { request, responder } => {
                let no_ack = request.no_ack;
                self.submit(
                    request.into(),
                    CONSUME_OK,
                    WaiterKind::Consume { no_ack, responder },
                    out,
                );
            }
            ChannelOp::Cancel {
                consumer_tag,
                responder,
            } => {
                let request = basic::Cancel {
                    consumer_tag: consumer_tag.clone(),
                    nowait: false,
                };
                self.submit(
                    request.into(),
                    CANCEL_OK,
                    WaiterKind::Cancel {
                        tag: consumer_tag,
                        responder,
                    },
                    out,
                );
            }
            ChannelOp::Get { request, responder } => {
                let no_ack = request.no_ack;
                self.submit(
                    request.into(),
                    GET_REPLIES,
                    WaiterKind::Get { no_ack, responder },
                    out,
                );
            }
            ChannelOp::Publish {
                request,
                properties,
                body,
                responder,
            } => {
                if !self.flow_active {
                    if self.fail_on_paused_flow {
                        let _ = responder.send(Err(Error::FlowPaused));
                    } else {
                        self.held.push_back((request, properties, body, responder));
                    }
                    return;
                }
                self.emit_publish(request, properties, body, responder, out);
            }
            ChannelOp::Ack { request, responder } => {
                match self.settle(request.delivery_tag, request.multiple) {
                    Ok(()) => {
                        out.push(Frame::method(self.id, request));
                        let _ = responder.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = responder.send(Err(e));
                    }
                }
            }
            ChannelOp::Nack { request, responder } => {
                match self.settle(request.delivery_tag, request.multiple) {
                    Ok(()) => {
                        out.push(Frame::method(self.id, request));
                        let _ = responder.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = responder.send(Err(e));
                    }
                }
            }
            ChannelOp::Reject { request, responder } => {
                match self.settle(request.delivery_tag, false) {
                    Ok(()) => {
                        out.push(Frame::method(self.id, request));
                        let _ = responder.send(Ok(()));
                    }
                    Err(e) => {
                        let _ = responder.send(Err(e));
                    }
                }
            }
            ChannelOp::Flow { active, responder } => self.submit(
                channel::Flow { active }.into(),
                FLOW_OK,
                WaiterKind::Flow(responder),
                out,
            ),
            ChannelOp::ConfirmSelect { responder } => self.submit(
                confirm_select_method(),
                CONFIRM_SELECT_OK,
                WaiterKind::ConfirmSelect(responder),
                out,
            ),
            ChannelOp::UnconfirmedCount { responder } => {
                let count = self.confirm.as_ref().map_or(0, |c| c.unconfirmed.len());
                let _ = responder.send(Ok(count));
            }
            ChannelOp::Close { responder } => {
                let request = channel::Close {
                    reply_code: ferrumq_wire::registry::reply_code::SUCCESS,
                    reply_text: "closed".into(),
                    class_id: 0,
                    method_id: 0,
                };
                self.submit(request.into(), CLOSE_OK, WaiterKind::Close(responder), out);
            }
        }
    }

    /// Queues a synchronous call; only the front of the queue is on the wire.
    fn submit(
        &mut self,
        request: Method,
        expected: &'static [(u16, u16)],
        kind: WaiterKind,
        out: &mut Vec<Frame>,
    ) {
        if let Err(e) = trial_encode(&request, self.dialect) {
            kind.fail(e);
            return;
        }
        let write_now = self.pending.is_empty();
        self.pending.push_back(PendingCall {
            request: if write_now {
                None
            } else {
                Some(request.clone())
            },
            expected,
            kind,
        });
        if write_now {
            out.push(Frame::method(self.id, request));
        }
    }

    fn emit_publish(
        &mut self,
        request: basic::Publish,
        properties: BasicProperties,
        body: Bytes,
        responder: Responder<Option<u64>>,
        out: &mut Vec<Frame>,
    ) {
        let method: Method = request.into();
        if let Err(e) = trial_encode(&method, self.dialect) {
            let _ = responder.send(Err(e));
            return;
        }
        let header = ContentHeader::for_basic(body.len() as u64, properties);
        if let Err(e) = trial_encode_header(&header, self.dialect) {
            let _ = responder.send(Err(e));
            return;
        }

        // method, header, and body chunks leave contiguously; the engine
        // writes the whole outbox under one flush
        out.push(Frame::method(self.id, method));
        out.push(Frame::header(self.id, header));
        for chunk in split_body(&body, self.frame_max) {
            out.push(Frame::body(self.id, chunk));
        }

        let seq = self.confirm.as_mut().map(|c| {
            let seq = c.next_seq;
            c.next_seq += 1;
            c.unconfirmed.insert(seq);
            seq
        });
        let _ = responder.send(Ok(seq));
    }

    /// Removes settled tags, enforcing that a plain ack names an
    /// outstanding delivery. `multiple` with tag zero settles everything.
    fn settle(&mut self, delivery_tag: u64, multiple: bool) -> Result<(), Error> {
        if multiple {
            if delivery_tag == 0 {
                self.outstanding.clear();
            } else {
                self.outstanding = self.outstanding.split_off(&(delivery_tag + 1));
            }
            Ok(())
        } else if self.outstanding.remove(&delivery_tag) {
            Ok(())
        } else {
            Err(Error::UnknownDeliveryTag(delivery_tag))
        }
    }

    /* ---------------------------- incoming ---------------------------- */

    pub fn on_method(&mut self, method: Method, out: &mut Vec<Frame>) -> Result<MuxEvent, Error> {
        if self.assembly.is_some() {
            return Err(Error::ProtocolViolation(format!(
                "method frame on channel {} while content is being assembled",
                self.id
            )));
        }

        if method.carries_content() {
            return match method {
                Method::BasicDeliver(_) | Method::BasicReturn(_) | Method::BasicGetOk(_) => {
                    self.assembly = Some(Assembly {
                        method,
                        header: None,
                        body: BytesMut::new(),
                    });
                    Ok(MuxEvent::Continue)
                }
                other => Err(Error::ProtocolViolation(format!(
                    "{} is not expected from the broker",
                    other.name()
                ))),
            };
        }

        match method {
            Method::ChannelClose(close) => {
                out.push(Frame::method(self.id, channel::CloseOk));
                let err = Error::ChannelClosed {
                    reply_code: close.reply_code,
                    reply_text: close.reply_text,
                    class_id: close.class_id,
                    method_id: close.method_id,
                };
                warn!(channel = self.id, %err, "broker closed channel");
                self.shut_down(&err);
                Ok(MuxEvent::Remove)
            }
            Method::ChannelFlow(flow) => {
                self.flow_active = flow.active;
                out.push(Frame::method(self.id, channel::FlowOk { active: flow.active }));
                if flow.active {
                    self.release_held(out);
                }
                Ok(MuxEvent::Continue)
            }
            Method::BasicCancel(cancel) => {
                // server-initiated consumer cancellation
                if let Some(entry) = self.consumers.remove(&cancel.consumer_tag) {
                    let _ = entry.tx.send(ConsumerMessage::Cancelled);
                }
                Ok(MuxEvent::Continue)
            }
            Method::BasicAck(ack) => self.on_confirm(ack.delivery_tag, ack.multiple, false),
            Method::BasicNack(nack) => self.on_confirm(nack.delivery_tag, nack.multiple, true),
            other => self.on_reply(other, out),
        }
    }

    fn on_reply(&mut self, method: Method, out: &mut Vec<Frame>) -> Result<MuxEvent, Error> {
        let key = (method.class_id(), method.method_id());
        let matches = self
            .pending
            .front()
            .is_some_and(|call| call.expected.contains(&key));
        if !matches {
            return Err(Error::ProtocolViolation(format!(
                "unexpected {} on channel {}",
                method.name(),
                self.id
            )));
        }

        let call = self.pending.pop_front().expect("matched front waiter");
        let mut event = MuxEvent::Continue;
        match call.kind {
            WaiterKind::Open(responder) => {
                let returned = self.returned_rx.take().expect("channel opened once");
                let _ = responder.send(Ok(OpenedChannel {
                    id: self.id,
                    returned,
                }));
            }
            WaiterKind::Method(responder) => {
                let _ = responder.send(Ok(method));
            }
            WaiterKind::Consume { no_ack, responder } => {
                if let Method::BasicConsumeOk(ok) = method {
                    let (tx, rx) = mpsc::unbounded_channel();
                    self.consumers
                        .insert(ok.consumer_tag.clone(), ConsumerEntry { tx, no_ack });
                    let _ = responder.send(Ok(ConsumeStarted {
                        consumer_tag: ok.consumer_tag,
                        deliveries: rx,
                    }));
                }
            }
            WaiterKind::Cancel { tag, responder } => {
                self.consumers.remove(&tag);
                let _ = responder.send(Ok(()));
            }
            WaiterKind::Get { responder, .. } => {
                // only get-empty arrives here; get-ok goes through assembly
                let _ = responder.send(Ok(None));
            }
            WaiterKind::Flow(responder) => {
                if let Method::ChannelFlowOk(ok) = method {
                    self.flow_active = ok.active;
                    if ok.active {
                        self.release_held(out);
                    }
                    let _ = responder.send(Ok(ok.active));
                }
            }
            WaiterKind::ConfirmSelect(responder) => {
                let (tx, rx) = mpsc::unbounded_channel();
                match &mut self.confirm {
                    Some(state) => state.listener = tx,
                    None => {
                        self.confirm = Some(ConfirmState {
                            next_seq: 1,
                            unconfirmed: BTreeSet::new(),
                            listener: tx,
                        });
                    }
                }
                let _ = responder.send(Ok(rx));
            }
            WaiterKind::Close(responder) => {
                let _ = responder.send(Ok(()));
                let err = Error::ChannelClosed {
                    reply_code: ferrumq_wire::registry::reply_code::SUCCESS,
                    reply_text: "closed by client".into(),
                    class_id: 0,
                    method_id: 0,
                };
                self.shut_down(&err);
                event = MuxEvent::Remove;
            }
        }

        self.write_next_queued(out);
        Ok(event)
    }

    pub fn on_header(&mut self, header: ContentHeader, out: &mut Vec<Frame>) -> Result<(), Error> {
        match &mut self.assembly {
            Some(assembly) if assembly.header.is_none() => {
                assembly.header = Some(header);
                self.maybe_finish_content(out)
            }
            Some(_) => Err(Error::ProtocolViolation(format!(
                "repeated content header on channel {}",
                self.id
            ))),
            None => Err(Error::ProtocolViolation(format!(
                "content header on channel {} without a content method",
                self.id
            ))),
        }
    }

    pub fn on_body(&mut self, chunk: Bytes, out: &mut Vec<Frame>) -> Result<(), Error> {
        match &mut self.assembly {
            Some(assembly) => {
                let header = assembly.header.as_ref().ok_or_else(|| {
                    Error::ProtocolViolation(format!(
                        "body frame on channel {} before the content header",
                        self.id
                    ))
                })?;
                if assembly.body.len() as u64 + chunk.len() as u64 > header.body_size {
                    return Err(Error::ProtocolViolation(format!(
                        "body overruns the declared size of {} octets",
                        header.body_size
                    )));
                }
                assembly.body.extend_from_slice(&chunk);
                self.maybe_finish_content(out)
            }
            None => Err(Error::ProtocolViolation(format!(
                "body frame on channel {} without a content method",
                self.id
            ))),
        }
    }

    /// Releases the assembled message once the accumulated body matches the
    /// declared size.
    fn maybe_finish_content(&mut self, out: &mut Vec<Frame>) -> Result<(), Error> {
        let done = self
            .assembly
            .as_ref()
            .and_then(|a| a.header.as_ref().map(|h| a.body.len() as u64 == h.body_size))
            .unwrap_or(false);
        if !done {
            return Ok(());
        }

        let assembly = self.assembly.take().expect("assembly in progress");
        let header = assembly.header.expect("header received");
        let properties = header.properties;
        let body = assembly.body.freeze();

        match assembly.method {
            Method::BasicDeliver(deliver) => {
                self.note_delivery_tag(deliver.delivery_tag)?;
                match self.consumers.get(&deliver.consumer_tag) {
                    Some(entry) => {
                        if !entry.no_ack {
                            self.outstanding.insert(deliver.delivery_tag);
                        }
                        let _ = entry.tx.send(ConsumerMessage::Delivery(Delivery {
                            consumer_tag: deliver.consumer_tag,
                            delivery_tag: deliver.delivery_tag,
                            redelivered: deliver.redelivered,
                            exchange: deliver.exchange,
                            routing_key: deliver.routing_key,
                            properties,
                            body,
                        }));
                    }
                    None => {
                        warn!(
                            channel = self.id,
                            consumer_tag = %deliver.consumer_tag,
                            "dropping delivery for unknown consumer"
                        );
                    }
                }
                Ok(())
            }
            Method::BasicReturn(ret) => {
                let _ = self.returned_tx.send(ReturnedMessage {
                    reply_code: ret.reply_code,
                    reply_text: ret.reply_text,
                    exchange: ret.exchange,
                    routing_key: ret.routing_key,
                    properties,
                    body,
                });
                Ok(())
            }
            Method::BasicGetOk(get_ok) => {
                let front_is_get = matches!(
                    self.pending.front(),
                    Some(PendingCall {
                        kind: WaiterKind::Get { .. },
                        ..
                    })
                );
                if !front_is_get {
                    return Err(Error::ProtocolViolation(format!(
                        "basic.get-ok on channel {} without a pending basic.get",
                        self.id
                    )));
                }
                self.note_delivery_tag(get_ok.delivery_tag)?;
                let call = self.pending.pop_front().expect("pending get");
                if let WaiterKind::Get { no_ack, responder } = call.kind {
                    if !no_ack {
                        self.outstanding.insert(get_ok.delivery_tag);
                    }
                    let _ = responder.send(Ok(Some(GetMessage {
                        delivery_tag: get_ok.delivery_tag,
                        redelivered: get_ok.redelivered,
                        exchange: get_ok.exchange,
                        routing_key: get_ok.routing_key,
                        message_count: get_ok.message_count,
                        properties,
                        body,
                    })));
                }
                self.write_next_queued(out);
                Ok(())
            }
            other => Err(Error::ProtocolViolation(format!(
                "content completed for non-content method {}",
                other.name()
            ))),
        }
    }

    fn note_delivery_tag(&mut self, tag: u64) -> Result<(), Error> {
        if tag <= self.last_delivery_tag {
            return Err(Error::ProtocolViolation(format!(
                "delivery tag {tag} is not greater than {}",
                self.last_delivery_tag
            )));
        }
        self.last_delivery_tag = tag;
        Ok(())
    }

    fn on_confirm(
        &mut self,
        delivery_tag: u64,
        multiple: bool,
        nacked: bool,
    ) -> Result<MuxEvent, Error> {
        let Some(confirm) = &mut self.confirm else {
            return Err(Error::ProtocolViolation(format!(
                "publisher confirm on channel {} outside confirm mode",
                self.id
            )));
        };
        if multiple {
            if delivery_tag == 0 {
                confirm.unconfirmed.clear();
            } else {
                confirm.unconfirmed = confirm.unconfirmed.split_off(&(delivery_tag + 1));
            }
        } else {
            confirm.unconfirmed.remove(&delivery_tag);
        }
        let _ = confirm.listener.send(Confirmation {
            delivery_tag,
            multiple,
            nacked,
        });
        Ok(MuxEvent::Continue)
    }

    /// An unknown method on a user channel fails the pending caller instead
    /// of the connection.
    pub fn on_unknown_method(&mut self, class_id: u16, method_id: u16, out: &mut Vec<Frame>) {
        match self.pending.pop_front() {
            Some(call) => {
                call.kind.fail(Error::UnknownMethod {
                    class_id,
                    method_id,
                });
                self.write_next_queued(out);
            }
            None => {
                trace!(
                    channel = self.id,
                    class_id,
                    method_id,
                    "ignoring unknown method with no waiter"
                );
            }
        }
    }

    fn write_next_queued(&mut self, out: &mut Vec<Frame>) {
        if let Some(next) = self.pending.front_mut() {
            if let Some(request) = next.request.take() {
                out.push(Frame::method(self.id, request));
            }
        }
    }

    fn release_held(&mut self, out: &mut Vec<Frame>) {
        while let Some((request, properties, body, responder)) = self.held.pop_front() {
            self.emit_publish(request, properties, body, responder, out);
        }
    }

    /// Fails every waiter and closes every stream this channel owns.
    fn shut_down(&mut self, err: &Error) {
        for call in self.pending.drain(..) {
            call.kind.fail(err.replicate());
        }
        for (_, _, _, responder) in self.held.drain(..) {
            let _ = responder.send(Err(err.replicate()));
        }
        // dropping the senders ends consumer and confirm streams
        self.consumers.clear();
        self.confirm = None;
        self.assembly = None;
    }

    /// Connection-fatal teardown driven by the engine.
    pub fn fail_all(&mut self, err: &Error) {
        self.shut_down(err);
    }
}

fn confirm_select_method() -> Method {
    ferrumq_wire::methods::confirm::Select { nowait: false }.into()
}

fn trial_encode(method: &Method, dialect: WireDialect) -> Result<(), Error> {
    let mut w = Writer::new(dialect);
    method.encode(&mut w).map_err(Error::from)
}

fn trial_encode_header(header: &ContentHeader, dialect: WireDialect) -> Result<(), Error> {
    let mut w = Writer::new(dialect);
    header.encode(&mut w).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::FramePayload;
    use ferrumq_wire::methods::queue;
    use tokio::sync::oneshot;

    fn open_mux() -> ChannelMux {
        let mut mux = ChannelMux::new(1, WireDialect::Rabbit, 131_072, false);
        let (tx, mut rx) = oneshot::channel();
        let mut out = Vec::new();
        mux.begin_open(tx, &mut out);
        assert_eq!(out.len(), 1);
        mux.on_method(channel::OpenOk::default().into(), &mut out)
            .unwrap();
        assert!(rx.try_recv().unwrap().is_ok());
        mux
    }

    fn deliver_message(mux: &mut ChannelMux, tag: u64, body: &[u8]) {
        let mut out = Vec::new();
        mux.on_method(
            basic::Deliver {
                consumer_tag: "ctag".into(),
                delivery_tag: tag,
                redelivered: false,
                exchange: "".into(),
                routing_key: "q".into(),
            }
            .into(),
            &mut out,
        )
        .unwrap();
        mux.on_header(
            ContentHeader::for_basic(body.len() as u64, BasicProperties::default()),
            &mut out,
        )
        .unwrap();
        if !body.is_empty() {
            mux.on_body(Bytes::copy_from_slice(body), &mut out).unwrap();
        }
        assert!(out.is_empty());
    }

    fn start_consumer(mux: &mut ChannelMux) -> mpsc::UnboundedReceiver<ConsumerMessage> {
        let (tx, mut rx) = oneshot::channel();
        let mut out = Vec::new();
        mux.handle_op(
            ChannelOp::Consume {
                request: basic::Consume {
                    queue: "q".into(),
                    ..Default::default()
                },
                responder: tx,
            },
            &mut out,
        );
        mux.on_method(
            basic::ConsumeOk {
                consumer_tag: "ctag".into(),
            }
            .into(),
            &mut out,
        )
        .unwrap();
        rx.try_recv().unwrap().unwrap().deliveries
    }

    #[test]
    fn synchronous_calls_serialize_fifo() {
        let mut mux = open_mux();
        let mut out = Vec::new();

        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        let declare = |name: &str| queue::Declare {
            queue: name.into(),
            ..Default::default()
        };
        mux.handle_op(
            ChannelOp::Call {
                request: declare("one").into(),
                expected: &[(class::QUEUE, 11)],
                responder: tx1,
            },
            &mut out,
        );
        mux.handle_op(
            ChannelOp::Call {
                request: declare("two").into(),
                expected: &[(class::QUEUE, 11)],
                responder: tx2,
            },
            &mut out,
        );
        // only the first request went on the wire
        assert_eq!(out.len(), 1);

        let ok = queue::DeclareOk {
            queue: "one".into(),
            message_count: 0,
            consumer_count: 0,
        };
        mux.on_method(ok.into(), &mut out).unwrap();
        assert!(rx1.try_recv().unwrap().is_ok());
        // completing the first put the second on the wire
        assert_eq!(out.len(), 2);
        assert!(rx2.try_recv().is_err());

        let ok = queue::DeclareOk {
            queue: "two".into(),
            message_count: 0,
            consumer_count: 0,
        };
        mux.on_method(ok.into(), &mut out).unwrap();
        assert!(rx2.try_recv().unwrap().is_ok());
    }

    #[test]
    fn content_assembly_routes_to_the_consumer() {
        let mut mux = open_mux();
        let mut rx = start_consumer(&mut mux);

        let mut out = Vec::new();
        mux.on_method(
            basic::Deliver {
                consumer_tag: "ctag".into(),
                delivery_tag: 1,
                redelivered: false,
                exchange: "logs".into(),
                routing_key: "info".into(),
            }
            .into(),
            &mut out,
        )
        .unwrap();
        mux.on_header(
            ContentHeader::for_basic(10, BasicProperties::default()),
            &mut out,
        )
        .unwrap();
        mux.on_body(Bytes::from_static(b"hello"), &mut out).unwrap();
        // half the body: nothing released yet
        assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Empty)));
        mux.on_body(Bytes::from_static(b"world"), &mut out).unwrap();

        match rx.try_recv().unwrap() {
            ConsumerMessage::Delivery(delivery) => {
                assert_eq!(delivery.delivery_tag, 1);
                assert_eq!(&delivery.body[..], b"helloworld");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn method_during_assembly_is_fatal() {
        let mut mux = open_mux();
        let _rx = start_consumer(&mut mux);
        let mut out = Vec::new();
        mux.on_method(
            basic::Deliver {
                consumer_tag: "ctag".into(),
                delivery_tag: 1,
                redelivered: false,
                exchange: "".into(),
                routing_key: "".into(),
            }
            .into(),
            &mut out,
        )
        .unwrap();
        let err = mux
            .on_method(channel::Flow { active: false }.into(), &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    #[test]
    fn body_without_content_method_is_fatal() {
        let mut mux = open_mux();
        let mut out = Vec::new();
        let err = mux
            .on_body(Bytes::from_static(b"stray"), &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    #[test]
    fn broker_close_fails_waiters_and_acks_the_close() {
        let mut mux = open_mux();
        let mut out = Vec::new();
        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(
            ChannelOp::Call {
                request: queue::Declare {
                    queue: "missing".into(),
                    passive: true,
                    ..Default::default()
                }
                .into(),
                expected: &[(class::QUEUE, 11)],
                responder: tx,
            },
            &mut out,
        );

        let event = mux
            .on_method(
                channel::Close {
                    reply_code: 404,
                    reply_text: "NOT_FOUND - no queue 'missing'".into(),
                    class_id: class::QUEUE,
                    method_id: 10,
                }
                .into(),
                &mut out,
            )
            .unwrap();
        assert_eq!(event, MuxEvent::Remove);

        // close-ok is on the wire
        assert!(matches!(
            &out.last().unwrap().payload,
            FramePayload::Method(Method::ChannelCloseOk(_))
        ));
        match rx.try_recv().unwrap().unwrap_err() {
            Error::ChannelClosed {
                reply_code,
                class_id,
                ..
            } => {
                assert_eq!(reply_code, 404);
                assert_eq!(class_id, class::QUEUE);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn delivery_tags_must_increase() {
        let mut mux = open_mux();
        let _rx = start_consumer(&mut mux);
        deliver_message(&mut mux, 1, b"a");
        deliver_message(&mut mux, 2, b"b");

        let mut out = Vec::new();
        mux.on_method(
            basic::Deliver {
                consumer_tag: "ctag".into(),
                delivery_tag: 2,
                redelivered: true,
                exchange: "".into(),
                routing_key: "".into(),
            }
            .into(),
            &mut out,
        )
        .unwrap();
        let err = mux
            .on_header(ContentHeader::for_basic(0, BasicProperties::default()), &mut out)
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    #[test]
    fn acks_validate_outstanding_tags() {
        let mut mux = open_mux();
        let _rx = start_consumer(&mut mux);
        deliver_message(&mut mux, 1, b"a");
        deliver_message(&mut mux, 2, b"b");
        deliver_message(&mut mux, 3, b"c");

        let mut out = Vec::new();
        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(
            ChannelOp::Ack {
                request: basic::Ack {
                    delivery_tag: 2,
                    multiple: true,
                },
                responder: tx,
            },
            &mut out,
        );
        assert!(rx.try_recv().unwrap().is_ok());

        // tags 1 and 2 are settled; acking 1 again is refused locally
        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(
            ChannelOp::Ack {
                request: basic::Ack {
                    delivery_tag: 1,
                    multiple: false,
                },
                responder: tx,
            },
            &mut out,
        );
        assert!(matches!(
            rx.try_recv().unwrap().unwrap_err(),
            Error::UnknownDeliveryTag(1)
        ));

        // tag 3 is still outstanding
        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(
            ChannelOp::Ack {
                request: basic::Ack {
                    delivery_tag: 3,
                    multiple: false,
                },
                responder: tx,
            },
            &mut out,
        );
        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn confirm_mode_assigns_and_resolves_sequence_numbers() {
        let mut mux = open_mux();
        let mut out = Vec::new();

        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(ChannelOp::ConfirmSelect { responder: tx }, &mut out);
        mux.on_method(
            ferrumq_wire::methods::confirm::SelectOk.into(),
            &mut out,
        )
        .unwrap();
        let mut confirms = rx.try_recv().unwrap().unwrap();

        let publish = |mux: &mut ChannelMux, out: &mut Vec<Frame>| {
            let (tx, mut rx) = oneshot::channel();
            mux.handle_op(
                ChannelOp::Publish {
                    request: basic::Publish {
                        routing_key: "q".into(),
                        ..Default::default()
                    },
                    properties: BasicProperties::default(),
                    body: Bytes::from_static(b"m"),
                    responder: tx,
                },
                out,
            );
            rx.try_recv().unwrap().unwrap()
        };
        assert_eq!(publish(&mut mux, &mut out), Some(1));
        assert_eq!(publish(&mut mux, &mut out), Some(2));
        assert_eq!(publish(&mut mux, &mut out), Some(3));

        // broker confirms 1 and 2 at once
        mux.on_method(
            basic::Ack {
                delivery_tag: 2,
                multiple: true,
            }
            .into(),
            &mut out,
        )
        .unwrap();
        let confirmation = confirms.try_recv().unwrap();
        assert_eq!(confirmation.delivery_tag, 2);
        assert!(confirmation.multiple);
        assert!(!confirmation.nacked);

        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(ChannelOp::UnconfirmedCount { responder: tx }, &mut out);
        assert_eq!(rx.try_recv().unwrap().unwrap(), 1);
    }

    #[test]
    fn paused_flow_queues_publishes_until_resume() {
        let mut mux = open_mux();
        let mut out = Vec::new();
        mux.on_method(channel::Flow { active: false }.into(), &mut out)
            .unwrap();
        // flow-ok went back
        assert_eq!(out.len(), 1);

        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(
            ChannelOp::Publish {
                request: basic::Publish::default(),
                properties: BasicProperties::default(),
                body: Bytes::from_static(b"queued"),
                responder: tx,
            },
            &mut out,
        );
        // held, not written, not resolved
        assert_eq!(out.len(), 1);
        assert!(rx.try_recv().is_err());

        mux.on_method(channel::Flow { active: true }.into(), &mut out)
            .unwrap();
        // flow-ok + method + header + body
        assert_eq!(out.len(), 5);
        assert!(rx.try_recv().unwrap().is_ok());
    }

    #[test]
    fn paused_flow_can_fail_fast() {
        let mut mux = ChannelMux::new(1, WireDialect::Rabbit, 131_072, true);
        let (tx, _rx) = oneshot::channel();
        let mut out = Vec::new();
        mux.begin_open(tx, &mut out);
        mux.on_method(channel::OpenOk::default().into(), &mut out)
            .unwrap();
        mux.on_method(channel::Flow { active: false }.into(), &mut out)
            .unwrap();

        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(
            ChannelOp::Publish {
                request: basic::Publish::default(),
                properties: BasicProperties::default(),
                body: Bytes::new(),
                responder: tx,
            },
            &mut out,
        );
        assert!(matches!(
            rx.try_recv().unwrap().unwrap_err(),
            Error::FlowPaused
        ));
    }

    #[test]
    fn get_empty_resolves_to_none() {
        let mut mux = open_mux();
        let mut out = Vec::new();
        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(
            ChannelOp::Get {
                request: basic::Get {
                    queue: "q".into(),
                    no_ack: false,
                    ..Default::default()
                },
                responder: tx,
            },
            &mut out,
        );
        mux.on_method(basic::GetEmpty::default().into(), &mut out)
            .unwrap();
        assert!(rx.try_recv().unwrap().unwrap().is_none());
    }

    #[test]
    fn get_ok_resolves_after_its_content() {
        let mut mux = open_mux();
        let mut out = Vec::new();
        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(
            ChannelOp::Get {
                request: basic::Get {
                    queue: "q".into(),
                    no_ack: false,
                    ..Default::default()
                },
                responder: tx,
            },
            &mut out,
        );
        mux.on_method(
            basic::GetOk {
                delivery_tag: 1,
                redelivered: false,
                exchange: "".into(),
                routing_key: "q".into(),
                message_count: 4,
            }
            .into(),
            &mut out,
        )
        .unwrap();
        assert!(rx.try_recv().is_err());

        mux.on_header(ContentHeader::for_basic(3, BasicProperties::default()), &mut out)
            .unwrap();
        mux.on_body(Bytes::from_static(b"msg"), &mut out).unwrap();

        let message = rx.try_recv().unwrap().unwrap().unwrap();
        assert_eq!(message.message_count, 4);
        assert_eq!(&message.body[..], b"msg");
    }

    #[test]
    fn server_cancel_notifies_the_consumer() {
        let mut mux = open_mux();
        let mut rx = start_consumer(&mut mux);
        let mut out = Vec::new();
        mux.on_method(
            basic::Cancel {
                consumer_tag: "ctag".into(),
                nowait: true,
            }
            .into(),
            &mut out,
        )
        .unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            ConsumerMessage::Cancelled
        ));
        // the stream then ends
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn unknown_method_fails_only_the_pending_caller() {
        let mut mux = open_mux();
        let mut out = Vec::new();
        let (tx, mut rx) = oneshot::channel();
        mux.handle_op(
            ChannelOp::Call {
                request: queue::Declare::default().into(),
                expected: &[(class::QUEUE, 11)],
                responder: tx,
            },
            &mut out,
        );
        mux.on_unknown_method(42, 99, &mut out);
        assert!(matches!(
            rx.try_recv().unwrap().unwrap_err(),
            Error::UnknownMethod {
                class_id: 42,
                method_id: 99
            }
        ));
    }
}
