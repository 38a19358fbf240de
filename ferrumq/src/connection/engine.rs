//! The connection event loop
//!
//! One engine task owns the transport and every channel state machine. The
//! `tokio::select!` below is the wait primitive: it resumes on inbound
//! frames, the heartbeat tick, application commands, or an observed process
//! signal, and each arm runs to completion before the next wait.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use ferrumq_wire::methods::connection as connection_m;
use ferrumq_wire::methods::Method;
use ferrumq_wire::registry::{class, reply_code};
use ferrumq_wire::WireDialect;

use crate::channel::mux::{ChannelMux, MuxEvent};
use crate::control::{Command, ConnectionEvent, Responder};
use crate::error::{Error, Operation};
use crate::frames::{Frame, FramePayload};
use crate::signal::{CaughtSignal, SignalWatcher};
use crate::transport::Transport;

use super::heartbeat::{HeartBeat, HeartbeatStatus};
use super::Tuning;

#[derive(Debug)]
enum Running {
    Continue,
    Stop,
}

/// Connection-level settings the engine needs at runtime.
pub(crate) struct EngineConfig {
    pub tuning: Tuning,
    pub dialect: WireDialect,
    pub dispatch_signals: bool,
    pub fail_on_paused_flow: bool,
    pub write_timeout: Duration,
}

/// Set once the close handshake is underway; the responder is present only
/// for a client-requested close.
struct CloseWait {
    responder: Option<Responder<()>>,
}

pub(crate) struct ConnectionEngine<Io> {
    transport: Transport<Io>,
    config: EngineConfig,

    channels: HashMap<u16, ChannelMux>,
    next_channel_id: u16,

    commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    signals: SignalWatcher,
    heartbeat: HeartBeat,

    closing: Option<CloseWait>,
}

impl<Io> ConnectionEngine<Io>
where
    Io: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    pub fn new(
        transport: Transport<Io>,
        config: EngineConfig,
        commands: mpsc::Receiver<Command>,
        events: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        let heartbeat = if transport.heartbeat_enabled() {
            HeartBeat::new()
        } else {
            HeartBeat::never()
        };
        Self {
            transport,
            config,
            channels: HashMap::new(),
            next_channel_id: 1,
            commands,
            events,
            signals: SignalWatcher::new(),
            heartbeat,
            closing: None,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.event_loop())
    }

    async fn event_loop(mut self) {
        loop {
            let step = tokio::select! {
                frame = self.transport.next() => self.on_frame(frame).await,
                Some(()) = self.heartbeat.next() => self.on_tick().await,
                command = self.commands.recv() => self.on_command(command).await,
                signal = self.signals.recv() => {
                    self.on_signal(signal);
                    Ok(Running::Continue)
                }
            };
            match step {
                Ok(Running::Continue) => {}
                Ok(Running::Stop) => break,
                Err(err) => {
                    self.shutdown_with(err);
                    break;
                }
            }
        }
        let _ = self.transport.close().await;
        trace!("connection engine exited");
    }

    /* ---------------------------- inbound ----------------------------- */

    async fn on_frame(&mut self, frame: Option<Result<Frame, Error>>) -> Result<Running, Error> {
        let frame = match frame {
            None => {
                if self.closing.is_some() {
                    // the broker may drop the transport instead of answering
                    // our close with close-ok
                    self.finish_close();
                    return Ok(Running::Stop);
                }
                return Err(Error::ConnectionClosed {
                    reply_code: 0,
                    reply_text: "transport closed by broker".into(),
                });
            }
            // a transport-level notice observed while waiting surfaces as
            // one IoWait failure; framing-level errors keep their kind
            Some(Err(Error::Io(e))) => return Err(Error::IoWait(e.to_string())),
            Some(Err(e)) => return Err(e),
            Some(Ok(frame)) => frame,
        };

        if frame.channel == 0 {
            self.on_connection_frame(frame.payload).await
        } else if self.closing.is_some() {
            // discard everything except connection.close-ok
            Ok(Running::Continue)
        } else {
            self.on_channel_frame(frame.channel, frame.payload).await
        }
    }

    async fn on_connection_frame(&mut self, payload: FramePayload) -> Result<Running, Error> {
        match payload {
            FramePayload::Heartbeat => Ok(Running::Continue),
            FramePayload::Method(method) => self.on_connection_method(method).await,
            FramePayload::UnknownMethod {
                class_id,
                method_id,
            } => {
                if self.closing.is_some() {
                    return Ok(Running::Continue);
                }
                self.initiate_fault_close(
                    reply_code::FRAME_ERROR,
                    format!("unknown method {class_id}.{method_id} on channel 0"),
                    class_id,
                    method_id,
                )
                .await?;
                Ok(Running::Continue)
            }
            FramePayload::Header(_) | FramePayload::Body(_) => {
                if self.closing.is_some() {
                    return Ok(Running::Continue);
                }
                self.initiate_fault_close(
                    reply_code::UNEXPECTED_FRAME,
                    "content frame on channel 0".into(),
                    0,
                    0,
                )
                .await?;
                Ok(Running::Continue)
            }
        }
    }

    async fn on_connection_method(&mut self, method: Method) -> Result<Running, Error> {
        match method {
            Method::ConnectionClose(close) => {
                let _ = self
                    .write_frames(vec![Frame::method(0, connection_m::CloseOk)])
                    .await;
                let err = Error::ConnectionClosed {
                    reply_code: close.reply_code,
                    reply_text: close.reply_text,
                };
                warn!(%err, "broker closed the connection");
                self.fail_channels(&err);
                self.finish_close();
                Ok(Running::Stop)
            }
            Method::ConnectionCloseOk(_) => {
                if self.closing.is_none() {
                    return Err(Error::ProtocolViolation(
                        "connection.close-ok without a pending close".into(),
                    ));
                }
                self.finish_close();
                Ok(Running::Stop)
            }
            Method::ConnectionBlocked(blocked) => {
                debug!(reason = %blocked.reason, "broker blocked the connection");
                let _ = self.events.send(ConnectionEvent::Blocked {
                    reason: blocked.reason,
                });
                Ok(Running::Continue)
            }
            Method::ConnectionUnblocked(_) => {
                debug!("broker unblocked the connection");
                let _ = self.events.send(ConnectionEvent::Unblocked);
                Ok(Running::Continue)
            }
            other => {
                if self.closing.is_some() {
                    return Ok(Running::Continue);
                }
                let code = if other.class_id() == class::CONNECTION {
                    reply_code::UNEXPECTED_FRAME
                } else {
                    reply_code::COMMAND_INVALID
                };
                let (failing_class, failing_method) = (other.class_id(), other.method_id());
                self.initiate_fault_close(
                    code,
                    format!("{} is out of context on channel 0", other.name()),
                    failing_class,
                    failing_method,
                )
                .await?;
                Ok(Running::Continue)
            }
        }
    }

    async fn on_channel_frame(&mut self, id: u16, payload: FramePayload) -> Result<Running, Error> {
        if matches!(payload, FramePayload::Heartbeat) {
            self.initiate_fault_close(
                reply_code::FRAME_ERROR,
                format!("heartbeat frame on channel {id}"),
                0,
                0,
            )
            .await?;
            return Ok(Running::Continue);
        }

        let mut out = Vec::new();
        let result = match self.channels.get_mut(&id) {
            None => None,
            Some(mux) => Some(match payload {
                FramePayload::Method(method) => mux.on_method(method, &mut out),
                FramePayload::Header(header) => {
                    mux.on_header(header, &mut out).map(|_| MuxEvent::Continue)
                }
                FramePayload::Body(body) => {
                    mux.on_body(body, &mut out).map(|_| MuxEvent::Continue)
                }
                FramePayload::UnknownMethod {
                    class_id,
                    method_id,
                } => {
                    mux.on_unknown_method(class_id, method_id, &mut out);
                    Ok(MuxEvent::Continue)
                }
                FramePayload::Heartbeat => Ok(MuxEvent::Continue),
            }),
        };

        let Some(result) = result else {
            self.initiate_fault_close(
                reply_code::CHANNEL_ERROR,
                format!("frame for unknown channel {id}"),
                0,
                0,
            )
            .await?;
            return Ok(Running::Continue);
        };

        match result {
            Ok(event) => {
                self.write_frames(out).await?;
                if event == MuxEvent::Remove {
                    self.channels.remove(&id);
                }
                Ok(Running::Continue)
            }
            Err(err) => {
                // the peer broke channel framing; the whole stream is suspect
                let code = err.close_code();
                self.initiate_fault_close(code, err.to_string(), 0, 0).await?;
                Ok(Running::Continue)
            }
        }
    }

    /* ---------------------------- commands ---------------------------- */

    async fn on_command(&mut self, command: Option<Command>) -> Result<Running, Error> {
        let Some(command) = command else {
            return self.on_handles_dropped().await;
        };

        match command {
            Command::OpenChannel { responder } => {
                if self.closing.is_some() {
                    let _ = responder.send(Err(engine_closed()));
                    return Ok(Running::Continue);
                }
                match self.allocate_channel_id() {
                    Some(id) => {
                        let mut mux = ChannelMux::new(
                            id,
                            self.config.dialect,
                            self.config.tuning.frame_max,
                            self.config.fail_on_paused_flow,
                        );
                        let mut out = Vec::new();
                        mux.begin_open(responder, &mut out);
                        self.channels.insert(id, mux);
                        self.write_frames(out).await?;
                    }
                    None => {
                        let _ = responder.send(Err(Error::ChannelMaxReached));
                    }
                }
                Ok(Running::Continue)
            }
            Command::CloseConnection { responder } => {
                if self.closing.is_some() {
                    let _ = responder.send(Ok(()));
                    return Ok(Running::Continue);
                }
                self.fail_channels(&Error::ConnectionClosed {
                    reply_code: reply_code::SUCCESS,
                    reply_text: "connection closed by client".into(),
                });
                self.closing = Some(CloseWait {
                    responder: Some(responder),
                });
                self.write_frames(vec![Frame::method(
                    0,
                    connection_m::Close {
                        reply_code: reply_code::SUCCESS,
                        reply_text: "closed".into(),
                        class_id: 0,
                        method_id: 0,
                    },
                )])
                .await?;
                Ok(Running::Continue)
            }
            Command::Channel { id, op } => {
                if self.closing.is_some() {
                    op.fail(engine_closed());
                    return Ok(Running::Continue);
                }
                match self.channels.get_mut(&id) {
                    Some(mux) => {
                        let mut out = Vec::new();
                        mux.handle_op(op, &mut out);
                        self.write_frames(out).await?;
                    }
                    None => op.fail(Error::ChannelClosed {
                        reply_code: 0,
                        reply_text: format!("channel {id} is closed"),
                        class_id: 0,
                        method_id: 0,
                    }),
                }
                Ok(Running::Continue)
            }
        }
    }

    /// Every handle is gone; close the connection on a best-effort basis.
    async fn on_handles_dropped(&mut self) -> Result<Running, Error> {
        if self.closing.is_none() {
            debug!("all handles dropped, closing connection");
            let _ = self
                .write_frames(vec![Frame::method(
                    0,
                    connection_m::Close {
                        reply_code: reply_code::SUCCESS,
                        reply_text: "client handles dropped".into(),
                        class_id: 0,
                        method_id: 0,
                    },
                )])
                .await;
        }
        Ok(Running::Stop)
    }

    fn allocate_channel_id(&mut self) -> Option<u16> {
        let max = self.config.tuning.channel_max.max(1);
        for _ in 0..max {
            let id = self.next_channel_id;
            self.next_channel_id = if id >= max { 1 } else { id + 1 };
            if !self.channels.contains_key(&id) {
                return Some(id);
            }
        }
        None
    }

    /* ----------------------- heartbeat & signals ---------------------- */

    async fn on_tick(&mut self) -> Result<Running, Error> {
        match self.transport.check_heartbeat() {
            HeartbeatStatus::Missed => Err(Error::HeartbeatMissed),
            HeartbeatStatus::SendDue => {
                trace!("emitting heartbeat frame");
                self.write_frames(vec![Frame::heartbeat()]).await?;
                Ok(Running::Continue)
            }
            HeartbeatStatus::Idle => Ok(Running::Continue),
        }
    }

    /// Signals never abort the wait: they are recorded, optionally surfaced
    /// to the application, and the loop re-enters the select.
    fn on_signal(&mut self, signal: CaughtSignal) {
        debug!(?signal, "process signal observed during wait");
        if self.config.dispatch_signals {
            let _ = self.events.send(ConnectionEvent::SignalCaught(signal));
        }
    }

    /* ----------------------------- teardown --------------------------- */

    /// Sends `connection.close` for a fault we detected and starts
    /// discarding traffic until `close-ok` (or transport loss) finishes the
    /// handshake.
    async fn initiate_fault_close(
        &mut self,
        code: u16,
        text: String,
        failing_class: u16,
        failing_method: u16,
    ) -> Result<(), Error> {
        error!(code, %text, "closing connection on protocol fault");
        self.fail_channels(&Error::ConnectionClosed {
            reply_code: code,
            reply_text: text.clone(),
        });
        self.closing = Some(CloseWait { responder: None });
        self.write_frames(vec![Frame::method(
            0,
            connection_m::Close {
                reply_code: code,
                reply_text: text,
                class_id: failing_class,
                method_id: failing_method,
            },
        )])
        .await
    }

    fn finish_close(&mut self) {
        if let Some(mut wait) = self.closing.take() {
            if let Some(responder) = wait.responder.take() {
                let _ = responder.send(Ok(()));
            }
        }
    }

    fn shutdown_with(&mut self, err: Error) {
        error!(%err, "connection failed");
        self.fail_channels(&err);
        if let Some(mut wait) = self.closing.take() {
            if let Some(responder) = wait.responder.take() {
                let _ = responder.send(Err(err.replicate()));
            }
        }
    }

    fn fail_channels(&mut self, err: &Error) {
        for mux in self.channels.values_mut() {
            mux.fail_all(err);
        }
        self.channels.clear();
    }

    /// Writes a batch of frames under one flush so multi-frame content stays
    /// contiguous on the wire.
    async fn write_frames(&mut self, frames: Vec<Frame>) -> Result<(), Error> {
        if frames.is_empty() {
            return Ok(());
        }
        let write_timeout = self.config.write_timeout;
        let transport = &mut self.transport;
        let write = async move {
            for frame in frames {
                transport.feed(frame).await?;
            }
            transport.flush().await
        };
        tokio::time::timeout(write_timeout, write)
            .await
            .map_err(|_| Error::Timeout(Operation::Write))?
    }
}

fn engine_closed() -> Error {
    Error::ConnectionClosed {
        reply_code: 0,
        reply_text: "connection is closed".into(),
    }
}
