//! The connection: builder, public handle, engine task
//!
//! A [`Connection`] is a handle onto the engine task that owns the socket.
//! Dropping every handle (connection and channels) makes the engine send a
//! final `connection.close` and exit.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::channel::Channel;
use crate::control::{Command, ConnectionEvent};
use crate::error::Error;

pub mod builder;
pub(crate) mod engine;
pub(crate) mod heartbeat;

pub use builder::Builder;

/// The values committed in `connection.tune-ok`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub channel_max: u16,
    pub frame_max: u32,
    /// Seconds; zero means heartbeats are disabled
    pub heartbeat: u16,
}

/// An open connection to a broker.
#[derive(Debug)]
pub struct Connection {
    commands: mpsc::Sender<Command>,
    events: mpsc::UnboundedReceiver<ConnectionEvent>,
    tuning: Tuning,
    engine: JoinHandle<()>,
}

impl Connection {
    /// Starts configuring a connection; see [`Builder`].
    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
        tuning: Tuning,
        engine: JoinHandle<()>,
    ) -> Self {
        Self {
            commands,
            events,
            tuning,
            engine,
        }
    }

    /// The limits fixed by tune negotiation.
    pub fn tuning(&self) -> Tuning {
        self.tuning
    }

    /// Opens the next free channel.
    pub async fn open_channel(&self) -> Result<Channel, Error> {
        let (responder, reply) = oneshot::channel();
        self.commands
            .send(Command::OpenChannel { responder })
            .await
            .map_err(|_| engine_gone())?;
        let opened = reply.await.map_err(|_| engine_gone())??;
        Ok(Channel::new(opened, self.commands.clone()))
    }

    /// The next out-of-band notification: blocked/unblocked state or an
    /// observed process signal. `None` once the connection is finished.
    pub async fn recv_event(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }

    /// Performs the close handshake and waits for the engine to finish.
    pub async fn close(self) -> Result<(), Error> {
        let (responder, reply) = oneshot::channel();
        if self
            .commands
            .send(Command::CloseConnection { responder })
            .await
            .is_err()
        {
            // engine already gone
            return Ok(());
        }
        let result = match reply.await {
            Ok(result) => result,
            Err(_) => Ok(()),
        };
        let _ = self.engine.await;
        result
    }
}

fn engine_gone() -> Error {
    Error::ConnectionClosed {
        reply_code: 0,
        reply_text: "connection is closed".into(),
    }
}
