//! Errors surfaced by connections and channels

use std::io;

use ferrumq_wire as wire;

/// What a deadline was guarding when it fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Connect,
    Read,
    Write,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Connect => f.write_str("connect"),
            Operation::Read => f.write_str("read"),
            Operation::Write => f.write_str("write"),
        }
    }
}

/// Everything that can go wrong on a connection or one of its channels.
///
/// Anything that breaks frame synchronization is fatal to the connection and
/// fails every channel with [`Error::ConnectionClosed`]; errors scoped to a
/// single channel fail only that channel's callers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying transport failure
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A caller-supplied value violated a wire-level constraint
    #[error("wire encoding failed: {0}")]
    Encoding(#[source] wire::Error),

    /// The peer sent bytes that do not parse as a legal frame
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The peer sent a legal frame that is illegal in the current state
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The peer sent a method absent from the registry
    #[error("unknown method {class_id}.{method_id}")]
    UnknownMethod { class_id: u16, method_id: u16 },

    /// Broker inactivity exceeded twice the negotiated heartbeat
    #[error("missed heartbeats from broker")]
    HeartbeatMissed,

    /// A connect/read/write deadline elapsed
    #[error("{0} timed out")]
    Timeout(Operation),

    /// The transport is gone or `connection.close` was exchanged.
    /// `reply_code` is zero when the close did not come from the peer.
    #[error("connection closed: {reply_code} {reply_text}")]
    ConnectionClosed { reply_code: u16, reply_text: String },

    /// The channel was closed, usually by a `channel.close` from the broker
    #[error("channel closed: {reply_code} {reply_text}")]
    ChannelClosed {
        reply_code: u16,
        reply_text: String,
        class_id: u16,
        method_id: u16,
    },

    /// A transport-level notice captured while waiting for traffic
    #[error("transport warning during wait: {0}")]
    IoWait(String),

    /// The broker refused the credentials during negotiation
    #[error("authentication failure: {reply_text}")]
    AuthFailure { reply_text: String },

    /// The broker answered the preamble with its own protocol header
    #[error("broker requires protocol version {major}.{minor}.{revision}")]
    VersionMismatch { major: u8, minor: u8, revision: u8 },

    /// The `amqp://` open address did not parse
    #[error("invalid broker url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Only `amqp` is dialed directly; encrypted transports come in through
    /// the stream seam
    #[error("unsupported url scheme {0:?}")]
    UnsupportedScheme(String),

    /// The broker paused the channel and the channel is configured to fail
    /// rather than queue publishes
    #[error("channel flow is paused by the broker")]
    FlowPaused,

    /// An ack/nack/reject named a delivery tag that is not outstanding
    #[error("delivery tag {0} is not outstanding")]
    UnknownDeliveryTag(u64),

    /// Every channel id up to the negotiated channel-max is in use
    #[error("no free channel id under the negotiated channel-max")]
    ChannelMaxReached,
}

impl From<wire::Error> for Error {
    fn from(err: wire::Error) -> Self {
        match err {
            wire::Error::UnknownMethod {
                class_id,
                method_id,
            } => Error::UnknownMethod {
                class_id,
                method_id,
            },
            e if e.is_encoding() => Error::Encoding(e),
            e => Error::MalformedFrame(e.to_string()),
        }
    }
}

impl Error {
    /// Rebuild the error for delivery to another waiter.
    ///
    /// Only the variants that can fan out to several callers are preserved
    /// structurally; the rest collapse into `ConnectionClosed` with the
    /// original message as text.
    pub(crate) fn replicate(&self) -> Error {
        match self {
            Error::ConnectionClosed {
                reply_code,
                reply_text,
            } => Error::ConnectionClosed {
                reply_code: *reply_code,
                reply_text: reply_text.clone(),
            },
            Error::ChannelClosed {
                reply_code,
                reply_text,
                class_id,
                method_id,
            } => Error::ChannelClosed {
                reply_code: *reply_code,
                reply_text: reply_text.clone(),
                class_id: *class_id,
                method_id: *method_id,
            },
            Error::HeartbeatMissed => Error::HeartbeatMissed,
            Error::Timeout(op) => Error::Timeout(*op),
            other => Error::ConnectionClosed {
                reply_code: 0,
                reply_text: other.to_string(),
            },
        }
    }

    /// The reply code carried back to the peer when this error forces us to
    /// initiate the connection close handshake.
    pub(crate) fn close_code(&self) -> u16 {
        use ferrumq_wire::registry::reply_code;
        match self {
            Error::MalformedFrame(_) | Error::UnknownMethod { .. } => reply_code::FRAME_ERROR,
            Error::ProtocolViolation(_) => reply_code::UNEXPECTED_FRAME,
            _ => reply_code::INTERNAL_ERROR,
        }
    }
}
