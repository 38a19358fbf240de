//! An AMQP 0-9-1 client for RabbitMQ-family brokers
//!
//! The crate speaks the framed, multiplexed 0-9-1 session: one TCP (or any
//! byte-stream) transport, a negotiated tune, logical channels for
//! publishing and consuming, and a bidirectional heartbeat that detects
//! half-open peers.
//!
//! ```no_run
//! use ferrumq::{Connection, Publish, QueueDeclareOptions};
//!
//! # async fn run() -> Result<(), ferrumq::Error> {
//! let connection = Connection::builder()
//!     .host("localhost")
//!     .credentials("guest", "guest")
//!     .open()
//!     .await?;
//!
//! let channel = connection.open_channel().await?;
//! channel
//!     .queue_declare("work", QueueDeclareOptions::default())
//!     .await?;
//! channel
//!     .basic_publish(Publish::new("", "work", "hello"))
//!     .await?;
//!
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Wire-level types (field tables, method classes, properties) live in the
//! [`wire`] crate, re-exported here.

pub mod channel;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod frames;
pub mod message;
pub mod sasl;

mod control;
mod signal;
mod transport;

pub use ferrumq_wire as wire;

pub use channel::{
    Channel, ConsumeOptions, ExchangeDeclareOptions, QueueDeclareOptions, QueueDeleteOptions,
};
pub use connection::{Builder, Connection, Tuning};
pub use consumer::Consumer;
pub use control::ConnectionEvent;
pub use error::{Error, Operation};
pub use message::{
    Confirmation, ConsumerMessage, Delivery, GetMessage, Publish, ReturnedMessage,
};
pub use sasl::SaslMechanism;
pub use signal::CaughtSignal;
pub use ferrumq_wire::{BasicProperties, FieldArray, FieldTable, FieldValue, WireDialect};
