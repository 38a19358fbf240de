//! AMQP 0-9-1 wire types and codec
//!
//! Everything here is pure and transport-free: cursored primitive encodings,
//! tagged field values and ordered tables, the typed method classes with
//! their registry, and the content header with the basic property set. The
//! `ferrumq` crate layers framing, I/O, and the connection and channel state
//! machines on top.

pub mod codec;
pub mod content;
pub mod dialect;
pub mod error;
pub mod methods;
pub mod properties;
pub mod registry;
pub mod table;

pub use codec::{Reader, Writer};
pub use content::ContentHeader;
pub use dialect::WireDialect;
pub use error::Error;
pub use methods::Method;
pub use properties::BasicProperties;
pub use table::{Decimal, FieldArray, FieldTable, FieldValue};
