//! Queue-class methods (class id 50)

use crate::codec::{Reader, Writer};
use crate::error::Error;
use crate::table::FieldTable;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Declare {
    pub ticket: u16,
    pub queue: String,
    pub passive: bool,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub nowait: bool,
    pub arguments: FieldTable,
}

impl Declare {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.queue)?;
        w.write_bit(self.passive);
        w.write_bit(self.durable);
        w.write_bit(self.exclusive);
        w.write_bit(self.auto_delete);
        w.write_bit(self.nowait);
        self.arguments.encode(w)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            queue: r.read_shortstr()?,
            passive: r.read_bit()?,
            durable: r.read_bit()?,
            exclusive: r.read_bit()?,
            auto_delete: r.read_bit()?,
            nowait: r.read_bit()?,
            arguments: FieldTable::decode(r)?,
        })
    }
}

/// Reports the declared queue's name (server-named when the request left it
/// empty) and its current depth.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclareOk {
    pub queue: String,
    pub message_count: u32,
    pub consumer_count: u32,
}

impl DeclareOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_shortstr(&self.queue)?;
        w.write_long(self.message_count);
        w.write_long(self.consumer_count);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            queue: r.read_shortstr()?,
            message_count: r.read_long()?,
            consumer_count: r.read_long()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bind {
    pub ticket: u16,
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
    pub nowait: bool,
    pub arguments: FieldTable,
}

impl Bind {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.queue)?;
        w.write_shortstr(&self.exchange)?;
        w.write_shortstr(&self.routing_key)?;
        w.write_bit(self.nowait);
        self.arguments.encode(w)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            queue: r.read_shortstr()?,
            exchange: r.read_shortstr()?,
            routing_key: r.read_shortstr()?,
            nowait: r.read_bit()?,
            arguments: FieldTable::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BindOk;

impl BindOk {
    pub fn encode_args(&self, _w: &mut Writer) -> Result<(), Error> {
        Ok(())
    }

    pub fn decode_args(_r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self)
    }
}

/// Note: unlike `queue.bind` there is no `nowait` bit in the grammar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Unbind {
    pub ticket: u16,
    pub queue: String,
    pub exchange: String,
    pub routing_key: String,
    pub arguments: FieldTable,
}

impl Unbind {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.queue)?;
        w.write_shortstr(&self.exchange)?;
        w.write_shortstr(&self.routing_key)?;
        self.arguments.encode(w)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            queue: r.read_shortstr()?,
            exchange: r.read_shortstr()?,
            routing_key: r.read_shortstr()?,
            arguments: FieldTable::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnbindOk;

impl UnbindOk {
    pub fn encode_args(&self, _w: &mut Writer) -> Result<(), Error> {
        Ok(())
    }

    pub fn decode_args(_r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Purge {
    pub ticket: u16,
    pub queue: String,
    pub nowait: bool,
}

impl Purge {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.queue)?;
        w.write_bit(self.nowait);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            queue: r.read_shortstr()?,
            nowait: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeOk {
    pub message_count: u32,
}

impl PurgeOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_long(self.message_count);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            message_count: r.read_long()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delete {
    pub ticket: u16,
    pub queue: String,
    pub if_unused: bool,
    pub if_empty: bool,
    pub nowait: bool,
}

impl Delete {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.queue)?;
        w.write_bit(self.if_unused);
        w.write_bit(self.if_empty);
        w.write_bit(self.nowait);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            queue: r.read_shortstr()?,
            if_unused: r.read_bit()?,
            if_empty: r.read_bit()?,
            nowait: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOk {
    pub message_count: u32,
}

impl DeleteOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_long(self.message_count);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            message_count: r.read_long()?,
        })
    }
}
