//! Exchange-class methods (class id 40)
//!
//! `bind`/`unbind` are the RabbitMQ exchange-to-exchange binding extension.

use crate::codec::{Reader, Writer};
use crate::error::Error;
use crate::table::FieldTable;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Declare {
    pub ticket: u16,
    pub exchange: String,
    pub exchange_type: String,
    pub passive: bool,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    pub nowait: bool,
    pub arguments: FieldTable,
}

impl Declare {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.exchange)?;
        w.write_shortstr(&self.exchange_type)?;
        w.write_bit(self.passive);
        w.write_bit(self.durable);
        w.write_bit(self.auto_delete);
        w.write_bit(self.internal);
        w.write_bit(self.nowait);
        self.arguments.encode(w)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            exchange: r.read_shortstr()?,
            exchange_type: r.read_shortstr()?,
            passive: r.read_bit()?,
            durable: r.read_bit()?,
            auto_delete: r.read_bit()?,
            internal: r.read_bit()?,
            nowait: r.read_bit()?,
            arguments: FieldTable::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeclareOk;

impl DeclareOk {
    pub fn encode_args(&self, _w: &mut Writer) -> Result<(), Error> {
        Ok(())
    }

    pub fn decode_args(_r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Delete {
    pub ticket: u16,
    pub exchange: String,
    pub if_unused: bool,
    pub nowait: bool,
}

impl Delete {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.exchange)?;
        w.write_bit(self.if_unused);
        w.write_bit(self.nowait);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            exchange: r.read_shortstr()?,
            if_unused: r.read_bit()?,
            nowait: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOk;

impl DeleteOk {
    pub fn encode_args(&self, _w: &mut Writer) -> Result<(), Error> {
        Ok(())
    }

    pub fn decode_args(_r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bind {
    pub ticket: u16,
    pub destination: String,
    pub source: String,
    pub routing_key: String,
    pub nowait: bool,
    pub arguments: FieldTable,
}

impl Bind {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.destination)?;
        w.write_shortstr(&self.source)?;
        w.write_shortstr(&self.routing_key)?;
        w.write_bit(self.nowait);
        self.arguments.encode(w)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            destination: r.read_shortstr()?,
            source: r.read_shortstr()?,
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

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Unbind {
    pub ticket: u16,
    pub destination: String,
    pub source: String,
    pub routing_key: String,
    pub nowait: bool,
    pub arguments: FieldTable,
}

impl Unbind {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.destination)?;
        w.write_shortstr(&self.source)?;
        w.write_shortstr(&self.routing_key)?;
        w.write_bit(self.nowait);
        self.arguments.encode(w)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            destination: r.read_shortstr()?,
            source: r.read_shortstr()?,
            routing_key: r.read_shortstr()?,
            nowait: r.read_bit()?,
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
