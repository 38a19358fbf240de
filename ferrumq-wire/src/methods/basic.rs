//! Basic-class methods (class id 60): publish/consume/ack and friends
//!
//! `publish`, `return`, `deliver`, and `get-ok` carry content: each is
//! followed on the wire by a content header frame and body frames.
//! `nack` is the RabbitMQ extension combining reject with multiple-tag
//! semantics.

use crate::codec::{Reader, Writer};
use crate::error::Error;
use crate::table::FieldTable;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Qos {
    pub prefetch_size: u32,
    pub prefetch_count: u16,
    pub global: bool,
}

impl Qos {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_long(self.prefetch_size);
        w.write_short(self.prefetch_count);
        w.write_bit(self.global);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            prefetch_size: r.read_long()?,
            prefetch_count: r.read_short()?,
            global: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QosOk;

impl QosOk {
    pub fn encode_args(&self, _w: &mut Writer) -> Result<(), Error> {
        Ok(())
    }

    pub fn decode_args(_r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Consume {
    pub ticket: u16,
    pub queue: String,
    /// Empty asks the server to generate a tag
    pub consumer_tag: String,
    pub no_local: bool,
    pub no_ack: bool,
    pub exclusive: bool,
    pub nowait: bool,
    pub arguments: FieldTable,
}

impl Consume {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.queue)?;
        w.write_shortstr(&self.consumer_tag)?;
        w.write_bit(self.no_local);
        w.write_bit(self.no_ack);
        w.write_bit(self.exclusive);
        w.write_bit(self.nowait);
        self.arguments.encode(w)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            queue: r.read_shortstr()?,
            consumer_tag: r.read_shortstr()?,
            no_local: r.read_bit()?,
            no_ack: r.read_bit()?,
            exclusive: r.read_bit()?,
            nowait: r.read_bit()?,
            arguments: FieldTable::decode(r)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumeOk {
    pub consumer_tag: String,
}

impl ConsumeOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_shortstr(&self.consumer_tag)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            consumer_tag: r.read_shortstr()?,
        })
    }
}

/// Client-initiated cancel, and also sent by RabbitMQ to a consumer whose
/// queue was deleted when `consumer_cancel_notify` is active.
#[derive(Debug, Clone, PartialEq)]
pub struct Cancel {
    pub consumer_tag: String,
    pub nowait: bool,
}

impl Cancel {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_shortstr(&self.consumer_tag)?;
        w.write_bit(self.nowait);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            consumer_tag: r.read_shortstr()?,
            nowait: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelOk {
    pub consumer_tag: String,
}

impl CancelOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_shortstr(&self.consumer_tag)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            consumer_tag: r.read_shortstr()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Publish {
    pub ticket: u16,
    pub exchange: String,
    pub routing_key: String,
    pub mandatory: bool,
    pub immediate: bool,
}

impl Publish {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.exchange)?;
        w.write_shortstr(&self.routing_key)?;
        w.write_bit(self.mandatory);
        w.write_bit(self.immediate);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            exchange: r.read_shortstr()?,
            routing_key: r.read_shortstr()?,
            mandatory: r.read_bit()?,
            immediate: r.read_bit()?,
        })
    }
}

/// An unroutable mandatory/immediate publish coming back.
#[derive(Debug, Clone, PartialEq)]
pub struct Return {
    pub reply_code: u16,
    pub reply_text: String,
    pub exchange: String,
    pub routing_key: String,
}

impl Return {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.reply_code);
        w.write_shortstr(&self.reply_text)?;
        w.write_shortstr(&self.exchange)?;
        w.write_shortstr(&self.routing_key)?;
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reply_code: r.read_short()?,
            reply_text: r.read_shortstr()?,
            exchange: r.read_shortstr()?,
            routing_key: r.read_shortstr()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Deliver {
    pub consumer_tag: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
}

impl Deliver {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_shortstr(&self.consumer_tag)?;
        w.write_longlong(self.delivery_tag);
        w.write_bit(self.redelivered);
        w.write_shortstr(&self.exchange)?;
        w.write_shortstr(&self.routing_key)?;
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            consumer_tag: r.read_shortstr()?,
            delivery_tag: r.read_longlong()?,
            redelivered: r.read_bit()?,
            exchange: r.read_shortstr()?,
            routing_key: r.read_shortstr()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Get {
    pub ticket: u16,
    pub queue: String,
    pub no_ack: bool,
}

impl Get {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.ticket);
        w.write_shortstr(&self.queue)?;
        w.write_bit(self.no_ack);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            ticket: r.read_short()?,
            queue: r.read_shortstr()?,
            no_ack: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GetOk {
    pub delivery_tag: u64,
    pub redelivered: bool,
    pub exchange: String,
    pub routing_key: String,
    pub message_count: u32,
}

impl GetOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_longlong(self.delivery_tag);
        w.write_bit(self.redelivered);
        w.write_shortstr(&self.exchange)?;
        w.write_shortstr(&self.routing_key)?;
        w.write_long(self.message_count);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            delivery_tag: r.read_longlong()?,
            redelivered: r.read_bit()?,
            exchange: r.read_shortstr()?,
            routing_key: r.read_shortstr()?,
            message_count: r.read_long()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GetEmpty {
    /// Deprecated cluster-id field, always empty
    pub cluster_id: String,
}

impl GetEmpty {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_shortstr(&self.cluster_id)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            cluster_id: r.read_shortstr()?,
        })
    }
}

/// `multiple` acknowledges every unacknowledged tag up to and including
/// `delivery_tag`. Sent by the broker in confirm mode as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub delivery_tag: u64,
    pub multiple: bool,
}

impl Ack {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_longlong(self.delivery_tag);
        w.write_bit(self.multiple);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            delivery_tag: r.read_longlong()?,
            multiple: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reject {
    pub delivery_tag: u64,
    pub requeue: bool,
}

impl Reject {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_longlong(self.delivery_tag);
        w.write_bit(self.requeue);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            delivery_tag: r.read_longlong()?,
            requeue: r.read_bit()?,
        })
    }
}

/// Deprecated fire-and-forget recover, kept for wire completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoverAsync {
    pub requeue: bool,
}

impl RecoverAsync {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_bit(self.requeue);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            requeue: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Recover {
    pub requeue: bool,
}

impl Recover {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_bit(self.requeue);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            requeue: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoverOk;

impl RecoverOk {
    pub fn encode_args(&self, _w: &mut Writer) -> Result<(), Error> {
        Ok(())
    }

    pub fn decode_args(_r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nack {
    pub delivery_tag: u64,
    pub multiple: bool,
    pub requeue: bool,
}

impl Nack {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_longlong(self.delivery_tag);
        w.write_bit(self.multiple);
        w.write_bit(self.requeue);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            delivery_tag: r.read_longlong()?,
            multiple: r.read_bit()?,
            requeue: r.read_bit()?,
        })
    }
}
