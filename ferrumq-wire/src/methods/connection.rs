//! Connection-class methods (class id 10)
//!
//! These travel exclusively on channel 0 and drive the protocol preamble,
//! tune negotiation, open/close handshake, and RabbitMQ's blocked
//! notifications.

use bytes::Bytes;

use crate::codec::{Reader, Writer};
use crate::error::Error;
use crate::table::FieldTable;

/// Opens the negotiation: the server announces its protocol version, its
/// properties, and the SASL mechanisms and locales it offers.
#[derive(Debug, Clone, PartialEq)]
pub struct Start {
    pub version_major: u8,
    pub version_minor: u8,
    pub server_properties: FieldTable,
    /// Space-separated mechanism names, e.g. `"PLAIN AMQPLAIN"`
    pub mechanisms: Bytes,
    /// Space-separated locale names, e.g. `"en_US"`
    pub locales: Bytes,
}

impl Start {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_octet(self.version_major);
        w.write_octet(self.version_minor);
        self.server_properties.encode(w)?;
        w.write_longstr(&self.mechanisms)?;
        w.write_longstr(&self.locales)?;
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            version_major: r.read_octet()?,
            version_minor: r.read_octet()?,
            server_properties: FieldTable::decode(r)?,
            mechanisms: r.read_longstr()?,
            locales: r.read_longstr()?,
        })
    }
}

/// The client's half of `connection.start`: identity properties, the chosen
/// mechanism, and the opaque SASL response.
#[derive(Debug, Clone, PartialEq)]
pub struct StartOk {
    pub client_properties: FieldTable,
    pub mechanism: String,
    pub response: Bytes,
    pub locale: String,
}

impl StartOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        self.client_properties.encode(w)?;
        w.write_shortstr(&self.mechanism)?;
        w.write_longstr(&self.response)?;
        w.write_shortstr(&self.locale)?;
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            client_properties: FieldTable::decode(r)?,
            mechanism: r.read_shortstr()?,
            response: r.read_longstr()?,
            locale: r.read_shortstr()?,
        })
    }
}

/// SASL challenge for multi-round mechanisms.
#[derive(Debug, Clone, PartialEq)]
pub struct Secure {
    pub challenge: Bytes,
}

impl Secure {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_longstr(&self.challenge)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            challenge: r.read_longstr()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecureOk {
    pub response: Bytes,
}

impl SecureOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_longstr(&self.response)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            response: r.read_longstr()?,
        })
    }
}

/// Server proposal for channel-max, frame-max, and heartbeat. A zero leaves
/// the choice to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tune {
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
}

impl Tune {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.channel_max);
        w.write_long(self.frame_max);
        w.write_short(self.heartbeat);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            channel_max: r.read_short()?,
            frame_max: r.read_long()?,
            heartbeat: r.read_short()?,
        })
    }
}

/// The negotiated values the client commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuneOk {
    pub channel_max: u16,
    pub frame_max: u32,
    pub heartbeat: u16,
}

impl TuneOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.channel_max);
        w.write_long(self.frame_max);
        w.write_short(self.heartbeat);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            channel_max: r.read_short()?,
            frame_max: r.read_long()?,
            heartbeat: r.read_short()?,
        })
    }
}

/// Selects the virtual host. The trailing fields are deprecated 0-9 leftovers
/// the wire format still carries.
#[derive(Debug, Clone, PartialEq)]
pub struct Open {
    pub virtual_host: String,
    pub capabilities: String,
    pub insist: bool,
}

impl Open {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_shortstr(&self.virtual_host)?;
        w.write_shortstr(&self.capabilities)?;
        w.write_bit(self.insist);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            virtual_host: r.read_shortstr()?,
            capabilities: r.read_shortstr()?,
            insist: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOk {
    pub known_hosts: String,
}

impl OpenOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_shortstr(&self.known_hosts)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            known_hosts: r.read_shortstr()?,
        })
    }
}

/// Orderly connection shutdown from either side. `class_id`/`method_id`
/// point at the method that provoked the close, or zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Close {
    pub reply_code: u16,
    pub reply_text: String,
    pub class_id: u16,
    pub method_id: u16,
}

impl Close {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.reply_code);
        w.write_shortstr(&self.reply_text)?;
        w.write_short(self.class_id);
        w.write_short(self.method_id);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reply_code: r.read_short()?,
            reply_text: r.read_shortstr()?,
            class_id: r.read_short()?,
            method_id: r.read_short()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CloseOk;

impl CloseOk {
    pub fn encode_args(&self, _w: &mut Writer) -> Result<(), Error> {
        Ok(())
    }

    pub fn decode_args(_r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self)
    }
}

/// RabbitMQ extension: the broker stopped accepting publishes.
#[derive(Debug, Clone, PartialEq)]
pub struct Blocked {
    pub reason: String,
}

impl Blocked {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_shortstr(&self.reason)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            reason: r.read_shortstr()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Unblocked;

impl Unblocked {
    pub fn encode_args(&self, _w: &mut Writer) -> Result<(), Error> {
        Ok(())
    }

    pub fn decode_args(_r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self)
    }
}
