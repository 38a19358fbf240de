//! Channel-class methods (class id 20)

use crate::codec::{Reader, Writer};
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Open {
    /// Deprecated out-of-band field, always empty
    pub out_of_band: String,
}

impl Open {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_shortstr(&self.out_of_band)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            out_of_band: r.read_shortstr()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpenOk {
    /// Deprecated channel-id field, ignored
    pub channel_id: bytes::Bytes,
}

impl OpenOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_longstr(&self.channel_id)
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            channel_id: r.read_longstr()?,
        })
    }
}

/// Pauses (`active = false`) or resumes outbound content on the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow {
    pub active: bool,
}

impl Flow {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_bit(self.active);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            active: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowOk {
    pub active: bool,
}

impl FlowOk {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_bit(self.active);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            active: r.read_bit()?,
        })
    }
}

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
