//! Confirm-class methods (class id 85), the publisher-confirms extension

use crate::codec::{Reader, Writer};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Select {
    pub nowait: bool,
}

impl Select {
    pub fn encode_args(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_bit(self.nowait);
        Ok(())
    }

    pub fn decode_args(r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self {
            nowait: r.read_bit()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectOk;

impl SelectOk {
    pub fn encode_args(&self, _w: &mut Writer) -> Result<(), Error> {
        Ok(())
    }

    pub fn decode_args(_r: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Self)
    }
}
