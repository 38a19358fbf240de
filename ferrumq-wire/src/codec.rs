//! Cursored reader and writer for the primitive wire encodings
//!
//! All multi-octet integers are big-endian. Strings are length-prefixed and
//! never NUL-terminated. Consecutive boolean arguments are packed into shared
//! octets LSB-first; the run is broken by any non-boolean read or write.

use bytes::{BufMut, Bytes, BytesMut};

use crate::dialect::WireDialect;
use crate::error::Error;

/// Cursored reader over a frame payload.
#[derive(Debug)]
pub struct Reader<'a> {
    src: &'a [u8],
    pos: usize,
    /// Pending bit-packed octet and the index of the next bit in it
    bits: Option<(u8, u8)>,
}

impl<'a> Reader<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self {
            src,
            pos: 0,
            bits: None,
        }
    }

    pub fn remaining(&self) -> usize {
        self.src.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume `n` octets, breaking any bit run.
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], Error> {
        self.bits = None;
        if self.remaining() < n {
            return Err(Error::UnexpectedEof);
        }
        let out = &self.src[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_octet(&mut self) -> Result<u8, Error> {
        Ok(self.take(1)?[0])
    }

    pub fn read_short(&mut self) -> Result<u16, Error> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_long(&mut self) -> Result<u32, Error> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_longlong(&mut self) -> Result<u64, Error> {
        let b = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_be_bytes(buf))
    }

    pub fn read_signed_octet(&mut self) -> Result<i8, Error> {
        Ok(self.read_octet()? as i8)
    }

    pub fn read_signed_short(&mut self) -> Result<i16, Error> {
        Ok(self.read_short()? as i16)
    }

    pub fn read_signed_long(&mut self) -> Result<i32, Error> {
        Ok(self.read_long()? as i32)
    }

    pub fn read_signed_longlong(&mut self) -> Result<i64, Error> {
        Ok(self.read_longlong()? as i64)
    }

    pub fn read_float(&mut self) -> Result<f32, Error> {
        Ok(f32::from_bits(self.read_long()?))
    }

    pub fn read_double(&mut self) -> Result<f64, Error> {
        Ok(f64::from_bits(self.read_longlong()?))
    }

    pub fn read_timestamp(&mut self) -> Result<u64, Error> {
        self.read_longlong()
    }

    pub fn read_shortstr(&mut self) -> Result<String, Error> {
        let len = self.read_octet()? as usize;
        let raw = self.take(len)?;
        Ok(std::str::from_utf8(raw)?.to_owned())
    }

    pub fn read_longstr(&mut self) -> Result<Bytes, Error> {
        let len = self.read_long()? as usize;
        let raw = self.take(len)?;
        Ok(Bytes::copy_from_slice(raw))
    }

    /// Read one bit out of the current bit-packed octet, fetching a fresh
    /// octet when the run starts or the current one is exhausted.
    pub fn read_bit(&mut self) -> Result<bool, Error> {
        let (octet, index) = match self.bits {
            Some((octet, index)) if index < 8 => (octet, index),
            _ => {
                if self.remaining() < 1 {
                    return Err(Error::UnexpectedEof);
                }
                let octet = self.src[self.pos];
                self.pos += 1;
                (octet, 0)
            }
        };
        self.bits = Some((octet, index + 1));
        Ok(octet & (1 << index) != 0)
    }
}

/// Growable writer for a frame payload.
#[derive(Debug)]
pub struct Writer {
    buf: BytesMut,
    dialect: WireDialect,
    /// Offset of the octet holding the current bit run and the next bit index
    bits: Option<(usize, u8)>,
}

impl Writer {
    pub fn new(dialect: WireDialect) -> Self {
        Self {
            buf: BytesMut::new(),
            dialect,
            bits: None,
        }
    }

    pub fn dialect(&self) -> WireDialect {
        self.dialect
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    fn end_bits(&mut self) {
        self.bits = None;
    }

    pub fn write_octet(&mut self, v: u8) {
        self.end_bits();
        self.buf.put_u8(v);
    }

    pub fn write_short(&mut self, v: u16) {
        self.end_bits();
        self.buf.put_u16(v);
    }

    pub fn write_long(&mut self, v: u32) {
        self.end_bits();
        self.buf.put_u32(v);
    }

    pub fn write_longlong(&mut self, v: u64) {
        self.end_bits();
        self.buf.put_u64(v);
    }

    pub fn write_signed_octet(&mut self, v: i8) {
        self.write_octet(v as u8);
    }

    pub fn write_signed_short(&mut self, v: i16) {
        self.write_short(v as u16);
    }

    pub fn write_signed_long(&mut self, v: i32) {
        self.write_long(v as u32);
    }

    pub fn write_signed_longlong(&mut self, v: i64) {
        self.write_longlong(v as u64);
    }

    pub fn write_float(&mut self, v: f32) {
        self.write_long(v.to_bits());
    }

    pub fn write_double(&mut self, v: f64) {
        self.write_longlong(v.to_bits());
    }

    pub fn write_timestamp(&mut self, v: u64) {
        self.write_longlong(v);
    }

    pub fn write_shortstr(&mut self, v: &str) -> Result<(), Error> {
        if v.len() > u8::MAX as usize {
            return Err(Error::ShortStringTooLong(v.len()));
        }
        self.end_bits();
        self.buf.put_u8(v.len() as u8);
        self.buf.put_slice(v.as_bytes());
        Ok(())
    }

    pub fn write_longstr(&mut self, v: &[u8]) -> Result<(), Error> {
        if v.len() > u32::MAX as usize {
            return Err(Error::LengthOverflow("long string"));
        }
        self.end_bits();
        self.buf.put_u32(v.len() as u32);
        self.buf.put_slice(v);
        Ok(())
    }

    pub fn write_bytes(&mut self, v: &[u8]) {
        self.end_bits();
        self.buf.put_slice(v);
    }

    /// Append one bit to the current bit run, opening a fresh octet when the
    /// run starts or the current one is full.
    pub fn write_bit(&mut self, v: bool) {
        let (at, index) = match self.bits {
            Some((at, index)) if index < 8 => (at, index),
            _ => {
                let at = self.buf.len();
                self.buf.put_u8(0);
                (at, 0)
            }
        };
        if v {
            self.buf[at] |= 1 << index;
        }
        self.bits = Some((at, index + 1));
    }
}
