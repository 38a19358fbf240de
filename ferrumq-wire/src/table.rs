//! Field values, tables, and arrays
//!
//! A field is a tag octet followed by its payload. Tables map short-string
//! keys to tagged values and preserve insertion order on the wire; arrays are
//! length-prefixed sequences of tagged values.

use bytes::Bytes;
use indexmap::IndexMap;

use crate::codec::{Reader, Writer};
use crate::dialect::WireDialect;
use crate::error::Error;

mod tag {
    pub const BOOLEAN: u8 = b't';
    pub const SHORT_SHORT_INT: u8 = b'b';
    pub const SHORT_SHORT_UINT: u8 = b'B';
    pub const SHORT_INT: u8 = b'U';
    pub const SHORT_UINT: u8 = b'u';
    pub const LONG_INT: u8 = b'I';
    pub const LONG_UINT: u8 = b'i';
    pub const LONG_LONG_INT: u8 = b'L';
    pub const LONG_LONG_UINT: u8 = b'l';
    pub const FLOAT: u8 = b'f';
    pub const DOUBLE: u8 = b'd';
    pub const DECIMAL: u8 = b'D';
    pub const SHORT_STRING: u8 = b's';
    pub const LONG_STRING: u8 = b'S';
    pub const ARRAY: u8 = b'A';
    pub const TIMESTAMP: u8 = b'T';
    pub const TABLE: u8 = b'F';
    pub const VOID: u8 = b'V';
    pub const BYTE_ARRAY: u8 = b'x';
}

/// A decimal value: `value / 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    pub scale: u8,
    pub value: i32,
}

impl Decimal {
    pub fn new(scale: u8, value: i32) -> Self {
        Self { scale, value }
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.value) / 10f64.powi(i32::from(self.scale))
    }
}

/// A tagged field value in the RabbitMQ dialect.
///
/// Variant names follow the protocol grammar. `LongString` and `ByteArray`
/// hold raw octets; long strings are not required to be UTF-8 on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Boolean(bool),
    ShortShortInt(i8),
    ShortShortUint(u8),
    ShortInt(i16),
    ShortUint(u16),
    LongInt(i32),
    LongUint(u32),
    LongLongInt(i64),
    LongLongUint(u64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    ShortString(String),
    LongString(Bytes),
    Array(FieldArray),
    Timestamp(u64),
    Table(FieldTable),
    Void,
    ByteArray(Bytes),
}

impl FieldValue {
    /// Serialize one tagged field.
    ///
    /// In the strict dialect, integer widths narrower than 32 bits widen to
    /// `I` and `u32` widens to `L`; the widening preserves the value.
    pub fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        match (self, w.dialect()) {
            (FieldValue::ShortShortInt(v), WireDialect::Strict091) => {
                return FieldValue::LongInt(i32::from(*v)).encode(w);
            }
            (FieldValue::ShortShortUint(v), WireDialect::Strict091) => {
                return FieldValue::LongInt(i32::from(*v)).encode(w);
            }
            (FieldValue::ShortInt(v), WireDialect::Strict091) => {
                return FieldValue::LongInt(i32::from(*v)).encode(w);
            }
            (FieldValue::ShortUint(v), WireDialect::Strict091) => {
                return FieldValue::LongInt(i32::from(*v)).encode(w);
            }
            (FieldValue::LongUint(v), WireDialect::Strict091) => {
                return FieldValue::LongLongInt(i64::from(*v)).encode(w);
            }
            _ => {}
        }

        match self {
            FieldValue::Boolean(v) => {
                w.write_octet(tag::BOOLEAN);
                w.write_octet(u8::from(*v));
            }
            FieldValue::ShortShortInt(v) => {
                w.write_octet(tag::SHORT_SHORT_INT);
                w.write_signed_octet(*v);
            }
            FieldValue::ShortShortUint(v) => {
                w.write_octet(tag::SHORT_SHORT_UINT);
                w.write_octet(*v);
            }
            FieldValue::ShortInt(v) => {
                w.write_octet(tag::SHORT_INT);
                w.write_signed_short(*v);
            }
            FieldValue::ShortUint(v) => {
                w.write_octet(tag::SHORT_UINT);
                w.write_short(*v);
            }
            FieldValue::LongInt(v) => {
                w.write_octet(tag::LONG_INT);
                w.write_signed_long(*v);
            }
            FieldValue::LongUint(v) => {
                w.write_octet(tag::LONG_UINT);
                w.write_long(*v);
            }
            FieldValue::LongLongInt(v) => {
                w.write_octet(tag::LONG_LONG_INT);
                w.write_signed_longlong(*v);
            }
            FieldValue::LongLongUint(v) => {
                w.write_octet(tag::LONG_LONG_UINT);
                w.write_longlong(*v);
            }
            FieldValue::Float(v) => {
                w.write_octet(tag::FLOAT);
                w.write_float(*v);
            }
            FieldValue::Double(v) => {
                w.write_octet(tag::DOUBLE);
                w.write_double(*v);
            }
            FieldValue::Decimal(v) => {
                w.write_octet(tag::DECIMAL);
                w.write_octet(v.scale);
                w.write_signed_long(v.value);
            }
            FieldValue::ShortString(v) => {
                w.write_octet(tag::SHORT_STRING);
                w.write_shortstr(v)?;
            }
            FieldValue::LongString(v) => {
                w.write_octet(tag::LONG_STRING);
                w.write_longstr(v)?;
            }
            FieldValue::Array(v) => {
                w.write_octet(tag::ARRAY);
                v.encode(w)?;
            }
            FieldValue::Timestamp(v) => {
                w.write_octet(tag::TIMESTAMP);
                w.write_timestamp(*v);
            }
            FieldValue::Table(v) => {
                w.write_octet(tag::TABLE);
                v.encode(w)?;
            }
            FieldValue::Void => {
                w.write_octet(tag::VOID);
            }
            FieldValue::ByteArray(v) => {
                w.write_octet(tag::BYTE_ARRAY);
                w.write_longstr(v)?;
            }
        }
        Ok(())
    }

    /// Parse one tagged field, accepting either dialect's tag set.
    pub fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        let value = match r.read_octet()? {
            tag::BOOLEAN => FieldValue::Boolean(r.read_octet()? != 0),
            tag::SHORT_SHORT_INT => FieldValue::ShortShortInt(r.read_signed_octet()?),
            tag::SHORT_SHORT_UINT => FieldValue::ShortShortUint(r.read_octet()?),
            tag::SHORT_INT => FieldValue::ShortInt(r.read_signed_short()?),
            tag::SHORT_UINT => FieldValue::ShortUint(r.read_short()?),
            tag::LONG_INT => FieldValue::LongInt(r.read_signed_long()?),
            tag::LONG_UINT => FieldValue::LongUint(r.read_long()?),
            tag::LONG_LONG_INT => FieldValue::LongLongInt(r.read_signed_longlong()?),
            tag::LONG_LONG_UINT => FieldValue::LongLongUint(r.read_longlong()?),
            tag::FLOAT => FieldValue::Float(r.read_float()?),
            tag::DOUBLE => FieldValue::Double(r.read_double()?),
            tag::DECIMAL => {
                let scale = r.read_octet()?;
                let value = r.read_signed_long()?;
                FieldValue::Decimal(Decimal { scale, value })
            }
            tag::SHORT_STRING => FieldValue::ShortString(r.read_shortstr()?),
            tag::LONG_STRING => FieldValue::LongString(r.read_longstr()?),
            tag::ARRAY => FieldValue::Array(FieldArray::decode(r)?),
            tag::TIMESTAMP => FieldValue::Timestamp(r.read_timestamp()?),
            tag::TABLE => FieldValue::Table(FieldTable::decode(r)?),
            tag::VOID => FieldValue::Void,
            tag::BYTE_ARRAY => FieldValue::ByteArray(r.read_longstr()?),
            other => return Err(Error::UnknownFieldTag(other)),
        };
        Ok(value)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::LongInt(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::LongLongInt(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::LongString(Bytes::copy_from_slice(v.as_bytes()))
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::LongString(Bytes::from(v.into_bytes()))
    }
}

impl From<FieldTable> for FieldValue {
    fn from(v: FieldTable) -> Self {
        FieldValue::Table(v)
    }
}

/// An ordered mapping from short-string keys to field values.
///
/// Backed by an [`IndexMap`] so the wire order matches insertion order.
/// Duplicate keys are accepted on read with the last occurrence winning;
/// duplicates are never emitted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldTable(IndexMap<String, FieldValue>);

impl FieldTable {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// Serialize as a four-octet byte length followed by the entries.
    pub fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        let mut body = Writer::new(w.dialect());
        for (key, value) in &self.0 {
            body.write_shortstr(key)?;
            value.encode(&mut body)?;
        }
        if body.len() > u32::MAX as usize {
            return Err(Error::LengthOverflow("field table"));
        }
        w.write_long(body.len() as u32);
        w.write_bytes(&body.into_bytes());
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        let len = r.read_long()? as usize;
        let body = r.take(len)?;
        let mut inner = Reader::new(body);
        let mut table = FieldTable::new();
        while !inner.is_empty() {
            let key = inner.read_shortstr()?;
            let value = FieldValue::decode(&mut inner)?;
            table.0.insert(key, value);
        }
        Ok(table)
    }
}

impl FromIterator<(String, FieldValue)> for FieldTable {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A length-prefixed sequence of tagged values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldArray(Vec<FieldValue>);

impl FieldArray {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, value: impl Into<FieldValue>) {
        self.0.push(value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldValue> {
        self.0.iter()
    }

    pub fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        let mut body = Writer::new(w.dialect());
        for value in &self.0 {
            value.encode(&mut body)?;
        }
        if body.len() > u32::MAX as usize {
            return Err(Error::LengthOverflow("field array"));
        }
        w.write_long(body.len() as u32);
        w.write_bytes(&body.into_bytes());
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        let len = r.read_long()? as usize;
        let body = r.take(len)?;
        let mut inner = Reader::new(body);
        let mut array = FieldArray::new();
        while !inner.is_empty() {
            array.0.push(FieldValue::decode(&mut inner)?);
        }
        Ok(array)
    }
}

impl From<Vec<FieldValue>> for FieldArray {
    fn from(v: Vec<FieldValue>) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(table: &FieldTable, dialect: WireDialect) -> FieldTable {
        let mut w = Writer::new(dialect);
        table.encode(&mut w).unwrap();
        let buf = w.into_bytes();
        let mut r = Reader::new(&buf);
        let out = FieldTable::decode(&mut r).unwrap();
        assert!(r.is_empty());
        out
    }

    #[test]
    fn table_round_trips_in_rabbit_dialect() {
        let mut nested = FieldTable::new();
        nested.insert("retries", 3i32);

        let mut array = FieldArray::new();
        array.push("a");
        array.push(7i64);

        let mut table = FieldTable::new();
        table.insert("flag", true);
        table.insert("tiny", FieldValue::ShortShortInt(-5));
        table.insert("count", FieldValue::ShortUint(512));
        table.insert("big", 1i64 << 40);
        table.insert("pi", FieldValue::Double(3.25));
        table.insert("price", FieldValue::Decimal(Decimal::new(2, 1999)));
        table.insert("name", "consumer-1");
        table.insert("stamp", FieldValue::Timestamp(1_700_000_000));
        table.insert("nested", nested);
        table.insert("list", FieldValue::Array(array));
        table.insert("nothing", FieldValue::Void);

        assert_eq!(round_trip(&table, WireDialect::Rabbit), table);
    }

    #[test]
    fn table_wire_order_matches_insertion_order() {
        let mut table = FieldTable::new();
        table.insert("zz", true);
        table.insert("aa", false);

        let mut w = Writer::new(WireDialect::Rabbit);
        table.encode(&mut w).unwrap();
        let buf = w.into_bytes();
        // 4-octet length, then key "zz" before key "aa"
        assert_eq!(&buf[4..7], &[2, b'z', b'z']);
    }

    #[test]
    fn duplicate_keys_on_read_last_wins() {
        // two boolean entries under the same key "k": false, then true
        let mut raw = Vec::new();
        for v in [0u8, 1u8] {
            raw.push(1);
            raw.push(b'k');
            raw.push(b't');
            raw.push(v);
        }
        let mut framed = Vec::new();
        framed.extend_from_slice(&(raw.len() as u32).to_be_bytes());
        framed.extend_from_slice(&raw);

        let mut r = Reader::new(&framed);
        let table = FieldTable::decode(&mut r).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("k"), Some(&FieldValue::Boolean(true)));
    }

    #[test]
    fn strict_dialect_widens_narrow_integers() {
        let mut table = FieldTable::new();
        table.insert("tiny", FieldValue::ShortShortUint(7));
        table.insert("short", FieldValue::ShortInt(-3));
        table.insert("ulong", FieldValue::LongUint(9));

        let decoded = round_trip(&table, WireDialect::Strict091);
        assert_eq!(decoded.get("tiny"), Some(&FieldValue::LongInt(7)));
        assert_eq!(decoded.get("short"), Some(&FieldValue::LongInt(-3)));
        assert_eq!(decoded.get("ulong"), Some(&FieldValue::LongLongInt(9)));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let framed = [0u8, 0, 0, 4, 1, b'k', b'Z', 0];
        let mut r = Reader::new(&framed);
        assert_eq!(
            FieldTable::decode(&mut r),
            Err(Error::UnknownFieldTag(b'Z'))
        );
    }

    #[test]
    fn encode_of_decode_is_identity_on_legal_bytes() {
        // hand-assembled table: {"s": shortstr "hi", "n": long 5}
        let mut raw = Vec::new();
        raw.push(1);
        raw.push(b's');
        raw.push(b's');
        raw.push(2);
        raw.extend_from_slice(b"hi");
        raw.push(1);
        raw.push(b'n');
        raw.push(b'I');
        raw.extend_from_slice(&5i32.to_be_bytes());
        let mut framed = Vec::new();
        framed.extend_from_slice(&(raw.len() as u32).to_be_bytes());
        framed.extend_from_slice(&raw);

        let mut r = Reader::new(&framed);
        let table = FieldTable::decode(&mut r).unwrap();
        let mut w = Writer::new(WireDialect::Rabbit);
        table.encode(&mut w).unwrap();
        assert_eq!(&w.into_bytes()[..], &framed[..]);
    }
}
