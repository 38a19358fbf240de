//! The fourteen basic message properties and their presence flags

use crate::codec::{Reader, Writer};
use crate::error::Error;
use crate::table::FieldTable;

/// Optional per-message properties carried in the content header.
///
/// The wire order is fixed; a property is present when its flag bit is set.
/// `delivery_mode` is `1` transient, `2` persistent. `expiration` is a TTL in
/// milliseconds, kept as the string the protocol defines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicProperties {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub headers: Option<FieldTable>,
    pub delivery_mode: Option<u8>,
    pub priority: Option<u8>,
    pub correlation_id: Option<String>,
    pub reply_to: Option<String>,
    pub expiration: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: Option<u64>,
    pub message_type: Option<String>,
    pub user_id: Option<String>,
    pub app_id: Option<String>,
    pub cluster_id: Option<String>,
}

// Flag bits within the first (and for this property set, only) flags word.
const CONTENT_TYPE: u16 = 1 << 15;
const CONTENT_ENCODING: u16 = 1 << 14;
const HEADERS: u16 = 1 << 13;
const DELIVERY_MODE: u16 = 1 << 12;
const PRIORITY: u16 = 1 << 11;
const CORRELATION_ID: u16 = 1 << 10;
const REPLY_TO: u16 = 1 << 9;
const EXPIRATION: u16 = 1 << 8;
const MESSAGE_ID: u16 = 1 << 7;
const TIMESTAMP: u16 = 1 << 6;
const MESSAGE_TYPE: u16 = 1 << 5;
const USER_ID: u16 = 1 << 4;
const APP_ID: u16 = 1 << 3;
const CLUSTER_ID: u16 = 1 << 2;
/// LSB of every flags word except the last signals a continuation word.
const CONTINUATION: u16 = 1;

impl BasicProperties {
    fn flags(&self) -> u16 {
        let mut flags = 0;
        if self.content_type.is_some() {
            flags |= CONTENT_TYPE;
        }
        if self.content_encoding.is_some() {
            flags |= CONTENT_ENCODING;
        }
        if self.headers.is_some() {
            flags |= HEADERS;
        }
        if self.delivery_mode.is_some() {
            flags |= DELIVERY_MODE;
        }
        if self.priority.is_some() {
            flags |= PRIORITY;
        }
        if self.correlation_id.is_some() {
            flags |= CORRELATION_ID;
        }
        if self.reply_to.is_some() {
            flags |= REPLY_TO;
        }
        if self.expiration.is_some() {
            flags |= EXPIRATION;
        }
        if self.message_id.is_some() {
            flags |= MESSAGE_ID;
        }
        if self.timestamp.is_some() {
            flags |= TIMESTAMP;
        }
        if self.message_type.is_some() {
            flags |= MESSAGE_TYPE;
        }
        if self.user_id.is_some() {
            flags |= USER_ID;
        }
        if self.app_id.is_some() {
            flags |= APP_ID;
        }
        if self.cluster_id.is_some() {
            flags |= CLUSTER_ID;
        }
        flags
    }

    pub fn encode(&self, w: &mut Writer) -> Result<(), Error> {
        w.write_short(self.flags());
        if let Some(v) = &self.content_type {
            w.write_shortstr(v)?;
        }
        if let Some(v) = &self.content_encoding {
            w.write_shortstr(v)?;
        }
        if let Some(v) = &self.headers {
            v.encode(w)?;
        }
        if let Some(v) = self.delivery_mode {
            w.write_octet(v);
        }
        if let Some(v) = self.priority {
            w.write_octet(v);
        }
        if let Some(v) = &self.correlation_id {
            w.write_shortstr(v)?;
        }
        if let Some(v) = &self.reply_to {
            w.write_shortstr(v)?;
        }
        if let Some(v) = &self.expiration {
            w.write_shortstr(v)?;
        }
        if let Some(v) = &self.message_id {
            w.write_shortstr(v)?;
        }
        if let Some(v) = self.timestamp {
            w.write_timestamp(v);
        }
        if let Some(v) = &self.message_type {
            w.write_shortstr(v)?;
        }
        if let Some(v) = &self.user_id {
            w.write_shortstr(v)?;
        }
        if let Some(v) = &self.app_id {
            w.write_shortstr(v)?;
        }
        if let Some(v) = &self.cluster_id {
            w.write_shortstr(v)?;
        }
        Ok(())
    }

    pub fn decode(r: &mut Reader<'_>) -> Result<Self, Error> {
        let flags = r.read_short()?;
        // Swallow continuation words; no property past bit 2 is defined for
        // the basic class, so their bits carry nothing we can decode.
        let mut word = flags;
        while word & CONTINUATION != 0 {
            word = r.read_short()?;
        }

        let mut props = BasicProperties::default();
        if flags & CONTENT_TYPE != 0 {
            props.content_type = Some(r.read_shortstr()?);
        }
        if flags & CONTENT_ENCODING != 0 {
            props.content_encoding = Some(r.read_shortstr()?);
        }
        if flags & HEADERS != 0 {
            props.headers = Some(FieldTable::decode(r)?);
        }
        if flags & DELIVERY_MODE != 0 {
            props.delivery_mode = Some(r.read_octet()?);
        }
        if flags & PRIORITY != 0 {
            props.priority = Some(r.read_octet()?);
        }
        if flags & CORRELATION_ID != 0 {
            props.correlation_id = Some(r.read_shortstr()?);
        }
        if flags & REPLY_TO != 0 {
            props.reply_to = Some(r.read_shortstr()?);
        }
        if flags & EXPIRATION != 0 {
            props.expiration = Some(r.read_shortstr()?);
        }
        if flags & MESSAGE_ID != 0 {
            props.message_id = Some(r.read_shortstr()?);
        }
        if flags & TIMESTAMP != 0 {
            props.timestamp = Some(r.read_timestamp()?);
        }
        if flags & MESSAGE_TYPE != 0 {
            props.message_type = Some(r.read_shortstr()?);
        }
        if flags & USER_ID != 0 {
            props.user_id = Some(r.read_shortstr()?);
        }
        if flags & APP_ID != 0 {
            props.app_id = Some(r.read_shortstr()?);
        }
        if flags & CLUSTER_ID != 0 {
            props.cluster_id = Some(r.read_shortstr()?);
        }
        Ok(props)
    }
}
