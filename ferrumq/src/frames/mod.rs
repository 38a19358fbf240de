//! The 0-9-1 framing layer
//!
//! A frame is `type:1 | channel:2 | length:4 | payload | 0xCE`. The codec
//! plugs into `tokio_util::codec::Framed` and enforces the end octet and the
//! negotiated frame-size ceiling on both directions.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use ferrumq_wire::{ContentHeader, Method, WireDialect, Writer};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::Error;

pub const FRAME_METHOD: u8 = 1;
pub const FRAME_HEADER: u8 = 2;
pub const FRAME_BODY: u8 = 3;
pub const FRAME_HEARTBEAT: u8 = 8;
pub const FRAME_END: u8 = 0xCE;

/// Octets of framing around a body chunk: 7-octet header plus the end octet.
pub const FRAME_OVERHEAD: usize = 8;

/// Protocol floor for the negotiated frame-max.
pub const FRAME_MIN_SIZE: u32 = 4096;

/// The preamble the client opens the transport with.
pub const PROTOCOL_HEADER: [u8; 8] = *b"AMQP\x00\x00\x09\x01";

/// One framed unit, already parsed by payload type.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub channel: u16,
    pub payload: FramePayload,
}

impl Frame {
    pub fn method(channel: u16, method: impl Into<Method>) -> Self {
        Self {
            channel,
            payload: FramePayload::Method(method.into()),
        }
    }

    pub fn header(channel: u16, header: ContentHeader) -> Self {
        Self {
            channel,
            payload: FramePayload::Header(header),
        }
    }

    pub fn body(channel: u16, body: Bytes) -> Self {
        Self {
            channel,
            payload: FramePayload::Body(body),
        }
    }

    pub fn heartbeat() -> Self {
        Self {
            channel: 0,
            payload: FramePayload::Heartbeat,
        }
    }
}

/// Payload of a frame, keyed by the frame type octet.
///
/// `UnknownMethod` stands in for a method frame whose `(class-id, method-id)`
/// is absent from the registry: the frame is consumed so the stream stays in
/// sync, and the connection or channel decides what to do with it.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Method(Method),
    Header(ContentHeader),
    Body(Bytes),
    Heartbeat,
    UnknownMethod { class_id: u16, method_id: u16 },
}

/// Splits a message body into chunks that fit under `frame_max` once the
/// framing overhead is added. An empty body yields no chunks.
pub fn split_body(body: &Bytes, frame_max: u32) -> Vec<Bytes> {
    let chunk = frame_max as usize - FRAME_OVERHEAD;
    let mut out = Vec::with_capacity(body.len().div_ceil(chunk.max(1)));
    let mut offset = 0;
    while offset < body.len() {
        let end = usize::min(offset + chunk, body.len());
        out.push(body.slice(offset..end));
        offset = end;
    }
    out
}

/// Frame encoder/decoder bound to a negotiated frame-size ceiling and the
/// dialect used for emitted field tables.
#[derive(Debug)]
pub struct FrameCodec {
    /// Total frame length ceiling including overhead; zero before tune
    pub max_frame_size: usize,
    pub dialect: WireDialect,
}

impl FrameCodec {
    pub fn new(dialect: WireDialect) -> Self {
        Self {
            max_frame_size: 0,
            dialect,
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (frame_type, payload) = match item.payload {
            FramePayload::Method(method) => {
                let mut w = Writer::new(self.dialect);
                method.encode(&mut w).map_err(Error::from)?;
                (FRAME_METHOD, w.into_bytes())
            }
            FramePayload::Header(header) => {
                let mut w = Writer::new(self.dialect);
                header.encode(&mut w).map_err(Error::from)?;
                (FRAME_HEADER, w.into_bytes())
            }
            FramePayload::Body(body) => (FRAME_BODY, body),
            FramePayload::Heartbeat => (FRAME_HEARTBEAT, Bytes::new()),
            FramePayload::UnknownMethod { class_id, method_id } => {
                return Err(Error::ProtocolViolation(format!(
                    "refusing to emit unknown method {class_id}.{method_id}"
                )));
            }
        };

        if self.max_frame_size > 0 && payload.len() + FRAME_OVERHEAD > self.max_frame_size {
            return Err(Error::ProtocolViolation(format!(
                "outbound frame of {} octets exceeds frame-max {}",
                payload.len() + FRAME_OVERHEAD,
                self.max_frame_size
            )));
        }

        dst.reserve(payload.len() + FRAME_OVERHEAD);
        dst.put_u8(frame_type);
        dst.put_u16(item.channel);
        dst.put_u32(payload.len() as u32);
        dst.put_slice(&payload);
        dst.put_u8(FRAME_END);
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 7 {
            return Ok(None);
        }

        // A broker that rejects our protocol version answers the preamble
        // with its own preamble and closes.
        if src.starts_with(b"AMQP") {
            if src.len() < 8 {
                return Ok(None);
            }
            return Err(Error::VersionMismatch {
                major: src[5],
                minor: src[6],
                revision: src[7],
            });
        }

        let frame_type = src[0];
        let channel = u16::from_be_bytes([src[1], src[2]]);
        let length = u32::from_be_bytes([src[3], src[4], src[5], src[6]]) as usize;

        if self.max_frame_size > 0 && length + FRAME_OVERHEAD > self.max_frame_size {
            return Err(Error::MalformedFrame(format!(
                "inbound frame of {} octets exceeds frame-max {}",
                length + FRAME_OVERHEAD,
                self.max_frame_size
            )));
        }

        if src.len() < length + FRAME_OVERHEAD {
            src.reserve(length + FRAME_OVERHEAD - src.len());
            return Ok(None);
        }

        let mut raw = src.split_to(length + FRAME_OVERHEAD);
        raw.advance(7);
        let end = raw[length];
        if end != FRAME_END {
            return Err(Error::MalformedFrame(format!(
                "frame end octet is 0x{end:02x}, expected 0xce"
            )));
        }
        let payload = raw.split_to(length).freeze();

        let payload = match frame_type {
            FRAME_METHOD => match Method::decode(&payload) {
                Ok(method) => FramePayload::Method(method),
                Err(ferrumq_wire::Error::UnknownMethod {
                    class_id,
                    method_id,
                }) => FramePayload::UnknownMethod {
                    class_id,
                    method_id,
                },
                Err(e) => return Err(e.into()),
            },
            FRAME_HEADER => FramePayload::Header(ContentHeader::decode(&payload)?),
            FRAME_BODY => FramePayload::Body(payload),
            FRAME_HEARTBEAT => FramePayload::Heartbeat,
            other => {
                return Err(Error::MalformedFrame(format!(
                    "unknown frame type {other}"
                )));
            }
        };

        Ok(Some(Frame { channel, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrumq_wire::methods::basic;
    use ferrumq_wire::BasicProperties;

    fn encode(frame: Frame) -> BytesMut {
        let mut codec = FrameCodec::new(WireDialect::Rabbit);
        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();
        buf
    }

    #[test]
    fn heartbeat_frame_is_eight_known_octets() {
        let buf = encode(Frame::heartbeat());
        assert_eq!(&buf[..], b"\x08\x00\x00\x00\x00\x00\x00\xCE");
    }

    #[test]
    fn every_emitted_frame_ends_with_the_end_octet() {
        for frame in [
            Frame::heartbeat(),
            Frame::method(
                3,
                basic::Ack {
                    delivery_tag: 1,
                    multiple: false,
                },
            ),
            Frame::header(3, ContentHeader::for_basic(0, BasicProperties::default())),
            Frame::body(3, Bytes::from_static(b"payload")),
        ] {
            let buf = encode(frame);
            assert_eq!(*buf.last().unwrap(), FRAME_END);
        }
    }

    #[test]
    fn frames_round_trip_through_the_codec() {
        let frames = vec![
            Frame::method(
                1,
                basic::Deliver {
                    consumer_tag: "ctag".into(),
                    delivery_tag: 2,
                    redelivered: false,
                    exchange: "logs".into(),
                    routing_key: "info".into(),
                },
            ),
            Frame::header(1, ContentHeader::for_basic(5, BasicProperties::default())),
            Frame::body(1, Bytes::from_static(b"hello")),
            Frame::heartbeat(),
        ];

        let mut codec = FrameCodec::new(WireDialect::Rabbit);
        let mut buf = BytesMut::new();
        for frame in &frames {
            codec.encode(frame.clone(), &mut buf).unwrap();
        }
        for expected in &frames {
            let got = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(&got, expected);
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn partial_frames_wait_for_more_bytes() {
        let full = encode(Frame::body(9, Bytes::from_static(b"abcdef")));
        let mut codec = FrameCodec::new(WireDialect::Rabbit);
        for cut in [1, 6, full.len() - 1] {
            let mut partial = BytesMut::from(&full[..cut]);
            assert!(codec.decode(&mut partial).unwrap().is_none(), "cut {cut}");
        }
    }

    #[test]
    fn missing_end_octet_is_a_framing_error() {
        let mut buf = encode(Frame::heartbeat());
        let last = buf.len() - 1;
        buf[last] = 0x00;
        let mut codec = FrameCodec::new(WireDialect::Rabbit);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let mut buf = BytesMut::new();
        buf.put_u8(4);
        buf.put_u16(0);
        buf.put_u32(0);
        buf.put_u8(FRAME_END);
        let mut codec = FrameCodec::new(WireDialect::Rabbit);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn broker_preamble_reply_surfaces_the_version() {
        let mut buf = BytesMut::from(&b"AMQP\x00\x01\x00\x00"[..]);
        let mut codec = FrameCodec::new(WireDialect::Rabbit);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(Error::VersionMismatch {
                major: 1,
                minor: 0,
                revision: 0
            })
        ));
    }

    #[test]
    fn unknown_method_is_consumed_not_fatal() {
        let mut buf = BytesMut::new();
        buf.put_u8(FRAME_METHOD);
        buf.put_u16(5);
        buf.put_u32(4);
        buf.put_u16(42);
        buf.put_u16(99);
        buf.put_u8(FRAME_END);
        let mut codec = FrameCodec::new(WireDialect::Rabbit);
        codec.encode(Frame::heartbeat(), &mut buf).unwrap();

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            frame.payload,
            FramePayload::UnknownMethod {
                class_id: 42,
                method_id: 99
            }
        );
        // the stream stays in sync: the following frame still decodes
        let next = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(next.payload, FramePayload::Heartbeat);
        assert!(buf.is_empty());
    }

    #[test]
    fn inbound_frames_over_frame_max_are_rejected() {
        let mut codec = FrameCodec::new(WireDialect::Rabbit);
        codec.max_frame_size = 4096;
        let mut buf = BytesMut::new();
        buf.put_u8(FRAME_BODY);
        buf.put_u16(1);
        buf.put_u32(5000);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn body_split_matches_frame_max() {
        let body = Bytes::from(vec![0u8; 10_000]);
        let chunks = split_body(&body, 4096);
        assert_eq!(
            chunks.iter().map(Bytes::len).collect::<Vec<_>>(),
            vec![4088, 4088, 1824]
        );
        assert_eq!(chunks.iter().map(Bytes::len).sum::<usize>(), 10_000);

        assert!(split_body(&Bytes::new(), 4096).is_empty());
    }
}
