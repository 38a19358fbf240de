//! End-to-end exchanges against a byte-scripted broker
//!
//! Every test pins the exact octets the client must emit and feeds it the
//! exact octets a broker would answer with, through a `tokio_test` mock
//! stream plugged into the transport seam.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio_test::io::Builder as IoBuilder;
use tokio_util::codec::Encoder;

use ferrumq::frames::{Frame, FrameCodec};
use ferrumq::wire::methods::{basic, channel as channel_m, connection as connection_m, queue, Method};
use ferrumq::wire::registry::class;
use ferrumq::wire::{BasicProperties, ContentHeader, FieldTable, WireDialect};
use ferrumq::{
    Connection, ConnectionEvent, Error, Publish, QueueDeclareOptions, Tuning,
};

fn frame_bytes(frame: Frame) -> Vec<u8> {
    let mut codec = FrameCodec::new(WireDialect::Rabbit);
    let mut buf = BytesMut::new();
    codec.encode(frame, &mut buf).unwrap();
    buf.to_vec()
}

fn method_frame(channel: u16, method: impl Into<Method>) -> Vec<u8> {
    frame_bytes(Frame::method(channel, method))
}

/// The identity table the builder sends; must stay in lockstep with
/// `Builder::client_properties`.
fn client_properties() -> FieldTable {
    let mut capabilities = FieldTable::new();
    capabilities.insert("publisher_confirms", true);
    capabilities.insert("consumer_cancel_notify", true);
    capabilities.insert("exchange_exchange_bindings", true);
    capabilities.insert("basic.nack", true);
    capabilities.insert("connection.blocked", true);
    capabilities.insert("authentication_failure_close", true);

    let mut properties = FieldTable::new();
    properties.insert("product", "ferrumq");
    properties.insert("version", env!("CARGO_PKG_VERSION"));
    properties.insert("platform", "Rust");
    properties.insert("capabilities", capabilities);
    properties
}

/// Scripts the preamble, start/start-ok, tune/tune-ok, and open/open-ok
/// exchange with the given broker tune proposals.
fn script_handshake(mock: &mut IoBuilder, frame_max: u32, heartbeat: u16) {
    mock.write(b"AMQP\x00\x00\x09\x01");
    mock.read(&method_frame(
        0,
        connection_m::Start {
            version_major: 0,
            version_minor: 9,
            server_properties: FieldTable::new(),
            mechanisms: Bytes::from_static(b"PLAIN AMQPLAIN"),
            locales: Bytes::from_static(b"en_US"),
        },
    ));
    mock.write(&method_frame(
        0,
        connection_m::StartOk {
            client_properties: client_properties(),
            mechanism: "PLAIN".into(),
            response: Bytes::from_static(b"\x00guest\x00guest"),
            locale: "en_US".into(),
        },
    ));
    mock.read(&method_frame(
        0,
        connection_m::Tune {
            channel_max: 2047,
            frame_max,
            heartbeat,
        },
    ));
    mock.write(&method_frame(
        0,
        connection_m::TuneOk {
            channel_max: 2047,
            frame_max,
            heartbeat,
        },
    ));
    mock.write(&method_frame(
        0,
        connection_m::Open {
            virtual_host: "/".into(),
            capabilities: String::new(),
            insist: false,
        },
    ));
    mock.read(&method_frame(
        0,
        connection_m::OpenOk {
            known_hosts: String::new(),
        },
    ));
}

fn script_connection_close(mock: &mut IoBuilder) {
    mock.write(&method_frame(
        0,
        connection_m::Close {
            reply_code: 200,
            reply_text: "closed".into(),
            class_id: 0,
            method_id: 0,
        },
    ));
    mock.read(&method_frame(0, connection_m::CloseOk));
}

fn script_channel_open(mock: &mut IoBuilder, channel: u16) {
    mock.write(&method_frame(channel, channel_m::Open::default()));
    mock.read(&method_frame(channel, channel_m::OpenOk::default()));
}

#[tokio::test]
async fn handshake_and_tune_follow_the_documented_script() {
    let mut mock = IoBuilder::new();
    script_handshake(&mut mock, 131_072, 60);
    script_connection_close(&mut mock);

    let connection = Connection::builder()
        .open_with_stream(mock.build())
        .await
        .unwrap();
    assert_eq!(
        connection.tuning(),
        Tuning {
            channel_max: 2047,
            frame_max: 131_072,
            heartbeat: 60,
        }
    );
    connection.close().await.unwrap();
}

#[tokio::test]
async fn broker_preamble_reply_is_a_version_mismatch() {
    let mut mock = IoBuilder::new();
    mock.write(b"AMQP\x00\x00\x09\x01");
    mock.read(b"AMQP\x00\x00\x08\x00");

    let err = Connection::builder()
        .open_with_stream(mock.build())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::VersionMismatch {
            major: 0,
            minor: 8,
            revision: 0
        }
    ));
}

#[tokio::test]
async fn auth_refusal_during_negotiation_is_an_auth_failure() {
    let mut mock = IoBuilder::new();
    mock.write(b"AMQP\x00\x00\x09\x01");
    mock.read(&method_frame(
        0,
        connection_m::Start {
            version_major: 0,
            version_minor: 9,
            server_properties: FieldTable::new(),
            mechanisms: Bytes::from_static(b"PLAIN"),
            locales: Bytes::from_static(b"en_US"),
        },
    ));
    mock.write(&method_frame(
        0,
        connection_m::StartOk {
            client_properties: client_properties(),
            mechanism: "PLAIN".into(),
            response: Bytes::from_static(b"\x00guest\x00wrong"),
            locale: "en_US".into(),
        },
    ));
    mock.read(&method_frame(
        0,
        connection_m::Close {
            reply_code: 403,
            reply_text: "ACCESS_REFUSED - login refused".into(),
            class_id: 0,
            method_id: 0,
        },
    ));

    let err = Connection::builder()
        .credentials("guest", "wrong")
        .open_with_stream(mock.build())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AuthFailure { .. }));
}

#[tokio::test]
async fn channel_close_on_missing_queue_leaves_the_connection_open() {
    let mut mock = IoBuilder::new();
    script_handshake(&mut mock, 131_072, 0);
    script_channel_open(&mut mock, 1);
    mock.write(&method_frame(
        1,
        queue::Declare {
            ticket: 0,
            queue: "missing".into(),
            passive: true,
            ..Default::default()
        },
    ));
    mock.read(&method_frame(
        1,
        channel_m::Close {
            reply_code: 404,
            reply_text: "NOT_FOUND - no queue 'missing' in vhost '/'".into(),
            class_id: class::QUEUE,
            method_id: 10,
        },
    ));
    mock.write(&method_frame(1, channel_m::CloseOk));
    script_connection_close(&mut mock);

    let connection = Connection::builder()
        .open_with_stream(mock.build())
        .await
        .unwrap();
    let channel = connection.open_channel().await.unwrap();

    let err = channel
        .queue_declare(
            "missing",
            QueueDeclareOptions {
                passive: true,
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    match err {
        Error::ChannelClosed {
            reply_code,
            class_id,
            method_id,
            ..
        } => {
            assert_eq!(reply_code, 404);
            assert_eq!(class_id, class::QUEUE);
            assert_eq!(method_id, 10);
        }
        other => panic!("unexpected {other:?}"),
    }

    // the close was scoped to the channel; the connection still closes
    // cleanly through the full handshake
    connection.close().await.unwrap();
}

#[tokio::test]
async fn publish_splits_the_body_at_frame_max() {
    let mut mock = IoBuilder::new();
    script_handshake(&mut mock, 4096, 0);
    script_channel_open(&mut mock, 1);

    mock.write(&method_frame(
        1,
        basic::Publish {
            ticket: 0,
            exchange: String::new(),
            routing_key: "work".into(),
            mandatory: false,
            immediate: false,
        },
    ));
    mock.write(&frame_bytes(Frame::header(
        1,
        ContentHeader::for_basic(10_000, BasicProperties::default()),
    )));
    mock.write(&frame_bytes(Frame::body(1, Bytes::from(vec![0x42; 4088]))));
    mock.write(&frame_bytes(Frame::body(1, Bytes::from(vec![0x42; 4088]))));
    mock.write(&frame_bytes(Frame::body(1, Bytes::from(vec![0x42; 1824]))));
    script_connection_close(&mut mock);

    let connection = Connection::builder()
        .open_with_stream(mock.build())
        .await
        .unwrap();
    let channel = connection.open_channel().await.unwrap();

    let confirm_seq = channel
        .basic_publish(Publish::new("", "work", vec![0x42; 10_000]))
        .await
        .unwrap();
    // no confirm mode, no sequence number
    assert_eq!(confirm_seq, None);

    connection.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn outbound_silence_triggers_a_heartbeat_frame() {
    let mut mock = IoBuilder::new();
    script_handshake(&mut mock, 131_072, 10);
    mock.write(b"\x08\x00\x00\x00\x00\x00\x00\xCE");
    script_connection_close(&mut mock);

    let connection = Connection::builder()
        .open_with_stream(mock.build())
        .await
        .unwrap();

    // six virtual seconds of outbound silence with heartbeat=10: the next
    // tick past the half-period emits exactly one heartbeat frame
    tokio::time::sleep(Duration::from_secs(7)).await;

    connection.close().await.unwrap();
}

#[tokio::test]
async fn blocked_notifications_surface_as_events() {
    let mut mock = IoBuilder::new();
    script_handshake(&mut mock, 131_072, 0);
    mock.read(&method_frame(
        0,
        connection_m::Blocked {
            reason: "low on disk".into(),
        },
    ));
    mock.read(&method_frame(0, connection_m::Unblocked));
    script_connection_close(&mut mock);

    let mut connection = Connection::builder()
        .open_with_stream(mock.build())
        .await
        .unwrap();

    match connection.recv_event().await.unwrap() {
        ConnectionEvent::Blocked { reason } => assert_eq!(reason, "low on disk"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        connection.recv_event().await.unwrap(),
        ConnectionEvent::Unblocked
    ));

    connection.close().await.unwrap();
}

#[tokio::test]
async fn deliveries_flow_to_the_registered_consumer() {
    let mut mock = IoBuilder::new();
    script_handshake(&mut mock, 131_072, 0);
    script_channel_open(&mut mock, 1);

    mock.write(&method_frame(
        1,
        basic::Consume {
            ticket: 0,
            queue: "work".into(),
            consumer_tag: String::new(),
            no_local: false,
            no_ack: false,
            exclusive: false,
            nowait: false,
            arguments: FieldTable::new(),
        },
    ));
    mock.read(&method_frame(
        1,
        basic::ConsumeOk {
            consumer_tag: "amq.ctag-1".into(),
        },
    ));
    mock.read(&method_frame(
        1,
        basic::Deliver {
            consumer_tag: "amq.ctag-1".into(),
            delivery_tag: 1,
            redelivered: false,
            exchange: String::new(),
            routing_key: "work".into(),
        },
    ));
    mock.read(&frame_bytes(Frame::header(
        1,
        ContentHeader::for_basic(5, BasicProperties::default()),
    )));
    mock.read(&frame_bytes(Frame::body(1, Bytes::from_static(b"hello"))));
    mock.write(&method_frame(
        1,
        basic::Ack {
            delivery_tag: 1,
            multiple: false,
        },
    ));
    script_connection_close(&mut mock);

    let connection = Connection::builder()
        .open_with_stream(mock.build())
        .await
        .unwrap();
    let channel = connection.open_channel().await.unwrap();

    let mut consumer = channel
        .basic_consume("work", Default::default())
        .await
        .unwrap();
    assert_eq!(consumer.tag(), "amq.ctag-1");

    match consumer.recv().await.unwrap() {
        ferrumq::ConsumerMessage::Delivery(delivery) => {
            assert_eq!(delivery.delivery_tag, 1);
            assert_eq!(&delivery.body[..], b"hello");
            channel.basic_ack(delivery.delivery_tag, false).await.unwrap();
        }
        other => panic!("unexpected {other:?}"),
    }

    connection.close().await.unwrap();
}
