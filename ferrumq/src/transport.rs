//! Framed transport over any byte stream
//!
//! Binds the frame codec to an `AsyncRead + AsyncWrite` transport and stamps
//! every inbound frame and outbound write into the heartbeat clock. The
//! stream seam is deliberately generic: plain TCP comes from
//! [`connect_tcp`], an encrypted or in-memory transport plugs in through the
//! same type parameter.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{Sink, Stream};
use pin_project_lite::pin_project;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::Instant;
use tokio_util::codec::Framed;

use ferrumq_wire::WireDialect;

use crate::connection::heartbeat::{HeartbeatClock, HeartbeatStatus};
use crate::error::{Error, Operation};
use crate::frames::{Frame, FrameCodec, PROTOCOL_HEADER};

pin_project! {
    pub(crate) struct Transport<Io> {
        #[pin]
        framed: Framed<Io, FrameCodec>,
        clock: HeartbeatClock,
    }
}

impl<Io> Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    /// Writes the 8-octet protocol preamble and binds the codec.
    ///
    /// The broker answers either with `connection.start` or, on a version it
    /// does not speak, with its own preamble, which the codec surfaces as
    /// [`Error::VersionMismatch`] on the first read.
    pub async fn negotiate(
        mut io: Io,
        dialect: WireDialect,
        timeout: Duration,
    ) -> Result<Self, Error> {
        tokio::time::timeout(timeout, io.write_all(&PROTOCOL_HEADER))
            .await
            .map_err(|_| Error::Timeout(Operation::Connect))??;
        Ok(Self::bind(io, dialect))
    }

    pub fn bind(io: Io, dialect: WireDialect) -> Self {
        Self {
            framed: Framed::new(io, FrameCodec::new(dialect)),
            clock: HeartbeatClock::disabled(Instant::now()),
        }
    }

    /// Applies the tuned frame ceiling to both directions.
    pub fn set_frame_max(&mut self, frame_max: u32) {
        self.framed.codec_mut().max_frame_size = frame_max as usize;
    }

    /// Starts the heartbeat clock with the negotiated period.
    pub fn set_heartbeat(&mut self, heartbeat_seconds: u16) {
        self.clock.tune(heartbeat_seconds, Instant::now());
    }

    pub fn heartbeat_enabled(&self) -> bool {
        self.clock.enabled()
    }

    /// Two-step check run before every wait: give up when the peer has been
    /// silent past `2 * heartbeat + 1`, emit when our own side has been
    /// quiet past half the period.
    pub fn check_heartbeat(&self) -> HeartbeatStatus {
        self.clock.check(Instant::now())
    }
}

impl<Io> Stream for Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    type Item = Result<Frame, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.framed.poll_next(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                this.clock.touch_read(Instant::now());
                Poll::Ready(Some(Ok(frame)))
            }
            other => other,
        }
    }
}

impl<Io> Sink<Frame> for Transport<Io>
where
    Io: AsyncRead + AsyncWrite + Unpin,
{
    type Error = Error;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().framed.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        let this = self.project();
        this.framed.start_send(item)?;
        this.clock.touch_write(Instant::now());
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().framed.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().framed.poll_close(cx)
    }
}

/// Opens a plain TCP transport with the configured connect deadline and
/// optional keepalive.
pub(crate) async fn connect_tcp(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    keepalive: bool,
) -> Result<TcpStream, Error> {
    let connect = async {
        let mut last_err = None;
        for addr in tokio::net::lookup_host((host, port)).await? {
            match tcp_connect_addr(addr, keepalive).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "address resolution returned no candidates",
            ))
        }))
    };

    tokio::time::timeout(connect_timeout, connect)
        .await
        .map_err(|_| Error::Timeout(Operation::Connect))?
}

async fn tcp_connect_addr(addr: SocketAddr, keepalive: bool) -> Result<TcpStream, Error> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_keepalive(keepalive)?;
    let stream = socket.connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{SinkExt, StreamExt};

    #[tokio::test]
    async fn preamble_goes_out_before_any_frame() {
        let mock = tokio_test::io::Builder::new()
            .write(b"AMQP\x00\x00\x09\x01")
            .build();
        Transport::negotiate(mock, WireDialect::Rabbit, Duration::from_secs(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn version_mismatch_reply_is_detected() {
        let mock = tokio_test::io::Builder::new()
            .write(b"AMQP\x00\x00\x09\x01")
            .read(b"AMQP\x00\x00\x09\x00")
            .build();
        let mut transport =
            Transport::negotiate(mock, WireDialect::Rabbit, Duration::from_secs(1))
                .await
                .unwrap();
        let err = transport.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            Error::VersionMismatch {
                major: 0,
                minor: 9,
                revision: 0
            }
        ));
    }

    #[tokio::test]
    async fn heartbeat_frames_round_trip_through_the_transport() {
        let mock = tokio_test::io::Builder::new()
            .write(b"\x08\x00\x00\x00\x00\x00\x00\xCE")
            .read(b"\x08\x00\x00\x00\x00\x00\x00\xCE")
            .build();
        let mut transport = Transport::bind(mock, WireDialect::Rabbit);
        transport.send(Frame::heartbeat()).await.unwrap();
        let frame = transport.next().await.unwrap().unwrap();
        assert_eq!(frame, Frame::heartbeat());
    }
}
