//! Heartbeat scheduling: a tick stream for the engine loop and the clock
//! that decides when to emit or give up

use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;

use futures_util::Stream;
use pin_project_lite::pin_project;
use tokio::time::Instant;
use tokio_stream::wrappers::IntervalStream;

pin_project! {
    /// A wrapper over an `Option<IntervalStream>` that never ticks when the
    /// negotiated heartbeat is zero.
    #[derive(Debug)]
    pub(crate) struct HeartBeat {
        #[pin]
        interval: Option<IntervalStream>,
    }
}

impl HeartBeat {
    /// A ticker that never yields; used when heartbeats are disabled.
    pub fn never() -> Self {
        Self { interval: None }
    }

    /// Ticks at one-second granularity so emission and miss detection track
    /// the negotiated period closely regardless of its length.
    pub fn new() -> Self {
        let interval = tokio::time::interval(Duration::from_secs(1));
        Self {
            interval: Some(IntervalStream::new(interval)),
        }
    }
}

impl Stream for HeartBeat {
    type Item = ();

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.interval.as_pin_mut() {
            Some(stream) => stream.poll_next(cx).map(|i| i.map(|_| ())),
            None => Poll::Pending,
        }
    }
}

/// Outcome of a heartbeat check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeartbeatStatus {
    /// Nothing to do
    Idle,
    /// Outbound silence passed half the period; emit a heartbeat frame
    SendDue,
    /// Inbound and outbound silence passed `2 * heartbeat + 1`; the peer is
    /// presumed half-open
    Missed,
}

/// Tracks transport activity against the negotiated heartbeat period.
#[derive(Debug)]
pub(crate) struct HeartbeatClock {
    period: Option<Duration>,
    last_read: Instant,
    last_write: Instant,
}

impl HeartbeatClock {
    pub fn disabled(now: Instant) -> Self {
        Self {
            period: None,
            last_read: now,
            last_write: now,
        }
    }

    pub fn enabled(&self) -> bool {
        self.period.is_some()
    }

    /// Activates the clock once tune negotiation fixes the period.
    pub fn tune(&mut self, heartbeat_seconds: u16, now: Instant) {
        self.period = match heartbeat_seconds {
            0 => None,
            secs => Some(Duration::from_secs(u64::from(secs))),
        };
        self.last_read = now;
        self.last_write = now;
    }

    pub fn touch_read(&mut self, now: Instant) {
        self.last_read = now;
    }

    pub fn touch_write(&mut self, now: Instant) {
        self.last_write = now;
    }

    pub fn check(&self, now: Instant) -> HeartbeatStatus {
        let Some(period) = self.period else {
            return HeartbeatStatus::Idle;
        };

        let last_seen = Instant::max(self.last_read, self.last_write);
        if now.saturating_duration_since(last_seen) > 2 * period + Duration::from_secs(1) {
            return HeartbeatStatus::Missed;
        }
        if now.saturating_duration_since(self.last_write) > period / 2 {
            return HeartbeatStatus::SendDue;
        }
        HeartbeatStatus::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuned_clock(heartbeat: u16) -> (HeartbeatClock, Instant) {
        let now = Instant::now();
        let mut clock = HeartbeatClock::disabled(now);
        clock.tune(heartbeat, now);
        (clock, now)
    }

    #[test]
    fn disabled_clock_never_fires() {
        let (clock, now) = tuned_clock(0);
        assert_eq!(
            clock.check(now + Duration::from_secs(3600)),
            HeartbeatStatus::Idle
        );
    }

    #[test]
    fn emission_is_due_after_half_the_period() {
        let (clock, now) = tuned_clock(10);
        assert_eq!(clock.check(now + Duration::from_secs(4)), HeartbeatStatus::Idle);
        // six seconds of outbound silence with heartbeat=10
        assert_eq!(
            clock.check(now + Duration::from_secs(6)),
            HeartbeatStatus::SendDue
        );
    }

    #[test]
    fn writes_defer_emission() {
        let (mut clock, now) = tuned_clock(10);
        clock.touch_write(now + Duration::from_secs(5));
        assert_eq!(
            clock.check(now + Duration::from_secs(9)),
            HeartbeatStatus::Idle
        );
    }

    #[test]
    fn silence_beyond_twice_the_period_is_a_miss() {
        let (mut clock, now) = tuned_clock(10);
        // keep our own side chatty so only inbound silence counts
        clock.touch_write(now + Duration::from_secs(21));
        assert_eq!(
            clock.check(now + Duration::from_secs(21)),
            HeartbeatStatus::Idle
        );

        let (clock, now) = tuned_clock(10);
        assert_eq!(
            clock.check(now + Duration::from_secs(22)),
            HeartbeatStatus::Missed
        );
    }

    #[test]
    fn reads_defer_the_miss() {
        let (mut clock, now) = tuned_clock(10);
        clock.touch_read(now + Duration::from_secs(20));
        // not a miss: the broker was heard 2 seconds ago; our own silence
        // still owes a heartbeat frame
        assert_eq!(
            clock.check(now + Duration::from_secs(22)),
            HeartbeatStatus::SendDue
        );
    }
}
