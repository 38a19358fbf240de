//! Process-signal cooperation for the engine's wait loop
//!
//! The watcher turns terminate/quit/interrupt into an event the engine's
//! select loop can observe without aborting the wait: the loop records the
//! signal, optionally forwards it to the application through the connection
//! event stream, and re-enters the wait. Platforms without these facilities
//! get a watcher that never fires, leaving timeouts as the only wakeup.

/// A process signal observed while waiting for broker traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaughtSignal {
    Interrupt,
    Terminate,
    Quit,
}

#[cfg(unix)]
pub(crate) use unix::SignalWatcher;

#[cfg(unix)]
mod unix {
    use tokio::signal::unix::{signal, Signal, SignalKind};

    use super::CaughtSignal;

    pub(crate) struct SignalWatcher {
        interrupt: Option<Signal>,
        terminate: Option<Signal>,
        quit: Option<Signal>,
    }

    impl SignalWatcher {
        /// Streams that cannot be registered (sandboxed runtimes) are left
        /// out; the corresponding arm then never fires.
        pub fn new() -> Self {
            Self {
                interrupt: signal(SignalKind::interrupt()).ok(),
                terminate: signal(SignalKind::terminate()).ok(),
                quit: signal(SignalKind::quit()).ok(),
            }
        }

        pub async fn recv(&mut self) -> CaughtSignal {
            tokio::select! {
                _ = wait(self.interrupt.as_mut()) => CaughtSignal::Interrupt,
                _ = wait(self.terminate.as_mut()) => CaughtSignal::Terminate,
                _ = wait(self.quit.as_mut()) => CaughtSignal::Quit,
            }
        }
    }

    async fn wait(stream: Option<&mut Signal>) {
        match stream {
            Some(stream) => {
                if stream.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(not(unix))]
pub(crate) use fallback::SignalWatcher;

#[cfg(not(unix))]
mod fallback {
    use super::CaughtSignal;

    pub(crate) struct SignalWatcher;

    impl SignalWatcher {
        pub fn new() -> Self {
            Self
        }

        pub async fn recv(&mut self) -> CaughtSignal {
            match tokio::signal::ctrl_c().await {
                Ok(()) => CaughtSignal::Interrupt,
                Err(_) => std::future::pending().await,
            }
        }
    }
}
