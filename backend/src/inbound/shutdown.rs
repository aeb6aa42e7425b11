//! Process shutdown signals shared by the server and the companion bot.
//!
//! Both binaries stop on `SIGINT` (Ctrl-C) and on `SIGTERM`, which is what
//! container orchestrators send before killing a process. Listeners are
//! installed eagerly by [`ShutdownListener::install`] so a signal arriving
//! before the first poll is not lost.

use std::fmt;
use std::future::Future;

use tracing::warn;

/// Signal that ended the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// `SIGINT` / Ctrl-C.
    Interrupt,
    /// `SIGTERM`.
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Interrupt => "interrupt",
            Self::Terminate => "terminate",
        })
    }
}

/// Resolve with whichever of `interrupt` or `terminate` completes first.
pub async fn first_signal<I, T>(interrupt: I, terminate: T) -> ShutdownSignal
where
    I: Future<Output = ()>,
    T: Future<Output = ()>,
{
    tokio::select! {
        () = interrupt => ShutdownSignal::Interrupt,
        () = terminate => ShutdownSignal::Terminate,
    }
}

/// Installed `SIGINT` and `SIGTERM` handlers.
///
/// Must be created inside a Tokio runtime. A handler that fails to install
/// is logged and never fires; the other one still does.
///
/// # Examples
/// ```no_run
/// use taskboard::inbound::shutdown::ShutdownListener;
///
/// # async fn run() {
/// let listener = ShutdownListener::install();
/// let signal = listener.wait().await;
/// println!("stopping on {signal}");
/// # }
/// ```
pub struct ShutdownListener {
    inner: platform::Listeners,
}

impl ShutdownListener {
    /// Register the signal handlers now.
    pub fn install() -> Self {
        Self {
            inner: platform::Listeners::install(),
        }
    }

    /// Wait for the first shutdown signal.
    pub async fn wait(mut self) -> ShutdownSignal {
        self.inner.wait().await
    }
}

#[cfg(unix)]
mod platform {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    use super::{ShutdownSignal, first_signal, warn};

    pub(super) struct Listeners {
        interrupt: Option<Signal>,
        terminate: Option<Signal>,
    }

    impl Listeners {
        pub(super) fn install() -> Self {
            Self {
                interrupt: listen(SignalKind::interrupt(), "SIGINT"),
                terminate: listen(SignalKind::terminate(), "SIGTERM"),
            }
        }

        pub(super) async fn wait(&mut self) -> ShutdownSignal {
            first_signal(
                recv(self.interrupt.as_mut()),
                recv(self.terminate.as_mut()),
            )
            .await
        }
    }

    fn listen(kind: SignalKind, name: &'static str) -> Option<Signal> {
        signal(kind)
            .inspect_err(|error| warn!(signal = name, error = %error, "failed to install signal handler"))
            .ok()
    }

    async fn recv(signal: Option<&mut Signal>) {
        match signal {
            Some(signal) => {
                if signal.recv().await.is_none() {
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(not(unix))]
mod platform {
    use super::{ShutdownSignal, first_signal, warn};

    pub(super) struct Listeners;

    impl Listeners {
        pub(super) fn install() -> Self {
            Self
        }

        pub(super) async fn wait(&mut self) -> ShutdownSignal {
            first_signal(
                async {
                    if let Err(error) = tokio::signal::ctrl_c().await {
                        warn!(error = %error, "failed to listen for Ctrl-C");
                        std::future::pending::<()>().await;
                    }
                },
                std::future::pending::<()>(),
            )
            .await
        }
    }
}
