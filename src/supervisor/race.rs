//! The three-way race between handler completion, handler panic, and
//! cancellation (deadline or client disconnect).
//!
//! # Design Decisions
//! - Completion and panic both arrive through the worker's `JoinHandle`;
//!   cancellation is a timer merged with the disconnect future
//! - `select!` is biased toward the worker so a handler that finishes on the
//!   same poll as the deadline still counts as completed
//! - Losing branches are dropped, not awaited. Dropping the `JoinHandle`
//!   detaches the worker, which keeps running against its own capture

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Why a request was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cancellation {
    DeadlineExceeded,
    ClientDisconnected,
}

impl Cancellation {
    pub fn as_str(self) -> &'static str {
        match self {
            Cancellation::DeadlineExceeded => "deadline exceeded",
            Cancellation::ClientDisconnected => "client disconnected",
        }
    }
}

impl fmt::Display for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the race was won.
pub(crate) enum Outcome {
    Completed,
    Panicked {
        message: String,
        payload: Box<dyn Any + Send + 'static>,
    },
    Cancelled(Cancellation),
}

/// Public summary of a resolved request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Completed,
    Panicked,
    Cancelled(Cancellation),
}

impl Resolution {
    pub fn label(self) -> &'static str {
        match self {
            Resolution::Completed => "completed",
            Resolution::Panicked => "panicked",
            Resolution::Cancelled(Cancellation::DeadlineExceeded) => "deadline_exceeded",
            Resolution::Cancelled(Cancellation::ClientDisconnected) => "client_disconnected",
        }
    }
}

impl Outcome {
    pub(crate) fn resolution(&self) -> Resolution {
        match self {
            Outcome::Completed => Resolution::Completed,
            Outcome::Panicked { .. } => Resolution::Panicked,
            Outcome::Cancelled(reason) => Resolution::Cancelled(*reason),
        }
    }
}

/// Cancellation state a handler can observe through the request extensions.
///
/// Handlers are never stopped; this only tells them their output is no
/// longer wanted.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<Option<Cancellation>>,
}

impl CancelSignal {
    pub(crate) fn channel() -> (watch::Sender<Option<Cancellation>>, Self) {
        let (tx, rx) = watch::channel(None);
        (tx, Self { rx })
    }

    /// Reason the request was cancelled, if it was.
    pub fn reason(&self) -> Option<Cancellation> {
        *self.rx.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Wait until the request is cancelled. Never resolves for a request
    /// that finished without being cancelled.
    pub async fn cancelled(&self) -> Cancellation {
        let mut rx = self.rx.clone();
        if let Ok(reason) = rx.wait_for(Option::is_some).await {
            if let Some(reason) = *reason {
                return reason;
            }
        }
        std::future::pending().await
    }
}

/// Text of a panic payload, for the error response and the log line.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "handler panicked with a non-string payload".to_string()
    }
}

async fn cancellation<D>(deadline: Option<Duration>, disconnected: D) -> Cancellation
where
    D: Future<Output = ()>,
{
    let expired = async {
        match deadline {
            Some(timeout) => tokio::time::sleep(timeout).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = expired => Cancellation::DeadlineExceeded,
        _ = disconnected => Cancellation::ClientDisconnected,
    }
}

/// Wait for the first of completion, panic, or cancellation.
pub(crate) async fn race<D>(
    mut worker: JoinHandle<()>,
    deadline: Option<Duration>,
    disconnected: D,
) -> Outcome
where
    D: Future<Output = ()>,
{
    tokio::select! {
        biased;
        joined = &mut worker => match joined {
            Ok(()) => Outcome::Completed,
            Err(err) if err.is_panic() => {
                let payload = err.into_panic();
                Outcome::Panicked {
                    message: panic_message(payload.as_ref()),
                    payload,
                }
            }
            Err(err) => {
                // Only happens when the runtime is shutting down underneath us.
                let message = err.to_string();
                Outcome::Panicked {
                    payload: Box::new(message.clone()),
                    message,
                }
            }
        },
        reason = cancellation(deadline, disconnected) => Outcome::Cancelled(reason),
    }
}
