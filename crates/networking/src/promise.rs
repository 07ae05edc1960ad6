//! Single-owner handles to in-flight request/response exchanges.
//!
//! A [`PendingPromise`] is polled without blocking. It never changes once it
//! has settled: callers that want to retry issue a new request and replace
//! the promise.

use crate::error::Error;
use std::time::Duration;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::time::Instant;

/// Observable state of a [`PendingPromise`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromiseState<T> {
    /// No response yet and the deadline has not passed.
    Waiting,
    /// The remote side answered.
    Success(T),
    /// The exchange failed (transport error, remote error, or the promise was already spent).
    Failed(String),
    /// The deadline passed before a response arrived.
    TimedOut,
}

impl<T> PromiseState<T> {
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        matches!(self, PromiseState::Waiting)
    }
}

/// The consumer half of an in-flight exchange.
#[derive(Debug)]
pub struct PendingPromise<T> {
    receiver: Option<oneshot::Receiver<Result<T, String>>>,
    deadline: Instant,
}

/// The producer half of an in-flight exchange.
#[derive(Debug)]
pub struct PromiseResolver<T> {
    sender: oneshot::Sender<Result<T, String>>,
}

/// Create a linked promise/resolver pair that times out after `timeout`.
#[must_use]
pub fn promise<T>(timeout: Duration) -> (PendingPromise<T>, PromiseResolver<T>) {
    let (sender, receiver) = oneshot::channel();
    (
        PendingPromise {
            receiver: Some(receiver),
            deadline: Instant::now() + timeout,
        },
        PromiseResolver { sender },
    )
}

impl<T> PendingPromise<T> {
    /// Poll the exchange. Returns [`PromiseState::Waiting`] until it settles; a
    /// settled promise yields its outcome exactly once and `Failed` afterwards.
    pub fn poll(&mut self) -> PromiseState<T> {
        let Some(receiver) = self.receiver.as_mut() else {
            return PromiseState::Failed("promise already settled".to_string());
        };

        let state = match receiver.try_recv() {
            Ok(Ok(value)) => PromiseState::Success(value),
            Ok(Err(reason)) => PromiseState::Failed(reason),
            Err(TryRecvError::Closed) => PromiseState::Failed(Error::ChannelClosed.to_string()),
            Err(TryRecvError::Empty) if Instant::now() >= self.deadline => PromiseState::TimedOut,
            Err(TryRecvError::Empty) => return PromiseState::Waiting,
        };

        self.receiver = None;
        state
    }

    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.receiver.is_none()
    }
}

impl<T> PromiseResolver<T> {
    /// Complete the exchange. Returns `false` if the promise was dropped.
    pub fn fulfill(self, value: T) -> bool {
        self.sender.send(Ok(value)).is_ok()
    }

    /// Fail the exchange. Returns `false` if the promise was dropped.
    pub fn fail(self, reason: impl Into<String>) -> bool {
        self.sender.send(Err(reason.into())).is_ok()
    }

    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }
}
