//! Error types for blelink.
//!
//! Two kinds of failure live here. [`Error`] is what the API surface
//! returns synchronously; it is deliberately small because almost every
//! failure in this crate is asynchronous and travels to the observer
//! instead. [`LinkError`] is that observer-facing kind: the reasons a
//! link attempt died or an established link went away.

use thiserror::Error;

/// Result type alias for blelink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Synchronous errors returned by the device API.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation was issued while the device was not linked.
    #[error("device is not linked")]
    NotLinked,

    /// The transport rejected a request before it was issued.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Reasons a link attempt failed or an established link ended.
///
/// Delivered to the observer, never thrown across the API boundary.
/// `LinkingCancelled`, `LinkingTimedOut` and `ConnectFailed` are only
/// reported while a link attempt is in flight; `LinkLost` only for a
/// link that was established first.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The caller cancelled the link attempt via `unlink()`.
    #[error("linking cancelled by caller")]
    LinkingCancelled,

    /// The connect timer fired before the transport reported a result.
    #[error("linking timed out")]
    LinkingTimedOut,

    /// The radio stack reported a connect failure.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// An established link dropped (out of range, peripheral powered
    /// off, radio subsystem disabled, ...). `None` when the stack gave
    /// no reason.
    #[error("link lost: {}", .0.as_deref().unwrap_or("no reason given"))]
    LinkLost(Option<String>),
}
