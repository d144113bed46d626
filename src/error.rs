//! Fatal error taxonomy for a transfer session.
//!
//! Only unrecoverable transport and file failures surface here.  Protocol
//! anomalies (corrupt frames, duplicates, stale acks) are handled by the
//! retransmission machinery and never produce a [`TransferError`];
//! would-block conditions on the non-blocking socket are transient and
//! retried on the next readiness event.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    /// Unrecoverable socket or file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote host/port could not be resolved to a usable address.
    #[error("cannot resolve peer address {0}")]
    BadPeer(String),
}
