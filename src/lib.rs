//! `gbn-transfer` — Go-Back-N reliable file transfer over UDP.
//!
//! Moves a file from a sender process to a receiver process across an
//! unreliable, unordered, lossy datagram transport, using a bounded sliding
//! window, cumulative acknowledgments, a single retransmission timer driven
//! by the oldest unacknowledged frame, and CRC-32 corruption detection.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  data frames  ┌──────────┐
//!  │  Sender  │──────────────▶│ Receiver │──▶ output file
//!  └────┬─────┘               └─────┬────┘
//!       │        cumulative ACKs    │
//!       │◀──────────────────────────┘
//!       │
//!  ┌────▼────────────────────────────────┐
//!  │  PacketStore (unacked frames with   │
//!  │  per-frame retransmit deadlines)    │
//!  └────┬────────────────────────────────┘
//!       │ raw UDP datagrams
//!  ┌────▼──────┐
//!  │  Socket   │  (thin async wrapper around tokio UdpSocket)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`frame`]    — wire format (serialise / deserialise, checksum)
//! - [`store`]    — ordered store of unacknowledged outbound packets
//! - [`sender`]   — sliding-window send engine and its event loop
//! - [`receiver`] — in-order-only receive engine and cumulative ACKs
//! - [`socket`]   — async UDP transport boundary
//! - [`error`]    — fatal error taxonomy

pub mod error;
pub mod frame;
pub mod receiver;
pub mod sender;
pub mod socket;
pub mod store;

pub use error::TransferError;
pub use receiver::{Receiver, ReceiverReport};
pub use sender::{Sender, SenderConfig, SenderReport};
pub use socket::Socket;
