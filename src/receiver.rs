//! Go-Back-N receive-side engine.
//!
//! The receiver keeps a single cursor: the highest in-order sequence number
//! accepted so far.  Exactly one frame is acceptable at any moment — the
//! next in-order, checksum-valid data frame.  Everything else (corrupt,
//! duplicate, future, or reordered frames) is dropped without buffering,
//! and the unchanged cumulative acknowledgment is re-sent, prompting the
//! sender's timeout-driven retransmission of the whole window.
//!
//! Accepted payload is appended to the output in receipt order; a
//! zero-payload data frame marks end-of-transfer.
//!
//! [`ReceiverState`] is the pure accept/reject state machine; [`Receiver`]
//! wraps it with the socket loop and file writes.  One blocking receive per
//! iteration suffices here — the receiver has no timer of its own.

use std::io::Write;

use crate::error::TransferError;
use crate::frame::{Frame, FrameError, Message, HEADER_LEN, MAX_DATAGRAM};
use crate::socket::Socket;

/// Byte counters reported when the terminal frame is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverReport {
    /// Payload bytes seen across all received frames, accepted or not.
    pub total_bytes: u64,
    /// Payload bytes accepted in order with a valid checksum.
    pub good_bytes: u64,
}

/// Outcome of one inbound frame, decided by [`ReceiverState::on_message`].
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// In-order data: append this payload to the output file.
    Deliver(Vec<u8>),
    /// The terminal frame arrived; the transfer is complete.
    Finished,
    /// Anything else: re-assert the current expectation, change nothing.
    Reject,
}

// ---------------------------------------------------------------------------
// ReceiverState — pure protocol state
// ---------------------------------------------------------------------------

/// Session state for the receive side.
#[derive(Debug)]
pub struct ReceiverState {
    /// Highest in-order sequence number accepted; −1 before the first frame.
    last_received_seq: i64,
    total_bytes: u64,
    good_bytes: u64,
}

impl ReceiverState {
    pub fn new() -> Self {
        Self {
            last_received_seq: -1,
            total_bytes: 0,
            good_bytes: 0,
        }
    }

    /// Account one received datagram of `len` bytes into the total counter,
    /// regardless of whether it decodes or is accepted.
    pub fn note_datagram(&mut self, len: usize) {
        self.total_bytes += len.saturating_sub(HEADER_LEN) as u64;
    }

    /// Accept or reject one decoded frame.
    ///
    /// Accepts iff the frame is data with exactly the next sequence number;
    /// the cursor advances and the payload counts as good bytes.  An empty
    /// accepted payload finishes the transfer.
    pub fn on_message(&mut self, message: Message) -> Step {
        match message {
            Message::Data { seq, payload } if seq == self.last_received_seq + 1 => {
                self.last_received_seq = seq;
                self.good_bytes += payload.len() as u64;
                if payload.is_empty() {
                    Step::Finished
                } else {
                    Step::Deliver(payload)
                }
            }
            Message::Data { seq, .. } => {
                log::debug!(
                    "dropping out-of-order frame: seq {seq}, expecting {}",
                    self.last_received_seq + 1
                );
                Step::Reject
            }
            Message::Ack { .. } => {
                log::debug!("dropping unexpected ack frame from peer");
                Step::Reject
            }
        }
    }

    /// Next sequence number this receiver expects — the cumulative ack value
    /// placed in every outbound acknowledgment.
    pub fn expected_seq(&self) -> i64 {
        self.last_received_seq + 1
    }

    pub fn report(&self) -> ReceiverReport {
        ReceiverReport {
            total_bytes: self.total_bytes,
            good_bytes: self.good_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// Receiver — socket loop and file output
// ---------------------------------------------------------------------------

/// The receive side of one transfer session.
pub struct Receiver {
    state: ReceiverState,
    socket: Socket,
}

impl Receiver {
    pub fn new(socket: Socket) -> Self {
        Self {
            state: ReceiverState::new(),
            socket,
        }
    }

    /// Receive frames until the terminal frame is accepted, appending good
    /// payload to `out` in order.
    ///
    /// Every received frame — accepted or rejected — is answered with a
    /// cumulative acknowledgment sent back to its source address.  Returns
    /// the byte counters once the transfer completes.
    pub async fn run<W: Write>(mut self, mut out: W) -> Result<ReceiverReport, TransferError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            let (n, peer) = self.socket.recv_from(&mut buf).await?;
            log::trace!("socket: {n} bytes received from {peer}");
            self.state.note_datagram(n);

            let step = match Frame::decode(&buf[..n]) {
                Ok(frame) => self.state.on_message(frame.message()),
                Err(e @ FrameError::SizeMismatch { .. }) => {
                    log::warn!("truncated frame: {e}");
                    Step::Reject
                }
                Err(e) => {
                    log::debug!("rejecting undecodable frame: {e}");
                    Step::Reject
                }
            };

            // Ack first, in receipt order, exactly like the accept path;
            // for a rejected frame this re-asserts the old expectation.
            let ack = Frame::ack(self.state.expected_seq()).encode();
            self.socket.send_to(&ack, peer).await?;

            match step {
                Step::Deliver(payload) => {
                    out.write_all(&payload)?;
                    log::debug!("file: {} bytes written", payload.len());
                }
                Step::Finished => {
                    out.flush()?;
                    let report = self.state.report();
                    log::info!(
                        "transfer complete: {} good of {} total byte(s)",
                        report.good_bytes,
                        report.total_bytes
                    );
                    return Ok(report);
                }
                Step::Reject => {}
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
