//! Go-Back-N send-side engine.
//!
//! The sender reads the whole input file into the [`PacketStore`] up front,
//! then drives a single-threaded event loop that multiplexes three events:
//!
//! 1. an incoming acknowledgment (advances the cumulative ack cursor and
//!    evicts the acknowledged prefix),
//! 2. expiry of the retransmission timer (go back: rewind `next_send_seq`
//!    to the last acknowledged point and mark the whole window due), and
//! 3. write readiness while the sliding window admits another frame.
//!
//! Exactly one retransmission timer exists, armed to the deadline of the
//! **oldest** unacknowledged packet; `None` is the "no packet outstanding"
//! sentinel.  The session ends once the terminal frame's sequence number is
//! acknowledged.
//!
//! [`SenderState`] holds every protocol decision and touches no I/O, so the
//! window, timer, and cursor rules are unit-testable without sockets.
//! [`Sender`] owns the socket and performs the actual sends and receives.

use std::io::{self, Read};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::error::TransferError;
use crate::frame::{Frame, Message, HEADER_LEN, MAX_DATAGRAM, MAX_PAYLOAD};
use crate::socket::Socket;
use crate::store::{PacketStore, StoredPacket};

/// Sleep used when no retransmission timer is armed.  The event loop never
/// acts on this branch alone; an ack or write readiness always preempts it.
const NO_TIMER_WAIT: Duration = Duration::from_secs(365 * 24 * 3600);

/// Fixed per-session tuning knobs.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Maximum number of in-flight (sent, unacknowledged) frames.
    pub window: u32,
    /// How long a transmitted frame may remain unacknowledged before the
    /// whole window is retransmitted.
    pub retransmit_timeout: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            window: 25,
            retransmit_timeout: Duration::from_secs(3),
        }
    }
}

/// Totals reported after a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderReport {
    /// Payload bytes read from the input file.
    pub file_bytes: u64,
    /// Frames produced, including the terminal frame.
    pub frames: u64,
    /// Individual frame transmissions, retransmits included.
    pub transmissions: u64,
}

// ---------------------------------------------------------------------------
// SenderState — pure protocol state
// ---------------------------------------------------------------------------

/// Session state for the send side.
///
/// ```text
///  last_ack_seq        next_send_seq      very_last_seq
///       │                   │                  │
///  ─────┼───────────────────┼──────────────────┼──▶ seq space
///       │ ◀── in flight ──▶ │ ◀── sendable ──▶ │
/// ```
#[derive(Debug)]
pub struct SenderState {
    store: PacketStore,
    /// Cumulative ack cursor: everything below it is confirmed delivered.
    last_ack_seq: i64,
    /// Next sequence number eligible for transmission.
    next_send_seq: i64,
    /// Sequence number of the terminal zero-payload frame.
    very_last_seq: i64,
    /// Deadline of the oldest unacknowledged packet; `None` = timer disarmed.
    timer: Option<Instant>,
    window: i64,
    retransmit_timeout: Duration,
    transmissions: u64,
    file_bytes: u64,
}

impl SenderState {
    pub fn new(config: &SenderConfig) -> Self {
        assert!(config.window >= 1, "window size must be at least 1");
        Self {
            store: PacketStore::new(),
            last_ack_seq: 0,
            next_send_seq: 0,
            very_last_seq: 0,
            timer: None,
            window: i64::from(config.window),
            retransmit_timeout: config.retransmit_timeout,
            transmissions: 0,
            file_bytes: 0,
        }
    }

    /// Read `src` to exhaustion, framing it into the packet store.
    ///
    /// Chunks are [`MAX_PAYLOAD`] bytes; a shorter final chunk is followed
    /// by a separate zero-payload terminal frame with the next sequence
    /// number.  An empty source yields exactly one terminal frame with
    /// sequence 0.  Returns the number of payload bytes read.
    pub fn fill_from_reader<R: Read>(&mut self, mut src: R) -> io::Result<u64> {
        let mut seq_no = 0i64;
        loop {
            let mut chunk = vec![0u8; MAX_PAYLOAD];
            let n = read_chunk(&mut src, &mut chunk)?;
            chunk.truncate(n);
            self.file_bytes += n as u64;
            log::debug!("file: {n} bytes read into frame {seq_no}");

            let terminal = chunk.is_empty();
            self.store
                .append(StoredPacket::from_frame(&Frame::data(seq_no, chunk)));
            if terminal {
                break;
            }
            seq_no += 1;
        }
        self.very_last_seq = seq_no;
        Ok(self.file_bytes)
    }

    /// The transfer is complete once the terminal frame is acknowledged.
    pub fn finished(&self) -> bool {
        self.last_ack_seq > self.very_last_seq
    }

    /// Sliding-window admission test: may a new frame be transmitted now?
    pub fn may_send(&self) -> bool {
        self.next_send_seq <= self.very_last_seq
            && self
                .store
                .highest_held()
                .is_some_and(|h| self.next_send_seq <= h)
            && self.next_send_seq - self.last_ack_seq < self.window
    }

    /// Frame bytes to transmit next, if admission allows.
    pub fn next_frame(&self) -> Option<&[u8]> {
        self.store.get(self.next_send_seq).map(|p| p.bytes.as_slice())
    }

    /// Record a successful transmission of the frame at `next_send_seq`:
    /// stamp its retransmission deadline, advance the cursor, and arm the
    /// timer if it was idle.
    pub fn mark_sent(&mut self, now: Instant) {
        let deadline = now + self.retransmit_timeout;
        if let Some(packet) = self.store.get_mut(self.next_send_seq) {
            packet.deadline = Some(deadline);
        }
        self.next_send_seq += 1;
        self.transmissions += 1;
        if self.timer.is_none() {
            self.timer = Some(deadline);
        }
    }

    /// Process a cumulative acknowledgment.
    ///
    /// Stale acks (`expected <= last_ack_seq`) are ignored.  A fresh ack
    /// advances the cursor, evicts the acknowledged prefix, and re-arms the
    /// timer from the new oldest packet's deadline.  Returns `true` when
    /// the cursor advanced.
    pub fn on_ack(&mut self, expected: i64, now: Instant) -> bool {
        if expected <= self.last_ack_seq {
            log::debug!(
                "stale ack: expected={expected}, cursor already at {}",
                self.last_ack_seq
            );
            return false;
        }

        self.last_ack_seq = expected;
        if self.next_send_seq < self.last_ack_seq {
            // The ack confirms frames we never recorded as sent.  Tolerated:
            // snap the send cursor forward so the window math stays sound.
            log::debug!(
                "ack outpaced send cursor: snapping {} -> {}",
                self.next_send_seq,
                self.last_ack_seq
            );
            self.next_send_seq = self.last_ack_seq;
        }
        self.store.evict_before(self.last_ack_seq);

        let horizon = now + self.retransmit_timeout;
        self.timer = match self.store.oldest_deadline() {
            Some(deadline) if deadline > horizon => {
                log::warn!(
                    "oldest packet deadline lies {:?} past the retransmit horizon; disarming timer",
                    deadline - horizon
                );
                None
            }
            Some(deadline) => Some(deadline),
            // Store empty (transfer nearly done) or oldest packet already
            // marked due after a timeout.
            None => None,
        };
        true
    }

    /// Timer expiry: treat the entire outstanding window as lost.
    ///
    /// Rewinds `next_send_seq` to the cumulative ack cursor and marks every
    /// held packet due for immediate resend.  The timer stays disarmed until
    /// the next successful send re-arms it.
    pub fn on_timeout(&mut self) {
        log::debug!(
            "retransmit timeout: going back to seq {} ({} frame(s) outstanding)",
            self.last_ack_seq,
            self.store.len()
        );
        self.next_send_seq = self.last_ack_seq;
        self.store.reset_deadlines();
        self.timer = None;
    }

    /// Bounded wait until the retransmission deadline.
    ///
    /// A deadline already in the past clamps to zero with a warning — an
    /// immediate timeout event, expected only under clock skew or a
    /// processing stall.
    pub fn next_wait(&self, now: Instant) -> Duration {
        match self.timer {
            None => NO_TIMER_WAIT,
            Some(deadline) if deadline < now => {
                log::warn!(
                    "retransmit deadline elapsed {:?} ago; clamping wait to zero",
                    now - deadline
                );
                Duration::ZERO
            }
            Some(deadline) => deadline - now,
        }
    }

    pub fn report(&self) -> SenderReport {
        SenderReport {
            file_bytes: self.file_bytes,
            frames: (self.very_last_seq + 1) as u64,
            transmissions: self.transmissions,
        }
    }

    #[cfg(test)]
    fn cursors(&self) -> (i64, i64) {
        (self.last_ack_seq, self.next_send_seq)
    }
}

/// Fill `buf` from `src`, short only at end-of-file.
fn read_chunk<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// Sender — event loop over the socket
// ---------------------------------------------------------------------------

/// The send side of one transfer session.
pub struct Sender {
    state: SenderState,
    socket: Socket,
}

impl Sender {
    /// Connect `socket` to the receiver and prepare an empty session.
    ///
    /// Call [`Sender::load`] before [`Sender::run`].
    pub async fn connect(
        socket: Socket,
        peer: SocketAddr,
        config: &SenderConfig,
    ) -> Result<Self, TransferError> {
        socket.connect(peer).await?;
        Ok(Self {
            state: SenderState::new(config),
            socket,
        })
    }

    /// Read the entire input into the packet store (the FILLING phase).
    ///
    /// No network traffic happens until [`Sender::run`].
    pub fn load<R: Read>(&mut self, src: R) -> Result<u64, TransferError> {
        Ok(self.state.fill_from_reader(src)?)
    }

    /// Drive the transfer to completion.
    ///
    /// Single-threaded and non-blocking: the loop suspends only in the
    /// `select!` below, waking on an incoming datagram, on the retransmit
    /// deadline, or on write readiness while the window admits a send.
    /// Branch order is significant — acknowledgments are handled before
    /// timer expiry, and both before new sends, matching the recovery
    /// design (a pending ack must not be preempted by a spurious
    /// whole-window retransmit).
    pub async fn run(mut self) -> Result<SenderReport, TransferError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        while !self.state.finished() {
            let wait = self.state.next_wait(Instant::now());

            tokio::select! {
                biased;

                ready = self.socket.readable() => {
                    ready?;
                    self.drain_acks(&mut buf)?;
                }
                _ = tokio::time::sleep(wait), if self.state.timer.is_some() => {
                    self.state.on_timeout();
                }
                ready = self.socket.writable(), if self.state.may_send() => {
                    ready?;
                    self.pump_sends()?;
                }
            }
        }

        let report = self.state.report();
        log::info!(
            "transfer complete: {} byte(s) in {} frame(s), {} transmission(s)",
            report.file_bytes,
            report.frames,
            report.transmissions
        );
        Ok(report)
    }

    /// Consume every queued datagram, feeding valid acks to the state.
    ///
    /// Corrupt datagrams and anything that is not an acknowledgment are
    /// protocol anomalies: logged and dropped, recovery is left to the
    /// retransmission timer.
    fn drain_acks(&mut self, buf: &mut [u8]) -> Result<(), TransferError> {
        loop {
            let n = match self.socket.try_recv(buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            log::trace!("socket: {n} bytes received");

            match Frame::decode(&buf[..n]).map(Frame::message) {
                Ok(Message::Ack { expected }) => {
                    self.state.on_ack(expected, Instant::now());
                }
                Ok(Message::Data { seq, .. }) => {
                    log::debug!("ignoring unexpected data frame (seq {seq}) from peer");
                }
                Err(e) => log::debug!("dropping undecodable datagram: {e}"),
            }
        }
    }

    /// Transmit frames while the window admits them.
    ///
    /// Stops early on `WouldBlock` (transient; retried after the next write
    /// readiness).  Any other socket error is fatal.
    fn pump_sends(&mut self) -> Result<(), TransferError> {
        while self.state.may_send() {
            // Admission guarantees the store holds this sequence number.
            let Some(bytes) = self.state.next_frame() else {
                break;
            };
            match self.socket.try_send(bytes) {
                Ok(n) => log::trace!("socket: {n} bytes sent ({} payload)", n - HEADER_LEN),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
            self.state.mark_sent(Instant::now());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
