//! Outbound packet store for the sender.
//!
//! [`PacketStore`] owns every data frame that has been produced from the
//! input file but not yet cumulatively acknowledged.  Packets are keyed by
//! their monotonically increasing sequence number and always form a
//! contiguous range, so lookups are plain index arithmetic.
//!
//! Ownership of a packet ends only through [`PacketStore::evict_before`],
//! called when the sender's cumulative ack cursor advances — there is no
//! other deallocation path.

use std::collections::VecDeque;
use std::time::Instant;

use crate::frame::Frame;

/// One not-yet-acknowledged data frame plus its retransmission deadline.
#[derive(Debug, Clone)]
pub struct StoredPacket {
    /// Sequence number, equal to the encoded frame's `seq_no`.
    pub seq_no: i64,
    /// The frame pre-encoded for transmission (checksum included).
    pub bytes: Vec<u8>,
    /// Absolute retransmission deadline.  `None` means the packet is due
    /// for (re)transmission and carries no armed deadline.
    pub deadline: Option<Instant>,
}

impl StoredPacket {
    /// Encode `frame` once and wrap it for storage.
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            seq_no: frame.seq_no,
            bytes: frame.encode(),
            deadline: None,
        }
    }
}

/// Ordered, index-addressable store of unacknowledged outbound packets.
///
/// Invariant: held sequence numbers form a contiguous range
/// `[first_held, first_held + len)`.
#[derive(Debug, Default)]
pub struct PacketStore {
    /// Sequence number of the front packet (meaningful when non-empty).
    first_held: i64,
    /// Highest sequence number ever appended, even after eviction.
    last_appended: Option<i64>,
    packets: VecDeque<StoredPacket>,
}

impl PacketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet at the tail.
    ///
    /// # Panics
    ///
    /// Panics if `packet.seq_no` is not exactly one past the last appended
    /// sequence number (or not 0 for the first append) — sequence numbers
    /// are produced in file order and never skip.
    pub fn append(&mut self, packet: StoredPacket) {
        let expected = self.last_appended.map_or(0, |last| last + 1);
        assert_eq!(
            packet.seq_no, expected,
            "out-of-sequence append: got {}, expected {}",
            packet.seq_no, expected
        );
        if self.packets.is_empty() {
            self.first_held = packet.seq_no;
        }
        self.last_appended = Some(packet.seq_no);
        self.packets.push_back(packet);
    }

    /// Look up a packet by sequence number.
    ///
    /// Returns `None` for anything already evicted or never appended.
    pub fn get(&self, seq_no: i64) -> Option<&StoredPacket> {
        self.index_of(seq_no).and_then(|i| self.packets.get(i))
    }

    pub fn get_mut(&mut self, seq_no: i64) -> Option<&mut StoredPacket> {
        self.index_of(seq_no)
            .and_then(|i| self.packets.get_mut(i))
    }

    /// Drop every held packet with sequence number `< seq_no`.
    ///
    /// Called whenever the cumulative ack cursor advances; reclaims the
    /// acknowledged prefix.
    pub fn evict_before(&mut self, seq_no: i64) {
        while self
            .packets
            .front()
            .is_some_and(|p| p.seq_no < seq_no)
        {
            self.packets.pop_front();
            self.first_held += 1;
        }
    }

    /// Highest sequence number ever appended.
    ///
    /// Bounds how far the sender may race ahead of chunk production; stays
    /// valid even after the corresponding packet is evicted.
    pub fn highest_held(&self) -> Option<i64> {
        self.last_appended
    }

    /// Sequence number of the oldest unacknowledged packet, if any.
    pub fn first_held(&self) -> Option<i64> {
        self.packets.front().map(|p| p.seq_no)
    }

    /// Deadline of the oldest held packet.
    ///
    /// `None` when the store is empty or that packet is marked due.
    pub fn oldest_deadline(&self) -> Option<Instant> {
        self.packets.front().and_then(|p| p.deadline)
    }

    /// Mark every held packet due for immediate resend.
    ///
    /// Go-Back-N retransmits the entire outstanding window on timeout;
    /// each packet gets a fresh deadline when it is actually resent.
    pub fn reset_deadlines(&mut self) {
        for packet in self.packets.iter_mut() {
            packet.deadline = None;
        }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    fn index_of(&self, seq_no: i64) -> Option<usize> {
        if self.packets.is_empty() || seq_no < self.first_held {
            return None;
        }
        let index = (seq_no - self.first_held) as usize;
        (index < self.packets.len()).then_some(index)
    }
}
