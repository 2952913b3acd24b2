//! Cursor-tracked primitives on the packet buffer
//!
//! Everything multi-byte is network order. Writers append at the cursor
//! (the end of the buffer); patchers fix up fields whose final value was
//! unknown when they were reserved.

use crate::definitions::params::{PayloadType, CRITICAL_PAYLOAD};

use super::Packet;

impl Packet {
    /// Octets left before the packet hits its size limit.
    pub(crate) fn write_left(&self) -> usize {
        self.limit - self.buf.len()
    }

    pub(crate) fn put_bytes(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= self.write_left());
        self.buf.extend_from_slice(bytes);
    }

    pub(crate) fn put_u8(&mut self, value: u8) {
        debug_assert!(self.write_left() >= 1);
        self.buf.push(value);
    }

    pub(crate) fn put_u16(&mut self, value: u16) {
        self.put_bytes(&value.to_be_bytes());
    }

    pub(crate) fn put_u32(&mut self, value: u32) {
        self.put_bytes(&value.to_be_bytes());
    }

    pub(crate) fn put_u64(&mut self, value: u64) {
        self.put_bytes(&value.to_be_bytes());
    }

    pub(crate) fn patch_u8(&mut self, off: usize, value: u8) {
        self.buf[off] = value;
    }

    pub(crate) fn patch_u16(&mut self, off: usize, value: u16) {
        self.buf[off..off + 2].copy_from_slice(&value.to_be_bytes());
    }

    pub(crate) fn patch_u32(&mut self, off: usize, value: u32) {
        self.buf[off..off + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Reserve a generic payload header and chain it in.
    ///
    /// The previous payload's next-payload slot (initially the IKE
    /// header's) is back-patched to this payload's kind; the new header
    /// is appended with a zero length for [`Packet::end_payload`] to
    /// settle, and its own next-payload slot becomes the chain tail.
    /// Returns the header's offset.
    pub(crate) fn begin_payload(&mut self, kind: PayloadType, critical: bool) -> usize {
        let start = self.buf.len();
        self.patch_u8(self.next_slot, kind as u8);
        let flags = if critical { CRITICAL_PAYLOAD } else { 0 };
        self.put_bytes(&[PayloadType::NoNextPayload as u8, flags, 0, 0]);
        self.next_slot = start;
        self.payloads.push(super::PayloadIndex {
            kind,
            off: start + 4,
            len: 0,
        });
        start
    }

    /// Settle the length of the payload whose header sits at `start`
    /// from the current cursor, and record it in the payload index.
    pub(crate) fn end_payload(&mut self, start: usize) {
        let total = self.buf.len() - start;
        self.patch_u16(start + 2, total as u16);
        if let Some(entry) = self
            .payloads
            .iter_mut()
            .rev()
            .find(|p| p.off == start + 4)
        {
            entry.len = total - 4;
        }
    }
}
