//! Sequence bookkeeping and response accumulation for one session.
//!
//! The sender and the background receive task share one `Exchange`
//! behind the connection's lock. The sender opens a pending slot with
//! [`Exchange::begin`], the receive task feeds fragments through
//! [`Exchange::absorb`], and the sender collects the text with
//! [`Exchange::finish`] once its wait elapses.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::packet::ResponsePart;

#[derive(Debug, Default)]
pub struct Exchange {
    /// Sequence byte the next command will use.
    next_sequence: u8,
    /// Sequence of the command currently awaiting its response.
    pending: Option<u8>,
    /// Unindexed fragments in arrival order.
    fragments: Vec<u8>,
    /// Indexed multi-packet fragments.
    parts: BTreeMap<u8, Vec<u8>>,
    /// Declared part count of the pending multi-packet response.
    expected_parts: Option<u8>,
    /// A datagram correlated with the pending command arrived.
    responded: bool,
}

impl Exchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh session: the first command uses sequence 0.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Allocate the next sequence number (wrapping mod 256), clear the
    /// response buffer and mark the command as pending.
    pub fn begin(&mut self) -> u8 {
        let seq = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.clear_buffer();
        self.pending = Some(seq);
        seq
    }

    /// Sequence for a keep-alive, or `None` while a command is pending.
    pub fn keep_alive_sequence(&mut self) -> Option<u8> {
        if self.pending.is_some() {
            return None;
        }
        let seq = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Some(seq)
    }

    pub fn pending(&self) -> Option<u8> {
        self.pending
    }

    pub fn next_sequence(&self) -> u8 {
        self.next_sequence
    }

    /// Append a response payload if it belongs to the pending command.
    ///
    /// Returns `false` when the fragment could not be correlated.
    pub fn absorb(&mut self, sequence: u8, payload: &[u8]) -> bool {
        if self.pending != Some(sequence) {
            trace!(sequence, pending = ?self.pending, "dropping uncorrelated fragment");
            return false;
        }
        self.responded = true;
        match ResponsePart::parse(payload) {
            ResponsePart::Single(body) => self.fragments.extend_from_slice(body),
            ResponsePart::Indexed { total, index, body } => {
                self.expected_parts = Some(total);
                self.parts.entry(index).or_insert_with(|| body.to_vec());
            }
        }
        true
    }

    /// Close the pending slot for `sequence` and return the accumulated
    /// text. UTF-8 errors are replaced, never fatal.
    ///
    /// Returns `None` when no correlated datagram arrived at all; an
    /// empty reply is `Some("")`.
    pub fn finish(&mut self, sequence: u8) -> Option<String> {
        if self.pending == Some(sequence) {
            self.pending = None;
        }
        if let Some(total) = self.expected_parts {
            if self.parts.len() < usize::from(total) {
                debug!(
                    sequence,
                    received = self.parts.len(),
                    total,
                    "multi-part response incomplete at deadline"
                );
            }
        }

        let mut raw = std::mem::take(&mut self.fragments);
        for body in std::mem::take(&mut self.parts).into_values() {
            raw.extend_from_slice(&body);
        }
        self.expected_parts = None;
        if !std::mem::take(&mut self.responded) {
            return None;
        }
        Some(String::from_utf8_lossy(&raw).into_owned())
    }

    fn clear_buffer(&mut self) {
        self.responded = false;
        self.fragments.clear();
        self.parts.clear();
        self.expected_parts = None;
    }
}
