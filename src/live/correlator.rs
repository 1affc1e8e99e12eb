//! Correlates streamed response fragments with dispatched requests.
//!
//! The protocol carries no per-fragment correlation id, so fragments are
//! broadcast to every pending entry. The serial dispatcher guarantees at
//! most one entry is pending when fragments arrive, which is what makes the
//! broadcast safe; the table still handles many entries so `fail_all` can
//! drain whatever exists.

use std::collections::HashMap;

use super::error::SendError;
use super::types::ReplyTx;

struct PendingResponse {
    reply: ReplyTx,
    buffer: String,
}

pub(crate) struct ResponseCorrelator {
    pending: HashMap<u64, PendingResponse>,
    next_id: u64,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    /// Create a pending entry with an empty buffer; ids are assigned at
    /// dispatch time and increase monotonically.
    pub fn register(&mut self, reply: ReplyTx) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(
            id,
            PendingResponse {
                reply,
                buffer: String::new(),
            },
        );
        id
    }

    /// Append a fragment to every pending entry. When `turn_complete` is
    /// set, every entry resolves with its accumulated buffer and is removed.
    /// Returns the number of entries resolved.
    pub fn apply_fragment(&mut self, text: &str, turn_complete: bool) -> usize {
        for entry in self.pending.values_mut() {
            entry.buffer.push_str(text);
        }

        if !turn_complete {
            return 0;
        }

        let resolved = self.pending.len();
        for (_, entry) in self.pending.drain() {
            let _ = entry.reply.send(Ok(entry.buffer));
        }
        resolved
    }

    /// Reject a single entry, e.g. after an encode failure. Returns false if
    /// the id is no longer pending.
    pub fn reject(&mut self, id: u64, error: SendError) -> bool {
        match self.pending.remove(&id) {
            Some(entry) => {
                let _ = entry.reply.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Reject every pending entry with the same reason and clear the table.
    /// Returns the number of entries rejected.
    pub fn fail_all(&mut self, error: &SendError) -> usize {
        let failed = self.pending.len();
        for (_, entry) in self.pending.drain() {
            let _ = entry.reply.send(Err(error.clone()));
        }
        failed
    }
}
