//! Correlation of the editor replies with the pending function calls

use std::collections::VecDeque;

use crate::{NetbeansError, Result};

/// The netbeans functions whose reply is processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    Insert,
    Remove,
    GetLength,
}

impl ReplyKind {
    /// The netbeans function name
    pub fn function(&self) -> &'static str {
        match self {
            ReplyKind::Insert => "insert",
            ReplyKind::Remove => "remove",
            ReplyKind::GetLength => "getLength",
        }
    }
}

/// A function call waiting for its reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub buf_id: u32,
    pub seqno: u32,
    pub kind: ReplyKind,
}

/// FIFO of the pending replies.
///
/// The pending reply is pushed before the function is sent. A reply is
/// matched by sequence number: the entries queued before the matching one
/// are dropped. When no entry matches, the oldest entry is used and its
/// handler must report the mismatch.
#[derive(Debug, Default)]
pub struct ReplyFifo {
    fifo: VecDeque<PendingReply>,
    last_seqno: Option<u32>,
}

impl ReplyFifo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pending: PendingReply) {
        self.fifo.push_back(pending);
    }

    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    /// Accept a reply with this sequence number.
    ///
    /// Return `Ok(None)` for a duplicate of the last accepted reply.
    pub fn accept(&mut self, seqno: u32) -> Result<Option<PendingReply>> {
        if self.last_seqno == Some(seqno) {
            log::debug!(target: "nb", "ignoring duplicate reply {}", seqno);
            return Ok(None);
        }
        if self.fifo.is_empty() {
            return Err(NetbeansError::OrphanReply(seqno));
        }

        let pending = match self.fifo.iter().position(|p| p.seqno == seqno) {
            Some(pos) => {
                if pos > 0 {
                    log::error!(target: "nb", "dropping {} pending replies before reply {}", pos, seqno);
                }
                self.fifo.drain(..=pos).last()
            }
            None => self.fifo.pop_front(),
        };
        self.last_seqno = Some(seqno);
        Ok(pending)
    }

    pub fn clear(&mut self) {
        self.fifo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(seqno: u32) -> PendingReply {
        PendingReply {
            buf_id: 1,
            seqno,
            kind: ReplyKind::Insert,
        }
    }

    #[test]
    fn test_in_order_replies() {
        let mut fifo = ReplyFifo::new();
        for seqno in 1..=4 {
            fifo.push(pending(seqno));
        }
        for seqno in 1..=4 {
            let reply = fifo.accept(seqno).unwrap().unwrap();
            assert_eq!(reply.seqno, seqno);
        }
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_duplicate_reply_is_ignored() {
        let mut fifo = ReplyFifo::new();
        fifo.push(pending(1));
        fifo.push(pending(2));
        assert!(fifo.accept(1).unwrap().is_some());
        assert!(fifo.accept(1).unwrap().is_none());
        assert_eq!(fifo.len(), 1);
    }

    #[test]
    fn test_skip_forward() {
        let mut fifo = ReplyFifo::new();
        for seqno in 1..=3 {
            fifo.push(pending(seqno));
        }
        assert_eq!(fifo.accept(3).unwrap().unwrap().seqno, 3);
        assert!(fifo.is_empty());
    }

    #[test]
    fn test_no_match_uses_oldest() {
        let mut fifo = ReplyFifo::new();
        fifo.push(pending(5));
        fifo.push(pending(6));
        assert_eq!(fifo.accept(9).unwrap().unwrap().seqno, 5);
        assert_eq!(fifo.len(), 1);
    }

    #[test]
    fn test_orphan_reply() {
        let mut fifo = ReplyFifo::new();
        match fifo.accept(3) {
            Err(NetbeansError::OrphanReply(3)) => {}
            other => panic!("Expected an orphan reply error, got {:?}", other),
        }
    }
}
