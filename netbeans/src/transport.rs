//! Outbound side of the netbeans connection

use tokio::sync::mpsc;

use crate::codec::{format_cmd, format_function, SeqNo};
use crate::correlator::{PendingReply, ReplyFifo, ReplyKind};

/// Cursor position in an editor buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub buf_id: u32,
    pub lnum: u32,
    pub col: u32,
}

/// Netbeans protocol version announced by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NbVersion(pub u32, pub u32);

impl NbVersion {
    pub const MIN: NbVersion = NbVersion(2, 3);
    pub const COLOR_NAMES: NbVersion = NbVersion(2, 5);

    pub fn parse(version: &str) -> Option<Self> {
        let mut parts = version.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().unwrap_or("0").parse().ok()?;
        Some(NbVersion(major, minor))
    }
}

impl std::fmt::Display for NbVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}.{}", self.0, self.1)
    }
}

/// Sends commands and functions to the editor and tracks the replies
/// expected in return
#[derive(Debug)]
pub struct Transport {
    tx: mpsc::UnboundedSender<String>,
    seqno: SeqNo,
    pub(crate) replies: ReplyFifo,
    pub ready: bool,
    pub detached: bool,
    pub version: NbVersion,
    /// Last cursor position set by the editor or by a marker placement
    pub last_pos: Option<Cursor>,
}

impl Transport {
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            tx,
            seqno: SeqNo::new(),
            replies: ReplyFifo::new(),
            ready: false,
            detached: false,
            version: NbVersion::MIN,
            last_pos: None,
        }
    }

    /// Send a netbeans command, no reply expected
    pub fn send_cmd(&mut self, buf_id: u32, cmd: &str, args: &str) {
        let seqno = self.seqno.next();
        self.push(format_cmd(buf_id, cmd, seqno, args));
    }

    /// Send a netbeans function and queue its pending reply
    pub fn send_function(&mut self, buf_id: u32, kind: ReplyKind, args: &str) {
        let seqno = self.seqno.next();
        self.replies.push(PendingReply {
            buf_id,
            seqno,
            kind,
        });
        self.push(format_function(buf_id, kind.function(), seqno, args));
    }

    /// Move the cursor back to the last known position
    pub fn goto_last(&mut self) {
        if let Some(cursor) = self.last_pos {
            self.send_cmd(cursor.buf_id, "setDot", &format!("{}/{}", cursor.lnum, cursor.col));
        }
    }

    /// Send a raw netbeans message
    pub fn send_raw(&mut self, data: &str) {
        self.push(data.to_string());
    }

    fn push(&mut self, data: String) {
        // Older editors close the socket on any message after detach.
        if self.detached && self.version <= NbVersion::COLOR_NAMES {
            return;
        }
        if !self.ready {
            log::debug!(target: "nb", "not ready, dropping: {}", data.trim_end());
            return;
        }
        log::debug!(target: "nb", "SEND: {}", data.trim_end());
        if self.tx.send(data).is_err() {
            log::error!(target: "nb", "netbeans connection closed");
            self.ready = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_order() {
        assert!(NbVersion::parse("2.2").unwrap() < NbVersion::MIN);
        assert!(NbVersion::parse("2.10").unwrap() > NbVersion::COLOR_NAMES);
        assert_eq!(NbVersion::parse("2.5"), Some(NbVersion(2, 5)));
        assert_eq!(NbVersion::parse("abc"), None);
    }

    #[test]
    fn test_send_function_queues_reply() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tr = Transport::new(tx);
        tr.ready = true;
        tr.send_function(2, ReplyKind::GetLength, "");
        tr.send_cmd(2, "setReadOnly", "T");
        assert_eq!(rx.try_recv().unwrap(), "2:getLength/1\n");
        assert_eq!(rx.try_recv().unwrap(), "2:setReadOnly!2 T\n");
        assert_eq!(tr.replies.len(), 1);
    }

    #[test]
    fn test_nothing_sent_before_ready() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tr = Transport::new(tx);
        tr.send_cmd(1, "setDot", "1/0");
        assert!(rx.try_recv().is_err());
    }
}
