//! Read-only report buffers: the console and the list buffers
//!
//! The editor content of a report buffer is mirrored by its byte length.
//! Edits are sent with the netbeans `insert` and `remove` functions and
//! bracketed by `startAtomic` and `endAtomic`.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::codec::quote;
use crate::correlator::ReplyKind;
use crate::diff::{line_edits, Edit};
use crate::transport::Transport;

pub const CONSOLE: &str = "(clewn)_console";
pub const EMPTY: &str = "(clewn)_empty";

/// Console output is flushed after this delay of inactivity
pub const FLUSH_DELAY: Duration = Duration::from_millis(500);

static RE_REPORT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:.*/)?\(clewn\)_\w+$").expect("valid report name regex"));

/// Return true when `name` is the name of a report buffer
pub fn is_report_name(name: &str) -> bool {
    RE_REPORT_NAME.is_match(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Console,
    Variables,
    Breakpoints,
    Backtrace,
    Threads,
}

impl ReportKind {
    /// The list buffers, updated after each debugger command
    pub const LISTS: [ReportKind; 4] = [
        ReportKind::Variables,
        ReportKind::Breakpoints,
        ReportKind::Backtrace,
        ReportKind::Threads,
    ];

    pub fn short_name(&self) -> &'static str {
        match self {
            ReportKind::Console => "console",
            ReportKind::Variables => "variables",
            ReportKind::Breakpoints => "breakpoints",
            ReportKind::Backtrace => "backtrace",
            ReportKind::Threads => "threads",
        }
    }

    /// The editor buffer name
    pub fn buffer_name(&self) -> String {
        format!("(clewn)_{}", self.short_name())
    }

    pub fn from_short_name(name: &str) -> Option<Self> {
        match name {
            "console" => Some(ReportKind::Console),
            "variables" => Some(ReportKind::Variables),
            "breakpoints" => Some(ReportKind::Breakpoints),
            "backtrace" => Some(ReportKind::Backtrace),
            "threads" => Some(ReportKind::Threads),
            _ => None,
        }
    }

    /// Return the kind of the report buffer named `name`, the name may
    /// include a directory
    pub fn from_buffer_name(name: &str) -> Option<Self> {
        let base = name.rsplit('/').next().unwrap_or(name);
        base.strip_prefix("(clewn)_")
            .and_then(ReportKind::from_short_name)
    }
}

/// A read-only editor buffer written by the debugger
#[derive(Debug)]
pub struct ReportBuffer {
    pub kind: ReportKind,
    pub buf_id: u32,
    pub registered: bool,
    /// The buffer is displayed in an editor window
    pub visible: bool,
    /// An atomic edit is in progress
    editing: bool,
    /// The last line of the editor buffer is not newline terminated
    nonempty_last: bool,
    /// Byte length of the editor buffer
    pub len: usize,
    /// The content must be sent again on the next update
    pub dirty: bool,
    /// Count of the getLength functions without a reply
    pub getlength_count: usize,
    content: String,
    /// Cursor positioning is disabled on the console when the editor
    /// does not redraw it
    pub enable_setdot: bool,
}

impl ReportBuffer {
    pub fn new(kind: ReportKind, buf_id: u32) -> Self {
        Self {
            kind,
            buf_id,
            registered: false,
            visible: false,
            editing: false,
            nonempty_last: false,
            len: 0,
            dirty: false,
            getlength_count: 0,
            content: String::new(),
            enable_setdot: true,
        }
    }

    pub fn name(&self) -> String {
        self.kind.buffer_name()
    }

    /// The content last sent to the editor
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn register(&mut self, tr: &mut Transport) {
        tr.send_cmd(self.buf_id, "editFile", &quote(&self.name()));
        tr.send_cmd(self.buf_id, "setReadOnly", "T");
        self.registered = true;
    }

    pub fn request_length(&mut self, tr: &mut Transport) {
        self.getlength_count += 1;
        tr.send_function(self.buf_id, ReplyKind::GetLength, "");
    }

    fn send_edit(&mut self, kind: ReplyKind, args: &str, tr: &mut Transport) {
        if !self.editing {
            tr.send_cmd(self.buf_id, "startAtomic", "");
            tr.send_cmd(self.buf_id, "setReadOnly", "F");
            self.editing = true;
        }
        tr.send_function(self.buf_id, kind, args);
        // A getLength reply may arrive after this edit and report an
        // outdated length, only the last getLength reply is checked.
        if self.getlength_count != 0 {
            self.request_length(tr);
        }
    }

    fn setdot_offset(&mut self, offset: usize, tr: &mut Transport) {
        if self.visible && self.enable_setdot {
            tr.send_cmd(self.buf_id, "setDot", &offset.to_string());
        }
    }

    pub fn setdot_lnum(&mut self, lnum: u32, tr: &mut Transport) {
        if self.visible && self.enable_setdot {
            tr.send_cmd(self.buf_id, "setDot", &format!("{}/0", lnum));
        }
    }

    fn terminate_editing(&mut self, tr: &mut Transport) {
        if self.editing {
            tr.send_cmd(self.buf_id, "setReadOnly", "T");
            tr.goto_last();
            tr.send_cmd(self.buf_id, "endAtomic", "");
            self.editing = false;
        }
    }

    /// Append text to the end of the buffer
    pub fn append(&mut self, msg: &str, tr: &mut Transport) {
        if !self.registered || msg.is_empty() {
            return;
        }
        if self.nonempty_last {
            self.nonempty_last = false;
            self.len -= 1;
        }
        self.send_edit(ReplyKind::Insert, &format!("{} {}", self.len, quote(msg)), tr);

        if !msg.ends_with('\n') {
            self.nonempty_last = true;
            self.len += 1;
        }
        self.len += msg.len();
        self.content.push_str(msg);

        self.setdot_offset(self.len.saturating_sub(1), tr);
        self.terminate_editing(tr);
    }

    fn remove(&mut self, offset: usize, count: usize, tr: &mut Transport) {
        self.send_edit(ReplyKind::Remove, &format!("{} {}", offset, count), tr);
    }

    /// Remove the first `count` bytes, or the whole buffer when `count` is
    /// None
    pub fn clear(&mut self, count: Option<usize>, tr: &mut Transport) {
        let count = count.unwrap_or(self.len).min(self.len);
        if self.kind != ReportKind::Console || count == self.len {
            self.content.clear();
        } else if self.content.is_char_boundary(count.min(self.content.len())) {
            self.content.drain(..count.min(self.content.len()));
        }
        if count == 0 {
            return;
        }
        if self.registered {
            self.remove(0, count, tr);
        }
        self.len -= count;
        if self.len == 0 {
            self.nonempty_last = false;
        } else {
            self.setdot_offset(self.len - 1, tr);
        }
        self.terminate_editing(tr);
        log::info!(target: "nb", "{} length: {} bytes", self.name(), self.len);
    }

    /// Replace the content of the buffer with the minimal set of line edits
    pub fn update(&mut self, content: &str, tr: &mut Transport) {
        self.dirty = false;
        if !self.registered {
            return;
        }
        for edit in line_edits(&self.content, content) {
            match edit {
                Edit::Insert { offset, text } => {
                    self.send_edit(ReplyKind::Insert, &format!("{} {}", offset, quote(&text)), tr);
                    self.len += text.len();
                }
                Edit::Remove { offset, len } => {
                    self.remove(offset, len, tr);
                    self.len -= len.min(self.len);
                }
            }
        }
        self.terminate_editing(tr);
        self.content = content.to_string();
    }
}

/// Group lines in a bounded list of elements, each element holds a line
/// count and a byte count
#[derive(Debug)]
pub struct LineCluster {
    nb_element: usize,
    nb_lines: usize,
    cluster: VecDeque<(usize, usize)>,
}

impl LineCluster {
    pub fn new(nb_element: usize, nb_lines: usize) -> Self {
        let mut cluster = VecDeque::with_capacity(nb_element + 1);
        cluster.push_back((0, 0));
        Self {
            nb_element,
            nb_lines,
            cluster,
        }
    }

    /// Account for `msg` in the last element.
    ///
    /// When the cluster is full and the last element is full, the first
    /// element is dropped and its byte count returned.
    pub fn append(&mut self, msg: &str) -> usize {
        if let Some(last) = self.cluster.back_mut() {
            last.0 += msg.matches('\n').count();
            last.1 += msg.len();
            if !(msg.ends_with('\n') && last.0 >= self.nb_lines) {
                return 0;
            }
        }
        self.cluster.push_back((0, 0));
        if self.cluster.len() > self.nb_element {
            if let Some((lines, bytes)) = self.cluster.pop_front() {
                log::info!(target: "nb", "line_cluster: clearing {} lines", lines);
                return bytes;
            }
        }
        0
    }
}

/// The console: debugger output is buffered and flushed on a prompt or
/// after a short delay of inactivity
#[derive(Debug)]
pub struct Console {
    pub report: ReportBuffer,
    cluster: LineCluster,
    buffer: String,
    time: Instant,
    count: usize,
    timeout_str: String,
    pub timed_out: bool,
}

impl Console {
    pub fn new(buf_id: u32, max_lines: usize) -> Self {
        Self {
            report: ReportBuffer::new(ReportKind::Console, buf_id),
            cluster: LineCluster::new(10, (max_lines / 10).max(1)),
            buffer: String::new(),
            time: Instant::now(),
            count: 0,
            timeout_str: String::new(),
            timed_out: false,
        }
    }

    /// Add text written only if nothing else is written before the flush
    /// delay expires
    pub fn timeout_append(&mut self, msg: &str) {
        self.timeout_str.push_str(msg);
        self.timed_out = false;
        self.time = Instant::now();
    }

    /// Add text to the console buffer
    pub fn append(&mut self, msg: &str) {
        self.timeout_str.clear();
        self.timed_out = false;
        self.count += self.cluster.append(msg);
        self.buffer.push_str(msg);
        self.time = Instant::now();
    }

    /// Flush the buffer to the editor.
    ///
    /// When `now` is None, flush unconditionally, otherwise flush after the
    /// inactivity delay.
    pub fn flush(&mut self, now: Option<Instant>, tr: &mut Transport) {
        if self.buffer.is_empty() && self.timeout_str.is_empty() {
            return;
        }
        if let Some(now) = now {
            if now.saturating_duration_since(self.time) <= FLUSH_DELAY {
                return;
            }
            if !self.timeout_str.is_empty() {
                let msg = std::mem::take(&mut self.timeout_str);
                self.append(&msg);
                self.timed_out = true;
            }
        }
        self.timeout_str.clear();

        let buffer = std::mem::take(&mut self.buffer);
        self.report.append(&buffer, tr);
        if self.count != 0 {
            self.report.clear(Some(self.count), tr);
            self.count = 0;
        }
    }

    /// Buffered text not yet sent to the editor
    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn transport() -> (Transport, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut tr = Transport::new(tx);
        tr.ready = true;
        (tr, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut sent = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            sent.push(msg);
        }
        sent
    }

    #[test]
    fn test_report_names() {
        assert!(is_report_name("(clewn)_console"));
        assert!(is_report_name("/home/x/(clewn)_variables"));
        assert!(!is_report_name("/home/x/foo.c"));
        assert_eq!(
            ReportKind::from_buffer_name("/tmp/(clewn)_backtrace"),
            Some(ReportKind::Backtrace)
        );
        assert_eq!(ReportKind::from_buffer_name("(clewn)_empty"), None);
    }

    #[test]
    fn test_append_is_bracketed() {
        let (mut tr, mut rx) = transport();
        let mut report = ReportBuffer::new(ReportKind::Console, 1);
        report.register(&mut tr);
        drain(&mut rx);

        report.append("(gdb) ", &mut tr);
        let sent = drain(&mut rx);
        assert_eq!(
            sent,
            vec![
                "1:startAtomic!3\n",
                "1:setReadOnly!4 F\n",
                "1:insert/5 0 \"(gdb) \"\n",
                "1:setReadOnly!6 T\n",
                "1:endAtomic!7\n",
            ]
        );
        // The unterminated last line is counted with an implicit newline.
        assert_eq!(report.len, 7);

        report.append("next\n", &mut tr);
        assert_eq!(drain(&mut rx)[2], "1:insert/10 6 \"next\\n\"\n");
        assert_eq!(report.len, 11);
    }

    #[test]
    fn test_update_is_idempotent() {
        let (mut tr, mut rx) = transport();
        let mut report = ReportBuffer::new(ReportKind::Breakpoints, 2);
        report.register(&mut tr);
        report.update("a\nb\n", &mut tr);
        assert_eq!(report.len, 4);
        drain(&mut rx);

        report.update("a\nb\n", &mut tr);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(report.content(), "a\nb\n");
    }

    #[test]
    fn test_getlength_outstanding_adds_getlength() {
        let (mut tr, mut rx) = transport();
        let mut report = ReportBuffer::new(ReportKind::Threads, 2);
        report.register(&mut tr);
        report.request_length(&mut tr);
        drain(&mut rx);

        report.update("x\n", &mut tr);
        let sent = drain(&mut rx);
        assert_eq!(sent[2], "2:insert/6 0 \"x\\n\"\n");
        assert_eq!(sent[3], "2:getLength/7\n");
        assert_eq!(report.getlength_count, 2);
    }

    #[test]
    fn test_line_cluster() {
        let mut cluster = LineCluster::new(2, 2);
        assert_eq!(cluster.append("a\n"), 0);
        assert_eq!(cluster.append("b\n"), 0);
        assert_eq!(cluster.append("c\nd\n"), 4);
        assert_eq!(cluster.append("e"), 0);
    }

    #[test]
    fn test_console_flush_after_delay() {
        let (mut tr, mut rx) = transport();
        let mut console = Console::new(1, 100);
        console.report.register(&mut tr);
        drain(&mut rx);

        console.append("hello\n");
        console.flush(Some(Instant::now()), &mut tr);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(console.pending(), "hello\n");

        console.flush(Some(Instant::now() + Duration::from_secs(1)), &mut tr);
        assert!(drain(&mut rx)[2].contains("insert"));
        assert_eq!(console.pending(), "");
    }

    #[test]
    fn test_timeout_string_discarded_by_output() {
        let (mut tr, _rx) = transport();
        let mut console = Console::new(1, 100);
        console.report.register(&mut tr);

        console.timeout_append("(gdb) ");
        console.append("output\n");
        console.flush(Some(Instant::now() + Duration::from_secs(1)), &mut tr);
        assert!(!console.timed_out);
        assert_eq!(console.report.content(), "output\n");

        console.timeout_append("(gdb) ");
        console.flush(Some(Instant::now() + Duration::from_secs(1)), &mut tr);
        assert!(console.timed_out);
        assert_eq!(console.report.content(), "output\n(gdb) ");
    }
}
