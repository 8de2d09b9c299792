//! Netbeans protocol engine
//!
//! This crate implements the editor side of a debugging session: the
//! netbeans handshake, the decoding of the editor events, the breakpoint and
//! frame markers placed in the editor buffers and the read-only report
//! buffers kept in sync with the debugger state.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use thiserror::Error;
use tokio::sync::mpsc;

pub mod annotation;
pub mod buffer;
pub mod codec;
pub mod correlator;
pub mod diff;
pub mod report;
pub mod transport;

pub use annotation::{AnnoId, AnnoKind, Annotation, Colors};
pub use buffer::{Buffer, BufferSet};
pub use codec::{parse_msg, quote, unquote, Event, Message, Reply};
pub use correlator::{PendingReply, ReplyFifo, ReplyKind};
pub use report::{Console, ReportBuffer, ReportKind, CONSOLE};
pub use transport::{Cursor, NbVersion, Transport};

#[derive(Error, Debug)]
pub enum NetbeansError {
    #[error("Invalid password: \"{0}\"")]
    InvalidPassword(String),
    #[error("Invalid netbeans version: \"{0}\"")]
    InvalidVersion(String),
    #[error("Received unexpected message: \"{0}\"")]
    UnexpectedMessage(String),
    #[error("Got a reply with no matching function request: {0}")]
    OrphanReply(u32),
    #[error("Invalid bufId: {0}")]
    UnknownBuffer(u32),
    #[error("Netbeans connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, NetbeansError>;

/// Showing a balloon longer than this is pointless
const BALLOON_SIZE: usize = 2000;

/// A decoded editor event for the debugging session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NbEvent {
    /// The handshake is complete
    Ready,
    /// A debugger command typed in the editor
    Command {
        cmd: String,
        args: String,
        buf_id: u32,
        /// The buffer name, None when the editor has no netbeans buffer
        pathname: Option<String>,
        lnum: u32,
    },
    /// The mouse hovers over this text
    Balloon(String),
    /// The editor is closing the connection
    Disconnect,
}

/// The netbeans protocol engine, owns the connection to the editor
#[derive(Debug)]
pub struct Netbeans {
    pub tr: Transport,
    pub buffers: BufferSet,
    pub console: Option<Console>,
    lists: HashMap<ReportKind, ReportBuffer>,
    passwd: String,
    max_lines: usize,
    /// The debugger is started, balloons may be shown
    pub started: bool,
}

impl Netbeans {
    pub fn new(
        tx: mpsc::UnboundedSender<String>,
        passwd: &str,
        max_lines: usize,
        colors: Colors,
    ) -> Self {
        Self {
            tr: Transport::new(tx),
            buffers: BufferSet::new(colors),
            console: None,
            lists: HashMap::new(),
            passwd: passwd.to_string(),
            max_lines,
            started: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.tr.ready
    }

    /// Process one line received from the editor
    pub fn handle_message(&mut self, msg: &str) -> Result<Option<NbEvent>> {
        log::debug!(target: "nb", "RECV: {}", msg);
        if !self.tr.ready {
            return self.open_session(msg);
        }

        match parse_msg(msg) {
            None => Ok(None),
            Some(Message::Event(event)) => Ok(self.handle_event(event)),
            Some(Message::Reply(reply)) => {
                self.handle_reply(reply)?;
                Ok(None)
            }
        }
    }

    fn open_session(&mut self, msg: &str) -> Result<Option<NbEvent>> {
        if let Some(passwd) = codec::parse_auth(msg) {
            if passwd == self.passwd {
                return Ok(None);
            }
            return Err(NetbeansError::InvalidPassword(passwd.to_string()));
        }

        if let Some(Message::Event(event)) = parse_msg(msg) {
            match event.name.as_str() {
                "version" => {
                    return match NbVersion::parse(&event.nbstring) {
                        Some(version) if version >= NbVersion::MIN => {
                            self.tr.version = version;
                            if version < NbVersion::COLOR_NAMES {
                                self.buffers.colors = Colors::legacy();
                            }
                            log::info!(target: "nb", "netbeans version {}", version);
                            Ok(None)
                        }
                        _ => Err(NetbeansError::InvalidVersion(event.nbstring)),
                    };
                }
                "startupDone" => {
                    self.tr.ready = true;
                    return Ok(Some(NbEvent::Ready));
                }
                _ => (),
            }
        }
        Err(NetbeansError::UnexpectedMessage(msg.to_string()))
    }

    fn handle_event(&mut self, event: Event) -> Option<NbEvent> {
        match event.name.as_str() {
            "balloonText" => {
                if event.nbstring.is_empty() {
                    log::error!(target: "nb", "empty string in balloonText");
                    None
                } else {
                    Some(NbEvent::Balloon(event.nbstring))
                }
            }
            "disconnect" => Some(NbEvent::Disconnect),
            "fileOpened" => {
                self.file_opened(event.buf_id, &event.nbstring);
                None
            }
            "keyAtPos" => self.key_at_pos(event),
            "killed" => {
                self.killed(event.buf_id);
                None
            }
            _ => None,
        }
    }

    fn handle_reply(&mut self, reply: Reply) -> Result<()> {
        let pending = match self.tr.replies.accept(reply.seqno)? {
            Some(pending) => pending,
            None => return Ok(()),
        };
        let name = self
            .buffers
            .get(pending.buf_id)
            .map(|buf| buf.name().to_string())
            .unwrap_or_default();
        if pending.seqno != reply.seqno {
            log::error!(
                target: "nb",
                "{}: invalid sequence number on {}",
                name,
                pending.kind.function()
            );
            return Ok(());
        }

        match pending.kind {
            ReplyKind::Insert | ReplyKind::Remove => {
                if !reply.args.is_empty() {
                    let err = format!(
                        "{}: got edit error from netbeans: {}",
                        name,
                        reply.args.join(" ")
                    );
                    if let Some(report) =
                        find_report(&mut self.console, &mut self.lists, pending.buf_id)
                    {
                        report.request_length(&mut self.tr);
                    }
                    self.clear_onerror(pending.buf_id, &err, true);
                }
            }
            ReplyKind::GetLength => {
                let length = match reply.args.first().and_then(|arg| arg.parse::<usize>().ok()) {
                    Some(length) if reply.args.len() == 1 => length,
                    _ => {
                        log::error!(target: "nb", "{}: invalid getLength reply: {:?}", name, reply.args);
                        return Ok(());
                    }
                };
                let mut resync = None;
                if let Some(report) = find_report(&mut self.console, &mut self.lists, pending.buf_id) {
                    report.getlength_count = report.getlength_count.saturating_sub(1);
                    if report.len != length {
                        let err = format!(
                            "{}: invalid buffer length (clewn: {} - editor: {})",
                            name, report.len, length
                        );
                        if report.getlength_count == 0 {
                            report.len = length;
                            resync = Some(err);
                        } else {
                            log::debug!(target: "nb", "ignoring: {}", err);
                        }
                    }
                }
                if let Some(err) = resync {
                    self.clear_onerror(pending.buf_id, &err, length != 0);
                }
            }
        }
        Ok(())
    }

    /// Clear a report buffer whose editor content has diverged, it is
    /// redrawn on the next update
    fn clear_onerror(&mut self, buf_id: u32, err: &str, loggit: bool) {
        if let Some(report) = find_report(&mut self.console, &mut self.lists, buf_id) {
            report.dirty = true;
            report.clear(None, &mut self.tr);
        }
        if loggit {
            log::error!(target: "nb", "{}", err);
        }
        self.show_balloon(&format!(
            "{}\nThe buffer will be restored on the next gdb command.",
            err
        ));
    }

    fn report_by_kind(&mut self, kind: ReportKind) -> Option<&mut ReportBuffer> {
        match kind {
            ReportKind::Console => self.console.as_mut().map(|console| &mut console.report),
            _ => self.lists.get_mut(&kind),
        }
    }

    /// Return the list buffer of this kind
    pub fn report(&self, kind: ReportKind) -> Option<&ReportBuffer> {
        match kind {
            ReportKind::Console => self.console.as_ref().map(|console| &console.report),
            _ => self.lists.get(&kind),
        }
    }

    /// Create the list buffers once
    fn setup_reports(&mut self) {
        if !self.lists.is_empty() {
            return;
        }
        for kind in ReportKind::LISTS {
            let buf_id = self.buffers.get_or_create(&kind.buffer_name()).buf_id;
            self.lists.insert(kind, ReportBuffer::new(kind, buf_id));
        }
        self.buffers.get_or_create(report::EMPTY);
    }

    fn setup_console(&mut self) {
        let registered = self
            .console
            .as_ref()
            .map_or(false, |console| console.report.registered);
        if !registered {
            let buf_id = self.buffers.get_or_create(CONSOLE).buf_id;
            let mut console = Console::new(buf_id, self.max_lines);
            console.report.register(&mut self.tr);
            self.console = Some(console);
        }
    }

    fn file_opened(&mut self, buf_id: u32, pathname: &str) {
        self.setup_reports();
        if pathname.is_empty() {
            self.show_balloon(
                "\nYou cannot use netbeans on a \"[No Name]\" file.\nPlease, edit a file.\n",
            );
            return;
        }

        let kind = if report::is_report_name(pathname) {
            let base = Path::new(pathname)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(pathname)
                .to_string();
            Some((ReportKind::from_buffer_name(&base), base))
        } else if Path::new(pathname).is_absolute() {
            None
        } else {
            log::warn!(target: "nb", "absolute pathname required: {}", pathname);
            return;
        };

        let name = match &kind {
            Some((_, base)) => base.clone(),
            None => pathname.to_string(),
        };
        if let Some((Some(kind), _)) = &kind {
            if let Some(report) = self.report_by_kind(*kind) {
                report.visible = true;
            }
        }

        let buf = self.buffers.get_or_create(&name);
        let known_id = buf.buf_id;
        if known_id != buf_id {
            if buf_id == 0 {
                buf.registered = true;
                self.tr
                    .send_cmd(known_id, "putBufferNumber", &quote(pathname));
                self.tr.send_cmd(known_id, "stopDocumentListen", "");
                self.buffers.refresh(known_id, &mut self.tr);
                if let Some((Some(kind), _)) = &kind {
                    if let Some(report) = self.report_by_kind(*kind) {
                        report.registered = true;
                    }
                }
            } else {
                log::warn!(target: "nb", "got fileOpened with wrong bufId");
            }
        } else if let Some((Some(kind), _)) = kind {
            if kind != ReportKind::Console {
                if let Some(report) = self.lists.get_mut(&kind) {
                    report.request_length(&mut self.tr);
                }
            }
        }
    }

    /// Handle the `ClewnBuffer.<name>.open|close` pseudo-commands sent
    /// when a report buffer is shown or hidden in an editor window
    fn is_editport_evt(&mut self, cmd: &str) -> bool {
        let tokens: Vec<&str> = cmd.split('.').collect();
        if tokens.len() != 3 || tokens[0] != "ClewnBuffer" {
            return false;
        }
        let visible = match tokens[2] {
            "open" => Some(true),
            "close" => Some(false),
            _ => None,
        };
        if let (Some(visible), Some(kind)) = (visible, ReportKind::from_short_name(tokens[1])) {
            if let Some(report) = self.report_by_kind(kind) {
                report.visible = visible;
            }
        }
        true
    }

    fn key_at_pos(&mut self, event: Event) -> Option<NbEvent> {
        let pathname = match event.buf_id {
            0 => None,
            buf_id => match self.buffers.get(buf_id) {
                Some(buf) => Some(buf.name().to_string()),
                None => {
                    log::error!(target: "nb", "invalid bufId: \"{}\" in keyAtPos", buf_id);
                    return None;
                }
            },
        };
        if event.nbstring.is_empty() {
            log::warn!(target: "nb", "empty string in keyAtPos");
            return None;
        }
        if event.args.len() != 2 {
            log::warn!(target: "nb", "invalid arg in keyAtPos");
            return None;
        }
        let (lnum, col) = match codec::parse_lnum_col(&event.args[1]) {
            Some(lnum_col) => lnum_col,
            None => {
                log::error!(target: "nb", "invalid lnum/col: {}", event.args[1]);
                return None;
            }
        };

        if pathname.is_some() && pathname.as_deref() != Some(CONSOLE) {
            self.tr.last_pos = Some(Cursor {
                buf_id: event.buf_id,
                lnum,
                col,
            });
        }

        let nbstring = event.nbstring.trim();
        let (cmd, args) = match nbstring.split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd.to_string(), args.trim().to_string()),
            None => (nbstring.to_string(), String::new()),
        };
        if !self.started && (cmd == "quit" || cmd.starts_with("complete")) {
            return None;
        }

        self.setup_console();
        self.setup_reports();
        if self.is_editport_evt(&cmd) {
            return None;
        }
        Some(NbEvent::Command {
            cmd,
            args,
            buf_id: event.buf_id,
            pathname,
            lnum,
        })
    }

    fn killed(&mut self, buf_id: u32) {
        // The editor has already removed the markers.
        if self.buffers.killed(buf_id).is_none() {
            log::error!(target: "nb", "invalid bufId: \"{}\" in killed", buf_id);
            return;
        }
        if self.tr.last_pos.map(|cursor| cursor.buf_id) == Some(buf_id) {
            self.tr.last_pos = None;
        }
        if let Some(report) = find_report(&mut self.console, &mut self.lists, buf_id) {
            report.registered = false;
            report.clear(None, &mut self.tr);
        }
    }

    /// Show a balloon in the editor
    pub fn show_balloon(&mut self, text: &str) {
        if !self.started {
            return;
        }
        let text = if text.chars().count() > BALLOON_SIZE {
            let half = BALLOON_SIZE / 2;
            let head: String = text.chars().take(half).collect();
            let tail: String = {
                let chars: Vec<char> = text.chars().collect();
                chars[chars.len() - half..].iter().collect()
            };
            format!("{}...{}", head, tail)
        } else {
            text.to_string()
        };
        self.tr.send_cmd(0, "showBalloon", &quote(&text));
    }

    /// Buffer text for the console
    pub fn console_print(&mut self, msg: &str) {
        if let Some(console) = self.console.as_mut() {
            console.append(msg);
        }
    }

    /// Queue text written to the console only when nothing else is
    /// printed before the flush delay expires
    pub fn console_timeout_print(&mut self, msg: &str) {
        if let Some(console) = self.console.as_mut() {
            console.timeout_append(msg);
        }
    }

    /// Flush the console, unconditionally when `now` is None
    pub fn flush_console(&mut self, now: Option<Instant>) {
        if let Some(console) = self.console.as_mut() {
            console.flush(now, &mut self.tr);
        }
    }

    /// Update a list buffer when `dirty` is set or when its editor content
    /// has diverged, then set the cursor at `lnum`
    pub fn update_report<F>(&mut self, kind: ReportKind, dirty: bool, lnum: Option<u32>, getdata: F)
    where
        F: FnOnce() -> String,
    {
        let Netbeans { lists, tr, .. } = self;
        let report = match lists.get_mut(&kind) {
            Some(report) => report,
            None => return,
        };
        if dirty && !report.registered {
            report.register(tr);
        }
        if dirty || report.dirty {
            report.update(&getdata(), tr);
            if let Some(lnum) = lnum {
                report.setdot_lnum(lnum, tr);
            }
        }
    }

    pub fn add_bp(&mut self, bp_id: u32, pathname: &str, lnum: u32) -> bool {
        self.buffers.add_bp(bp_id, pathname, lnum, &mut self.tr)
    }

    pub fn update_bp(&mut self, bp_id: u32, disabled: bool) -> bool {
        self.buffers.update_bp(bp_id, disabled, &mut self.tr)
    }

    pub fn delete_bp(&mut self, bp_id: u32) -> bool {
        self.buffers.delete_anno(AnnoId::Breakpoint(bp_id), &mut self.tr)
    }

    /// Show the frame marker, hide it when `location` is None
    pub fn show_frame(&mut self, location: Option<(&str, u32)>) {
        self.buffers.show_frame(location, &mut self.tr);
    }

    /// Unplace all the markers, the annotations are kept
    pub fn remove_all(&mut self) {
        self.buffers.remove_all(&mut self.tr);
    }

    pub fn delete_all(&mut self, pathname: Option<&str>, lnum: Option<u32>) -> Vec<AnnoId> {
        self.buffers.delete_all(pathname, lnum, &mut self.tr)
    }

    pub fn get_lnum_list(&self, pathname: &str) -> Vec<u32> {
        self.buffers.get_lnum_list(pathname)
    }

    /// Request the editor to close the netbeans session
    pub fn detach(&mut self) {
        self.remove_all();
        log::info!(target: "nb", "sending netbeans message 'DETACH'");
        self.tr.send_raw("DETACH\n");
        self.tr.detached = true;
    }
}

fn find_report<'a>(
    console: &'a mut Option<Console>,
    lists: &'a mut HashMap<ReportKind, ReportBuffer>,
    buf_id: u32,
) -> Option<&'a mut ReportBuffer> {
    if let Some(console) = console.as_mut() {
        if console.report.buf_id == buf_id {
            return Some(&mut console.report);
        }
    }
    lists.values_mut().find(|report| report.buf_id == buf_id)
}
