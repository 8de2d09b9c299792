//! The debugging session
//!
//! A `Session` ties the editor to gdb. The commands typed in the editor are
//! sent to gdb, the gdb output is handed to the pending commands, and after
//! each user command a cycle of out of band commands refreshes the markers
//! and the report buffers.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use gdbadapter::{
    is_annotation, parse_gdb_output, Command, Effect, GdbError, GdbOutput, GdbVersion, Info,
    OobItem, OobKind, OobList, ResultClass, ResultRecord, ResultTable, StreamType,
};
use netbeans::{NbEvent, Netbeans, ReportKind};

use crate::config::Config;
use crate::dispatch::{key_maps, CommandPrefixes};
use crate::error::Result;

/// Period of the background tick
pub const TICK: Duration = Duration::from_millis(200);

/// A multiple choice query is answered after this delay
pub const MULTIPLE_CHOICE_DELAY: Duration = Duration::from_millis(500);

/// The gdb process as seen by the session
pub trait GdbControl {
    fn start(&mut self) -> gdbadapter::Result<()>;
    /// Write to gdb stdin
    fn write(&mut self, data: &str);
    fn interrupt(&mut self) -> gdbadapter::Result<()>;
    /// Some when gdb has terminated
    fn exit_status(&mut self) -> Option<String>;
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Running,
    Quitting,
    Closing,
}

/// The last user command whose result has been received
#[derive(Debug)]
pub(crate) enum LastCmd {
    None,
    /// Set on startup and on an interrupt, the next prompt starts a cycle
    Startup,
    Cmd(Command),
}

/// What is known about gdb before it is started
#[derive(Debug, Clone)]
pub struct GdbSetup {
    pub version: GdbVersion,
    pub commands: Vec<String>,
    /// The arguments of the `set` command
    pub set_args: Vec<String>,
}

pub struct Session<G> {
    pub nb: Netbeans,
    pub(crate) gdb: G,
    pub(crate) state: State,
    pub info: Info,
    pub(crate) oob: OobList,
    pub(crate) results: ResultTable,
    pub(crate) gdb_busy: bool,
    pub(crate) lastcmd: LastCmd,
    doprompt: bool,
    /// Token of the last result record
    token: Option<u32>,
    stream_record: Vec<String>,
    /// The first command line, held until gdb is ready
    pub(crate) firstcmdline: Option<String>,
    pub(crate) curcmdline: String,
    multiple_choice: Option<Instant>,
    pub(crate) cmd_fifo: VecDeque<(String, String)>,
    /// Line of the variables buffer to show after a fold
    pub(crate) foldlnum: Option<u32>,
    pub(crate) project: Option<String>,
    pub(crate) prompt: String,
    pub(crate) async_commands: bool,
    pub(crate) prefixes: CommandPrefixes,
    pub(crate) keymaps: HashMap<String, String>,
    pub(crate) pid_status: Option<String>,
    pub(crate) last_balloon: String,
    closed: bool,
}

impl<G: GdbControl> Session<G> {
    pub fn new(nb: Netbeans, gdb: G, config: &Config, setup: GdbSetup) -> Self {
        Session {
            nb,
            gdb,
            state: State::Init,
            info: Info::new(&setup.commands),
            oob: OobList::new(&setup.version, &setup.commands),
            results: ResultTable::new(),
            gdb_busy: true,
            lastcmd: LastCmd::Startup,
            doprompt: false,
            token: None,
            stream_record: Vec::new(),
            firstcmdline: None,
            curcmdline: String::new(),
            multiple_choice: None,
            cmd_fifo: VecDeque::new(),
            foldlnum: None,
            project: config.project.clone(),
            prompt: config.prompt.clone(),
            async_commands: config.async_commands,
            prefixes: CommandPrefixes::new(&setup.commands, &setup.set_args),
            keymaps: key_maps(&config.keys),
            pid_status: None,
            last_balloon: String::new(),
            closed: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn gdb_mut(&mut self) -> &mut G {
        &mut self.gdb
    }

    /// Commands may be sent to gdb
    pub fn accepting_cmd(&self) -> bool {
        !self.gdb_busy && !self.oob.is_running()
    }

    /// Process one message from the editor
    pub fn handle_nb_message(&mut self, msg: &str) -> Result<()> {
        match self.nb.handle_message(msg)? {
            None => {}
            Some(NbEvent::Ready) => info!(target: "gdb", "the editor is connected"),
            Some(NbEvent::Command {
                cmd,
                args,
                pathname,
                lnum,
                ..
            }) => self.dispatch_keypos(&cmd, &args, pathname.as_deref(), lnum)?,
            Some(NbEvent::Balloon(text)) => self.balloon_text(&text),
            Some(NbEvent::Disconnect) => {
                info!(target: "gdb", "the editor is disconnecting");
                self.close();
            }
        }
        Ok(())
    }

    /// Start gdb on the first command typed in the editor
    pub(crate) fn start(&mut self) -> Result<()> {
        self.nb.started = true;
        self.nb.console_print(&format!(
            "Clewn version {} starting a new instance of gdb.\n\n",
            env!("CARGO_PKG_VERSION")
        ));
        if let Err(e) = self.gdb.start() {
            self.nb.console_print(&format!("Cannot start gdb: {}\n", e));
            self.nb.flush_console(None);
            self.shutdown();
            return Err(e.into());
        }
        Ok(())
    }

    /// Process one line of gdb output
    pub fn handle_gdb_line(&mut self, line: &str) -> Result<()> {
        debug!(target: "mi", "{}", line);
        let line = match line.strip_prefix("> ") {
            Some(rest) if rest.starts_with("~\"") => rest,
            _ => line,
        };
        if is_annotation(line) {
            return Ok(());
        }

        match parse_gdb_output(line) {
            Ok(GdbOutput::Stream(stream)) => match stream.stream_type {
                StreamType::Console | StreamType::Target => self.push_stream(stream.content),
                StreamType::Log => self.stream_record.push(stream.content),
            },
            Ok(GdbOutput::Async(record)) => match record.return_value() {
                Some((var, value)) => self
                    .nb
                    .console_print(&format!("Value returned is {} = {}\n", var, value)),
                None => info!(target: "mi", "{}", line),
            },
            Ok(GdbOutput::Result(record)) => match record.token {
                Some(token) => self.process_mi_record(token, &record)?,
                None => warn!(target: "mi", "result record without a token: {}", line),
            },
            Ok(GdbOutput::Prompt) => self.process_prompt(),
            Err(e) => warn!(target: "mi", "handle_line: bad format: \"{}\" ({})", line, e),
        }
        self.apply_effects();
        Ok(())
    }

    fn push_stream(&mut self, text: String) {
        let cancel = "[0] cancel\n";
        if (self.stream_record.is_empty() && text == "[0] cancel\n[1] all\n")
            || (self.multiple_choice.is_none()
                && self.stream_record.len() == 1
                && self.stream_record[0] == cancel
                && text.starts_with("[1] all\n"))
        {
            self.multiple_choice = Some(Instant::now());
        }
        self.stream_record.push(text);
    }

    fn take_stream(&mut self) -> String {
        let stream = self.stream_record.concat();
        self.stream_record.clear();
        stream
    }

    fn process_mi_record(&mut self, token: u32, record: &ResultRecord) -> Result<()> {
        let mut cmd = match self.results.remove(token) {
            Some(cmd) => cmd,
            None => {
                // The interrupted command of a quit.
                if self.token == Some(token) || self.state == State::Quitting {
                    return Ok(());
                }
                return Err(GdbError::InvalidToken(token).into());
            }
        };
        self.token = Some(token);

        let stream = self.take_stream();
        cmd.handle_stream(&stream, &mut self.info);
        if record.class == ResultClass::Error && cmd.prints_errors() {
            let msg = format!("{}\n", record.error_msg().unwrap_or_default());
            if cmd.cli_stream() != Some(msg.as_str()) {
                self.nb.console_print(&msg);
            }
        } else {
            cmd.handle_result(record, &mut self.info);
        }
        self.apply_effects();

        if cmd.is_user() {
            self.lastcmd = LastCmd::Cmd(cmd);
        }
        self.process_oob();
        Ok(())
    }

    fn process_prompt(&mut self) {
        let stream = self.take_stream();
        match &mut self.lastcmd {
            LastCmd::Cmd(cmd) => cmd.handle_stream(&stream, &mut self.info),
            _ if !stream.is_empty() => self.nb.console_print(&stream),
            _ => {}
        }
        self.apply_effects();
        if matches!(self.lastcmd, LastCmd::Startup) {
            self.process_oob();
        }
    }

    /// Start a cycle after a user command, then send the next out of band
    /// command of the running cycle
    pub(crate) fn process_oob(&mut self) {
        if !matches!(self.lastcmd, LastCmd::None) {
            self.oob.start_cycle();
            if !self.results.is_empty() {
                if self.state != State::Quitting {
                    error!(target: "mi", "all cmds have not been processed in results");
                }
                self.results.clear();
            }
            self.doprompt = match &self.lastcmd {
                LastCmd::Cmd(cmd) => cmd.prints_prompt(),
                _ => true,
            };
            self.lastcmd = LastCmd::None;
        }

        while self.oob.is_running() && !self.closed {
            match self.oob.next_item() {
                Some(item) => {
                    if self.run_oob_item(item) {
                        return;
                    }
                }
                None => self.terminate_cmd(),
            }
        }
    }

    /// Run a cycle element, return true when a command has been sent
    fn run_oob_item(&mut self, item: OobItem) -> bool {
        match item {
            OobItem::Entry(OobKind::Project) => {
                let name = self.oob.project_name().to_string();
                if !name.is_empty() {
                    self.info.save_project(&name, self.state == State::Quitting);
                    self.apply_effects();
                }
                false
            }
            OobItem::Entry(OobKind::Quit) => {
                if self.state == State::Quitting {
                    self.gdb.write("quit\n");
                    self.nb.console_print("\n=== End of gdb session ===\n");
                    self.nb.flush_console(None);
                    self.state = State::Closing;
                    self.close();
                }
                false
            }
            OobItem::Entry(kind @ OobKind::EnablePrettyPrinting) => {
                self.oob.take_pretty_printing()
                    && self.send(Command::Oob {
                        kind,
                        cmd: String::new(),
                    })
            }
            OobItem::Entry(kind) => match self.oob.take_armed(kind) {
                Some(cmd) => {
                    self.info.reset(kind);
                    self.send(Command::Oob { kind, cmd })
                }
                None => false,
            },
            OobItem::VarObj(cmd) => {
                if self.info.varobj.leaf(cmd.name()).is_none() {
                    return false;
                }
                self.send(Command::VarObj(cmd))
            }
        }
    }

    /// The cycle is over, gdb is ready for the next user command
    fn terminate_cmd(&mut self) {
        self.gdb_busy = false;
        self.multiple_choice = None;
        if self.doprompt {
            self.doprompt = false;
            self.print_prompt();
        }

        if self.state == State::Init {
            self.state = State::Running;
            if let Some(project) = self.project.clone() {
                self.clicmd_notify(&format!("source {}", project), true, false);
                return;
            }
        }

        if let Some(cmdline) = self.firstcmdline.take().filter(|line| !line.is_empty()) {
            self.clicmd_notify(&cmdline, true, false);
        }
        self.firstcmdline = Some(String::new());
        self.update_reports();
    }

    fn update_reports(&mut self) {
        let Session {
            nb, info, foldlnum, ..
        } = self;
        nb.update_report(ReportKind::Breakpoints, info.bp_dirty, None, || {
            info.collect_breakpoints()
        });
        nb.update_report(ReportKind::Backtrace, info.backtrace_dirty, None, || {
            info.collect_backtrace()
        });
        nb.update_report(ReportKind::Threads, info.threads_dirty, None, || {
            info.collect_threads()
        });
        let dirty = info.varobj.dirty;
        nb.update_report(ReportKind::Variables, dirty, foldlnum.take(), || {
            info.varobj.collect()
        });
    }

    /// Apply to the editor the changes made by the gdb commands
    pub(crate) fn apply_effects(&mut self) {
        for effect in self.info.drain_effects() {
            match effect {
                Effect::AddBp { id, path, lnum } => {
                    self.nb.add_bp(id, &path, lnum);
                }
                Effect::UpdateBp { id, disabled } => {
                    self.nb.update_bp(id, disabled);
                }
                Effect::DeleteBp { id } => {
                    self.nb.delete_bp(id);
                }
                Effect::ShowFrame { path, lnum } => self.nb.show_frame(Some((&path, lnum))),
                Effect::HideFrame => self.nb.show_frame(None),
                Effect::Console(text) => self.nb.console_print(&text),
                Effect::Balloon(text) => self.nb.show_balloon(&text),
                Effect::Completion(list) => {
                    debug!(target: "gdb", "{} completion candidates", list.len());
                    if !list.is_empty() {
                        self.nb.console_print(&format!("{}\n", list.join("\n")));
                        self.nb.flush_console(None);
                    }
                }
                Effect::PrintPrompt => self.print_prompt(),
                Effect::Rearm(kind) => self.oob.force(kind),
            }
        }
    }

    pub fn print_prompt(&mut self) {
        if !self.gdb_busy {
            self.nb.console_print(&self.prompt);
            self.nb.flush_console(None);
        }
    }

    /// Send a command line to gdb after notifying the out of band commands
    ///
    /// An empty command is sent instead when `nop` is set, to run a cycle.
    pub(crate) fn clicmd_notify(&mut self, cmd: &str, console: bool, nop: bool) {
        if console {
            self.nb.console_print(&format!("{}\n", cmd));
        }
        self.oob.notify(cmd);
        if nop {
            self.send_user(Command::no_prompt(""), true);
        } else {
            self.send_user(Command::cli(cmd), true);
        }
    }

    /// Send a user command, return false when gdb does not accept commands
    pub(crate) fn send_user(&mut self, cmd: Command, verbose: bool) -> bool {
        if !self.accepting_cmd() {
            if verbose {
                self.nb
                    .console_print("gdb busy: command discarded, please retry\n");
            }
            return false;
        }
        self.gdb_busy = true;
        self.send(cmd)
    }

    fn send(&mut self, cmd: Command) -> bool {
        let line = cmd.line();
        match self.results.add(cmd) {
            Some(token) => {
                debug!(target: "mi", "{}{}", token, line.trim_end());
                self.gdb.write(&format!("{}{}", token, line));
                true
            }
            None => {
                error!(target: "mi", "cannot add the command to the results: {}", line.trim_end());
                false
            }
        }
    }

    /// Send an interrupt to gdb
    pub(crate) fn sendintr(&mut self) {
        if let Err(e) = self.gdb.interrupt() {
            error!(target: "gdb", "{}", e);
        }
    }

    /// Run the queued command and answer the multiple choice queries
    pub fn tick(&mut self, now: Instant) {
        self.nb.flush_console(Some(now));
        if let Some(since) = self.multiple_choice {
            if now.saturating_duration_since(since) > MULTIPLE_CHOICE_DELAY {
                self.multiple_choice = None;
                info!(target: "gdb", "answering the multiple choice query");
                self.gdb.write("1\n");
            }
            return;
        }
        if self.accepting_cmd() {
            if let Some((cmd, args)) = self.cmd_fifo.pop_front() {
                self.do_cmd(&cmd, &args);
            }
        }
    }

    /// gdb output has reached end of file
    pub fn gdb_terminated(&mut self) {
        if self.closed {
            return;
        }
        let status = self
            .gdb
            .exit_status()
            .unwrap_or_else(|| "gdb terminated".to_string());
        warn!(target: "gdb", "{}", status);
        self.pid_status = Some(status);
        if self.state == State::Init {
            self.shutdown();
        } else {
            self.cmd_quit();
        }
    }

    /// Close the session, gdb is asked to quit first when it is running
    pub fn close(&mut self) {
        if self.state == State::Running {
            self.cmd_quit();
            return;
        }
        if self.closed {
            return;
        }
        info!(target: "gdb", "closing the session");
        self.info.close();
        self.apply_effects();
        self.update_reports();
        self.nb.remove_all();
        self.nb.started = false;
        self.closed = true;
        self.gdb.close();
    }

    /// Close the session without waiting for gdb
    pub fn shutdown(&mut self) {
        self.state = State::Closing;
        self.close();
    }
}
