/// The debuggee state
///
/// Named after the gdb `info` command, this is where the results of the out
/// of band commands are stored. The changes that must be reflected in the
/// editor are queued as effects, drained by the session after each record.

use log::{debug, error, info};
use std::collections::BTreeMap;
use std::path::Path;

use crate::oob::{smallpref_inlist, OobKind};
use crate::records::{from_list, Breakpoint, Frame, Source, Thread, VarChange};
use crate::types::{tuple_str, ResultClass, ResultRecord, Value};
use crate::varobj::RootVarObj;

const ARGS_PREFIX: &str = "Argument list to give program being debugged when it is started is";
const ARGS_NONE: &str = " \"\".\n";
const DIRECTORIES_PREFIX: &str = "Source directories searched: ";
const PGMFILE_PREFIX: &str = "Symbols from";

/// A change to be applied to the editor or the gdb session
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AddBp { id: u32, path: String, lnum: u32 },
    UpdateBp { id: u32, disabled: bool },
    DeleteBp { id: u32 },
    ShowFrame { path: String, lnum: u32 },
    HideFrame,
    /// Text printed in the console
    Console(String),
    Balloon(String),
    /// The result of a completion request
    Completion(Vec<String>),
    PrintPrompt,
    /// Arm an out of band command whatever the last command
    Rearm(OobKind),
}

fn default_directories() -> Vec<String> {
    vec!["$cdir".to_string(), "$cwd".to_string()]
}

/// The data following `prefix` in a console stream
fn after_prefix<'a>(stream: &'a str, prefix: &str) -> Option<&'a str> {
    match stream.find(prefix) {
        Some(idx) => Some(&stream[idx + prefix.len()..]),
        None => {
            debug!(
                target: "mi",
                "bad prefix in oob parsing of \"{}\", requested prefix: \"{}\"",
                stream.trim(),
                prefix
            );
            None
        }
    }
}

fn pathname_in(name: &str, source: &Source) -> Option<String> {
    if source.file != name {
        return None;
    }
    let fullname = source.fullname.as_deref()?;
    if Path::new(fullname).exists() {
        Some(fullname.to_string())
    } else {
        None
    }
}

fn frame_location(out: &mut String, frame: &Frame) {
    if let Some(func) = &frame.func {
        out.push_str(&format!(" in {}", func));
    } else if let Some(from) = &frame.from {
        out.push_str(&format!(" from {}", from));
    }
}

fn threads_eq(a: &BTreeMap<u32, Thread>, b: &BTreeMap<u32, Thread>) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|((ida, ta), (idb, tb))| {
            let frames_eq = match (&ta.frame, &tb.frame) {
                (Some(fa), Some(fb)) => fa.loose_eq(fb),
                (None, None) => true,
                _ => false,
            };
            ida == idb
                && frames_eq
                && ta.target_id == tb.target_id
                && ta.name == tb.name
                && ta.state == tb.state
                && ta.core == tb.core
                && ta.current == tb.current
        })
}

#[derive(Debug)]
pub struct Info {
    pub args: Option<String>,
    pub directories: Vec<String>,
    pub file: Option<Source>,
    next_file: Option<Source>,
    pub frame: Option<Frame>,
    prev_frame: Option<Frame>,
    frame_prefix: String,
    pub backtrace: Vec<Frame>,
    pub backtrace_dirty: bool,
    pub threads: BTreeMap<u32, Thread>,
    pub threads_dirty: bool,
    pub debuggee: Option<String>,
    pub cwd: Option<String>,
    pub sources: Vec<Source>,
    pub breakpoints: BTreeMap<u32, Breakpoint>,
    pub bp_dirty: bool,
    pub varobj: RootVarObj,
    /// Number used to name the next root varobj
    pub varnum: u32,
    effects: Vec<Effect>,
}

impl Info {
    /// `commands` is the list of gdb commands, used to compute the
    /// abbreviation of the `frame` command
    pub fn new(commands: &[String]) -> Self {
        let keys: Vec<String> = commands.iter().filter(|c| *c != "frame").cloned().collect();
        Info {
            args: None,
            directories: default_directories(),
            file: None,
            next_file: None,
            frame: None,
            prev_frame: None,
            frame_prefix: smallpref_inlist("frame", &keys),
            backtrace: Vec::new(),
            backtrace_dirty: false,
            threads: BTreeMap::new(),
            threads_dirty: false,
            debuggee: None,
            cwd: None,
            sources: Vec::new(),
            breakpoints: BTreeMap::new(),
            bp_dirty: false,
            varobj: RootVarObj::new(),
            varnum: 1,
            effects: Vec::new(),
        }
    }

    pub fn push_effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Clear the attribute set by an out of band command, before the command
    /// is sent
    pub fn reset(&mut self, kind: OobKind) {
        match kind {
            OobKind::Args => self.args = None,
            OobKind::Directories => self.directories = default_directories(),
            OobKind::File => self.next_file = None,
            OobKind::FrameCli | OobKind::Frame => self.frame = None,
            OobKind::BackTrace => self.backtrace.clear(),
            OobKind::PgmFile => self.debuggee = None,
            OobKind::Pwd => self.cwd = None,
            OobKind::Sources => self.sources.clear(),
            OobKind::Threads
            | OobKind::VarUpdate
            | OobKind::Breakpoints
            | OobKind::EnablePrettyPrinting
            | OobKind::Project
            | OobKind::Quit => {}
        }
    }

    /// Process the result record of an out of band MI command
    ///
    /// `cmd` is the user command line that triggered the out of band command.
    pub fn handle_oob_result(&mut self, kind: OobKind, record: &ResultRecord, cmd: &str) {
        if record.class != ResultClass::Done {
            if let Some(msg) = record.error_msg() {
                debug!(target: "mi", "{:?}: {}", kind, msg);
            }
            return;
        }
        let results = &record.results;
        match kind {
            OobKind::File => {
                self.next_file = Source::from_tuple(results)
                    .filter(|source| source.fullname.is_some() && source.line.is_some());
                self.update_file();
            }
            OobKind::FrameCli | OobKind::Frame => {
                self.frame = results
                    .get("frame")
                    .and_then(Value::as_tuple)
                    .and_then(Frame::from_tuple);
                self.update_frame(cmd);
            }
            OobKind::BackTrace => {
                self.backtrace = from_list(results.get("stack"), Frame::from_tuple);
            }
            OobKind::Threads => {
                let threads = from_list(results.get("threads"), Thread::from_tuple);
                let current = tuple_str(results, "current-thread-id");
                self.update_threads(threads, current);
            }
            OobKind::VarUpdate => {
                let changelist = from_list(results.get("changelist"), VarChange::from_tuple);
                self.update_changelist(&changelist);
            }
            OobKind::Pwd => self.cwd = tuple_str(results, "cwd").map(str::to_string),
            OobKind::Sources => {
                self.sources = from_list(results.get("files"), Source::from_tuple);
            }
            OobKind::Breakpoints => {
                let body = results
                    .get("BreakpointTable")
                    .and_then(Value::as_tuple)
                    .and_then(|table| table.get("body"));
                let breakpoints = from_list(body, Breakpoint::from_tuple);
                self.update_breakpoints(breakpoints);
            }
            OobKind::EnablePrettyPrinting => info!(target: "mi", "-enable-pretty-printing: {:?}", record.class),
            _ => debug!(target: "mi", "unexpected result for {:?}", kind),
        }
    }

    /// Process the stream records of an out of band console command
    pub fn handle_oob_stream(&mut self, kind: OobKind, stream: &str) {
        match kind {
            OobKind::Args => {
                let data = match after_prefix(stream, ARGS_PREFIX) {
                    Some(data) => data,
                    None => return,
                };
                if data == ARGS_NONE {
                    return;
                }
                match (data.find('"'), data.rfind("\".")) {
                    (Some(start), Some(end)) if start < end => {
                        self.args = Some(data[start + 1..end].to_string());
                    }
                    _ => error!(target: "mi", "no match for \"{}\"", data),
                }
            }
            OobKind::Directories => {
                let data = match after_prefix(stream, DIRECTORIES_PREFIX) {
                    Some(data) => data,
                    None => return,
                };
                let directories: Vec<String> = data
                    .split(|c| c == ':' || c == '\n')
                    .filter(|dir| !dir.is_empty())
                    .map(str::to_string)
                    .collect();
                if directories.is_empty() {
                    error!(target: "mi", "no match for \"{}\"", data);
                } else {
                    self.directories = directories;
                }
            }
            OobKind::PgmFile => {
                let data = match after_prefix(stream, PGMFILE_PREFIX) {
                    Some(data) => data,
                    None => return,
                };
                let debuggee = data
                    .trim_start()
                    .strip_prefix('"')
                    .and_then(|rest| rest.split_once("\"."))
                    .map(|(name, _)| name)
                    .filter(|name| !name.is_empty() && !name.contains('"'));
                match debuggee {
                    Some(name) => self.debuggee = Some(name.to_string()),
                    None => error!(target: "mi", "no match for \"{}\"", data),
                }
            }
            _ => error!(target: "mi", "{:?}: unexpected stream record {}", kind, stream),
        }
    }

    /// Return the full path name of the source file `name`
    ///
    /// An absolute path name is checked for existence, otherwise the gdb
    /// source directories are searched.
    pub fn get_fullpath(&self, name: &str) -> Option<String> {
        let mut name = name;
        let path = Path::new(name);
        if path.is_absolute() {
            if path.exists() {
                return Some(name.to_string());
            }
            name = path.file_name()?.to_str()?;
        }
        if name.is_empty() {
            return None;
        }

        for dirname in &self.directories {
            let found = match dirname.as_str() {
                "$cdir" => self
                    .file
                    .as_ref()
                    .and_then(|file| pathname_in(name, file))
                    .or_else(|| self.sources.iter().find_map(|s| pathname_in(name, s))),
                "$cwd" => {
                    let cwd = match &self.cwd {
                        Some(cwd) => Some(Path::new(cwd).to_path_buf()),
                        None => std::env::current_dir().ok(),
                    };
                    cwd.map(|cwd| cwd.join(name))
                        .filter(|p| p.exists())
                        .map(|p| p.to_string_lossy().into_owned())
                }
                dir => Some(Path::new(dir).join(name))
                    .filter(|p| p.exists())
                    .map(|p| p.to_string_lossy().into_owned()),
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    /// The source file is known when gdb has loaded the symbols, the
    /// sources list must then be fetched
    fn update_file(&mut self) {
        if self.file.is_none() {
            self.effects.push(Effect::Rearm(OobKind::Sources));
        }
        self.file = self.next_file.take();
    }

    /// Build the new breakpoints table and update the editor signs
    pub fn update_breakpoints(&mut self, list: Vec<Breakpoint>) {
        let table: BTreeMap<u32, Breakpoint> = list
            .into_iter()
            .filter(Breakpoint::is_listed)
            .map(|bp| (bp.number, bp))
            .collect();

        for (num, bp) in &table {
            let old = match self.breakpoints.get(num) {
                Some(old) => old,
                None => continue,
            };
            if bp.enabled != old.enabled {
                self.bp_dirty = true;
                if !bp.is_watchpoint() && old.location().is_some() {
                    self.effects.push(Effect::UpdateBp { id: *num, disabled: !bp.enabled });
                }
            }
            if bp.times != old.times {
                self.bp_dirty = true;
            }
        }

        let mut changed = false;
        for (num, old) in &self.breakpoints {
            if table.contains_key(num) {
                continue;
            }
            changed = true;
            if old.location().is_some() {
                self.effects.push(Effect::DeleteBp { id: *num });
            }
        }

        let mut added = Vec::new();
        for (num, bp) in &table {
            if self.breakpoints.contains_key(num) {
                continue;
            }
            changed = true;
            if let Some((file, lnum)) = bp.location() {
                if let Some(path) = self.get_fullpath(file) {
                    added.push(Effect::AddBp { id: *num, path, lnum });
                }
            }
        }
        self.effects.extend(added);

        self.breakpoints = table;
        if changed {
            self.bp_dirty = true;
        }
    }

    /// The breakpoints report
    pub fn collect_breakpoints(&mut self) -> String {
        self.bp_dirty = false;
        let mut lines = Vec::new();
        for (num, bp) in &self.breakpoints {
            let mut line = format!(
                "{:<4} {:<15} {:<3} {:<5} {:<6}",
                num,
                bp.bp_type,
                if bp.enabled { "y" } else { "n" },
                bp.times,
                bp.disp
            );
            if bp.is_watchpoint() {
                if let Some(what) = &bp.what {
                    line.push_str(what);
                }
            } else {
                if let Some(func) = &bp.func {
                    line.push_str(&format!(" in {}", func));
                }
                if let Some((file, lnum)) = bp.location() {
                    line.push_str(&format!(" at {}:{}", file, lnum));
                    if let Some(path) = self.get_fullpath(file) {
                        line.push_str(&format!(" <{}>", path));
                    }
                }
            }
            lines.push(line);
        }
        if lines.is_empty() {
            return String::new();
        }
        let mut output = String::from("Num  Type            Enb Hit   Disp   What\n");
        for line in lines {
            output.push_str(&line);
            output.push('\n');
        }
        output
    }

    /// The backtrace report, the selected frame is marked with a star
    pub fn collect_backtrace(&mut self) -> String {
        self.backtrace_dirty = false;
        let selected = self.frame.as_ref().map(|f| f.level.as_str());
        let mut output = String::new();
        for frame in &self.backtrace {
            let mark = if Some(frame.level.as_str()) == selected { '*' } else { ' ' };
            output.push_str(&format!("{} #{:<3}", mark, frame.level));
            frame_location(&mut output, frame);
            if let Some(file) = &frame.file {
                output.push_str(&format!(" at {}", file));
                if let Some(path) = self.get_fullpath(file) {
                    output.push_str(&format!(" <{}>", path));
                }
            }
            output.push('\n');
        }
        output
    }

    fn frame_changed(&self) -> bool {
        match (&self.prev_frame, &self.frame) {
            (Some(prev), Some(frame)) => !prev.loose_eq(frame),
            (None, None) => false,
            _ => true,
        }
    }

    /// Update the frame sign after the frame has been fetched
    pub fn update_frame(&mut self, cmd: &str) {
        let changed = self.frame_changed();
        if changed {
            self.backtrace_dirty = true;
        }

        let location = self.frame.as_ref().and_then(|frame| {
            let lnum = frame.line?;
            let fname = match &frame.fullname {
                Some(fullname) => fullname.clone(),
                None => {
                    let fname = frame.file.clone()?;
                    let fullname = self.file.as_ref().and_then(|f| f.fullname.as_deref());
                    match fullname {
                        Some(fullname)
                            if Path::new(fullname).file_name().and_then(|n| n.to_str())
                                == Some(fname.as_str()) =>
                        {
                            fullname.to_string()
                        }
                        _ => fname,
                    }
                }
            };
            Some((self.get_fullpath(&fname)?, lnum))
        });

        match location {
            Some((path, lnum)) => {
                if changed || cmd.starts_with(self.frame_prefix.as_str()) {
                    self.effects.push(Effect::ShowFrame { path, lnum });
                }
            }
            None => self.hide_frame(),
        }
        self.prev_frame = self.frame.clone();
    }

    /// Remove the frame sign
    pub fn hide_frame(&mut self) {
        if self.prev_frame.take().is_some() {
            self.backtrace_dirty = true;
            self.backtrace.clear();
        }
        self.effects.push(Effect::HideFrame);
    }

    /// The threads report
    pub fn collect_threads(&mut self) -> String {
        self.threads_dirty = false;
        if self.threads.is_empty() {
            return String::new();
        }
        let mut output = String::from("  Id  Name             State   Info\n");
        for thread in self.threads.values() {
            output.push_str(&format!(
                "{} {:<3} {:<16} {:<7} {}",
                if thread.current { '*' } else { ' ' },
                thread.id,
                thread.name,
                thread.state,
                thread.target_id
            ));
            if let Some(frame) = &thread.frame {
                frame_location(&mut output, frame);
                if let Some(file) = &frame.file {
                    output.push_str(&format!(" at {}", file));
                }
            }
            output.push('\n');
        }
        output
    }

    pub fn update_threads(&mut self, list: Vec<Thread>, current: Option<&str>) {
        let mut threads: BTreeMap<u32, Thread> = list.into_iter().map(|t| (t.id, t)).collect();
        if let Some(current) = current {
            match current.parse().ok().and_then(|id: u32| threads.get_mut(&id)) {
                Some(thread) => thread.current = true,
                None => error!(target: "mi", "unknown current-thread-id {}", current),
            }
        }
        if !threads_eq(&threads, &self.threads) {
            self.threads_dirty = true;
        }
        self.threads = threads;
    }

    pub fn update_changelist(&mut self, changelist: &[VarChange]) {
        self.varobj.update_changelist(changelist);
    }

    /// The content of a project file, None when the program file is not
    /// known
    pub fn project_text(&self) -> Option<String> {
        let debuggee = self.debuggee.as_deref()?;
        let mut text = String::new();
        if let Some(cwd) = &self.cwd {
            let sep = if cwd.ends_with('/') { "" } else { "/" };
            text.push_str(&format!("cd {}{}\n", cwd, sep));
        }
        text.push_str(&format!("file {}\n", debuggee));
        if let Some(args) = &self.args {
            text.push_str(&format!("set args {}\n", args));
        }

        // At most one breakpoint per line.
        let mut saved: Vec<String> = Vec::new();
        for bp in self.breakpoints.values() {
            let (file, lnum) = match bp.location() {
                Some(location) => location,
                None => continue,
            };
            if let Some(path) = self.get_fullpath(file) {
                let location = format!("{}:{}", path, lnum);
                if !saved.contains(&location) {
                    text.push_str(&format!("break {}\n", location));
                    saved.push(location);
                }
            }
        }
        Some(text)
    }

    /// Write the project file and report the outcome in the console
    pub fn save_project(&mut self, name: &str, quitting: bool) {
        let outcome = match self.project_text() {
            Some(text) => std::fs::write(name, text)
                .map(|_| format!("Project '{}' has been saved.", name))
                .map_err(|e| format!("Project '{}' not saved: {}", name, e)),
            None => Err(format!(
                "Project '{}' not saved: no executable file specified.",
                name
            )),
        };
        let msg = match outcome {
            Ok(msg) => {
                info!(target: "mi", "{}", msg);
                msg
            }
            Err(msg) => {
                error!(target: "mi", "{}", msg);
                msg
            }
        };
        self.effects.push(Effect::Console(format!("{}\n", msg)));
        if !quitting {
            self.effects.push(Effect::PrintPrompt);
        }
    }

    /// Remove all the state shown in the editor
    pub fn close(&mut self) {
        self.update_breakpoints(Vec::new());
        self.frame = None;
        self.update_frame("");
        self.update_threads(Vec::new(), None);
        self.varobj.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_gdb_output, parse_results};
    use crate::types::GdbOutput;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn record(line: &str) -> ResultRecord {
        match parse_gdb_output(line).unwrap() {
            GdbOutput::Result(record) => record,
            other => panic!("not a result record: {:?}", other),
        }
    }

    fn source_dir(files: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for file in files {
            fs::write(dir.path().join(file), "int main() {}\n").unwrap();
        }
        dir
    }

    fn info_in(dir: &TempDir) -> Info {
        let mut info = Info::new(&["frame".to_string(), "finish".to_string(), "file".to_string()]);
        info.directories = vec![dir.path().to_string_lossy().into_owned()];
        info
    }

    fn break_list(body: &str) -> ResultRecord {
        record(&format!(
            "^done,BreakpointTable={{nr_rows=\"1\",nr_cols=\"6\",hdr=[],body=[{}]}}",
            body
        ))
    }

    const BP1: &str = r#"bkpt={number="1",type="breakpoint",disp="keep",enabled="y",addr="0x1",func="main",file="foo.c",line="3",times="0"}"#;
    const BP1_DISABLED: &str = r#"bkpt={number="1",type="breakpoint",disp="keep",enabled="n",addr="0x1",func="main",file="foo.c",line="3",times="0"}"#;
    const WP2: &str = r#"bkpt={number="2",type="hw watchpoint",disp="keep",enabled="y",what="len",times="0"}"#;

    #[test]
    fn test_breakpoints_added_updated_deleted() {
        let dir = source_dir(&["foo.c"]);
        let path = dir.path().join("foo.c").to_string_lossy().into_owned();
        let mut info = info_in(&dir);

        info.handle_oob_result(OobKind::Breakpoints, &break_list(&format!("{},{}", BP1, WP2)), "");
        assert_eq!(info.drain_effects(), vec![Effect::AddBp { id: 1, path: path.clone(), lnum: 3 }]);
        assert!(info.bp_dirty);
        assert_eq!(
            info.collect_breakpoints(),
            format!(
                "Num  Type            Enb Hit   Disp   What\n\
                 1    breakpoint      y   0     keep   in main at foo.c:3 <{}>\n\
                 2    hw watchpoint   y   0     keep  len\n",
                path
            )
        );
        assert!(!info.bp_dirty);

        info.handle_oob_result(OobKind::Breakpoints, &break_list(BP1_DISABLED), "");
        assert_eq!(info.drain_effects(), vec![Effect::UpdateBp { id: 1, disabled: true }]);
        assert!(info.bp_dirty);

        info.handle_oob_result(OobKind::Breakpoints, &break_list(""), "");
        assert_eq!(info.drain_effects(), vec![Effect::DeleteBp { id: 1 }]);
        assert_eq!(info.collect_breakpoints(), "");
    }

    #[test]
    fn test_unresolved_breakpoint_has_no_sign() {
        let dir = source_dir(&[]);
        let mut info = info_in(&dir);
        info.handle_oob_result(OobKind::Breakpoints, &break_list(BP1), "");
        assert!(info.drain_effects().is_empty());
        assert!(info.bp_dirty);
    }

    #[test]
    fn test_get_fullpath() {
        let dir = source_dir(&["foo.c"]);
        let path = dir.path().join("foo.c").to_string_lossy().into_owned();
        let mut info = info_in(&dir);
        assert_eq!(info.get_fullpath(&path), Some(path.clone()));
        assert_eq!(info.get_fullpath("/nonexistent/dir/foo.c"), Some(path.clone()));
        assert_eq!(info.get_fullpath("bar.c"), None);

        info.directories = default_directories();
        info.sources = vec![Source {
            file: "foo.c".into(),
            fullname: Some(path.clone()),
            line: None,
        }];
        assert_eq!(info.get_fullpath("foo.c"), Some(path));
    }

    #[test]
    fn test_frame_shown_then_hidden() {
        let dir = source_dir(&["foo.c"]);
        let path = dir.path().join("foo.c").to_string_lossy().into_owned();
        let mut info = info_in(&dir);
        let frame = record(r#"^done,frame={level="0",addr="0x1",func="main",file="foo.c",line="3"}"#);

        info.reset(OobKind::Frame);
        info.handle_oob_result(OobKind::Frame, &frame, "next");
        assert_eq!(info.drain_effects(), vec![Effect::ShowFrame { path: path.clone(), lnum: 3 }]);
        assert!(info.backtrace_dirty);

        // Same frame, not shown again unless the command selects a frame.
        info.handle_oob_result(OobKind::Frame, &frame, "info locals");
        assert!(info.drain_effects().is_empty());
        info.handle_oob_result(OobKind::Frame, &frame, "frame 0");
        assert_eq!(info.drain_effects(), vec![Effect::ShowFrame { path, lnum: 3 }]);

        info.backtrace = vec![Frame::default()];
        info.hide_frame();
        assert_eq!(info.drain_effects(), vec![Effect::HideFrame]);
        assert!(info.backtrace.is_empty());
    }

    #[test]
    fn test_backtrace_report() {
        let dir = source_dir(&[]);
        let mut info = info_in(&dir);
        info.frame = Frame::from_tuple(&parse_results(r#"level="1""#).unwrap());
        info.handle_oob_result(
            OobKind::BackTrace,
            &record(r#"^done,stack=[frame={level="0",addr="0x1",func="foo",file="foo.c",line="3"},frame={level="1",addr="0x2",from="/lib/libc.so.6"}]"#),
            "",
        );
        assert_eq!(info.collect_backtrace(), "  #0   in foo at foo.c\n* #1   from /lib/libc.so.6\n");
    }

    #[test]
    fn test_threads_report() {
        let dir = source_dir(&[]);
        let mut info = info_in(&dir);
        let threads = record(
            r#"^done,threads=[{id="1",target-id="process 4165",name="a.out",frame={level="0",addr="0x1",func="main",args=[],file="a.c",line="510"},state="stopped",core="3"}],current-thread-id="1""#,
        );
        info.handle_oob_result(OobKind::Threads, &threads, "");
        assert!(info.threads_dirty);
        assert_eq!(
            info.collect_threads(),
            "  Id  Name             State   Info\n* 1   a.out            stopped process 4165 in main at a.c\n"
        );
        info.handle_oob_result(OobKind::Threads, &threads, "");
        assert!(!info.threads_dirty);
    }

    #[test]
    fn test_file_rearms_sources() {
        let dir = source_dir(&[]);
        let mut info = info_in(&dir);
        let file = record(r#"^done,line="1",file="foo.c",fullname="/tmp/foo.c",macro-info="0""#);
        info.reset(OobKind::File);
        info.handle_oob_result(OobKind::File, &file, "");
        assert_eq!(info.drain_effects(), vec![Effect::Rearm(OobKind::Sources)]);
        assert_eq!(info.file.as_ref().map(|f| f.file.as_str()), Some("foo.c"));

        info.reset(OobKind::File);
        info.handle_oob_result(OobKind::File, &file, "");
        assert!(info.drain_effects().is_empty());
    }

    #[test]
    fn test_console_streams() {
        let dir = source_dir(&[]);
        let mut info = info_in(&dir);
        info.handle_oob_stream(
            OobKind::Args,
            "Argument list to give program being debugged when it is started is \"-x \"a b\" c\".\n",
        );
        assert_eq!(info.args.as_deref(), Some("-x \"a b\" c"));

        info.reset(OobKind::Args);
        info.handle_oob_stream(
            OobKind::Args,
            "Argument list to give program being debugged when it is started is \"\".\n",
        );
        assert_eq!(info.args, None);

        info.handle_oob_stream(OobKind::Directories, "Source directories searched: /src:$cdir:$cwd\n");
        assert_eq!(info.directories, vec!["/src", "$cdir", "$cwd"]);

        info.handle_oob_stream(
            OobKind::PgmFile,
            "Symbols from \"/home/user/foobar\".\nLocal exec file:\n",
        );
        assert_eq!(info.debuggee.as_deref(), Some("/home/user/foobar"));
    }

    #[test]
    fn test_project_text() {
        let dir = source_dir(&["foo.c"]);
        let path = dir.path().join("foo.c").to_string_lossy().into_owned();
        let mut info = info_in(&dir);
        assert_eq!(info.project_text(), None);

        info.debuggee = Some("/home/user/foobar".into());
        info.cwd = Some("/home/user".into());
        info.args = Some("1 2".into());
        let bp3 = BP1.replace("number=\"1\"", "number=\"3\"");
        info.handle_oob_result(OobKind::Breakpoints, &break_list(&format!("{},{}", BP1, bp3)), "");
        assert_eq!(
            info.project_text().unwrap(),
            format!("cd /home/user/\nfile /home/user/foobar\nset args 1 2\nbreak {}:3\n", path)
        );
    }

    #[test]
    fn test_save_project() {
        let dir = source_dir(&[]);
        let project = dir.path().join("project.gdb").to_string_lossy().into_owned();
        let mut info = info_in(&dir);

        info.save_project(&project, false);
        assert_eq!(
            info.drain_effects(),
            vec![
                Effect::Console(format!(
                    "Project '{}' not saved: no executable file specified.\n",
                    project
                )),
                Effect::PrintPrompt,
            ]
        );

        info.debuggee = Some("/bin/true".into());
        info.save_project(&project, true);
        assert_eq!(
            info.drain_effects(),
            vec![Effect::Console(format!("Project '{}' has been saved.\n", project))]
        );
        assert_eq!(fs::read_to_string(&project).unwrap(), "file /bin/true\n");
    }

    #[test]
    fn test_close() {
        let dir = source_dir(&["foo.c"]);
        let mut info = info_in(&dir);
        info.handle_oob_result(OobKind::Breakpoints, &break_list(BP1), "");
        info.drain_effects();
        info.close();
        assert_eq!(info.drain_effects(), vec![Effect::DeleteBp { id: 1 }, Effect::HideFrame]);
        assert!(info.breakpoints.is_empty());
    }
}
