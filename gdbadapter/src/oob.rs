/// Out of band commands
///
/// After each user command, once gdb has printed its prompt, a fixed and
/// ordered list of queries is run to refresh the state of the debuggee.
/// The order matters: an entry may use the state parsed by the previous
/// ones, the breakpoints need the source files for example.

use std::collections::VecDeque;

use crate::commands::VarObjCmd;
use crate::types::GdbVersion;

const DIRECTORY_CMDS: &[&str] = &["directory", "source"];
const SOURCE_CMDS: &[&str] = &["file", "exec-file", "core-file", "symbol-file", "add-symbol-file"];
const PROJECT_CMDS: &[&str] = &[
    "project", "r", "start", "source", "file", "exec-file", "core-file", "symbol-file",
    "add-symbol-file",
];

/// The catalogue of out of band commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OobKind {
    Args,
    Directories,
    File,
    FrameCli,
    Frame,
    BackTrace,
    Threads,
    PgmFile,
    VarUpdate,
    Pwd,
    Sources,
    Breakpoints,
    EnablePrettyPrinting,
    Project,
    Quit,
}

impl OobKind {
    /// All the entries, in execution order
    pub const CATALOGUE: [OobKind; 15] = [
        OobKind::Args,
        OobKind::Directories,
        OobKind::File,
        OobKind::FrameCli, // After File.
        OobKind::Frame,
        OobKind::BackTrace, // After Frame.
        OobKind::Threads,
        OobKind::PgmFile,
        OobKind::VarUpdate,
        OobKind::Pwd,
        OobKind::Sources,
        OobKind::Breakpoints, // After File and Sources.
        OobKind::EnablePrettyPrinting,
        OobKind::Project,
        OobKind::Quit,
    ];

    /// The command sent to gdb, None for the entries that do not query gdb
    pub fn gdb_cmd(&self) -> Option<&'static str> {
        match self {
            OobKind::Args => Some("-interpreter-exec console \"show args\"\n"),
            OobKind::Directories => Some("-interpreter-exec console \"show directories\"\n"),
            OobKind::File => Some("-file-list-exec-source-file\n"),
            OobKind::FrameCli => Some("frame\n"),
            OobKind::Frame => Some("-stack-info-frame\n"),
            OobKind::BackTrace => Some("-stack-list-frames\n"),
            OobKind::Threads => Some("-thread-info\n"),
            OobKind::PgmFile => Some("-interpreter-exec console \"info files\"\n"),
            OobKind::VarUpdate => Some("-var-update --all-values *\n"),
            OobKind::Pwd => Some("-environment-pwd\n"),
            OobKind::Sources => Some("-file-list-exec-source-files\n"),
            OobKind::Breakpoints => Some("-break-list\n"),
            OobKind::EnablePrettyPrinting => Some("-enable-pretty-printing\n"),
            OobKind::Project | OobKind::Quit => None,
        }
    }

    /// The result of a console command is parsed from the stream records
    pub fn is_mi(&self) -> bool {
        self.gdb_cmd()
            .map_or(false, |cmd| !cmd.starts_with("-interpreter-exec console"))
    }

    /// The commands that trigger the entry, an empty list triggers it after
    /// each command
    pub fn trigger_list(&self) -> &'static [&'static str] {
        match self {
            OobKind::Args | OobKind::PgmFile | OobKind::Pwd => PROJECT_CMDS,
            OobKind::Directories => DIRECTORY_CMDS,
            OobKind::Sources => SOURCE_CMDS,
            _ => &[],
        }
    }

    fn version_min(&self) -> Option<GdbVersion> {
        match self {
            OobKind::Frame => Some(GdbVersion::new(&[6, 4])),
            _ => None,
        }
    }

    fn version_max(&self) -> Option<GdbVersion> {
        match self {
            OobKind::FrameCli => Some(GdbVersion::new(&[6, 3])),
            _ => None,
        }
    }

    fn supported(&self, version: &GdbVersion) -> bool {
        self.version_min().map_or(true, |min| *version >= min)
            && self.version_max().map_or(true, |max| *version <= max)
    }
}

/// Return the smallest prefix of `word` that is not a prefix of `other`,
/// an empty string when `other` starts with `word`
pub fn smallest_prefix<'a>(word: &'a str, other: &str) -> &'a str {
    if other.starts_with(word) {
        return "";
    }
    let mut end = 0;
    for (idx, ch) in word.char_indices() {
        end = idx + ch.len_utf8();
        if other.get(..end) != Some(&word[..end]) {
            break;
        }
    }
    &word[..end]
}

/// Return the smallest prefix of `word` that allows completion among
/// `strlist`
///
/// Returns `word` itself when it is a prefix of one of the keywords.
pub fn smallpref_inlist(word: &str, strlist: &[String]) -> String {
    let mut sorted: Vec<&str> = strlist.iter().map(String::as_str).filter(|s| *s != word).collect();
    sorted.push(word);
    sorted.sort_unstable();
    let i = match sorted.iter().position(|s| *s == word) {
        Some(i) => i,
        None => return word.to_string(),
    };

    let or_word = |prefix: &'_ str| -> String {
        if prefix.is_empty() {
            word.to_string()
        } else {
            prefix.to_string()
        }
    };
    let previous = if i > 0 {
        or_word(smallest_prefix(word, sorted[i - 1]))
    } else {
        String::new()
    };
    let next = if i + 1 < sorted.len() {
        or_word(smallest_prefix(word, sorted[i + 1]))
    } else {
        String::new()
    };
    // Alone in the list.
    or_word(previous.max(next).as_str())
}

/// Build the prefixes of `words` among the `commands`
pub fn prefixes(words: &[&str], commands: &[String]) -> Vec<String> {
    let keys: Vec<String> = commands
        .iter()
        .filter(|cmd| !words.contains(&cmd.as_str()))
        .cloned()
        .collect();
    let mut prefixes: Vec<String> = words.iter().map(|w| smallpref_inlist(w, &keys)).collect();
    prefixes.sort();
    prefixes.dedup();
    prefixes
}

/// A catalogue entry and its trigger state
#[derive(Debug, Clone)]
pub struct OobEntry {
    pub kind: OobKind,
    trigger_prefix: Vec<String>,
    armed: bool,
    /// The command line of the last notification
    cmd: String,
}

impl OobEntry {
    fn new(kind: OobKind, commands: &[String]) -> Self {
        OobEntry {
            kind,
            trigger_prefix: prefixes(kind.trigger_list(), commands),
            armed: false,
            cmd: String::new(),
        }
    }

    fn notify(&mut self, cmd: &str, force: bool) {
        self.cmd = cmd.to_string();
        if force
            || self.kind.trigger_list().is_empty()
            || self.trigger_prefix.iter().any(|prefix| cmd.starts_with(prefix.as_str()))
        {
            self.armed = true;
        }
    }
}

/// An element of a cycle of out of band commands
#[derive(Debug, Clone, PartialEq)]
pub enum OobItem {
    Entry(OobKind),
    VarObj(VarObjCmd),
}

/// The scheduler of the out of band commands
#[derive(Debug)]
pub struct OobList {
    entries: Vec<OobEntry>,
    /// Varobj commands pushed while no cycle is running
    running: Vec<VarObjCmd>,
    fifo: Option<VecDeque<OobItem>>,
    /// The project file named by the last `project` command
    project_name: String,
    pretty_printing: bool,
}

impl OobList {
    /// Build the catalogue for this gdb version, the trigger prefixes are
    /// computed among the gdb `commands`
    pub fn new(version: &GdbVersion, commands: &[String]) -> Self {
        let entries = OobKind::CATALOGUE
            .iter()
            .filter(|kind| kind.supported(version))
            .map(|kind| OobEntry::new(*kind, commands))
            .collect();
        OobList {
            entries,
            running: Vec::new(),
            fifo: None,
            project_name: String::new(),
            pretty_printing: *version >= GdbVersion::new(&[7]),
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = OobKind> + '_ {
        self.entries.iter().map(|entry| entry.kind)
    }

    /// Notify all the entries of the command line being sent to gdb
    pub fn notify(&mut self, cmd: &str) {
        self.project_name = cmd
            .strip_prefix("project ")
            .map(|name| name.trim().to_string())
            .unwrap_or_default();
        for entry in self.entries.iter_mut() {
            match entry.kind {
                OobKind::Project | OobKind::Quit | OobKind::EnablePrettyPrinting => {}
                _ => entry.notify(cmd, false),
            }
        }
    }

    /// Arm an entry whatever the last command
    pub fn force(&mut self, kind: OobKind) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.kind == kind) {
            let cmd = entry.cmd.clone();
            entry.notify(&cmd, true);
        }
    }

    /// Disarm the entry and return the command line it was notified with,
    /// None when the entry is not armed
    pub fn take_armed(&mut self, kind: OobKind) -> Option<String> {
        let entry = self.entries.iter_mut().find(|entry| entry.kind == kind)?;
        if !entry.armed {
            return None;
        }
        entry.armed = false;
        Some(entry.cmd.clone())
    }

    /// Pretty printing is enabled once, on the first cycle
    pub fn take_pretty_printing(&mut self) -> bool {
        std::mem::replace(&mut self.pretty_printing, false)
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Start a cycle: the catalogue followed by the pending varobj commands
    pub fn start_cycle(&mut self) {
        let mut fifo: VecDeque<OobItem> = self.kinds().map(OobItem::Entry).collect();
        fifo.extend(self.running.drain(..).map(OobItem::VarObj));
        self.fifo = Some(fifo);
    }

    pub fn is_running(&self) -> bool {
        self.fifo.is_some()
    }

    /// The next element of the cycle, the cycle ends when it returns None
    pub fn next_item(&mut self) -> Option<OobItem> {
        let item = self.fifo.as_mut()?.pop_front();
        if item.is_none() {
            self.fifo = None;
        }
        item
    }

    /// Push a varobj command, to the running cycle if any
    pub fn push(&mut self, cmd: VarObjCmd) {
        match self.fifo.as_mut() {
            Some(fifo) => fifo.push_back(OobItem::VarObj(cmd)),
            None => self.running.push(cmd),
        }
    }

    pub fn len(&self) -> usize {
        self.fifo.as_ref().map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
