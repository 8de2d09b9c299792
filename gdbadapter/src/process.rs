/// Process management for GDB
///
/// This module spawns gdb with the MI interpreter, interrupts it, and runs
/// gdb in batch mode to probe its version and its list of commands.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::parser::parse_gdb_output;
use crate::types::{GdbOutput, GdbVersion, StreamType};
use crate::{GdbError, Result};

/// gdb initial settings
pub const GDB_INIT: &str = "set confirm off\nset height 0\nset width 0\nset annotate 1\n";

/// gdb 6.1.1 and below do not implement `-file-list-exec-source-files`
pub const MIN_VERSION: [u32; 3] = [6, 2, 1];

/// Used when the commands cannot be listed with `complete`
pub const DEFAULT_COMMANDS: &[&str] = &[
    "actions", "advance", "attach", "awatch", "backtrace", "break", "bt", "call", "catch", "cd",
    "clear", "commands", "complete", "condition", "continue", "core-file", "define", "delete",
    "detach", "directory", "disable", "disassemble", "display", "document", "down", "echo",
    "edit", "enable", "end", "exec-file", "file", "finish", "focus", "frame", "fs", "handle",
    "help", "ignore", "info", "inferior", "interrupt", "jump", "kill", "layout", "list", "make",
    "next", "nexti", "ni", "output", "print", "ptype", "pwd", "python", "python-interactive",
    "quit", "rbreak", "refresh", "return", "reverse-next", "reverse-step", "run", "rwatch",
    "search", "set", "shell", "show", "si", "signal", "source", "start", "step", "stepi",
    "symbol-file", "tbreak", "thread", "tty", "tui", "undisplay", "until", "up", "update",
    "watch", "whatis", "where", "winheight", "x",
];

/// A running gdb process
#[derive(Debug)]
pub struct GdbProcess {
    child: Child,
    // Removed when the process is dropped.
    _init: NamedTempFile,
}

impl GdbProcess {
    /// Start gdb with the MI interpreter
    ///
    /// The debuggee is run on `tty` when set.
    pub fn spawn(
        program: &str,
        args: &[String],
        tty: Option<&str>,
    ) -> Result<(Self, ChildStdin, ChildStdout)> {
        let mut init = NamedTempFile::new()?;
        init.write_all(GDB_INIT.as_bytes())?;
        init.flush()?;

        let mut command = Command::new(program);
        if let Some(tty) = tty {
            command.arg(format!("-tty={}", tty));
        }
        command
            .arg("-x")
            .arg(init.path())
            .arg("--interpreter=mi")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        log::debug!(target: "gdb", "starting {:?}", command);

        let mut child = command.spawn()?;
        let stdin = child.stdin.take().ok_or(GdbError::ProcessTerminated)?;
        let stdout = child.stdout.take().ok_or(GdbError::ProcessTerminated)?;
        log::info!(target: "gdb", "gdb started with pid {:?}", child.id());
        Ok((GdbProcess { child, _init: init }, stdin, stdout))
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Send an interrupt to gdb, as a Ctrl-C typed in its terminal
    pub fn interrupt(&self) -> Result<()> {
        let pid = self.id().ok_or(GdbError::ProcessTerminated)?;
        send_interrupt_signal(pid)
    }

    /// The exit status of gdb when it has terminated
    pub fn exit_status(&mut self) -> Option<String> {
        match self.child.try_wait() {
            Ok(Some(status)) => Some(format!("gdb {}", status)),
            Ok(None) => None,
            Err(e) => {
                log::error!(target: "gdb", "cannot get the gdb status: {}", e);
                None
            }
        }
    }

    /// Kill gdb without waiting for it, the child is reaped by tokio
    pub fn start_kill(&mut self) -> std::io::Result<()> {
        self.child.start_kill()
    }

    /// Wait for gdb to exit, kill it after `delay`
    pub async fn wait(&mut self, delay: Duration) {
        match tokio::time::timeout(delay, self.child.wait()).await {
            Ok(Ok(status)) => log::info!(target: "gdb", "gdb exited: {}", status),
            Ok(Err(e)) => log::error!(target: "gdb", "cannot wait for gdb: {}", e),
            Err(_) => {
                log::warn!(target: "gdb", "gdb did not exit, killing it");
                if let Err(e) = self.start_kill() {
                    log::error!(target: "gdb", "cannot kill gdb: {}", e);
                }
            }
        }
    }
}

#[cfg(unix)]
fn send_interrupt_signal(pid: u32) -> Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGINT).map_err(|e| {
        log::error!(target: "gdb", "failed to send SIGINT to pid {}: {}", pid, e);
        GdbError::SignalError(e.to_string())
    })
}

#[cfg(not(unix))]
fn send_interrupt_signal(_pid: u32) -> Result<()> {
    Err(GdbError::SignalError("interrupt not supported on this platform".into()))
}

/// Run `job` in gdb batch mode and return its MI output
pub async fn gdb_batch(program: &str, job: &str) -> Result<String> {
    let mut script = NamedTempFile::new()?;
    script.write_all(job.as_bytes())?;
    script.flush()?;

    let output = Command::new(program)
        .arg("--interpreter=mi")
        .arg("-batch")
        .arg("-nx")
        .arg("-x")
        .arg(script.path())
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .await?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// The console stream records of an MI output
fn console_lines(output: &str) -> impl Iterator<Item = String> + '_ {
    output.lines().filter_map(|line| match parse_gdb_output(line) {
        Ok(GdbOutput::Stream(stream)) if stream.stream_type == StreamType::Console => {
            stream.content.strip_suffix('\n').map(str::to_string)
        }
        _ => None,
    })
}

/// Parse the gdb version from the output of `show version`
///
/// The version starts after the last space of the first line.
pub fn parse_gdb_version(header: &str) -> Option<GdbVersion> {
    let first = console_lines(header).next()?;
    first.rsplit(' ').find_map(|word| {
        let word = word.trim_start_matches('(');
        let version: String = word
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        if version.chars().next().map_or(false, |c| c.is_ascii_digit()) {
            GdbVersion::parse(&version)
        } else {
            None
        }
    })
}

/// Get the version of the gdb program and check it is supported
pub async fn probe_version(program: &str) -> Result<GdbVersion> {
    let header = gdb_batch(program, "show version\n").await?;
    let version = parse_gdb_version(&header)
        .ok_or_else(|| GdbError::VersionError(format!("cannot find the gdb version of {}", program)))?;
    if version < GdbVersion::new(&MIN_VERSION) {
        return Err(GdbError::VersionError(format!("invalid gdb version \"{}\"", version)));
    }
    log::info!(target: "gdb", "gdb version: {}", version);
    Ok(version)
}

/// The last word of each completion printed by gdb
pub fn completion_words(output: &str) -> Vec<String> {
    let mut words: Vec<String> = console_lines(output)
        .filter_map(|line| line.split_whitespace().last().map(str::to_string))
        .collect();
    words.sort();
    words.dedup();
    words
}

/// List the gdb commands, or the arguments of a command when `cmd` is not
/// empty
pub async fn probe_commands(program: &str, cmd: &str) -> Vec<String> {
    let job = if cmd.is_empty() {
        "complete\n".to_string()
    } else {
        format!("complete {} \n", cmd)
    };
    let words = match gdb_batch(program, &job).await {
        Ok(output) => completion_words(&output),
        Err(e) => {
            log::warn!(target: "gdb", "cannot list the gdb commands: {}", e);
            Vec::new()
        }
    };
    if words.is_empty() && cmd.is_empty() {
        return DEFAULT_COMMANDS.iter().map(|c| c.to_string()).collect();
    }
    words
}
