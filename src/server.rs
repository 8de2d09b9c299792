//! The tokio reactor of a session
//!
//! One task reads gdb stdout and one task writes gdb stdin, the session
//! itself runs in the reactor loop with the editor socket and the
//! background tick.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use gdbadapter::process::{probe_commands, probe_version};
use gdbadapter::{GdbError, GdbProcess, GdbVersion};
use netbeans::Netbeans;

use crate::config::Config;
use crate::error::{Result, SessionError};
use crate::session::{GdbControl, GdbSetup, Session, TICK};

/// Time given to gdb to exit on its own after the session is closed
const GDB_EXIT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub enum GdbLine {
    Line(String),
    Eof,
}

/// Runs gdb and connects its pipes to the reactor
pub struct GdbRunner {
    program: String,
    args: Vec<String>,
    tty: Option<String>,
    process: Option<GdbProcess>,
    stdin: Option<mpsc::UnboundedSender<String>>,
    lines: mpsc::UnboundedSender<GdbLine>,
}

impl GdbRunner {
    pub fn new(config: &Config, lines: mpsc::UnboundedSender<GdbLine>) -> Self {
        GdbRunner {
            program: config.gdb.clone(),
            args: config.gdb_args.clone(),
            tty: config.tty.clone(),
            process: None,
            stdin: None,
            lines,
        }
    }

    /// Wait for gdb to exit
    pub async fn wait(&mut self) {
        self.stdin = None;
        if let Some(process) = self.process.as_mut() {
            process.wait(GDB_EXIT_DELAY).await;
        }
    }
}

impl GdbControl for GdbRunner {
    fn start(&mut self) -> gdbadapter::Result<()> {
        let (process, stdin, stdout) =
            GdbProcess::spawn(&self.program, &self.args, self.tty.as_deref())?;
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_stdin(stdin, rx));
        tokio::spawn(read_stdout(stdout, self.lines.clone()));
        self.process = Some(process);
        self.stdin = Some(tx);
        Ok(())
    }

    fn write(&mut self, data: &str) {
        match &self.stdin {
            Some(stdin) => {
                if stdin.send(data.to_string()).is_err() {
                    warn!(target: "gdb", "gdb stdin is closed");
                }
            }
            None => warn!(target: "gdb", "gdb is not running, cannot write {:?}", data),
        }
    }

    fn interrupt(&mut self) -> gdbadapter::Result<()> {
        self.process
            .as_ref()
            .ok_or(GdbError::ProcessTerminated)?
            .interrupt()
    }

    fn exit_status(&mut self) -> Option<String> {
        self.process.as_mut()?.exit_status()
    }

    fn close(&mut self) {
        // gdb exits on end of file.
        self.stdin = None;
    }
}

async fn write_stdin(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(data) = rx.recv().await {
        if let Err(e) = stdin.write_all(data.as_bytes()).await {
            error!(target: "gdb", "cannot write to gdb: {}", e);
            return;
        }
    }
    debug!(target: "gdb", "closing gdb stdin");
}

async fn read_stdout(stdout: ChildStdout, lines: mpsc::UnboundedSender<GdbLine>) {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
                if lines.send(GdbLine::Line(line.to_string())).is_err() {
                    return;
                }
            }
            Err(e) => {
                error!(target: "gdb", "cannot read gdb output: {}", e);
                break;
            }
        }
    }
    let _ = lines.send(GdbLine::Eof);
}

/// Get the gdb version and its commands
pub async fn probe_gdb(config: &Config) -> Result<GdbSetup> {
    let version = match &config.gdb_version {
        Some(version) => GdbVersion::parse(version)
            .ok_or_else(|| SessionError::Config(format!("invalid gdb_version \"{}\"", version)))?,
        None => probe_version(&config.gdb).await?,
    };
    let commands = probe_commands(&config.gdb, "").await;
    let set_args = probe_commands(&config.gdb, "set").await;
    info!(target: "gdb", "{} gdb commands, {} set arguments", commands.len(), set_args.len());
    Ok(GdbSetup {
        version,
        commands,
        set_args,
    })
}

/// Accept the editor connection and run the session until it is closed
pub async fn run(config: Config) -> Result<()> {
    let setup = probe_gdb(&config).await?;
    let deadline = time::Instant::now() + Duration::from_secs(config.handshake_timeout);

    let listener = TcpListener::bind(&config.listen).await?;
    info!(target: "nb", "listening on {}", config.listen);
    let (socket, peer) = time::timeout_at(deadline, listener.accept())
        .await
        .map_err(|_| SessionError::HandshakeTimeout(config.handshake_timeout))??;
    info!(target: "nb", "connection from {}", peer);

    let (reader, mut writer) = socket.into_split();
    let (nb_tx, mut nb_rx) = mpsc::unbounded_channel::<String>();
    let writer_task = tokio::spawn(async move {
        while let Some(msg) = nb_rx.recv().await {
            if let Err(e) = writer.write_all(msg.as_bytes()).await {
                error!(target: "nb", "cannot write to the editor: {}", e);
                return;
            }
        }
        let _ = writer.shutdown().await;
    });

    let (line_tx, mut line_rx) = mpsc::unbounded_channel();
    let nb = Netbeans::new(nb_tx, &config.password, config.max_lines, config.colors()?);
    let gdb = GdbRunner::new(&config, line_tx);
    let mut session = Session::new(nb, gdb, &config, setup);

    let result = event_loop(&mut session, reader, &mut line_rx, deadline, config.handshake_timeout).await;
    if let Err(e) = &result {
        error!(target: "gdb", "{}", e);
        session.shutdown();
    }
    if session.nb.is_ready() && !session.nb.tr.detached {
        session.nb.detach();
    }
    session.gdb_mut().wait().await;

    drop(session);
    if let Err(e) = writer_task.await {
        error!(target: "nb", "editor writer task: {}", e);
    }
    result
}

async fn event_loop(
    session: &mut Session<GdbRunner>,
    reader: OwnedReadHalf,
    gdb_lines: &mut mpsc::UnboundedReceiver<GdbLine>,
    deadline: time::Instant,
    timeout: u64,
) -> Result<()> {
    let mut editor = BufReader::new(reader).lines();
    let mut editor_open = true;
    let handshake = time::sleep_until(deadline);
    tokio::pin!(handshake);
    let mut tick = time::interval(TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !session.is_closed() {
        tokio::select! {
            line = editor.next_line(), if editor_open => match line? {
                Some(line) => session.handle_nb_message(&line)?,
                None => {
                    info!(target: "nb", "the editor has closed the connection");
                    editor_open = false;
                    session.close();
                }
            },
            Some(line) = gdb_lines.recv() => match line {
                GdbLine::Line(line) => session.handle_gdb_line(&line)?,
                GdbLine::Eof => session.gdb_terminated(),
            },
            _ = &mut handshake, if !session.nb.is_ready() => {
                return Err(SessionError::HandshakeTimeout(timeout));
            }
            _ = tick.tick() => session.tick(Instant::now()),
        }
    }
    Ok(())
}
