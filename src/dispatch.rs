//! User commands
//!
//! A command typed in the editor is either implemented by the session, or
//! checked and sent to gdb as a console command.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use log::{info, LevelFilter};

use gdbadapter::oob::prefixes;
use gdbadapter::{Command, MiCommand, VarObjCmd};

use crate::error::Result;
use crate::session::{GdbControl, LastCmd, Session, State};

/// Commands that would break the MI dialog or the annotations
const ILLEGAL_CMDS: &[&str] = &[
    "-", "+", "<", ">", "!", "complete", "edit", "end", "shell", "layout", "focus", "fs",
    "refresh", "tui", "update", "winheight", "python-interactive",
];

/// Commands that read their input from the gdb terminal
const TERMINAL_CMDS: &[&str] = &["define", "document", "commands", "python"];

/// Commands after which the frame marker is stale
const RUN_CMDS: &[&str] = &[
    "attach", "detach", "kill", "run", "start", "continue", "fg", "step", "next", "finish",
    "until", "advance", "jump", "signal", "return", "file", "exec-file", "core-file",
];

const RUN_ALIASES: &[&str] = &["d", "r", "c", "s", "n", "u", "j"];

/// `set` arguments the session depends on
const ILLEGAL_SETARGS: &[&str] = &["annotate", "confirm", "height", "width"];

pub const FORMATS: &[&str] = &["binary", "decimal", "hexadecimal", "octal", "natural"];

/// The commands implemented by the session, with their help
pub const SESSION_COMMANDS: &[(&str, &str)] = &[
    ("dbgvar", "Add a watched variable to the variables buffer."),
    ("delvar", "Delete a watched variable from the variables buffer."),
    ("foldvar", "Collapse/expand a variable in the variables buffer."),
    ("help", "Print help on gdb and on the session commands."),
    ("loglevel", "Get or set the log level."),
    ("project", "Save the project to this file on quit."),
    ("quit", "Quit gdb and close the session."),
    ("setfmtvar", "Set the output format of a watched variable."),
    ("sigint", "Send a <C-C> character to gdb."),
];

/// Key mappings, `${fname}` is replaced with the buffer name, `${lnum}` with
/// the cursor line and `${text}` with the last balloon text
pub const KEY_MAPS: &[(&str, &str)] = &[
    ("C-Z", "sigint"),
    ("S-B", "info breakpoints"),
    ("S-L", "info locals"),
    ("S-A", "info args"),
    ("S-S", "step"),
    ("C-N", "next"),
    ("S-F", "finish"),
    ("S-R", "run"),
    ("S-Q", "quit"),
    ("S-C", "continue"),
    ("S-X", "foldvar ${lnum}"),
    ("S-W", "where"),
    ("C-U", "up"),
    ("C-D", "down"),
    ("C-B", "break \"${fname}\":${lnum}"),
    ("C-K", "clear \"${fname}\":${lnum}"),
    ("C-P", "print ${text}"),
    ("C-X", "print *${text}"),
];

/// The default key mappings updated with `keys`
pub fn key_maps(keys: &BTreeMap<String, String>) -> HashMap<String, String> {
    let mut maps: HashMap<String, String> = KEY_MAPS
        .iter()
        .map(|(key, cmd)| (key.to_string(), cmd.to_string()))
        .collect();
    for (key, cmd) in keys {
        if cmd.trim().is_empty() {
            maps.remove(key);
        } else {
            maps.insert(key.clone(), cmd.clone());
        }
    }
    maps
}

/// The prefixes used to check a command line, computed among the gdb
/// commands so that `fin` is recognized as `finish`
#[derive(Debug, Clone)]
pub struct CommandPrefixes {
    illegal: Vec<String>,
    run: Vec<String>,
    setargs: Vec<String>,
}

impl CommandPrefixes {
    pub fn new(commands: &[String], set_args: &[String]) -> Self {
        let mut keys: Vec<String> = commands.to_vec();
        keys.extend(SESSION_COMMANDS.iter().map(|(name, _)| name.to_string()));
        keys.sort();
        keys.dedup();

        let words: Vec<&str> = ILLEGAL_CMDS.iter().chain(TERMINAL_CMDS).copied().collect();
        let illegal = prefixes(&words, &keys)
            .into_iter()
            // `python` is allowed with arguments.
            .filter(|prefix| prefix != "py")
            .collect();
        let run_keys: Vec<String> = keys
            .iter()
            .filter(|key| !TERMINAL_CMDS.contains(&key.as_str()))
            .cloned()
            .collect();

        CommandPrefixes {
            illegal,
            run: prefixes(RUN_CMDS, &run_keys),
            setargs: prefixes(ILLEGAL_SETARGS, set_args),
        }
    }

    pub fn is_illegal(&self, cmd: &str) -> bool {
        self.illegal.iter().any(|prefix| cmd.starts_with(prefix.as_str()))
    }

    pub fn is_illegal_setarg(&self, arg: &str) -> bool {
        self.setargs.iter().any(|prefix| arg.starts_with(prefix.as_str()))
    }

    pub fn is_run(&self, cmd: &str) -> bool {
        RUN_ALIASES.contains(&cmd) || self.run.iter().any(|prefix| cmd.starts_with(prefix.as_str()))
    }
}

fn expand_keymap(mapping: &str, fname: &str, lnum: u32, text: &str) -> String {
    mapping
        .replace("${fname}", fname)
        .replace("${lnum}", &lnum.to_string())
        .replace("${text}", text)
}

impl<G: GdbControl> Session<G> {
    /// Dispatch a command typed in the editor
    pub fn dispatch_keypos(
        &mut self,
        cmd: &str,
        args: &str,
        pathname: Option<&str>,
        lnum: u32,
    ) -> Result<()> {
        if !self.nb.started {
            self.start()?;
        }

        let cmdline = match self.keymaps.get(cmd) {
            Some(mapping) => expand_keymap(mapping, pathname.unwrap_or_default(), lnum, &self.last_balloon),
            None => format!("{} {}", cmd, args),
        };
        let (cmd, args) = match cmdline.trim().split_once(char::is_whitespace) {
            Some((cmd, args)) => (cmd.to_string(), args.trim_start().to_string()),
            None => (cmdline.trim().to_string(), String::new()),
        };

        if cmd == "sigint" {
            self.lastcmd = LastCmd::Startup;
        }
        if !self.async_commands || cmd == "sigint" {
            if cmd == "sigint" {
                self.cmd_fifo.clear();
            }
            self.do_cmd(&cmd, &args);
        } else {
            self.cmd_fifo.push_back((cmd, args));
        }
        Ok(())
    }

    pub(crate) fn do_cmd(&mut self, cmd: &str, args: &str) {
        self.pre_cmd(cmd, args);
        match cmd {
            "complete" => self.cmd_complete(args),
            "dbgvar" => self.cmd_dbgvar(args),
            "delvar" => self.cmd_delvar(args),
            "foldvar" => self.cmd_foldvar(args),
            "help" => self.cmd_help(cmd, args),
            "loglevel" => self.cmd_loglevel(args),
            "project" => self.cmd_project(args),
            "quit" => self.cmd_quit(),
            "setfmtvar" => self.cmd_setfmtvar(args),
            "sigint" => self.cmd_sigint(),
            _ => self.default_cmd_processing(cmd, args),
        }
        self.apply_effects();
    }

    fn pre_cmd(&mut self, cmd: &str, args: &str) {
        self.curcmdline = if args.is_empty() {
            cmd.to_string()
        } else {
            format!("{} {}", cmd, args)
        };
        if self.firstcmdline.is_some()
            && cmd != "sigint"
            && cmd != "complete"
            && self.accepting_cmd()
        {
            let echo = format!("{}\n", self.curcmdline);
            self.nb.console_print(&echo);
        }
    }

    /// Check the command and send it to gdb, the first command is held
    /// until gdb is ready
    fn default_cmd_processing(&mut self, cmd: &str, args: &str) {
        if self.prefixes.is_illegal(cmd) {
            self.nb.console_print("Illegal command in clewn.\n");
            self.print_prompt();
            return;
        }
        if cmd == "set" {
            if let Some(first) = args.split_whitespace().next() {
                if self.prefixes.is_illegal_setarg(first) {
                    self.nb.console_print("Illegal argument in clewn.\n");
                    self.print_prompt();
                    return;
                }
            }
        }

        if self.prefixes.is_run(cmd) {
            self.info.hide_frame();
        }

        if self.firstcmdline.is_none() {
            self.firstcmdline = Some(self.curcmdline.clone());
        } else {
            let cmdline = self.curcmdline.clone();
            self.clicmd_notify(&cmdline, false, false);
        }
    }

    fn cmd_help(&mut self, cmd: &str, args: &str) {
        if args.is_empty() {
            self.nb.console_print("Clewn specific commands:\n");
            for (name, doc) in SESSION_COMMANDS {
                self.nb.console_print(&format!("{} -- {}\n", name, doc));
            }
            self.nb.console_print("\nGdb help:\n");
        }
        self.default_cmd_processing(cmd, args);
    }

    fn cmd_complete(&mut self, args: &str) {
        self.send_user(Command::complete(args), false);
    }

    fn cmd_dbgvar(&mut self, args: &str) {
        let varnum = self.info.varnum;
        let create = Command::Mi(MiCommand::VarCreate {
            exp: args.to_string(),
            varnum,
        });
        if self.send_user(create, true) {
            self.oob.push(VarObjCmd::Evaluate {
                name: format!("var{}", varnum),
            });
        }
    }

    fn cmd_delvar(&mut self, args: &str) {
        let words: Vec<&str> = args.split_whitespace().collect();
        let name = match words.as_slice() {
            [name] => *name,
            _ => {
                self.nb.console_print("Invalid arguments.\n");
                self.print_prompt();
                return;
            }
        };

        if self.info.varobj.leaf(name).is_some() {
            let dynamic_child =
                name.contains('.') && self.info.varobj.root_of(name).map_or(false, |root| root.dynamic);
            if !dynamic_child {
                self.send_user(
                    Command::Mi(MiCommand::VarDelete {
                        name: name.to_string(),
                    }),
                    true,
                );
                return;
            }
            self.nb
                .console_print("Cannot delete an element of a dynamic variable.\n");
        } else {
            self.nb.console_print(&format!("\"{}\" not found.\n", name));
        }
        self.print_prompt();
    }

    fn cmd_foldvar(&mut self, args: &str) {
        if let Err(msg) = self.foldvar(args) {
            self.nb.console_print(&format!("{}\n", msg));
            self.print_prompt();
        }
    }

    fn foldvar(&mut self, args: &str) -> std::result::Result<(), &'static str> {
        let words: Vec<&str> = args.split_whitespace().collect();
        let lnum = match words.as_slice() {
            [word] => word.parse::<u32>().map_err(|_| "Not a line number.")?,
            _ => return Err("Invalid arguments."),
        };
        let name = self
            .info
            .varobj
            .parents
            .get(&(lnum as usize))
            .cloned()
            .ok_or("Not a valid line number.")?;
        let varobj = self.info.varobj.leaf(&name).ok_or("Not a valid line number.")?;

        if varobj.children.is_empty() {
            let list = Command::Mi(MiCommand::ListChildren { name });
            if !self.send_user(list, true) {
                return Ok(());
            }
        } else {
            if varobj.dynamic && !name.contains('.') {
                return Err("Cannot collapse a dynamic variable.");
            }
            let children: Vec<String> = varobj.children.keys().cloned().collect();
            for child in children {
                self.oob.push(VarObjCmd::Delete { name: child });
            }
            self.clicmd_notify("dummy", false, true);
        }
        self.foldlnum = Some(lnum);
        Ok(())
    }

    fn cmd_setfmtvar(&mut self, args: &str) {
        let words: Vec<&str> = args.split_whitespace().collect();
        let (name, format) = match words.as_slice() {
            [name, format] => (*name, *format),
            _ => {
                self.nb.console_print("Invalid arguments.\n");
                self.print_prompt();
                return;
            }
        };
        if !FORMATS.contains(&format) {
            self.nb.console_print(&format!(
                "'{}' is an invalid format, must be one of ({}).\n",
                format,
                FORMATS
                    .iter()
                    .map(|f| format!("'{}'", f))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            self.print_prompt();
            return;
        }

        if self.info.varobj.leaf(name).is_some() {
            let set_format = Command::Mi(MiCommand::VarSetFormat {
                name: name.to_string(),
                format: format.to_string(),
            });
            if self.send_user(set_format, true) {
                self.oob.push(VarObjCmd::Evaluate {
                    name: name.to_string(),
                });
            }
            return;
        }
        self.nb.console_print(&format!("\"{}\" not found.\n", name));
        self.print_prompt();
    }

    fn cmd_project(&mut self, args: &str) {
        if args.is_empty() {
            self.nb.console_print("Invalid argument.\n");
            self.print_prompt();
            return;
        }
        self.clicmd_notify(&format!("project {}", args), false, true);
        // The prompt is printed after the project is saved.
        self.gdb_busy = false;
    }

    fn cmd_loglevel(&mut self, level: &str) {
        if level.is_empty() {
            let current = log::max_level().to_string().to_lowercase();
            self.nb
                .console_print(&format!("The log level is currently '{}'.\n", current));
        } else {
            match LevelFilter::from_str(level) {
                Ok(filter) => {
                    log::set_max_level(filter);
                    info!(target: "gdb", "log level set to {}", filter);
                }
                Err(_) => self
                    .nb
                    .console_print(&format!("'{}' is not a valid log level.\n", level)),
            }
        }
        self.print_prompt();
    }

    pub(crate) fn cmd_quit(&mut self) {
        match self.state {
            State::Init => {
                self.nb
                    .console_print("Ignoring 'quit' command on startup.\n");
                return;
            }
            State::Closing => return,
            _ => {}
        }

        if let Some(status) = self.pid_status.clone() {
            self.state = State::Closing;
            self.nb.console_print(&format!("\n{}\n", status));
            if let Some(project) = self.project.clone() {
                self.info.save_project(&project, true);
                self.apply_effects();
            }
            self.nb.console_print("Closing this gdb session.\n");
            self.nb.console_print("\n===========\n");
            self.nb.flush_console(None);
            self.close();
            return;
        }

        self.state = State::Quitting;
        self.sendintr();
        if self.accepting_cmd() {
            let cmd = match &self.project {
                Some(project) => format!("project {}", project),
                None => "dummy".to_string(),
            };
            self.clicmd_notify(&cmd, false, true);
        } else {
            self.state = State::Closing;
            self.close();
        }
    }

    fn cmd_sigint(&mut self) {
        if self.state == State::Init {
            self.nb
                .console_print("Ignoring 'sigint' command on startup.\n");
            return;
        }
        self.sendintr();
        self.nb.console_print("Quit\n");
        // gdb does not answer an interrupt when idle.
        if self.accepting_cmd() {
            let prompt = self.prompt.clone();
            self.nb.console_timeout_print(&prompt);
        }
    }

    /// Evaluate the text under the mouse, while the debuggee is stopped
    pub(crate) fn balloon_text(&mut self, text: &str) {
        self.last_balloon = text.to_string();
        if self.info.frame.is_some() {
            self.send_user(
                Command::ShowBalloon {
                    text: text.to_string(),
                },
                false,
            );
        }
    }
}
