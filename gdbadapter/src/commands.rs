/// GDB commands and the table of the pending results
///
/// Each command sent to gdb is prefixed with a token and stored in the
/// `ResultTable` until its result record is received. The command then
/// processes the stream records that gdb printed and its result.

use log::{debug, error, info, warn};
use std::collections::HashMap;

use crate::info::{Effect, Info};
use crate::oob::OobKind;
use crate::parser::quote;
use crate::records::from_list;
use crate::types::{ResultClass, ResultRecord};
use crate::varobj::VarObj;

/// The first token, tokens wrap in the 100..199 range
pub const FIRST_TOKEN: u32 = 100;

/// Commands on the watched variables
#[derive(Debug, Clone, PartialEq)]
pub enum MiCommand {
    VarCreate { exp: String, varnum: u32 },
    VarDelete { name: String },
    VarSetFormat { name: String, format: String },
    ListChildren { name: String },
}

/// Varobj commands queued to the out of band cycle
#[derive(Debug, Clone, PartialEq)]
pub enum VarObjCmd {
    Evaluate { name: String },
    Delete { name: String },
}

impl VarObjCmd {
    pub fn name(&self) -> &str {
        match self {
            VarObjCmd::Evaluate { name } | VarObjCmd::Delete { name } => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A console command typed by the user
    Cli {
        line: String,
        /// The prompt is printed by one of the out of band commands
        no_prompt: bool,
        stream: String,
    },
    /// Completion of a command line
    Complete {
        args: String,
        /// Removed from the completion candidates printed by gdb
        prefix: String,
        stream: String,
    },
    Mi(MiCommand),
    /// Evaluate the expression under the mouse
    ShowBalloon { text: String },
    Oob {
        kind: OobKind,
        /// The user command line that triggered the out of band command
        cmd: String,
    },
    VarObj(VarObjCmd),
}

impl Command {
    pub fn cli(line: &str) -> Self {
        Command::Cli {
            line: line.to_string(),
            no_prompt: false,
            stream: String::new(),
        }
    }

    /// The empty command used to trigger an out of band cycle
    pub fn no_prompt(line: &str) -> Self {
        Command::Cli {
            line: line.to_string(),
            no_prompt: true,
            stream: String::new(),
        }
    }

    pub fn complete(args: &str) -> Self {
        let prefix = match args.trim_end().rsplit_once(char::is_whitespace) {
            Some((_, last)) => args[..args.rfind(last).unwrap_or(0)].to_string(),
            // A command terminated with white space, or a command being
            // completed.
            None if args.trim_end().len() != args.len() => args.to_string(),
            None => String::new(),
        };
        Command::Complete {
            args: args.to_string(),
            prefix,
            stream: String::new(),
        }
    }

    /// The command text sent to gdb after the token
    pub fn line(&self) -> String {
        match self {
            Command::Cli { line, .. } => format!("-interpreter-exec console {}\n", quote(line)),
            Command::Complete { args, .. } => format!(
                "-interpreter-exec console {}\n",
                quote(&format!("complete {}", args))
            ),
            Command::Mi(MiCommand::VarCreate { exp, varnum }) => {
                format!("-var-create var{} * {}\n", varnum, quote(exp))
            }
            Command::Mi(MiCommand::VarDelete { name }) => format!("-var-delete {}\n", name),
            Command::Mi(MiCommand::VarSetFormat { name, format }) => {
                format!("-var-set-format {} {}\n", name, format)
            }
            Command::Mi(MiCommand::ListChildren { name }) => {
                format!("-var-list-children --all-values {}\n", name)
            }
            Command::ShowBalloon { text } => {
                format!("-data-evaluate-expression {}\n", quote(text))
            }
            Command::Oob { kind, .. } => kind.gdb_cmd().unwrap_or_default().to_string(),
            Command::VarObj(VarObjCmd::Evaluate { name }) => {
                format!("-var-evaluate-expression {}\n", name)
            }
            Command::VarObj(VarObjCmd::Delete { name }) => format!("-var-delete {}\n", name),
        }
    }

    /// A command issued by the user, as opposed to the out of band commands
    pub fn is_user(&self) -> bool {
        matches!(
            self,
            Command::Cli { .. } | Command::Complete { .. } | Command::Mi(_) | Command::ShowBalloon { .. }
        )
    }

    /// The prompt is printed at the end of the out of band cycle
    pub fn prints_prompt(&self) -> bool {
        !matches!(
            self,
            Command::Cli { no_prompt: true, .. } | Command::ShowBalloon { .. } | Command::Complete { .. }
        )
    }

    /// The error message of the result is printed in the console
    pub fn prints_errors(&self) -> bool {
        matches!(self, Command::Cli { .. } | Command::Complete { .. } | Command::Mi(_))
    }

    /// The stream text of a console command
    pub fn cli_stream(&self) -> Option<&str> {
        match self {
            Command::Cli { stream, .. } | Command::Complete { stream, .. } => Some(stream),
            _ => None,
        }
    }

    /// Process the stream records printed by gdb for this command
    pub fn handle_stream(&mut self, record: &str, info: &mut Info) {
        if record.is_empty() {
            return;
        }
        match self {
            Command::Cli { stream, .. } => {
                info.push_effect(Effect::Console(record.to_string()));
                *stream = record.to_string();
            }
            Command::Complete { stream, .. } => stream.push_str(record),
            Command::Mi(_) | Command::VarObj(_) => info.push_effect(Effect::Console(record.to_string())),
            Command::ShowBalloon { .. } => info.push_effect(Effect::Balloon(record.to_string())),
            Command::Oob { kind, .. } => {
                if kind.is_mi() {
                    debug!(target: "mi", "{:?}: ignoring stream record {:?}", kind, record);
                } else {
                    info.handle_oob_stream(*kind, record);
                }
            }
        }
    }

    /// Process the result record
    pub fn handle_result(&mut self, record: &ResultRecord, info: &mut Info) {
        match self {
            Command::Cli { .. } => debug!(target: "mi", "CliCommand gdb/mi result: {:?}", record.class),
            Command::Complete { prefix, stream, .. } => {
                if record.class == ResultClass::Done {
                    let completion = stream
                        .lines()
                        .filter_map(|line| line.strip_prefix(prefix.as_str()))
                        .map(str::to_string)
                        .collect();
                    info.push_effect(Effect::Completion(completion));
                }
            }
            Command::Mi(mi) => handle_mi_result(mi, record, info),
            Command::ShowBalloon { text } => {
                if let Some(value) = record.get_str("value").filter(|v| !v.is_empty()) {
                    info.push_effect(Effect::Balloon(format!("{} = \"{}\"", text, value)));
                }
            }
            Command::Oob { kind, cmd } => info.handle_oob_result(*kind, record, cmd),
            Command::VarObj(VarObjCmd::Evaluate { name }) => {
                let value = match record.get_str("value") {
                    Some(value) => value,
                    None => return,
                };
                if let Some(varobj) = info.varobj.leaf_mut(name) {
                    if varobj.value != value {
                        varobj.value = value.to_string();
                        varobj.chged = true;
                        info.varobj.dirty = true;
                    }
                }
            }
            Command::VarObj(VarObjCmd::Delete { name }) => {
                if record.get_str("ndeleted").is_some() {
                    info.varobj.remove(name);
                }
            }
        }
    }
}

fn handle_mi_result(mi: &MiCommand, record: &ResultRecord, info: &mut Info) {
    match mi {
        MiCommand::VarCreate { exp, .. } => {
            info.varnum += 1;
            let mut varobj = VarObj::new(exp);
            match varobj.update(&record.results) {
                Some(()) => info.varobj.insert(varobj),
                None => error!(target: "mi", "in varobj creation of {:?}", record.results),
            }
        }
        MiCommand::VarDelete { name } => {
            if let Some(ndeleted) = record.get_str("ndeleted") {
                if info.varobj.remove(name) {
                    info.push_effect(Effect::Console(format!(
                        "{} watched variables have been deleted\n",
                        ndeleted
                    )));
                }
            }
        }
        MiCommand::VarSetFormat { name, .. } => {
            if let Some(value) = record.get_str("value") {
                info.push_effect(Effect::Console(format!("{} = {}\n", name, value)));
            }
        }
        MiCommand::ListChildren { name } => {
            let children = from_list(record.results.get("children"), VarObj::from_tuple);
            if children.is_empty() {
                return;
            }
            match info.varobj.leaf_mut(name) {
                Some(varobj) => {
                    for child in children {
                        varobj.children.insert(child.name.clone(), child);
                    }
                    info.varobj.dirty = true;
                }
                None => warn!(target: "mi", "cannot find \"{}\" varobj", name),
            }
        }
    }
}

/// Storage for the commands whose result is pending, keyed by token
#[derive(Debug)]
pub struct ResultTable {
    token: u32,
    pending: HashMap<u32, Command>,
}

impl Default for ResultTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultTable {
    pub fn new() -> Self {
        ResultTable {
            token: FIRST_TOKEN,
            pending: HashMap::new(),
        }
    }

    /// Store the command and return its token
    ///
    /// An out of band command is refused when a command of the same kind is
    /// already pending.
    pub fn add(&mut self, command: Command) -> Option<u32> {
        if let Command::Oob { kind, .. } = &command {
            let duplicate = self
                .pending
                .values()
                .any(|cmd| matches!(cmd, Command::Oob { kind: k, .. } if k == kind));
            if duplicate {
                return None;
            }
        }
        let token = self.token;
        if self.pending.contains_key(&token) {
            error!(target: "mi", "token \"{}\" already exists as an expected pending result", token);
        }
        self.pending.insert(token, command);
        self.token = (self.token + 1) % 100 + 100;
        Some(token)
    }

    /// Remove the command awaiting the result with this token
    pub fn remove(&mut self, token: u32) -> Option<Command> {
        let command = self.pending.remove(&token);
        if command.is_none() {
            // May occur on quitting.
            info!(target: "mi", "no token \"{}\" as an expected pending result", token);
        }
        command
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_gdb_output;
    use crate::types::GdbOutput;

    fn record(line: &str) -> ResultRecord {
        match parse_gdb_output(line).unwrap() {
            GdbOutput::Result(record) => record,
            other => panic!("not a result record: {:?}", other),
        }
    }

    fn info() -> Info {
        Info::new(&[])
    }

    #[test]
    fn test_tokens_wrap() {
        let mut table = ResultTable::new();
        assert_eq!(table.add(Command::cli("next")), Some(100));
        for _ in 0..99 {
            table.add(Command::cli("next"));
        }
        assert_eq!(table.len(), 100);
        assert!(table.remove(199).is_some());
        assert_eq!(table.add(Command::cli("next")), Some(100));
    }

    #[test]
    fn test_one_oob_of_a_kind() {
        let mut table = ResultTable::new();
        let oob = Command::Oob {
            kind: OobKind::Breakpoints,
            cmd: String::new(),
        };
        assert_eq!(table.add(oob.clone()), Some(100));
        assert_eq!(table.add(oob.clone()), None);
        assert_eq!(
            table.add(Command::Oob {
                kind: OobKind::Frame,
                cmd: String::new()
            }),
            Some(101)
        );
        assert_eq!(table.remove(100), Some(oob));
        assert_eq!(table.remove(100), None);
    }

    #[test]
    fn test_lines() {
        assert_eq!(
            Command::cli("break \"foo.c\":3").line(),
            "-interpreter-exec console \"break \\\"foo.c\\\":3\"\n"
        );
        assert_eq!(
            Command::Mi(MiCommand::VarCreate {
                exp: "len".into(),
                varnum: 3
            })
            .line(),
            "-var-create var3 * \"len\"\n"
        );
        assert_eq!(
            Command::Oob {
                kind: OobKind::Pwd,
                cmd: String::new()
            }
            .line(),
            "-environment-pwd\n"
        );
    }

    #[test]
    fn test_complete() {
        let mut cmd = Command::complete("break ma");
        assert!(matches!(&cmd, Command::Complete { prefix, .. } if prefix == "break "));
        let mut info = info();
        cmd.handle_stream("break main\nbreak malloc\n", &mut info);
        cmd.handle_result(&record("^done"), &mut info);
        assert_eq!(
            info.drain_effects(),
            vec![Effect::Completion(vec!["main".into(), "malloc".into()])]
        );

        assert!(matches!(Command::complete("info "), Command::Complete { prefix, .. } if prefix == "info "));
        assert!(matches!(Command::complete("inf"), Command::Complete { prefix, .. } if prefix.is_empty()));
    }

    #[test]
    fn test_prompt_and_errors() {
        assert!(Command::cli("next").prints_prompt());
        assert!(!Command::no_prompt("").prints_prompt());
        assert!(!Command::ShowBalloon { text: "x".into() }.prints_prompt());
        assert!(!Command::ShowBalloon { text: "x".into() }.prints_errors());
        assert!(Command::Mi(MiCommand::VarDelete { name: "var1".into() }).prints_errors());
        assert!(!Command::VarObj(VarObjCmd::Delete { name: "var1".into() }).is_user());
    }

    #[test]
    fn test_varobj_lifecycle() {
        let mut info = info();
        let mut create = Command::Mi(MiCommand::VarCreate {
            exp: "len".into(),
            varnum: 1,
        });
        create.handle_result(&record(r#"^done,name="var1",numchild="0",value="1",type="int",has_more="0""#), &mut info);
        assert_eq!(info.varnum, 2);
        assert_eq!(info.varobj.leaf("var1").unwrap().exp, "len");

        let mut evaluate = Command::VarObj(VarObjCmd::Evaluate { name: "var1".into() });
        info.varobj.collect();
        info.varobj.collect();
        evaluate.handle_result(&record(r#"^done,value="2""#), &mut info);
        assert!(info.varobj.dirty);
        assert_eq!(info.varobj.leaf("var1").unwrap().value, "2");

        let mut format = Command::Mi(MiCommand::VarSetFormat {
            name: "var1".into(),
            format: "binary".into(),
        });
        format.handle_result(&record(r#"^done,format="binary",value="10""#), &mut info);

        let mut delete = Command::Mi(MiCommand::VarDelete { name: "var1".into() });
        delete.handle_result(&record(r#"^done,ndeleted="1""#), &mut info);
        assert!(info.varobj.root.is_empty());
        assert_eq!(
            info.drain_effects(),
            vec![
                Effect::Console("var1 = 10\n".into()),
                Effect::Console("1 watched variables have been deleted\n".into()),
            ]
        );
    }

    #[test]
    fn test_list_children() {
        let mut info = info();
        let mut create = Command::Mi(MiCommand::VarCreate {
            exp: "map".into(),
            varnum: 1,
        });
        create.handle_result(&record(r#"^done,name="var1",numchild="2",type="struct map""#), &mut info);
        let mut children = Command::Mi(MiCommand::ListChildren { name: "var1".into() });
        children.handle_result(
            &record(r#"^done,numchild="2",children=[child={name="var1.key",exp="key",numchild="0",value="1",type="int"},child={name="var1.value",exp="value",numchild="0",value="0x0",type="char *"}],has_more="0""#),
            &mut info,
        );
        assert_eq!(info.varobj.leaf("var1").unwrap().children.len(), 2);
        assert!(info.varobj.leaf("var1.value").is_some());
    }

    #[test]
    fn test_balloon() {
        let mut info = info();
        let mut balloon = Command::ShowBalloon { text: "len".into() };
        balloon.handle_result(&record(r#"^done,value="3""#), &mut info);
        assert_eq!(info.drain_effects(), vec![Effect::Balloon("len = \"3\"".into())]);
    }
}
