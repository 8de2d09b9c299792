/// Integration tests for the GDB adapter
///
/// These tests drive the result table, the out of band list and the
/// debugger state with recorded gdb output, the way a session does.

use gdbadapter::*;
use std::fs;

fn result(line: &str) -> ResultRecord {
    match parse_gdb_output(line).unwrap() {
        GdbOutput::Result(record) => record,
        other => panic!("Expected result record: {:?}", other),
    }
}

fn commands() -> Vec<String> {
    process::DEFAULT_COMMANDS.iter().map(|c| c.to_string()).collect()
}

/// Run a complete out of band cycle, answering each command with `reply`
fn run_cycle<F>(oob: &mut OobList, info: &mut Info, mut reply: F)
where
    F: FnMut(&Command) -> (String, String),
{
    let mut table = ResultTable::new();
    oob.start_cycle();
    while let Some(item) = oob.next_item() {
        let mut command = match item {
            OobItem::Entry(kind) => match oob.take_armed(kind) {
                Some(cmd) if kind.gdb_cmd().is_some() => {
                    info.reset(kind);
                    Command::Oob { kind, cmd }
                }
                _ => continue,
            },
            OobItem::VarObj(cmd) => Command::VarObj(cmd),
        };
        let token = table.add(command.clone()).unwrap();
        let (stream, record) = reply(&command);
        let record = result(&format!("{}{}", token, record));
        command.handle_stream(&stream, info);
        table.remove(token).unwrap();
        command.handle_result(&record, info);
    }
    assert!(table.is_empty());
}

#[test]
fn test_breakpoint_and_frame_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("foo.c");
    fs::write(&source, "int main() {}\n").unwrap();
    let fullname = source.to_string_lossy().into_owned();

    let mut oob = OobList::new(&GdbVersion::new(&[7, 6]), &commands());
    let mut info = Info::new(&commands());
    info.cwd = Some(dir.path().to_string_lossy().into_owned());

    oob.notify("break foo.c:3");
    let bkpt = format!(
        r#"^done,BreakpointTable={{nr_rows="1",nr_cols="6",body=[bkpt={{number="1",type="breakpoint",disp="keep",enabled="y",addr="0x0804852f",func="main",file="foo.c",fullname="{}",line="3",times="0"}}]}}"#,
        fullname
    );
    run_cycle(&mut oob, &mut info, |command| match command {
        Command::Oob { kind: OobKind::Breakpoints, .. } => (String::new(), bkpt.clone()),
        Command::Oob { kind: OobKind::Pwd, .. } => panic!("pwd is not triggered by break"),
        _ => (String::new(), "^done".to_string()),
    });
    let effects = info.drain_effects();
    assert!(effects.contains(&Effect::AddBp { id: 1, path: fullname.clone(), lnum: 3 }));
    assert!(effects.contains(&Effect::HideFrame));
    assert!(info.bp_dirty);

    oob.notify("run");
    let frame = format!(
        r#"^done,frame={{level="0",addr="0x0804852f",func="main",file="foo.c",fullname="{}",line="3"}}"#,
        fullname
    );
    let mut sent = Vec::new();
    run_cycle(&mut oob, &mut info, |command| {
        sent.push(command.line());
        match command {
            Command::Oob { kind: OobKind::Frame, .. } => (String::new(), frame.clone()),
            Command::Oob { kind: OobKind::Threads, .. } => (
                String::new(),
                r#"^done,threads=[{id="1",target-id="process 4242",name="foo",state="stopped"}],current-thread-id="1""#.to_string(),
            ),
            Command::Oob { kind: OobKind::PgmFile, .. } => (
                "Symbols from \"/tmp/foo\".\nLocal exec file:\n".to_string(),
                "^done".to_string(),
            ),
            _ => (String::new(), "^done".to_string()),
        }
    });
    assert!(sent.contains(&"-stack-info-frame\n".to_string()));
    assert!(sent.contains(&"-thread-info\n".to_string()));
    assert_eq!(info.debuggee.as_deref(), Some("/tmp/foo"));
    assert!(info.threads_dirty);
    assert!(info
        .drain_effects()
        .contains(&Effect::ShowFrame { path: fullname, lnum: 3 }));
    assert!(info.collect_threads().contains("* 1   foo"));
}

#[test]
fn test_varobj_commands_follow_the_catalogue() {
    let mut oob = OobList::new(&GdbVersion::new(&[7, 6]), &commands());
    let mut info = Info::new(&commands());
    let mut create = Command::Mi(MiCommand::VarCreate { exp: "len".into(), varnum: 1 });
    create.handle_result(
        &result(r#"^done,name="var1",numchild="0",value="1",type="int""#),
        &mut info,
    );
    oob.push(VarObjCmd::Evaluate { name: "var1".into() });

    let mut order = Vec::new();
    run_cycle(&mut oob, &mut info, |command| {
        order.push(command.clone());
        match command {
            Command::VarObj(_) => (String::new(), r#"^done,value="42""#.to_string()),
            _ => (String::new(), "^done".to_string()),
        }
    });
    assert!(matches!(order.last(), Some(Command::VarObj(VarObjCmd::Evaluate { .. }))));
    assert!(info.varobj.collect().contains("={*}42"));
}

#[test]
fn test_error_result_runs_no_action() {
    let mut info = Info::new(&commands());
    info.cwd = Some("/tmp".into());
    let mut command = Command::Oob { kind: OobKind::Pwd, cmd: "cd /".into() };
    command.handle_result(&result(r#"^error,msg="No such directory.""#), &mut info);
    assert_eq!(info.cwd.as_deref(), Some("/tmp"));
}
