use netbeans::*;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

fn connect() -> (Netbeans, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut nb = Netbeans::new(tx, "changeme", 100, Colors::default());
    nb.handle_message("AUTH changeme").unwrap();
    nb.handle_message("0:version=0 \"2.5\"").unwrap();
    assert_eq!(nb.handle_message("0:startupDone=0").unwrap(), Some(NbEvent::Ready));
    nb.started = true;
    (nb, rx)
}

/// The report buffers are created on the first editor command
fn first_command(nb: &mut Netbeans, rx: &mut mpsc::UnboundedReceiver<String>) {
    let event = nb.handle_message("0:keyAtPos=0 \"help\" 0 1/0").unwrap();
    assert!(matches!(event, Some(NbEvent::Command { pathname: None, .. })));
    drain(rx);
}

fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
    let mut sent = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        sent.push(msg);
    }
    sent
}

#[test]
fn test_disabled_breakpoint_render() {
    let (mut nb, mut rx) = connect();
    assert!(nb.add_bp(1, "/tmp/a.c", 5));
    assert!(nb.update_bp(1, true));

    let buf = nb.buffers.find("/tmp/a.c").unwrap();
    let kinds: Vec<(AnnoKind, u32)> = buf.annotations().map(|a| (a.kind(), a.lnum)).collect();
    assert_eq!(kinds, vec![(AnnoKind::Disabled, 5)]);

    let sent = drain(&mut rx);
    let added: Vec<&String> = sent.iter().filter(|msg| msg.contains(":addAnno!")).collect();
    // bpEnabled is type 1, bpDisabled is type 2.
    assert_eq!(added.len(), 2);
    assert!(added[0].ends_with(" 1 1 5/0 -1\n"));
    assert!(added[1].ends_with(" 1 2 5/0 -1\n"));
    assert!(sent.iter().any(|msg| msg.contains(":removeAnno!") && msg.ends_with(" 1\n")));
}

#[test]
fn test_two_frames_leave_one() {
    let (mut nb, _rx) = connect();
    nb.show_frame(Some(("/tmp/a.c", 3)));
    nb.show_frame(Some(("/tmp/a.c", 4)));
    let frames: Vec<u32> = nb
        .buffers
        .find("/tmp/a.c")
        .unwrap()
        .annotations()
        .filter(|a| a.kind() == AnnoKind::Frame)
        .map(|a| a.lnum)
        .collect();
    assert_eq!(frames, vec![4]);
}

#[test]
fn test_key_at_pos_dispatch() {
    let (mut nb, mut rx) = connect();
    nb.add_bp(1, "/tmp/a.c", 5);
    drain(&mut rx);

    let event = nb
        .handle_message("1:keyAtPos=0 \"break main\" 0 5/2")
        .unwrap();
    assert_eq!(
        event,
        Some(NbEvent::Command {
            cmd: "break".into(),
            args: "main".into(),
            buf_id: 1,
            pathname: Some("/tmp/a.c".into()),
            lnum: 5,
        })
    );
    assert_eq!(nb.tr.last_pos, Some(Cursor { buf_id: 1, lnum: 5, col: 2 }));

    // The console is created and registered on the first command.
    let sent = drain(&mut rx);
    assert!(sent[0].contains(":editFile!") && sent[0].contains("(clewn)_console"));
    assert!(nb.console.is_some());

    assert_eq!(nb.handle_message("2:keyAtPos=0 \"ClewnBuffer.variables.open\" 0 1/0").unwrap(), None);
    assert!(nb.report(ReportKind::Variables).unwrap().visible);
}

#[test]
fn test_quit_ignored_before_start() {
    let (mut nb, _rx) = connect();
    nb.started = false;
    nb.add_bp(1, "/tmp/a.c", 5);
    assert_eq!(nb.handle_message("1:keyAtPos=0 \"quit\" 0 1/0").unwrap(), None);
    assert!(nb.console.is_none());
}

#[test]
fn test_invalid_messages_are_not_fatal() {
    let (mut nb, _rx) = connect();
    assert_eq!(nb.handle_message("this is garbage").unwrap(), None);
    assert_eq!(nb.handle_message("9:unknownEvent=0").unwrap(), None);
    match nb.handle_message("42") {
        Err(NetbeansError::OrphanReply(42)) => {}
        other => panic!("Expected OrphanReply, got {:?}", other),
    }
}

#[test]
fn test_edit_error_resynchronizes_report() {
    let (mut nb, mut rx) = connect();
    first_command(&mut nb, &mut rx);
    nb.update_report(ReportKind::Breakpoints, true, None, || "a\nb\n".to_string());
    assert_eq!(nb.report(ReportKind::Breakpoints).unwrap().len, 4);

    let sent = drain(&mut rx);
    assert_eq!(sent[4], "3:insert/7 0 \"a\\n\"\n");
    assert_eq!(sent[5], "3:insert/8 2 \"b\\n\"\n");

    nb.handle_message("7").unwrap();
    nb.handle_message("8 -1 cannot insert").unwrap();
    let report = nb.report(ReportKind::Breakpoints).unwrap();
    assert!(report.dirty);
    assert_eq!(report.len, 0);
    assert_eq!(report.getlength_count, 2);

    let sent = drain(&mut rx);
    assert_eq!(sent[0], "3:getLength/11\n");
    assert!(sent.contains(&"3:remove/14 0 4\n".to_string()));
    assert!(sent.contains(&"3:getLength/15\n".to_string()));
    assert!(sent.last().unwrap().starts_with("0:showBalloon!18 "));

    // Only the last length reply is checked.
    nb.handle_message("11 0").unwrap();
    nb.handle_message("15 0").unwrap();
    assert_eq!(nb.report(ReportKind::Breakpoints).unwrap().getlength_count, 0);

    // The dirty report is restored on the next update.
    nb.update_report(ReportKind::Breakpoints, false, None, || "a\nb\n".to_string());
    let report = nb.report(ReportKind::Breakpoints).unwrap();
    assert!(!report.dirty);
    assert_eq!(report.len, 4);
}

#[test]
fn test_killed_report_is_cleared() {
    let (mut nb, mut rx) = connect();
    first_command(&mut nb, &mut rx);
    nb.update_report(ReportKind::Threads, true, None, || "* 1 main\n".to_string());
    let buf_id = nb.report(ReportKind::Threads).unwrap().buf_id;

    nb.handle_message(&format!("{}:killed=0", buf_id)).unwrap();
    let report = nb.report(ReportKind::Threads).unwrap();
    assert!(!report.registered);
    assert_eq!(report.len, 0);
}

#[test]
fn test_file_opened_registers_buffer() {
    let (mut nb, mut rx) = connect();
    nb.add_bp(1, "/tmp/a.c", 5);
    nb.handle_message("1:killed=0").unwrap();
    drain(&mut rx);

    nb.handle_message("0:fileOpened=0 \"/tmp/a.c\" T F").unwrap();
    let sent = drain(&mut rx);
    assert_eq!(sent[0], "1:putBufferNumber!7 \"/tmp/a.c\"\n");
    assert_eq!(sent[1], "1:stopDocumentListen!8\n");
    assert!(sent[2].starts_with("1:addAnno!9 1 1 5/0"));
}
