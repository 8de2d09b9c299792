//! Netbeans message codec
//!
//! This module parses the line oriented netbeans messages received from the
//! editor (events and function replies) and encodes the commands and
//! functions sent to it.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_EVENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<buf_id>\d+):(?P<name>[^\s=]+)=(?P<seqno>\d+)\s*(?P<args>.*?)\s*$")
        .expect("valid event regex")
});
static RE_REPLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<seqno>\d+)\s*(?P<args>.*?)\s*$").expect("valid reply regex")
});
static RE_AUTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*AUTH\s*(?P<passwd>\S+)\s*$").expect("valid auth regex"));
static RE_LNUMCOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<lnum>\d+)/(?P<col>\d+)").expect("valid lnum/col regex"));

/// The keyAtPos primary string has already been parsed by the editor as a
/// string expression and must not be unquoted twice.
const RAW_STRING_EVENT: &str = "keyAtPos";

/// An event sent by the editor: `bufID:name=seqno [args]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub buf_id: u32,
    pub name: String,
    pub seqno: u32,
    pub nbstring: String,
    pub args: Vec<String>,
}

/// A reply to a function call: `seqno [args]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub seqno: u32,
    pub nbstring: String,
    pub args: Vec<String>,
}

/// A parsed netbeans message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Event(Event),
    Reply(Reply),
}

impl Event {
    /// Encode the event the way the editor sends it
    pub fn encode(&self) -> String {
        let mut msg = format!("{}:{}={}", self.buf_id, self.name, self.seqno);
        push_args(&mut msg, &self.nbstring, &self.args, self.name != RAW_STRING_EVENT);
        msg
    }
}

impl Reply {
    /// Encode the reply the way the editor sends it
    pub fn encode(&self) -> String {
        let mut msg = self.seqno.to_string();
        push_args(&mut msg, &self.nbstring, &self.args, true);
        msg
    }
}

fn push_args(msg: &mut String, nbstring: &str, args: &[String], escape: bool) {
    if !nbstring.is_empty() {
        msg.push(' ');
        if escape {
            msg.push_str(&quote(nbstring));
        } else {
            msg.push('"');
            msg.push_str(nbstring);
            msg.push('"');
        }
    }
    for arg in args {
        msg.push(' ');
        msg.push_str(arg);
    }
}

/// Parse a received netbeans message.
///
/// Return `None` when the message matches neither the event nor the reply
/// grammar; the message is logged and must be discarded.
pub fn parse_msg(msg: &str) -> Option<Message> {
    let (caps, event) = match RE_EVENT.captures(msg) {
        Some(caps) => {
            let name = caps["name"].to_string();
            (caps, Some(name))
        }
        None => match RE_REPLY.captures(msg) {
            Some(caps) => (caps, None),
            None => {
                log::error!(target: "nb", "discarding invalid netbeans message: \"{}\"", msg);
                return None;
            }
        },
    };

    let seqno = match caps["seqno"].parse::<u32>() {
        Ok(seqno) => seqno,
        Err(_) => {
            log::error!(target: "nb", "discarding netbeans message with bad seqno: \"{}\"", msg);
            return None;
        }
    };
    let args = caps["args"].trim();
    let unescape = event.as_deref() != Some(RAW_STRING_EVENT);
    let (nbstring, arg_list) = split_args(args, unescape);

    match event {
        Some(name) => {
            let buf_id = match caps["buf_id"].parse::<u32>() {
                Ok(buf_id) => buf_id,
                Err(_) => {
                    log::error!(target: "nb", "discarding netbeans message with bad bufID: \"{}\"", msg);
                    return None;
                }
            };
            Some(Message::Event(Event {
                buf_id,
                name,
                seqno,
                nbstring,
                args: arg_list,
            }))
        }
        None => Some(Message::Reply(Reply {
            seqno,
            nbstring,
            args: arg_list,
        })),
    }
}

/// Split the arguments into the leading quoted string and the remaining
/// whitespace separated tokens
fn split_args(args: &str, unescape: bool) -> (String, Vec<String>) {
    let mut nbstring = String::new();
    let mut rest = args;
    if let Some(stripped) = args.strip_prefix('"') {
        if let Some(end) = stripped.rfind('"') {
            let inner = &stripped[..end];
            nbstring = if unescape {
                unquote(inner)
            } else {
                inner.to_string()
            };
            rest = &stripped[end + 1..];
        }
    }
    let arg_list = rest.split_whitespace().map(str::to_string).collect();
    (nbstring, arg_list)
}

/// Return the password of an `AUTH` message
pub fn parse_auth(msg: &str) -> Option<&str> {
    RE_AUTH
        .captures(msg)
        .and_then(|caps| caps.name("passwd"))
        .map(|m| m.as_str())
}

/// Parse the `lnum/col` argument of a keyAtPos event
pub fn parse_lnum_col(arg: &str) -> Option<(u32, u32)> {
    let caps = RE_LNUMCOL.captures(arg)?;
    let lnum = caps["lnum"].parse().ok()?;
    let col = caps["col"].parse().ok()?;
    Some((lnum, col))
}

/// Quote `msg` and escape its special characters
pub fn quote(msg: &str) -> String {
    let mut quoted = String::with_capacity(msg.len() + 2);
    quoted.push('"');
    for ch in msg.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            '\\' => quoted.push_str("\\\\"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

/// Remove the escapes of the escaped characters in a quoted string.
///
/// Unknown escape sequences are kept verbatim.
pub fn unquote(msg: &str) -> String {
    let mut result = String::with_capacity(msg.len());
    let mut chars = msg.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('"') => result.push('"'),
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

/// Netbeans sequence number counter, wrapping back to one
#[derive(Debug, Default)]
pub struct SeqNo {
    last: u32,
}

impl SeqNo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the next sequence number
    pub fn next(&mut self) -> u32 {
        self.last = self.last.checked_add(1).unwrap_or(1);
        self.last
    }

    /// The sequence number that `next` will return
    pub fn peek(&self) -> u32 {
        self.last.checked_add(1).unwrap_or(1)
    }
}

/// Format a command, no reply expected: `bufID:name!seqno [args]`
pub fn format_cmd(buf_id: u32, name: &str, seqno: u32, args: &str) -> String {
    format_request(buf_id, name, '!', seqno, args)
}

/// Format a function call, a reply is expected: `bufID:name/seqno [args]`
pub fn format_function(buf_id: u32, name: &str, seqno: u32, args: &str) -> String {
    format_request(buf_id, name, '/', seqno, args)
}

fn format_request(buf_id: u32, name: &str, sep: char, seqno: u32, args: &str) -> String {
    if args.is_empty() {
        format!("{}:{}{}{}\n", buf_id, name, sep, seqno)
    } else {
        format!("{}:{}{}{} {}\n", buf_id, name, sep, seqno, args)
    }
}
