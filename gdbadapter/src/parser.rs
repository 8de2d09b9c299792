/// GDB/MI output parser
///
/// This module handles parsing GDB/MI protocol output into structured data.

use crate::types::*;
use std::collections::HashMap;
use std::iter::Peekable;
use std::str::Chars;

/// Parse a line of GDB/MI output
pub fn parse_gdb_output(line: &str) -> Result<GdbOutput, String> {
    let mut line = line.trim_end_matches(|c| c == '\n' || c == '\r');

    // The '> ' prompt of a multiple choice query precedes the next record.
    if line.starts_with("> ~\"") {
        line = &line[2..];
    }

    if line.trim_end() == "(gdb)" {
        return Ok(GdbOutput::Prompt);
    }
    if line.is_empty() {
        return Err("Empty line".into());
    }

    if let Some(stream) = parse_stream_record(line) {
        return stream.map(GdbOutput::Stream);
    }

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    let token = if digits > 0 {
        Some(
            line[..digits]
                .parse()
                .map_err(|_| format!("Invalid token: {}", line))?,
        )
    } else {
        None
    };
    let rest = &line[digits..];

    match rest.chars().next() {
        Some('^') => parse_result_record(token, &rest[1..]).map(GdbOutput::Result),
        Some('*') => parse_async_record(token, AsyncKind::Exec, &rest[1..]).map(GdbOutput::Async),
        Some('+') => parse_async_record(token, AsyncKind::Status, &rest[1..]).map(GdbOutput::Async),
        Some('=') => parse_async_record(token, AsyncKind::Notify, &rest[1..]).map(GdbOutput::Async),
        _ => Err(format!("Unknown GDB/MI output format: {}", line)),
    }
}

/// Level 1 annotations are output with `set annotate 1` and must be ignored
///
/// `~"\032\032FILENAME:LINE:CHARACTER:MIDDLE:ADDR"`
pub fn is_annotation(line: &str) -> bool {
    let mut chars = line.chars();
    matches!(chars.next(), Some('~') | Some('@') | Some('&'))
        && chars.as_str().starts_with("\"\\032\\032")
        && chars.as_str().matches(':').count() >= 4
}

/// Parse a stream record (console, target, or log output)
fn parse_stream_record(line: &str) -> Option<Result<StreamRecord, String>> {
    let stream_type = match line.chars().next()? {
        '~' => StreamType::Console,
        '@' => StreamType::Target,
        '&' => StreamType::Log,
        _ => return None,
    };

    Some(
        parse_c_string(&line[1..])
            .map(|content| StreamRecord {
                stream_type,
                content,
            })
            .ok_or_else(|| format!("Bad format in stream record: {}", line)),
    )
}

/// Parse a result record, the part following '^'
fn parse_result_record(token: Option<u32>, rest: &str) -> Result<ResultRecord, String> {
    let (class_str, results_str) = split_class(rest);

    let class = ResultClass::from_str(class_str)
        .ok_or_else(|| format!("Unknown result class: {}", class_str))?;

    let results = match results_str {
        Some(results_str) => parse_results(results_str)?,
        None => HashMap::new(),
    };

    Ok(ResultRecord {
        token,
        class,
        results,
    })
}

/// Parse an async record, the part following the prefix
fn parse_async_record(token: Option<u32>, kind: AsyncKind, rest: &str) -> Result<AsyncRecord, String> {
    let (class, results_str) = split_class(rest);
    if class.is_empty() {
        return Err("Empty async class".into());
    }

    let results = match results_str {
        Some(results_str) => parse_results(results_str)?,
        None => HashMap::new(),
    };

    Ok(AsyncRecord {
        token,
        kind,
        class: class.to_string(),
        results,
    })
}

fn split_class(rest: &str) -> (&str, Option<&str>) {
    match rest.find(',') {
        Some(comma_pos) => (&rest[..comma_pos], Some(&rest[comma_pos + 1..])),
        None => (rest, None),
    }
}

/// Parse result key-value pairs
pub fn parse_results(input: &str) -> Result<HashMap<String, Value>, String> {
    let mut results = HashMap::new();
    let mut chars = input.chars().peekable();

    while chars.peek().is_some() {
        skip_blanks(&mut chars);
        if chars.peek().is_none() {
            break;
        }

        let key = parse_identifier(&mut chars)?;
        if chars.next() != Some('=') {
            return Err(format!("Expected '=' after key '{}'", key));
        }
        let value = parse_value(&mut chars)?;
        results.insert(key, value);

        skip_blanks(&mut chars);
        match chars.next() {
            Some(',') | None => {}
            Some(ch) => return Err(format!("Unexpected character '{}' after result", ch)),
        }
    }

    Ok(results)
}

fn skip_blanks(chars: &mut Peekable<Chars>) {
    while chars.peek().map_or(false, |c| c.is_whitespace()) {
        chars.next();
    }
}

/// Parse an identifier (key name)
fn parse_identifier(chars: &mut Peekable<Chars>) -> Result<String, String> {
    let mut identifier = String::new();

    while let Some(&ch) = chars.peek() {
        if ch.is_alphanumeric() || ch == '_' || ch == '-' {
            identifier.push(ch);
            chars.next();
        } else {
            break;
        }
    }

    if identifier.is_empty() {
        return Err("Empty identifier".into());
    }

    Ok(identifier)
}

/// Parse a value (string, list, or tuple)
fn parse_value(chars: &mut Peekable<Chars>) -> Result<Value, String> {
    skip_blanks(chars);
    match chars.peek() {
        Some('"') => {
            chars.next();
            parse_quoted(chars).map(Value::String)
        }
        Some('[') => {
            chars.next();
            let mut list = Vec::new();

            loop {
                skip_blanks(chars);
                match chars.peek() {
                    Some(']') => {
                        chars.next();
                        break;
                    }
                    None => return Err("Expected closing bracket".into()),
                    Some('"') | Some('[') | Some('{') => list.push(parse_value(chars)?),
                    Some(_) => {
                        // A list of results, the keys are dropped.
                        parse_identifier(chars)?;
                        if chars.next() != Some('=') {
                            return Err("Expected '=' in list".into());
                        }
                        list.push(parse_value(chars)?);
                    }
                }
                skip_blanks(chars);
                if chars.peek() == Some(&',') {
                    chars.next();
                }
            }

            Ok(Value::List(list))
        }
        Some('{') => {
            chars.next();
            let mut tuple = HashMap::new();

            loop {
                skip_blanks(chars);
                match chars.peek() {
                    Some('}') => {
                        chars.next();
                        break;
                    }
                    None => return Err("Expected closing brace".into()),
                    Some(_) => {}
                }
                let key = parse_identifier(chars)?;
                if chars.next() != Some('=') {
                    return Err("Expected '=' in tuple".into());
                }
                let value = parse_value(chars)?;
                tuple.insert(key, value);

                skip_blanks(chars);
                if chars.peek() == Some(&',') {
                    chars.next();
                }
            }

            Ok(Value::Tuple(tuple))
        }
        Some(ch) => Err(format!("Unexpected character '{}' in value", ch)),
        None => Err("Empty value".into()),
    }
}

/// Parse the body of a C string after its opening quote
///
/// Octal escapes are the bytes of UTF-8 sequences, the string is decoded
/// once all the bytes are known.
fn parse_quoted(chars: &mut Peekable<Chars>) -> Result<String, String> {
    let mut bytes: Vec<u8> = Vec::new();
    let mut buf = [0u8; 4];

    while let Some(ch) = chars.next() {
        let unescaped = match ch {
            '"' => return Ok(String::from_utf8_lossy(&bytes).into_owned()),
            '\\' => match chars.next() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('r') => '\r',
                Some('\\') => '\\',
                Some('"') => '"',
                Some(d) if d.is_digit(8) => {
                    let mut code = d.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match chars.peek().and_then(|c| c.to_digit(8)) {
                            Some(digit) => {
                                code = code * 8 + digit;
                                chars.next();
                            }
                            None => break,
                        }
                    }
                    bytes.push((code & 0xff) as u8);
                    continue;
                }
                Some(other) => {
                    bytes.push(b'\\');
                    other
                }
                None => return Err("Unterminated escape sequence".into()),
            },
            _ => ch,
        };
        bytes.extend_from_slice(unescaped.encode_utf8(&mut buf).as_bytes());
    }

    Err("Missing closing quote".into())
}

/// Parse a C-style string (removes quotes and handles escape sequences)
pub fn parse_c_string(input: &str) -> Option<String> {
    let mut chars = input.chars().peekable();
    if chars.next() != Some('"') {
        return None;
    }
    let result = parse_quoted(&mut chars).ok()?;
    if chars.next().is_some() {
        return None;
    }
    Some(result)
}

/// Quote a string for gdb, the mirror of `parse_c_string`
pub fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            '\r' => quoted.push_str("\\r"),
            _ => quoted.push(ch),
        }
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_c_string() {
        assert_eq!(parse_c_string("\"Hello\""), Some("Hello".to_string()));
        assert_eq!(parse_c_string("\"Hello\\nWorld\""), Some("Hello\nWorld".to_string()));
        assert_eq!(parse_c_string("\"Hello\\\\World\""), Some("Hello\\World".to_string()));
        assert_eq!(parse_c_string("\"Hello\\\"World\""), Some("Hello\"World".to_string()));
        assert_eq!(parse_c_string("\"\\032\""), Some("\u{1a}".to_string()));
        assert_eq!(parse_c_string(r#""caf\303\251\n""#), Some("café\n".to_string()));
        assert_eq!(parse_c_string("Hello"), None);
        assert_eq!(parse_c_string("\"Hello\" trailing"), None);
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("print \"a\\n\""), "\"print \\\"a\\\\n\\\"\"");
        assert_eq!(parse_c_string(&quote("a\tb\\c")), Some("a\tb\\c".to_string()));
    }

    #[test]
    fn test_parse_multiple_results() {
        let input = "reason=\"breakpoint-hit\",thread-id=\"1\"";
        let results = parse_results(input).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results.get("reason").unwrap().as_string(), Some("breakpoint-hit"));
        assert_eq!(results.get("thread-id").unwrap().as_string(), Some("1"));
    }

    #[test]
    fn test_parse_tuple_value() {
        let input = "bkpt={number=\"1\",type=\"breakpoint\"}";
        let results = parse_results(input).unwrap();

        let bkpt = results.get("bkpt").unwrap().as_tuple().unwrap();
        assert_eq!(bkpt.get("number").unwrap().as_string(), Some("1"));
        assert_eq!(bkpt.get("type").unwrap().as_string(), Some("breakpoint"));
    }

    #[test]
    fn test_parse_list_of_results() {
        let input = "stack=[frame={level=\"0\",func=\"main\"},frame={level=\"1\",func=\"_start\"}]";
        let results = parse_results(input).unwrap();

        let stack = results.get("stack").unwrap().as_list().unwrap();
        assert_eq!(stack.len(), 2);
        let frame = stack[1].as_tuple().unwrap();
        assert_eq!(frame.get("func").unwrap().as_string(), Some("_start"));
    }

    #[test]
    fn test_parse_empty_list() {
        let results = parse_results("threads=[],args=[]").unwrap();
        assert_eq!(results.get("threads").unwrap().as_list().unwrap().len(), 0);
        assert_eq!(results.get("args").unwrap().as_list().unwrap().len(), 0);
    }

    #[test]
    fn test_unterminated_value() {
        assert!(parse_results("bkpt={number=\"1\"").is_err());
        assert!(parse_results("msg=\"no end").is_err());
    }

    #[test]
    fn test_parse_prompt_and_tokens() {
        assert_eq!(parse_gdb_output("(gdb) ").unwrap(), GdbOutput::Prompt);
        match parse_gdb_output("101^done,value=\"3\"").unwrap() {
            GdbOutput::Result(record) => {
                assert_eq!(record.token, Some(101));
                assert_eq!(record.class, ResultClass::Done);
                assert_eq!(record.get_str("value"), Some("3"));
            }
            other => panic!("Expected result record, got {:?}", other),
        }
        match parse_gdb_output("=thread-group-added,id=\"i1\"").unwrap() {
            GdbOutput::Async(record) => {
                assert_eq!(record.kind, AsyncKind::Notify);
                assert_eq!(record.class, "thread-group-added");
            }
            other => panic!("Expected async record, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_choice_prompt_is_stripped() {
        match parse_gdb_output("> ~\"Breakpoint 2 at 0x4004f8\\n\"").unwrap() {
            GdbOutput::Stream(stream) => {
                assert_eq!(stream.stream_type, StreamType::Console);
                assert_eq!(stream.content, "Breakpoint 2 at 0x4004f8\n");
            }
            other => panic!("Expected stream record, got {:?}", other),
        }
    }

    #[test]
    fn test_annotation() {
        assert!(is_annotation("~\"\\032\\032/tmp/foo.c:12:133:beg:0x4004f8\""));
        assert!(!is_annotation("~\"Breakpoint 1, main () at foo.c:12\\n\""));
    }

    #[test]
    fn test_bad_lines() {
        assert!(parse_gdb_output("").is_err());
        assert!(parse_gdb_output("hello world").is_err());
        assert!(parse_gdb_output("~no quotes").is_err());
        assert!(parse_gdb_output("101^unknown").is_err());
    }
}
