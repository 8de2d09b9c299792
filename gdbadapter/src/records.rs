/// Typed GDB/MI records
///
/// The tuples of the MI results are converted into these structs, the
/// fields that gdb may omit are options.

use std::collections::HashMap;

use crate::types::{tuple_str, Value};

type Tuple = HashMap<String, Value>;

fn opt(tuple: &Tuple, name: &str) -> Option<String> {
    tuple_str(tuple, name).map(str::to_string)
}

/// Breakpoint information, an entry of the `-break-list` body
#[derive(Debug, Clone, PartialEq)]
pub struct Breakpoint {
    pub number: u32,
    pub bp_type: String,
    pub disp: String,
    pub enabled: bool,
    pub times: String,
    pub func: Option<String>,
    pub file: Option<String>,
    pub fullname: Option<String>,
    pub line: Option<u32>,
    pub what: Option<String>,
    pub original_location: Option<String>,
}

impl Breakpoint {
    /// Convert a `bkpt` tuple
    ///
    /// Returns None for the secondary locations of a multiple breakpoint,
    /// they do not have a type.
    pub fn from_tuple(tuple: &Tuple) -> Option<Self> {
        let bp_type = tuple_str(tuple, "type")?.to_string();
        let number = tuple_str(tuple, "number")?.parse().ok()?;
        let mut bp = Breakpoint {
            number,
            bp_type,
            disp: opt(tuple, "disp").unwrap_or_default(),
            enabled: tuple_str(tuple, "enabled") == Some("y"),
            times: opt(tuple, "times").unwrap_or_else(|| "0".to_string()),
            func: opt(tuple, "func"),
            file: opt(tuple, "file"),
            fullname: opt(tuple, "fullname"),
            line: tuple_str(tuple, "line").and_then(|l| l.parse().ok()),
            what: opt(tuple, "what"),
            original_location: opt(tuple, "original-location"),
        };
        if !bp.is_watchpoint() {
            bp.fix_location();
        }
        Some(bp)
    }

    pub fn is_watchpoint(&self) -> bool {
        self.bp_type.contains("watchpoint")
    }

    /// Breakpoints and watchpoints are listed, catchpoints on exceptions
    /// are excluded although gdb types them as breakpoints
    pub fn is_listed(&self) -> bool {
        let exception = self.what.as_deref().map_or(false, |w| w.contains("exception"));
        (self.bp_type.contains("breakpoint") && !exception) || self.is_watchpoint()
    }

    /// The source location of a breakpoint that can be shown with a marker
    pub fn location(&self) -> Option<(&str, u32)> {
        if self.is_watchpoint() {
            return None;
        }
        Some((self.file.as_deref()?, self.line?))
    }

    // A template function breakpoint has no file/line, use the
    // original location.
    fn fix_location(&mut self) {
        if self.file.is_some() && self.line.is_some() {
            return;
        }
        if let Some(oloc) = self.original_location.as_deref() {
            match oloc.rsplit_once(':') {
                Some((file, line)) => {
                    self.file = Some(file.trim_matches('"').to_string());
                    self.line = line.parse().ok();
                }
                None => {
                    if self.func.is_none() {
                        self.func = Some(oloc.to_string());
                    }
                }
            }
        }
    }
}

/// Frame information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub level: String,
    pub addr: Option<String>,
    pub func: Option<String>,
    pub file: Option<String>,
    pub fullname: Option<String>,
    pub line: Option<u32>,
    pub from: Option<String>,
}

impl Frame {
    /// Convert a frame tuple, the level is required
    pub fn from_tuple(tuple: &Tuple) -> Option<Self> {
        Some(Frame {
            level: tuple_str(tuple, "level")?.to_string(),
            addr: opt(tuple, "addr"),
            func: opt(tuple, "func"),
            file: opt(tuple, "file"),
            fullname: opt(tuple, "fullname"),
            line: tuple_str(tuple, "line").and_then(|l| l.parse().ok()),
            from: opt(tuple, "from"),
        })
    }

    /// Frames are equal when only their line and address differ
    pub fn loose_eq(&self, other: &Frame) -> bool {
        self.level == other.level
            && self.func == other.func
            && self.file == other.file
            && self.fullname == other.fullname
            && self.from == other.from
            && self.line.is_some() == other.line.is_some()
            && self.addr.is_some() == other.addr.is_some()
    }
}

/// An entry of the `-thread-info` list
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub id: u32,
    pub target_id: String,
    pub name: String,
    pub state: String,
    pub core: Option<String>,
    pub frame: Option<Frame>,
    pub current: bool,
}

impl Thread {
    pub fn from_tuple(tuple: &Tuple) -> Option<Self> {
        Some(Thread {
            id: tuple_str(tuple, "id")?.parse().ok()?,
            target_id: opt(tuple, "target-id").unwrap_or_default(),
            name: opt(tuple, "name").unwrap_or_default(),
            state: opt(tuple, "state").unwrap_or_default(),
            core: opt(tuple, "core"),
            frame: tuple
                .get("frame")
                .and_then(Value::as_tuple)
                .and_then(Frame::from_tuple),
            current: false,
        })
    }
}

/// A source file, an entry of `-file-list-exec-source-files` or the
/// result of `-file-list-exec-source-file`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Source {
    pub file: String,
    pub fullname: Option<String>,
    pub line: Option<u32>,
}

impl Source {
    pub fn from_tuple(tuple: &Tuple) -> Option<Self> {
        Some(Source {
            file: tuple_str(tuple, "file")?.to_string(),
            fullname: opt(tuple, "fullname"),
            line: tuple_str(tuple, "line").and_then(|l| l.parse().ok()),
        })
    }
}

/// An entry of the `-var-update` changelist
#[derive(Debug, Clone, PartialEq)]
pub struct VarChange {
    pub name: String,
    pub in_scope: String,
    pub value: Option<String>,
    pub has_more: Option<String>,
    pub new_num_children: Option<usize>,
    pub new_children: Vec<Tuple>,
}

impl VarChange {
    pub fn from_tuple(tuple: &Tuple) -> Option<Self> {
        Some(VarChange {
            name: tuple_str(tuple, "name")?.to_string(),
            in_scope: opt(tuple, "in_scope").unwrap_or_else(|| "true".to_string()),
            value: opt(tuple, "value"),
            has_more: opt(tuple, "has_more"),
            new_num_children: tuple_str(tuple, "new_num_children").and_then(|n| n.parse().ok()),
            new_children: tuple
                .get("new_children")
                .and_then(Value::as_list)
                .map(|children| children.iter().filter_map(Value::as_tuple).cloned().collect())
                .unwrap_or_default(),
        })
    }
}

/// Convert each tuple of a list, skipping the invalid ones
pub fn from_list<T, F>(value: Option<&Value>, convert: F) -> Vec<T>
where
    F: Fn(&Tuple) -> Option<T>,
{
    value
        .and_then(Value::as_list)
        .map(|list| list.iter().filter_map(Value::as_tuple).filter_map(|t| convert(t)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_results;

    fn tuple(input: &str) -> Tuple {
        let results = parse_results(&format!("t={}", input)).unwrap();
        results.get("t").unwrap().as_tuple().unwrap().clone()
    }

    #[test]
    fn test_breakpoint() {
        let bp = Breakpoint::from_tuple(&tuple(
            r#"{number="1",type="breakpoint",disp="keep",enabled="n",addr="0x08048564",func="main",file="myprog.c",fullname="/home/user/myprog.c",line="68",times="2"}"#,
        ))
        .unwrap();
        assert_eq!(bp.number, 1);
        assert!(!bp.enabled);
        assert_eq!(bp.location(), Some(("myprog.c", 68)));
        assert_eq!(bp.times, "2");
    }

    #[test]
    fn test_template_breakpoint_uses_original_location() {
        let bp = Breakpoint::from_tuple(&tuple(
            r#"{number="2",type="breakpoint",disp="keep",enabled="y",addr="<MULTIPLE>",times="0",original-location="\"foo.cpp\":12"}"#,
        ))
        .unwrap();
        assert_eq!(bp.location(), Some(("foo.cpp", 12)));
    }

    #[test]
    fn test_secondary_location_is_skipped() {
        assert!(Breakpoint::from_tuple(&tuple(r#"{number="2.1",enabled="y",addr="0x1"}"#)).is_none());
    }

    #[test]
    fn test_exception_catchpoint_not_listed() {
        let bp = Breakpoint::from_tuple(&tuple(
            r#"{number="3",type="breakpoint",disp="keep",enabled="y",what="exception throw",times="0"}"#,
        ))
        .unwrap();
        assert!(!bp.is_listed());
    }

    #[test]
    fn test_loose_frame() {
        let a = Frame::from_tuple(&tuple(r#"{level="0",addr="0x1",func="main",file="a.c",line="3"}"#)).unwrap();
        let b = Frame::from_tuple(&tuple(r#"{level="0",addr="0x2",func="main",file="a.c",line="4"}"#)).unwrap();
        let c = Frame::from_tuple(&tuple(r#"{level="1",addr="0x2",func="main",file="a.c",line="4"}"#)).unwrap();
        assert!(a.loose_eq(&b));
        assert!(!a.loose_eq(&c));
    }

    #[test]
    fn test_thread() {
        let thread = Thread::from_tuple(&tuple(
            r#"{id="1",target-id="process 4165",name="a.out",frame={level="0",addr="0x0000000000402454",func="main",args=[],file="a.c",line="510"},state="stopped",core="3"}"#,
        ))
        .unwrap();
        assert_eq!(thread.id, 1);
        assert_eq!(thread.frame.unwrap().func.as_deref(), Some("main"));
    }
}
