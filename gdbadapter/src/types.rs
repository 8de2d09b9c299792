/// GDB/MI types and data structures
///
/// This module defines the data structures used to represent GDB/MI protocol messages.

use std::collections::HashMap;

/// Represents the different types of GDB output
#[derive(Debug, Clone, PartialEq)]
pub enum GdbOutput {
    Result(ResultRecord),
    Async(AsyncRecord),
    Stream(StreamRecord),
    /// The idle marker, gdb accepts a new command
    Prompt,
}

/// Represents a GDB/MI result record
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub token: Option<u32>,
    pub class: ResultClass,
    pub results: HashMap<String, Value>,
}

impl ResultRecord {
    /// Get a string result by name
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.results.get(name).and_then(Value::as_string)
    }

    /// The error message of an `^error` record
    pub fn error_msg(&self) -> Option<&str> {
        match self.class {
            ResultClass::Error => self.get_str("msg"),
            _ => None,
        }
    }
}

/// GDB/MI result classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

impl ResultClass {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "done" => Some(ResultClass::Done),
            "running" => Some(ResultClass::Running),
            "connected" => Some(ResultClass::Connected),
            "error" => Some(ResultClass::Error),
            "exit" => Some(ResultClass::Exit),
            _ => None,
        }
    }
}

/// Represents a GDB/MI async record
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncRecord {
    pub token: Option<u32>,
    pub kind: AsyncKind,
    /// The async class, `stopped`, `running`, `thread-created`...
    pub class: String,
    pub results: HashMap<String, Value>,
}

impl AsyncRecord {
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.results.get(name).and_then(Value::as_string)
    }

    /// The value returned after a `finish` command, as
    /// `(gdb-result-var, return-value)`
    pub fn return_value(&self) -> Option<(&str, &str)> {
        if self.kind != AsyncKind::Exec
            || self.class != "stopped"
            || self.get_str("reason") != Some("function-finished")
        {
            return None;
        }
        Some((self.get_str("gdb-result-var")?, self.get_str("return-value")?))
    }
}

/// Prefix of an async record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncKind {
    Exec,   // * prefix
    Status, // + prefix
    Notify, // = prefix
}

/// Represents a GDB/MI stream record
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub stream_type: StreamType,
    pub content: String,
}

/// Types of GDB/MI streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Console, // ~ prefix
    Target,  // @ prefix
    Log,     // & prefix
}

/// Represents values in GDB/MI output
///
/// A list of results such as `[bkpt={...},bkpt={...}]` is stored as the
/// list of its values.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    List(Vec<Value>),
    Tuple(HashMap<String, Value>),
}

impl Value {
    /// Get the value as a string, if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a list, if possible
    pub fn as_list(&self) -> Option<&Vec<Value>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Get the value as a tuple, if possible
    pub fn as_tuple(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Tuple(tuple) => Some(tuple),
            _ => None,
        }
    }
}

/// Get a string field of a tuple
pub fn tuple_str<'a>(tuple: &'a HashMap<String, Value>, name: &str) -> Option<&'a str> {
    tuple.get(name).and_then(Value::as_string)
}

/// The version of the gdb program, compared component by component
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct GdbVersion(pub Vec<u32>);

impl GdbVersion {
    pub fn new(components: &[u32]) -> Self {
        GdbVersion(components.to_vec())
    }

    /// Parse a dotted version string such as `7.6.1`
    pub fn parse(version: &str) -> Option<Self> {
        let components: Vec<u32> = version
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| part.parse().ok())
            .collect::<Option<Vec<u32>>>()?;
        if components.is_empty() {
            return None;
        }
        Some(GdbVersion(components))
    }
}

impl std::fmt::Display for GdbVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|n| n.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_order() {
        assert!(GdbVersion::new(&[6, 3, 1]) < GdbVersion::new(&[6, 4]));
        assert!(GdbVersion::new(&[7]) <= GdbVersion::new(&[7, 0, 1]));
        assert!(GdbVersion::new(&[12, 1]) > GdbVersion::new(&[7, 6, 50, 20130728]));
        assert_eq!(GdbVersion::parse("7.6.1"), Some(GdbVersion::new(&[7, 6, 1])));
        assert_eq!(GdbVersion::parse("seven"), None);
    }

    #[test]
    fn test_return_value() {
        let mut results = HashMap::new();
        results.insert("reason".to_string(), Value::String("function-finished".into()));
        results.insert("gdb-result-var".to_string(), Value::String("$1".into()));
        results.insert("return-value".to_string(), Value::String("42".into()));
        let record = AsyncRecord {
            token: None,
            kind: AsyncKind::Exec,
            class: "stopped".into(),
            results,
        };
        assert_eq!(record.return_value(), Some(("$1", "42")));
    }
}
