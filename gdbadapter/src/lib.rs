/// GDB Adapter module for clewn
///
/// This module holds the gdb side of a debugging session: the GDB/MI
/// parser, the commands sent to gdb and their result handlers, the
/// out-of-band commands run after each user command, and the debugger
/// state those commands maintain.

use thiserror::Error;

pub mod commands;
pub mod info;
pub mod oob;
pub mod parser;
pub mod process;
pub mod records;
pub mod types;
pub mod varobj;

pub use commands::{Command, MiCommand, ResultTable, VarObjCmd};
pub use info::{Effect, Info};
pub use oob::{OobItem, OobKind, OobList};
pub use parser::*;
pub use process::GdbProcess;
pub use records::{Breakpoint, Frame, Source, Thread};
pub use types::*;
pub use varobj::{RootVarObj, VarObj};

#[derive(Error, Debug)]
pub enum GdbError {
    #[error("Failed to start GDB process: {0}")]
    ProcessStartError(#[from] std::io::Error),
    #[error("invalid token \"{0}\"")]
    InvalidToken(u32),
    #[error("Failed to parse GDB output: {0}")]
    ParseError(String),
    #[error("GDB process terminated unexpectedly")]
    ProcessTerminated,
    #[error("Cannot interrupt gdb: {0}")]
    SignalError(String),
    #[error("{0}")]
    VersionError(String),
}

pub type Result<T> = std::result::Result<T, GdbError>;
