//! clewn drives gdb from a text editor
//!
//! The editor connects to clewn over the netbeans socket. The commands
//! typed in the editor are run by gdb, breakpoints and the current frame
//! are shown as markers in the source buffers, and the state of the
//! debuggee is listed in read-only report buffers.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod server;
pub mod session;

pub use config::{Cli, Config};
pub use error::{Result, SessionError};
pub use session::{GdbControl, GdbSetup, Session, State};
