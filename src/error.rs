use gdbadapter::GdbError;
use netbeans::NetbeansError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("netbeans: {0}")]
    Netbeans(#[from] NetbeansError),
    #[error("gdb: {0}")]
    Gdb(#[from] GdbError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("no netbeans connection after {0} seconds")]
    HandshakeTimeout(u64),
}

pub type Result<T> = std::result::Result<T, SessionError>;
