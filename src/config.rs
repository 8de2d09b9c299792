//! Session configuration
//!
//! The settings are read from an optional TOML file, then overridden by the
//! command line arguments.

use clap::Parser;
use log::LevelFilter;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use netbeans::Colors;

use crate::error::{Result, SessionError};

#[derive(Parser, Debug, Default)]
#[command(name = "clewn", version, about = "Drive gdb from a text editor over the netbeans protocol")]
pub struct Cli {
    /// Configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// The gdb program
    #[arg(long)]
    pub gdb: Option<String>,

    /// Address of the netbeans socket
    #[arg(short, long, value_name = "ADDR")]
    pub listen: Option<String>,

    #[arg(long)]
    pub password: Option<String>,

    /// Project file sourced on startup and saved on quit
    #[arg(short, long)]
    pub project: Option<String>,

    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Terminal of the debuggee
    #[arg(long)]
    pub tty: Option<String>,

    /// Queue the commands typed while gdb is busy
    #[arg(long)]
    pub async_commands: bool,

    /// Arguments passed to gdb
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub gdb_args: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub gdb: String,
    pub gdb_args: Vec<String>,
    /// Skip the version probe
    pub gdb_version: Option<String>,
    pub listen: String,
    pub password: String,
    pub project: Option<String>,
    pub async_commands: bool,
    /// Maximum number of lines of the console
    pub max_lines: usize,
    /// Seconds
    pub handshake_timeout: u64,
    pub log_level: String,
    pub prompt: String,
    /// Background colors of the enabled breakpoints, the disabled
    /// breakpoints and the frame
    pub bg_colors: Vec<String>,
    pub tty: Option<String>,
    /// Key mappings added to the defaults, an empty mapping removes the key
    pub keys: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gdb: "gdb".to_string(),
            gdb_args: Vec::new(),
            gdb_version: None,
            listen: "127.0.0.1:3219".to_string(),
            password: "changeme".to_string(),
            project: None,
            async_commands: false,
            max_lines: 10000,
            handshake_timeout: 30,
            log_level: "info".to_string(),
            prompt: "(gdb) ".to_string(),
            bg_colors: Vec::new(),
            tty: None,
            keys: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Build the configuration from the command line and the file it names
    pub fn load(cli: Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(cli);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, cli: Cli) {
        if let Some(gdb) = cli.gdb {
            self.gdb = gdb;
        }
        if let Some(listen) = cli.listen {
            self.listen = listen;
        }
        if let Some(password) = cli.password {
            self.password = password;
        }
        if cli.project.is_some() {
            self.project = cli.project;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        if cli.tty.is_some() {
            self.tty = cli.tty;
        }
        self.async_commands |= cli.async_commands;
        if !cli.gdb_args.is_empty() {
            self.gdb_args = cli.gdb_args;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.level()?;
        self.colors()?;
        if self.max_lines == 0 {
            return Err(SessionError::Config("max_lines must be positive".into()));
        }
        Ok(())
    }

    pub fn level(&self) -> Result<LevelFilter> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| SessionError::Config(format!("invalid log level \"{}\"", self.log_level)))
    }

    pub fn colors(&self) -> Result<Colors> {
        match self.bg_colors.as_slice() {
            [] => Ok(Colors::default()),
            [enabled, disabled, frame] => Ok(Colors {
                enabled: enabled.clone(),
                disabled: disabled.clone(),
                frame: frame.clone(),
            }),
            other => Err(SessionError::Config(format!(
                "bg_colors needs three colors, got {}",
                other.len()
            ))),
        }
    }
}
