use clap::Parser;
use log::LevelFilter;

use clewn::{server, Cli, Config};

#[tokio::main]
async fn main() {
    let config = match Config::load(Cli::parse()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("clewn: {}", e);
            std::process::exit(2);
        }
    };

    // The log level is the global max level so that the `loglevel` command
    // may change it.
    if let Err(e) = simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Trace)
        .with_module_level("mio", LevelFilter::Warn)
        .with_module_level("tokio", LevelFilter::Warn)
        .init()
    {
        eprintln!("clewn: cannot initialize the logger: {}", e);
    }
    log::set_max_level(config.level().unwrap_or(LevelFilter::Info));

    log::info!("clewn {} starting", env!("CARGO_PKG_VERSION"));

    let exit_code = match server::run(config).await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{}", e);
            1
        }
    };

    log::info!("clewn exited with code: {exit_code}");
    std::process::exit(exit_code);
}
