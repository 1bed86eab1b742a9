use clap::Parser;
use conch::{
    config::AppConfig, doctor::doctor_report, init_logging, runtime,
    terminal_restore::install_terminal_panic_hook,
};
use std::process::ExitCode;
use tracing::{error, info};

/// Exit status for unusable command-line options.
const EXIT_USAGE: u8 = 2;

fn main() -> ExitCode {
    let mut config = AppConfig::parse();
    if let Err(err) = config.validate() {
        eprintln!("conch: {err:#}");
        return ExitCode::from(EXIT_USAGE);
    }
    if config.doctor {
        println!("{}", doctor_report(&config).render());
        return ExitCode::SUCCESS;
    }

    if let Err(err) = init_logging(&config) {
        eprintln!("conch: {err:#}; continuing without a log file");
    }
    install_terminal_panic_hook();
    info!(version = env!("CARGO_PKG_VERSION"), pid = std::process::id(), "conch starting");

    match runtime::run(&config) {
        Ok(code) => {
            info!(code, "conch exiting");
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
        Err(err) => {
            error!("startup failed: {err:#}");
            eprintln!("conch: {err:#}");
            ExitCode::FAILURE
        }
    }
}
