//! `hbsdmon` command-line entry point.

use std::process::ExitCode;

use clap::Parser;
use hbsdmon::cli_app::{self, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli_app::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("[-] {err}");
            ExitCode::FAILURE
        }
    }
}
