//! taskpilot - dependency-aware task prioritization

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = taskpilot::cli::run() {
        eprintln!("Error: {:#}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
