use std::process::ExitCode;

use zgo::cli;

fn main() -> ExitCode {
    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("zgo: error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
