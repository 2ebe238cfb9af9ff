use std::process::ExitCode;

fn main() -> ExitCode {
    medicert_cli::run()
}
