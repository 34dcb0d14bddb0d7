use std::process::ExitCode;

fn main() -> ExitCode {
    clubbot_cli::run()
}
