use std::process::ExitCode;

fn main() -> ExitCode {
    linekeeper_cli::run()
}
