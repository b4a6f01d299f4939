use std::process::ExitCode;

fn main() -> ExitCode {
    parkwise_cli::run()
}
