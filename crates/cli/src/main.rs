use std::process::ExitCode;

fn main() -> ExitCode {
    citequotes_cli::run()
}
