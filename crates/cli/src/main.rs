use std::process::ExitCode;

fn main() -> ExitCode {
    customers_cli::run()
}
