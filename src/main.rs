use clap::Parser;
use tidetrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
