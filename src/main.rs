use clap::Parser;
use levelwatch::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
