use clap::Parser;
use cotrader::adapters::tracing_sink::init_subscriber;
use cotrader::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    init_subscriber();
    run(Cli::parse())
}
