use std::process::ExitCode;

use clap::Parser;

use pixelforge::cli::{self, CliArgs};
use pixelforge::{log_info, logger};

fn main() -> ExitCode {
    logger::init();
    let args = CliArgs::parse();
    log_info!("pixelforge started with {} input file(s)", args.input.len());
    cli::run(args)
}
