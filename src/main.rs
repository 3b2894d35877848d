use std::process::ExitCode;

use colored::Colorize;
use shapegen::cli::CommandLineInterface;

fn main() -> ExitCode {
    let command_line_interface = CommandLineInterface::load();
    if let Err(error) = command_line_interface.init_logging() {
        eprintln!("{} {error:#}", "warning:".yellow().bold());
    }
    match command_line_interface.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{} {error:#}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
