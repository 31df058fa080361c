use std::process::ExitCode;

mod app;
mod logging;

fn main() -> ExitCode {
    let args = part_move::cli::parse();
    app::run(args)
}
