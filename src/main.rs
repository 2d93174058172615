mod api;
mod app;
mod config;
mod logic;
mod models;
mod utils;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = match app::Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(app::usage_status(&err));
        }
    };

    match app::run(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
