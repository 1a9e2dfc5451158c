use std::process::ExitCode;

use clap::Parser;
use prairie_cli::{CliArgs, PrairieCli};
use prairie_core::Error;

fn report(err: &Error) {
    eprintln!("error: {err}");
    if let Error::Process { stdout, stderr, .. } = err {
        if !stdout.is_empty() {
            eprintln!("--- stdout ---\n{stdout}");
        }
        if !stderr.is_empty() {
            eprintln!("--- stderr ---\n{stderr}");
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let cli = match PrairieCli::from_args("prairie", &args) {
        Ok(cli) => cli,
        Err(e) => {
            report(&e);
            return ExitCode::FAILURE;
        }
    };
    match cli.run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}
