use std::path::PathBuf;

use clap::Parser as ClapParser;

use lox::lox::Lox;

#[derive(ClapParser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Script to execute; omit to start the REPL.
    scripts: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Cli = Cli::parse();

    match args.scripts.as_slice() {
        [] => {
            let mut lox = Lox::new();
            lox.run_prompt()?;
        }

        [script] => {
            let mut lox = Lox::new();
            lox.run_file(script)?;

            if lox.had_error() {
                std::process::exit(65);
            }

            if lox.had_runtime_error() {
                std::process::exit(70);
            }
        }

        _ => {
            eprintln!("Usage: lox [script]");
            std::process::exit(64);
        }
    }

    Ok(())
}
