use std::io::BufRead;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "casebridge")]
#[command(version, about = "Imports Azure DevOps test plans into a local test case store", long_about = None)]
struct Cli {
    /// Config file merged over the built-in defaults
    #[arg(short, long, default_value = casebridge_lib::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Start the HTTP API (default)
    Serve,
    /// Save the Azure DevOps PAT in the OS keyring, read from stdin
    StorePat,
    /// Remove the stored Azure DevOps PAT
    ClearPat,
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => casebridge_lib::run(&cli.config),
        Command::StorePat => read_pat().and_then(|pat| casebridge_lib::store_pat(&pat)),
        Command::ClearPat => casebridge_lib::clear_pat(),
    };

    if let Err(err) = result {
        eprintln!("casebridge: {err}");
        std::process::exit(1);
    }
}

/// Reads the token as one line from stdin.
fn read_pat() -> casebridge_lib::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
