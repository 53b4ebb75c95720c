use std::io::Read;
use std::process::ExitCode;

use clap::Parser;

use kiln::compile;

/// Compile a source file to register-VM bytecode.
#[derive(Parser)]
#[command(name = "kiln", version, about)]
struct Cli {
    /// Source file, or '-' for stdin.
    file: String,

    /// Emit the compiled chunk as JSON instead of a listing.
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let source = if cli.file == "-" {
        let mut buf = String::new();
        match std::io::stdin().read_to_string(&mut buf) {
            Ok(_) => buf,
            Err(e) => {
                eprintln!("error reading stdin: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        match std::fs::read_to_string(&cli.file) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error reading {}: {e}", cli.file);
                return ExitCode::FAILURE;
            }
        }
    };

    let proto = match compile(&source) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}: {e}", cli.file);
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&proto) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("serialization error: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        print!("{}", proto.disassemble("main"));
    }

    ExitCode::SUCCESS
}
