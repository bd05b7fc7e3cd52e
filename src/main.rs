mod ast;
mod interpreter;
mod lexer;
mod parser;

use clap::Parser;
use interpreter::Interpreter;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "minijs",
    version,
    about = "A tree-walking interpreter for the minijs scripting language"
)]
struct Cli {
    /// Script file to execute
    file: Option<PathBuf>,

    /// Evaluate inline source
    #[arg(short = 'e', long = "eval")]
    eval: Option<String>,
}

fn run_source(interp: &mut Interpreter, source: &str) -> Result<(), String> {
    let script = parser::Parser::new(source)
        .and_then(|mut p| p.parse_script())
        .map_err(|e| e.to_string())?;
    interp.run(&script).map_err(|e| e.to_string())
}

fn execute_code(code: &str) -> ExitCode {
    let mut interp = Interpreter::new();
    match run_source(&mut interp, code) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

fn run_file(path: &Path) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {e}", path.display());
            return ExitCode::from(1);
        }
    };
    execute_code(&source)
}

fn run_repl() -> ExitCode {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut interp = Interpreter::new();

    println!("minijs v{}", env!("CARGO_PKG_VERSION"));
    println!("Type minijs instructions. Press Ctrl-D to exit.");

    loop {
        print!("> ");
        if stdout.flush().is_err() {
            break;
        }

        let mut line = String::new();
        let read_result = stdin.lock().read_line(&mut line);

        match read_result {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim();
                if !trimmed.is_empty()
                    && let Err(e) = run_source(&mut interp, trimmed)
                {
                    eprintln!("{e}");
                }
            }
            Err(e) => {
                eprintln!("Read error: {e}");
                return ExitCode::from(1);
            }
        }
    }

    println!();
    ExitCode::SUCCESS
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(code) = &cli.eval {
        return execute_code(code);
    }

    if let Some(path) = &cli.file {
        return run_file(path);
    }

    run_repl()
}
