mod args;

use args::{get_action, Action};
use compiler::heap::Heap;
use rustyline::error::ReadlineError;
use rustyline::Editor;
use std::path::PathBuf;
use std::{fmt, fs, process::exit};
use vm::Vm;

#[derive(Debug)]
enum CliError {
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "could not read file: {err}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

fn main() {
    println!("Clox interpreter (v{})", env!("CARGO_PKG_VERSION"));
    match get_action() {
        Ok(Action::Repl) => run_repl(),
        Ok(Action::File(path)) => match run_file(path) {
            Ok(code) => exit(code),
            Err(err) => {
                eprintln!("{err}");
                exit(exitcode::IOERR);
            }
        },
        Err(err) => {
            eprintln!("{err}");
            exit(exitcode::USAGE);
        }
    }
}

fn run_repl() {
    let mut heap = Heap::new();
    let mut vm = Vm::new();
    let mut rl = Editor::<()>::new();
    loop {
        match rl.readline("> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str());
                run_source(&line, &mut heap, &mut vm);
            }
            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Good bye!");
                break;
            }
            Err(err) => {
                eprintln!("{err}");
                break;
            }
        }
    }
}

/// Runs one source string; prints diagnostics but never changes the
/// process's exit code, matching REPL recovery policy.
fn run_source(source: &str, heap: &mut Heap, vm: &mut Vm) {
    let chunk = match compiler::compile(source, heap) {
        Ok(chunk) => chunk,
        Err(errors) => {
            for err in errors {
                eprintln!("{err}");
            }
            return;
        }
    };
    if let Err(err) = vm.execute(&chunk, heap) {
        eprintln!("{err}");
    }
}

fn run_file(path: PathBuf) -> Result<i32, CliError> {
    let bytes = fs::read(&path)?;
    let source = String::from_utf8_lossy(&bytes);
    let mut heap = Heap::new();
    let chunk = match compiler::compile(&source, &mut heap) {
        Ok(chunk) => chunk,
        Err(errors) => {
            for err in errors {
                eprintln!("{err}");
            }
            return Ok(exitcode::DATAERR);
        }
    };
    let mut vm = Vm::new();
    if let Err(err) = vm.execute(&chunk, &mut heap) {
        eprintln!("{err}");
        return Ok(exitcode::SOFTWARE);
    }
    Ok(exitcode::OK)
}
