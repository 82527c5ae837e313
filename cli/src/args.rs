use std::{env, fmt, path::PathBuf};

/// What the process was asked to do, derived from `env::args()`.
#[derive(Debug, Clone)]
pub enum Action {
    Repl,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub enum ArgsError {
    TooManyArguments,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyArguments => write!(f, "expected at most one argument: a script path"),
        }
    }
}

/// `clox` takes zero arguments (REPL) or exactly one (a script path).
pub fn get_action() -> Result<Action, ArgsError> {
    let mut args = env::args();
    args.next();
    match (args.next(), args.next()) {
        (None, _) => Ok(Action::Repl),
        (Some(path), None) => Ok(Action::File(PathBuf::from(path))),
        (Some(_), Some(_)) => Err(ArgsError::TooManyArguments),
    }
}
