use colored::Colorize;
use std::fmt;

/// The single runtime fault that can abort an `execute` call: a bad operand
/// type, division semantics aside (division by zero yields `inf`/`NaN`, not
/// an error), or a reference to an undefined global.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub message: String,
    pub line: u32,
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} line {}: {}", "runtime error:".bright_red(), self.line, self.message)
    }
}

impl std::error::Error for RuntimeError {}
