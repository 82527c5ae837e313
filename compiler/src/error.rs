use colored::Colorize;
use std::fmt;

/// One reported compile error: a scan error promoted by the compiler, or a
/// parse error raised directly. Accumulated into a log rather than thrown —
/// the compiler keeps parsing after the first one (panic/synchronize).
#[derive(Debug, Clone)]
pub struct CompileError {
    pub message: String,
    pub line: u32,
    /// `"at end"` or `"at '<lexeme>'"`.
    pub at: String,
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} line {}: {} {}",
            "compile error:".bright_red(),
            self.line,
            self.message,
            self.at,
        )
    }
}

impl std::error::Error for CompileError {}
