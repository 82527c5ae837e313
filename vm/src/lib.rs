pub mod error;

use compiler::chunk::value::Value;
use compiler::chunk::{Chunk, OpCode};
use compiler::heap::Heap;
use error::RuntimeError;
use std::io::{self, Write};

/// Reserved up front; the language has no recursion or function calls, so in
/// practice a program's stack depth never approaches this.
const STACK_RESERVE: usize = 1024;

/// Generic over the `OP_PRINT` sink so tests can capture output instead of
/// writing to the process's real stdout.
pub struct Vm<W: Write = io::Stdout> {
    stack: Vec<Value>,
    out: W,
}

impl Vm<io::Stdout> {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl<W: Write> Vm<W> {
    pub fn with_writer(out: W) -> Self {
        Self { stack: Vec::with_capacity(STACK_RESERVE), out }
    }

    /// Runs `chunk` to completion against `heap`, sequentially from offset 0.
    /// On a runtime fault the stack is discarded and the error is returned;
    /// `heap` is left intact either way so the caller (the REPL) can proceed.
    pub fn execute(&mut self, chunk: &Chunk, heap: &mut Heap) -> Result<(), RuntimeError> {
        self.stack.clear();

        #[cfg(feature = "debug-bytecode")]
        print!("{}", chunk.disassemble(heap, "chunk"));

        for (offset, op) in chunk.code().iter().enumerate() {
            let line = chunk.line(offset);
            self.run_op(*op, chunk, heap, line)?;
        }
        Ok(())
    }

    fn run_op(
        &mut self,
        op: OpCode,
        chunk: &Chunk,
        heap: &mut Heap,
        line: u32,
    ) -> Result<(), RuntimeError> {
        match op {
            OpCode::Constant(idx) => self.push(chunk.constant(idx).clone()),
            OpCode::Nil => self.push(Value::Nil),
            OpCode::True => self.push(Value::Bool(true)),
            OpCode::False => self.push(Value::Bool(false)),
            OpCode::Pop => {
                self.pop();
            }
            OpCode::DefineGlobal(idx) => {
                let value = self.pop();
                heap.set_global(idx, value);
            }
            OpCode::GetGlobal(idx) => {
                let value = heap
                    .get_global(idx)
                    .cloned()
                    .ok_or_else(|| self.error(format!("Undefined variable {}", heap.name_of(idx)), line))?;
                self.push(value);
            }
            OpCode::SetGlobal(idx) => {
                if heap.get_global(idx).is_none() {
                    return Err(self.error(format!("Undefined variable {}", heap.name_of(idx)), line));
                }
                heap.set_global(idx, self.peek().clone());
            }
            OpCode::Equal => {
                let b = self.pop();
                let a = self.pop();
                self.push(Value::Bool(a == b));
            }
            OpCode::Greater => self.numeric_cmp(line, |a, b| a > b)?,
            OpCode::Less => self.numeric_cmp(line, |a, b| a < b)?,
            OpCode::Add => self.add(heap, line)?,
            OpCode::Subtract => self.numeric_binary(line, |a, b| a - b)?,
            OpCode::Multiply => self.numeric_binary(line, |a, b| a * b)?,
            OpCode::Divide => self.numeric_binary(line, |a, b| a / b)?,
            OpCode::Not => {
                let value = self.pop();
                self.push(Value::Bool(value.falsey()));
            }
            OpCode::Negate => {
                let value = self.pop();
                let n = value
                    .as_number()
                    .ok_or_else(|| self.error("Operand must be a number".to_string(), line))?;
                self.push(Value::Number(-n));
            }
            OpCode::Print => {
                let value = self.pop();
                writeln!(self.out, "{value}").expect("write to print sink");
            }
            OpCode::Return => {}
        }
        Ok(())
    }

    fn add(&mut self, heap: &mut Heap, line: u32) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        if let (Some(a), Some(b)) = (a.as_number(), b.as_number()) {
            self.push(Value::Number(a + b));
            return Ok(());
        }
        if let (Some(a), Some(b)) = (a.as_string(), b.as_string()) {
            let concatenated = format!("{}{}", a.as_str(), b.as_str());
            let string_ref = heap.intern(&concatenated);
            self.push(Value::String(string_ref));
            return Ok(());
        }
        Err(self.error("Operands must be numbers or strings".to_string(), line))
    }

    fn numeric_binary(&mut self, line: u32, f: impl FnOnce(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let b = self.pop_number(line)?;
        let a = self.pop_number(line)?;
        self.push(Value::Number(f(a, b)));
        Ok(())
    }

    fn numeric_cmp(&mut self, line: u32, f: impl FnOnce(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let b = self.pop_number(line)?;
        let a = self.pop_number(line)?;
        self.push(Value::Bool(f(a, b)));
        Ok(())
    }

    fn pop_number(&mut self, line: u32) -> Result<f64, RuntimeError> {
        self.pop().as_number().ok_or_else(|| self.error("Operands must be numbers".to_string(), line))
    }

    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow: compiler emitted unbalanced opcodes")
    }

    fn peek(&self) -> &Value {
        self.stack.last().expect("stack underflow: compiler emitted unbalanced opcodes")
    }

    fn error(&self, message: String, line: u32) -> RuntimeError {
        RuntimeError { message, line }
    }

    /// The `OP_PRINT` sink, for tests to inspect what was written.
    pub fn writer(&self) -> &W {
        &self.out
    }
}

impl Default for Vm<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compiler::compile;

    /// Compiles and runs `source` against a fresh `Heap`, capturing `OP_PRINT`
    /// output instead of writing to the real stdout.
    fn run(source: &str) -> (Result<(), RuntimeError>, Heap, String) {
        let mut heap = Heap::new();
        let chunk = compile(source, &mut heap).unwrap_or_else(|errs| panic!("compile error: {errs:?}"));
        let mut vm = Vm::with_writer(Vec::new());
        let result = vm.execute(&chunk, &mut heap);
        let printed = String::from_utf8(vm.writer().clone()).unwrap();
        (result, heap, printed)
    }

    #[test]
    fn arithmetic_precedence() {
        let (result, _, printed) = run("print 1 + 2 * 3;");
        assert!(result.is_ok());
        assert_eq!(printed, "7\n");
    }

    #[test]
    fn string_concatenation_interns_result() {
        let mut heap = Heap::new();
        let chunk = compile(r#"print "foo" + "bar";"#, &mut heap).unwrap();
        let mut vm = Vm::with_writer(Vec::new());
        assert!(vm.execute(&chunk, &mut heap).is_ok());
        assert_eq!(String::from_utf8(vm.writer().clone()).unwrap(), "foobar\n");
    }

    #[test]
    fn global_define_and_read_round_trip() {
        let (result, _, printed) = run("var x = 1; print x;");
        assert!(result.is_ok());
        assert_eq!(printed, "1\n");
    }

    #[test]
    fn undefined_variable_is_runtime_error() {
        let (result, _, _) = run("print x;");
        let err = result.unwrap_err();
        assert!(err.message.contains("Undefined variable x"));
    }

    #[test]
    fn type_error_on_negate_non_number() {
        let (result, _, _) = run(r#"-"nope";"#);
        let err = result.unwrap_err();
        assert!(err.message.contains("Operand must be a number"));
    }

    #[test]
    fn type_error_on_mixed_add() {
        let (result, _, _) = run(r#"1 + "nope";"#);
        let err = result.unwrap_err();
        assert!(err.message.contains("Operands must be numbers or strings"));
    }

    #[test]
    fn nil_is_falsy() {
        let (result, _, printed) = run("print !nil;");
        assert!(result.is_ok());
        assert_eq!(printed, "true\n");
    }

    #[test]
    fn heap_survives_runtime_error_for_repl_continuation() {
        let mut heap = Heap::new();
        let chunk = compile("var x = 1; print y;", &mut heap).unwrap();
        let mut vm = Vm::with_writer(Vec::new());
        assert!(vm.execute(&chunk, &mut heap).is_err());
        let chunk2 = compile("print x;", &mut heap).unwrap();
        assert!(vm.execute(&chunk2, &mut heap).is_ok());
        assert_eq!(String::from_utf8(vm.writer().clone()).unwrap(), "1\n");
    }

    #[test]
    fn comparison_and_equality() {
        let (result, _, printed) = run("print 1 < 2; print 2 <= 2; print 1 == 1.0;");
        assert!(result.is_ok());
        assert_eq!(printed, "true\ntrue\ntrue\n");
    }
}
