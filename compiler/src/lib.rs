pub mod chunk;
pub mod error;
pub mod heap;

use chunk::value::Value;
use chunk::{Chunk, OpCode};
use error::CompileError;
use heap::Heap;
use lexer::{Lexer, Token, TokenKind};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
enum Precedence {
    None,
    Assignment,
    Or,
    And,
    Equality,
    Comparison,
    Term,
    Factor,
    Unary,
    Call,
    Primary,
}

impl Precedence {
    /// One level up the ladder; parsing the right operand one level above
    /// the operator's own precedence enforces left-associativity.
    fn next(self) -> Self {
        match self {
            Self::None => Self::Assignment,
            Self::Assignment => Self::Or,
            Self::Or => Self::And,
            Self::And => Self::Equality,
            Self::Equality => Self::Comparison,
            Self::Comparison => Self::Term,
            Self::Term => Self::Factor,
            Self::Factor => Self::Unary,
            Self::Unary => Self::Call,
            Self::Call | Self::Primary => Self::Primary,
        }
    }
}

type ParseFn<'a> = fn(&mut Compiler<'a>, bool);

#[derive(Clone, Copy)]
struct ParseRule<'a> {
    prefix: Option<ParseFn<'a>>,
    infix: Option<ParseFn<'a>>,
    precedence: Precedence,
}

const fn rule<'a>(
    prefix: Option<ParseFn<'a>>,
    infix: Option<ParseFn<'a>>,
    precedence: Precedence,
) -> ParseRule<'a> {
    ParseRule { prefix, infix, precedence }
}

/// The parse-rules table, as data: one row per token kind, looked up by a
/// single match in one place rather than dispatched through trait objects.
fn get_rule<'a>(kind: TokenKind) -> ParseRule<'a> {
    use Precedence::{Comparison, Equality, Factor, Term};
    use TokenKind::*;
    match kind {
        OParen => rule(Some(Compiler::grouping), None, Precedence::None),
        Minus => rule(Some(Compiler::unary), Some(Compiler::binary), Term),
        Plus => rule(None, Some(Compiler::binary), Term),
        Slash | Star => rule(None, Some(Compiler::binary), Factor),
        Bang => rule(Some(Compiler::unary), None, Precedence::None),
        BangEqual | EqualEqual => rule(None, Some(Compiler::binary), Equality),
        Greater | GreaterEqual | Less | LessEqual => rule(None, Some(Compiler::binary), Comparison),
        Identifier => rule(Some(Compiler::variable), None, Precedence::None),
        String => rule(Some(Compiler::string), None, Precedence::None),
        Number => rule(Some(Compiler::number), None, Precedence::None),
        False | True | Nil => rule(Some(Compiler::literal), None, Precedence::None),
        _ => rule(None, None, Precedence::None),
    }
}

pub struct Compiler<'a> {
    lexer: Lexer<'a>,
    heap: &'a mut Heap,
    chunk: Chunk,
    previous: Token<'a>,
    current: Token<'a>,
    errors: Vec<CompileError>,
    panic_mode: bool,
}

impl<'a> Compiler<'a> {
    fn new(source: &'a str, heap: &'a mut Heap) -> Self {
        let eof = Token::new(TokenKind::Eof, "", 0);
        Self {
            lexer: Lexer::new(source),
            heap,
            chunk: Chunk::new(),
            previous: eof,
            current: eof,
            errors: vec![],
            panic_mode: false,
        }
    }

    fn error_at(&mut self, token: Token<'a>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        let at = match token.kind {
            TokenKind::Eof => "at end".to_string(),
            TokenKind::Error => String::new(),
            _ => format!("at {} ({:?})", token.lexeme, token.kind),
        };
        self.errors.push(CompileError { message: message.to_string(), line: token.line, at });
    }

    fn error_at_previous(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.lexer.next_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme.to_string();
            self.error_at_current(&message);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_token(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn emit(&mut self, op: OpCode) {
        let line = self.previous.line;
        self.chunk.emit(op, line);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let Some(prefix) = get_rule(self.previous.kind).prefix else {
            self.error_at_previous("Expect expression");
            return;
        };
        let can_assign = precedence <= Precedence::Assignment;
        prefix(self, can_assign);

        while precedence <= get_rule(self.current.kind).precedence {
            self.advance();
            let infix = get_rule(self.previous.kind).infix.expect("infix rule for matched token");
            infix(self, can_assign);
        }

        if can_assign && self.match_token(TokenKind::Equal) {
            self.error_at_previous("Invalid assignment target");
        }
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::CParen, "Expect ')' after expression.");
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit(OpCode::Negate),
            TokenKind::Bang => self.emit(OpCode::Not),
            _ => unreachable!(),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        let next_precedence = get_rule(operator).precedence.next();
        self.parse_precedence(next_precedence);
        match operator {
            TokenKind::Plus => self.emit(OpCode::Add),
            TokenKind::Minus => self.emit(OpCode::Subtract),
            TokenKind::Star => self.emit(OpCode::Multiply),
            TokenKind::Slash => self.emit(OpCode::Divide),
            TokenKind::EqualEqual => self.emit(OpCode::Equal),
            TokenKind::BangEqual => {
                self.emit(OpCode::Equal);
                self.emit(OpCode::Not);
            }
            TokenKind::Less => self.emit(OpCode::Less),
            TokenKind::LessEqual => {
                self.emit(OpCode::Greater);
                self.emit(OpCode::Not);
            }
            TokenKind::Greater => self.emit(OpCode::Greater),
            TokenKind::GreaterEqual => {
                self.emit(OpCode::Less);
                self.emit(OpCode::Not);
            }
            _ => unreachable!(),
        }
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self.previous.lexeme.parse().expect("scanner only yields valid numbers");
        let idx = self.chunk.add_constant(Value::Number(value));
        self.emit(OpCode::Constant(idx));
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme;
        let bytes = &lexeme[1..lexeme.len() - 1];
        let string_ref = self.heap.intern(bytes);
        let idx = self.chunk.add_constant(Value::String(string_ref));
        self.emit(OpCode::Constant(idx));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit(OpCode::False),
            TokenKind::True => self.emit(OpCode::True),
            TokenKind::Nil => self.emit(OpCode::Nil),
            _ => unreachable!(),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme.to_string();
        self.named_variable(&name, can_assign);
    }

    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let idx = self.heap.declare_global(name);
        if can_assign && self.match_token(TokenKind::Equal) {
            self.expression();
            self.emit(OpCode::SetGlobal(idx));
        } else {
            self.emit(OpCode::GetGlobal(idx));
        }
    }

    fn var_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expect variable name");
        let name = self.previous.lexeme.to_string();
        let idx = self.heap.declare_global(&name);
        if self.match_token(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration");
        self.emit(OpCode::DefineGlobal(idx));
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after value.");
        self.emit(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.");
        self.emit(OpCode::Pop);
    }

    fn statement(&mut self) {
        if self.match_token(TokenKind::Print) {
            self.print_statement();
        } else {
            self.expression_statement();
        }
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            if lexer::token::SYNC_BOUNDARIES.contains(&self.current.kind) {
                return;
            }
            self.advance();
        }
    }

    fn declaration(&mut self) {
        if self.match_token(TokenKind::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn run(mut self) -> Result<Chunk, Vec<CompileError>> {
        self.advance();
        while !self.match_token(TokenKind::Eof) {
            self.declaration();
        }
        self.emit(OpCode::Return);
        if self.errors.is_empty() {
            Ok(self.chunk)
        } else {
            Err(self.errors)
        }
    }
}

/// Compiles `source` into a `Chunk`, registering string literals and global
/// names into `heap` along the way. Returns the error log on failure; no
/// chunk is produced in that case.
pub fn compile(source: &str, heap: &mut Heap) -> Result<Chunk, Vec<CompileError>> {
    Compiler::new(source, heap).run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(source: &str) -> (Chunk, Heap) {
        let mut heap = Heap::new();
        let chunk = compile(source, &mut heap).unwrap_or_else(|errs| {
            panic!("unexpected compile errors for {source:?}: {errs:?}")
        });
        (chunk, heap)
    }

    #[test]
    fn emits_return_at_top_level() {
        let (chunk, _) = compile_ok("1 + 2;");
        assert!(matches!(chunk.code().last(), Some(OpCode::Return)));
    }

    #[test]
    fn precedence_multiplication_before_addition() {
        let (chunk, _) = compile_ok("print 1 + 2 * 3;");
        assert_eq!(
            chunk.code(),
            &[
                OpCode::Constant(0),
                OpCode::Constant(1),
                OpCode::Constant(2),
                OpCode::Multiply,
                OpCode::Add,
                OpCode::Print,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn less_equal_desugars_to_greater_then_not() {
        let (chunk, _) = compile_ok("1 <= 2;");
        assert_eq!(
            chunk.code(),
            &[
                OpCode::Constant(0),
                OpCode::Constant(1),
                OpCode::Greater,
                OpCode::Not,
                OpCode::Pop,
                OpCode::Return,
            ]
        );
    }

    #[test]
    fn var_declaration_without_initializer_emits_nil() {
        let (chunk, _) = compile_ok("var x;");
        assert_eq!(chunk.code()[0], OpCode::Nil);
        assert!(matches!(chunk.code()[1], OpCode::DefineGlobal(0)));
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let mut heap = Heap::new();
        let errors = compile("print 1", &mut heap).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Expect ';' after value."));
    }

    #[test]
    fn error_context_includes_lexeme_and_kind() {
        let mut heap = Heap::new();
        let errors = compile("var 1;", &mut heap).unwrap_err();
        assert_eq!(errors[0].at, "at 1 (Number)");
    }

    #[test]
    fn recovers_after_first_error_to_report_more() {
        let mut heap = Heap::new();
        let errors = compile("var; var;", &mut heap).unwrap_err();
        assert!(errors.len() >= 2, "expected recovery to surface multiple errors, got {errors:?}");
    }

    #[test]
    fn rejects_invalid_assignment_target() {
        let mut heap = Heap::new();
        let errors = compile("a + b = c;", &mut heap).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("Invalid assignment target")));
    }

    #[test]
    fn declare_global_reuses_index_across_mentions() {
        let mut heap = Heap::new();
        let chunk = compile("var x = 1; x = 2;", &mut heap).unwrap();
        let define_idx = chunk.code().iter().find_map(|op| match op {
            OpCode::DefineGlobal(i) => Some(*i),
            _ => None,
        });
        let set_idx = chunk.code().iter().find_map(|op| match op {
            OpCode::SetGlobal(i) => Some(*i),
            _ => None,
        });
        assert_eq!(define_idx, set_idx);
    }
}
