use std::iter::Peekable;
use std::vec::IntoIter;

use arch::{Opcode, Reg, RegsNeeded};

use crate::error::Error;
use crate::expr::{BinaryOp, Expr, UnaryOp};
use crate::lexer::{LineLexer, Token};
use crate::program::Program;

// ----------------------------------------------------------------------------
// Statement

/// One source line: an optional label declaration and an optional
/// instruction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
    pub label: Option<String>,
    pub code: Option<Code>,
}

/// Instruction as written, operands already split into registers and the
/// constant expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub opcode: Opcode,
    pub regs: Vec<Reg>,
    pub expr: Option<Expr>,
}

impl Line {
    pub fn parse(line: &str) -> Result<Line, Error> {
        let tokens = LineLexer::new(line).parse()?;
        let mut parser = Parser::new(tokens);

        let mut result = Line::default();
        if let (Some(Token::Ident(name)), Some(Token::Colon)) = (parser.peek(0), parser.peek(1)) {
            result.label = Some(name);
            parser.consume();
            parser.consume();
        }
        if !parser.at_end() {
            result.code = Some(parser.parse_code()?);
        }
        Ok(result)
    }

    /// Feed the line into `program` through the validating construction API.
    pub fn apply(self, program: &mut Program) -> Result<(), Error> {
        if let Some(label) = self.label {
            program.label(label)?;
        }
        if let Some(code) = self.code {
            code.apply(program)?;
        }
        Ok(())
    }
}

impl Code {
    pub fn apply(self, program: &mut Program) -> Result<(), Error> {
        let Code { opcode, regs, expr } = self;
        match (regs.as_slice(), expr) {
            ([], None) => program.add_op(opcode)?,
            ([], Some(expr)) => program.add_expr(opcode, expr)?,
            ([reg], None) => program.add_reg(opcode, *reg)?,
            ([reg], Some(expr)) => program.add_reg_expr(opcode, *reg, expr)?,
            ([dest, source], None) => program.add_regs(opcode, *dest, *source)?,
            ([dest, source], Some(expr)) => program.add(opcode, *dest, *source, Some(expr))?,
            _ => return Err(Error::TooManyArguments(opcode)),
        };
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Program

/// Parse a whole source text into a fresh program. Errors carry the
/// 0-based line index.
pub fn parse_program(src: &str) -> Result<Program, Error> {
    let mut program = Program::new();
    parse_into(&mut program, src)?;
    Ok(program)
}

/// Append the statements of `src` to `program`. Labels are shared with
/// whatever the program already holds.
pub fn parse_into(program: &mut Program, src: &str) -> Result<(), Error> {
    for (idx, raw) in src.lines().enumerate() {
        Line::parse(raw)
            .and_then(|line| line.apply(program))
            .map_err(|e| e.at(idx))?;
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// Parser

struct Parser {
    tokens: Peekable<IntoIter<Token>>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
        }
    }

    fn peek(&self, n: usize) -> Option<Token> {
        self.tokens.clone().nth(n)
    }

    fn check(&mut self, tok: &Token) -> bool {
        self.tokens.peek() == Some(tok)
    }

    fn consume(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    fn expect(&mut self, tok: Token) -> Result<(), Error> {
        match self.consume() {
            Some(t) if t == tok => Ok(()),
            Some(t) => Err(Error::Syntax(format!("expected `{tok}`, found `{t}`"))),
            None => Err(Error::MissingArgument),
        }
    }

    fn at_end(&mut self) -> bool {
        self.tokens.peek().is_none()
    }

    /// code = mnemonic [ reg { "," reg } ] [ [ "," ] expr ]
    fn parse_code(&mut self) -> Result<Code, Error> {
        let opcode = match self.consume() {
            Some(Token::Ident(name)) => {
                Opcode::parse(&name).map_err(|_| Error::UnknownOperation(name))?
            }
            Some(t) => return Err(Error::Syntax(format!("expected mnemonic, found `{t}`"))),
            None => return Err(Error::Syntax("expected mnemonic".into())),
        };

        let count = match opcode.regs_needed() {
            RegsNeeded::None => 0,
            RegsNeeded::Source | RegsNeeded::Dest => 1,
            RegsNeeded::Both => 2,
        };
        let mut regs = Vec::with_capacity(count);
        for idx in 0..count {
            if idx > 0 {
                self.expect(Token::Comma)?;
            }
            regs.push(self.parse_reg()?);
        }

        let mut expr = None;
        if !self.at_end() {
            if count > 0 {
                self.expect(Token::Comma)?;
            }
            expr = Some(self.parse_expr()?);
        }
        match self.consume() {
            None => Ok(Code { opcode, regs, expr }),
            Some(Token::Comma) => Err(Error::TooManyArguments(opcode)),
            Some(t) => Err(Error::Syntax(format!("unexpected `{t}`"))),
        }
    }

    fn parse_reg(&mut self) -> Result<Reg, Error> {
        match self.consume() {
            Some(Token::Ident(name)) => Reg::parse(&name).map_err(|_| Error::UnknownRegister(name)),
            Some(t) => Err(Error::UnknownRegister(t.to_string())),
            None => Err(Error::MissingArgument),
        }
    }

    /// expr = xor-expr { "|" xor-expr }
    fn parse_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_xor_expr()?;
        while self.check(&Token::Pipe) {
            self.consume();
            let rhs = self.parse_xor_expr()?;
            lhs = Expr::binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    /// xor-expr = and-expr { "^" and-expr }
    fn parse_xor_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_and_expr()?;
        while self.check(&Token::Caret) {
            self.consume();
            let rhs = self.parse_and_expr()?;
            lhs = Expr::binary(BinaryOp::Xor, lhs, rhs);
        }
        Ok(lhs)
    }

    /// and-expr = shift-expr { "&" shift-expr }
    fn parse_and_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_shift_expr()?;
        while self.check(&Token::Ampersand) {
            self.consume();
            let rhs = self.parse_shift_expr()?;
            lhs = Expr::binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    /// shift-expr = add-expr { ( "<<" | ">>" ) add-expr }
    fn parse_shift_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_add_expr()?;
        loop {
            let op = match self.tokens.peek() {
                Some(Token::LAngleLAngle) => BinaryOp::Shl,
                Some(Token::RAngleRAngle) => BinaryOp::Shr,
                _ => return Ok(lhs),
            };
            self.consume();
            let rhs = self.parse_add_expr()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    /// add-expr = mul-expr { ( "+" | "-" ) mul-expr }
    fn parse_add_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_mul_expr()?;
        loop {
            let op = match self.tokens.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.consume();
            let rhs = self.parse_mul_expr()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    /// mul-expr = unary-expr { ( "*" | "/" | "%" ) unary-expr }
    fn parse_mul_expr(&mut self) -> Result<Expr, Error> {
        let mut lhs = self.parse_unary_expr()?;
        loop {
            let op = match self.tokens.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.consume();
            let rhs = self.parse_unary_expr()?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    /// unary-expr = ( "-" | "~" | "+" ) unary-expr | prim-expr
    fn parse_unary_expr(&mut self) -> Result<Expr, Error> {
        match self.tokens.peek() {
            Some(Token::Minus) => {
                self.consume();
                Ok(Expr::unary(UnaryOp::Neg, self.parse_unary_expr()?))
            }
            Some(Token::Tilde) => {
                self.consume();
                Ok(Expr::unary(UnaryOp::Not, self.parse_unary_expr()?))
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary_expr()
            }
            _ => self.parse_prim_expr(),
        }
    }

    /// prim-expr = number | ident | "$" | "(" expr ")"
    fn parse_prim_expr(&mut self) -> Result<Expr, Error> {
        match self.consume() {
            Some(Token::Number(v)) => Ok(Expr::Lit(v)),
            Some(Token::Ident(name)) => Ok(Expr::Ident(name)),
            Some(Token::Dollar) => Ok(Expr::Here),
            Some(Token::LParen) => {
                let expr = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }
            Some(t) => Err(Error::Syntax(format!("unexpected `{t}` in expression"))),
            None => Err(Error::MissingArgument),
        }
    }
}
