use std::fmt;

use thiserror::Error;

use crate::context::Context;
use crate::error::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("Arithmetic overflow in `{0}`")]
    Overflow(String),

    #[error("Division by zero in `{0}`")]
    DivisionByZero(String),

    #[error("Invalid shift amount {1} in `{0}`")]
    Shift(String, i64),

    #[error("Constant {0} does not fit in a 16 bit word")]
    OutOfRange(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
        }
    }
}

/// Constant operand of an instruction.
///
/// Identifiers are looked up only when the expression is evaluated, so an
/// expression may name a label that is defined further down the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Lit(i64),
    Ident(String),
    /// Address of the instruction carrying the expression.
    Here,
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>) -> Self {
        Expr::Ident(name.into())
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Self {
        Expr::Unary(op, Box::new(expr))
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn eval(&self, ctx: &Context) -> Result<i64, Error> {
        match self {
            Expr::Lit(v) => Ok(*v),
            Expr::Ident(name) => match ctx.get(name) {
                Some(addr) => Ok(addr as i64),
                None => Err(Error::UnresolvedSymbol(name.clone())),
            },
            Expr::Here => Ok(ctx.addr() as i64),
            Expr::Unary(op, expr) => {
                let v = expr.eval(ctx)?;
                match op {
                    UnaryOp::Neg => v
                        .checked_neg()
                        .ok_or_else(|| ArithmeticError::Overflow(self.to_string()).into()),
                    UnaryOp::Not => Ok(!v),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let a = lhs.eval(ctx)?;
                let b = rhs.eval(ctx)?;
                self.apply(*op, a, b).map_err(Error::from)
            }
        }
    }

    fn apply(&self, op: BinaryOp, a: i64, b: i64) -> Result<i64, ArithmeticError> {
        let overflow = || ArithmeticError::Overflow(self.to_string());
        match op {
            BinaryOp::Add => a.checked_add(b).ok_or_else(overflow),
            BinaryOp::Sub => a.checked_sub(b).ok_or_else(overflow),
            BinaryOp::Mul => a.checked_mul(b).ok_or_else(overflow),
            BinaryOp::Div | BinaryOp::Rem if b == 0 => {
                Err(ArithmeticError::DivisionByZero(self.to_string()))
            }
            BinaryOp::Div => a.checked_div(b).ok_or_else(overflow),
            BinaryOp::Rem => a.checked_rem(b).ok_or_else(overflow),
            BinaryOp::And => Ok(a & b),
            BinaryOp::Or => Ok(a | b),
            BinaryOp::Xor => Ok(a ^ b),
            BinaryOp::Shl | BinaryOp::Shr => {
                let amount = u32::try_from(b)
                    .ok()
                    .filter(|s| *s < i64::BITS)
                    .ok_or_else(|| ArithmeticError::Shift(self.to_string(), b))?;
                match op {
                    BinaryOp::Shl => Ok(a << amount),
                    _ => Ok(a >> amount),
                }
            }
        }
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::Lit(v)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Lit(v) => write!(f, "{v}"),
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Here => write!(f, "$"),
            Expr::Unary(UnaryOp::Neg, expr) => write!(f, "-{expr}"),
            Expr::Unary(UnaryOp::Not, expr) => write!(f, "~{expr}"),
            Expr::Binary(op, lhs, rhs) => write!(f, "({lhs} {} {rhs})", op.symbol()),
        }
    }
}
