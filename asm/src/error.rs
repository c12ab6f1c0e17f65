use arch::Opcode;
use color_print::cprintln;
use indexmap::IndexMap;
use thiserror::Error;

use crate::expr::ArithmeticError;

/// Why an operand list does not fit an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    NoConstant,
    NeedsConstant,
    NoRegister,
    NeedsRegister,
    NeedsBothRegisters,
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Mismatch::NoConstant => "does not need a constant",
            Mismatch::NeedsConstant => "needs a constant",
            Mismatch::NoRegister => "does not need a register",
            Mismatch::NeedsRegister => "needs a register",
            Mismatch::NeedsBothRegisters => "needs both registers",
        };
        f.write_str(msg)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("`{0}` {1}")]
    OperandMismatch(Opcode, Mismatch),

    #[error("Label `{label}` declared while `{pending}` is still waiting for an instruction")]
    LabelPending { pending: String, label: String },

    #[error("Label `{0}` is not followed by an instruction")]
    DanglingLabel(String),

    #[error("Re-defined label: `{0}`")]
    DuplicateLabel(String),

    #[error("Undefined label: `{0}`")]
    UnresolvedSymbol(String),

    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),

    #[error("Unknown operation: `{0}`")]
    UnknownOperation(String),

    #[error("Unknown register: `{0}`")]
    UnknownRegister(String),

    #[error("More argument required")]
    MissingArgument,

    #[error("Too many arguments for `{0}`")]
    TooManyArguments(Opcode),

    #[error("Syntax Error: {0}")]
    Syntax(String),

    #[error("{error}")]
    At {
        line: usize,
        #[source]
        error: Box<Error>,
    },

    #[error("Expected {expected} words of code, got {actual}")]
    CodeSize { expected: usize, actual: usize },

    #[error("Double check of `{0}`")]
    DuplicateCheck(String),

    #[error("Failed to open file: {0}")]
    FileOpen(String, #[source] std::io::Error),

    #[error("Failed to create file: {0}")]
    FileCreate(String, #[source] std::io::Error),

    #[error("Failed to write output")]
    FileWrite(#[source] std::io::Error),

    #[error("Invalid test description")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Attach the 0-based source line an error was raised on.
    pub fn at(self, line: usize) -> Self {
        match self {
            Error::At { .. } => self,
            error => Error::At {
                line,
                error: Box::new(error),
            },
        }
    }

    /// Source line of the error, if it carries one.
    pub fn line(&self) -> Option<usize> {
        match self {
            Error::At { line, .. } => Some(*line),
            _ => None,
        }
    }

    /// Error with any line information stripped.
    pub fn kind(&self) -> &Error {
        match self {
            Error::At { error, .. } => error.kind(),
            error => error,
        }
    }

    /// Like [`Error::kind`], by value.
    pub fn into_kind(self) -> Error {
        match self {
            Error::At { error, .. } => error.into_kind(),
            error => error,
        }
    }

    /// Print error with diagnostic information showing file location and line content
    pub fn print_diag(&self, files: &IndexMap<String, Vec<String>>, file: Option<&str>) {
        cprintln!("<red,bold>error</>: {}", self);

        let Some(file) = file else {
            return;
        };
        let Some(line_idx) = self.line() else {
            cprintln!("     <blue>--></> <underline>{}</>", file);
            return;
        };

        // line_idx is 0-based, display as 1-based
        let line_num = line_idx + 1;
        cprintln!("     <blue>--></> <underline>{}:{}</>", file, line_num);
        cprintln!("      <blue>|</>");

        let line_content = files
            .get(file)
            .and_then(|lines| lines.get(line_idx))
            .map(|s| s.as_str())
            .unwrap_or("");

        cprintln!(" <blue>{:>4} |</> {}", line_num, line_content);
        cprintln!("      <blue>|</>");
    }
}
