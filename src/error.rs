//! Error types for GradientScript.
//!
//! Every pipeline stage gets its own error enum, each
//! carrying enough context (a [`Span`] where positional, the offending
//! name otherwise) to produce a useful diagnostic. Stage errors chain into
//! the next stage's enum with `#[from]` exactly the way a lexer error
//! chains into a parse error, and the whole chain finally folds into
//! [`GsError`], the enum the CLI matches on.

use crate::term::Span;
use thiserror::Error;

/// Errors produced while tokenizing GradientScript source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    /// An unrecognized character was encountered.
    #[error("unexpected character '{ch}' at line {}, column {}", span.line, span.column)]
    UnexpectedChar { ch: char, span: Span },

    /// A numeric literal had a malformed decimal or trailing garbage.
    #[error("malformed number '{text}' at line {}, column {}", span.line, span.column)]
    MalformedNumber { text: String, span: Span },
}

/// Errors produced while parsing a token stream into a [`crate::term::Function`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("expected {expected}, found {found} at line {}, column {}", span.line, span.column)]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("unexpected end of input while parsing {context}")]
    UnexpectedEof { context: String },

    #[error("duplicate parameter '{name}' at line {}, column {}", span.line, span.column)]
    DuplicateParameter { name: String, span: Span },

    #[error("invalid component list for parameter '{name}' at line {}, column {}", span.line, span.column)]
    InvalidComponentList { name: String, span: Span },

    #[error("duplicate local assignment to '{name}' at line {}, column {}", span.line, span.column)]
    DuplicateAssignment { name: String, span: Span },

    #[error(transparent)]
    Lex(#[from] LexError),
}

/// Errors produced while inferring and checking types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TypeError {
    #[error("unknown identifier '{name}'")]
    UnknownIdentifier { name: String },

    #[error("unknown component '{component}' on parameter '{param}'")]
    UnknownComponent { param: String, component: String },

    #[error("struct operands have mismatched components: {lhs:?} vs {rhs:?}")]
    MismatchedStructs { lhs: Vec<String>, rhs: Vec<String> },

    #[error("'{name}' expects {expected} argument(s), found {found}")]
    WrongArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("component access '.{field}' on a non-struct expression")]
    ComponentOfScalar { field: String },
}

/// The kind of differentiation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffErrorKind {
    /// Parse-recognized but deliberately not differentiable (`pow`, `asin`, `acos`).
    NotImplemented,
    /// Structurally impossible to differentiate with this core (`f^g` with variable `g`,
    /// `normalize2d/3d`, `cross3d`).
    NotSupported,
}

/// Errors produced by the differentiator.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot differentiate '{primitive}': {reason} ({kind:?})")]
pub struct DiffError {
    pub primitive: String,
    pub reason: String,
    pub kind: DiffErrorKind,
}

impl DiffError {
    pub fn not_implemented(primitive: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            primitive: primitive.into(),
            reason: reason.into(),
            kind: DiffErrorKind::NotImplemented,
        }
    }

    pub fn not_supported(primitive: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            primitive: primitive.into(),
            reason: reason.into(),
            kind: DiffErrorKind::NotSupported,
        }
    }
}

/// Errors produced by the code emitter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmitError {
    #[error("'{name}' requires {expected} argument(s) at emission time, found {found}")]
    InvalidArity {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("'{name}' cannot be emitted directly; it should have been expanded before extraction")]
    UnsupportedPrimitive { name: String },
}

/// A single gradient component whose analytical value failed the
/// numerical check at one test point.
#[derive(Debug, Clone, PartialEq)]
pub struct ToleranceFailure {
    pub path: String,
    pub point_scale: f64,
    pub analytical: f64,
    pub numerical: f64,
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
}

/// Errors produced by the gradient checker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    #[error(
        "gradient verification failed for '{}' at scale {}: analytical={} numerical={}",
        .0.path, .0.point_scale, .0.analytical, .0.numerical
    )]
    ToleranceExceeded(ToleranceFailure),
}

/// The top-level error the CLI driver matches on.
#[derive(Error, Debug)]
pub enum GsError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error(transparent)]
    Check(#[from] CheckError),

    #[error("input file must have a .gs extension, got '{0}'")]
    MissingOrBadFile(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
