//! Compile diagnostics

use std::fmt;

use thiserror::Error;

use crate::syntax::Span;

/// What went wrong while lowering a parse tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    // ========================================================================
    // Parser Errors
    // ========================================================================

    /// Reported by the external parser and passed through verbatim
    #[error("Syntax error: {message}")]
    Syntax { message: String },

    // ========================================================================
    // Type Errors
    // ========================================================================

    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Unknown type: {name}")]
    UnknownType { name: String },

    #[error("Invalid literal: {message}")]
    InvalidLiteral { message: String },

    #[error("Cannot combine different assets: {left} and {right}")]
    AssetMismatch { left: String, right: String },

    // ========================================================================
    // Variable Errors
    // ========================================================================

    #[error("Duplicate variable: ${name}")]
    DuplicateVariable { name: String },

    #[error("Undeclared variable: ${name}")]
    UndeclaredVariable { name: String },

    #[error("Variable ${name} of type {ty} cannot be read from an account balance")]
    InvalidOrigin { name: String, ty: String },

    // ========================================================================
    // Allotment Errors
    // ========================================================================

    #[error("Allotment portions exceed 100%: {total}")]
    OverAllocated { total: String },

    #[error("Allotment portions sum to {total} with no remaining portion")]
    UnderAllocated { total: String },

    #[error("Allotment has more than one remaining portion")]
    DuplicateRemaining,

    #[error("Allotment portions already sum to 100%, remaining or variable portions are ambiguous")]
    AmbiguousAllotment,

    #[error("Allotment has no portions")]
    EmptyAllotment,

    // ========================================================================
    // Source Errors
    // ========================================================================

    #[error("Cannot send all from a source with an unbounded overdraft")]
    UnboundedTakeAll,

    #[error("An unbounded source can only be in last position")]
    FallbackNotLast,

    #[error("@world already has an unbounded overdraft")]
    WorldOverdraft,

    #[error("Account @{account} is already empty at this stage")]
    AccountAlreadyEmptied { account: String },

    #[error("Cannot send all from an allotment of sources")]
    AllotmentSendAll,
}

/// A single diagnostic with its position
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}:{}: {}", .span.line, .span.column, .kind)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub span: Span,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// Every diagnostic produced by one compilation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileErrors(pub Vec<CompileError>);

impl CompileErrors {
    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.0.iter()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &CompileErrorKind> {
        self.0.iter().map(|e| &e.kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<CompileError> for CompileErrors {
    fn from(error: CompileError) -> Self {
        CompileErrors(vec![error])
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}
