//! Numscript - compiler and funding VM of the ledger core
//!
//! Turns a parsed script plus live account data into postings:
//!
//! ```text
//! syntax::Script ──compile──▶ Program ──Machine──▶ Postings + metadata
//! ```
//!
//! - [`syntax`]: the parse tree produced by the external parser
//! - [`compiler`]: type-checks and validates the tree into a [`Program`]
//! - [`vm`]: resolves variables and balances, then runs the funding algebra
//!
//! # Invariants
//!
//! 1. A program either compiles without diagnostics or is not produced
//! 2. Execution is all or nothing: no postings survive a failed run
//! 3. `world` is always an unbounded source
//! 4. Allotments conserve the allocated total exactly

pub mod compiler;
pub mod program;
pub mod syntax;
pub mod value;
pub mod vm;

pub use compiler::{compile, CompileError, CompileErrorKind, CompileErrors};
pub use program::Program;
pub use value::{Monetary, Portion, Type, Value};
pub use vm::{
    AccountReader, InvolvedAccounts, Machine, MachineError, MachineErrorKind, MetadataProvider,
};
