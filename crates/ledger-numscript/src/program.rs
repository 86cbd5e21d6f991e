//! Compiled program model
//!
//! A `Program` is the typed, validated form of a script. It is immutable once
//! built and shared read-only (behind an `Arc`) by every execution of the same
//! script text.

use num_rational::BigRational;

use crate::value::{Type, Value};

/// A compiled script
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub vars: Vec<VarDecl>,
    pub instructions: Vec<Instruction>,
}

impl Program {
    /// Declarations the caller must bind (no origin)
    pub fn free_vars(&self) -> impl Iterator<Item = &VarDecl> {
        self.vars.iter().filter(|v| v.origin.is_none())
    }

    pub fn var(&self, name: &str) -> Option<&VarDecl> {
        self.vars.iter().find(|v| v.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub ty: Type,
    pub name: String,
    pub origin: Option<VarOrigin>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarOrigin {
    /// Account metadata decoded against the declared type
    Meta { account: Expr, key: String },
    /// Current balance of an account; only for monetary variables
    Balance { account: Expr, asset: Expr },
}

/// Typed binary operators.
///
/// Arithmetic is resolved to its operand type at compile time so the VM
/// never has to dispatch on operand tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    NumberAdd,
    NumberSub,
    MonetaryAdd,
    MonetarySub,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Variable(String),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Not(Box<Expr>),
    Ternary {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    MonetaryNew {
        asset: Box<Expr>,
        amount: Box<Expr>,
    },
}

/// How much a `send` or `save` wants
#[derive(Debug, Clone, PartialEq)]
pub enum Amount {
    /// An exact monetary amount
    Monetary(Expr),
    /// Everything available in the given asset
    All(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Print(Expr),
    Fail,
    /// Withdraw `amount` from `source` and allocate it to `destination`
    Allocate {
        amount: Amount,
        source: Source,
        destination: Destination,
    },
    SetTxMeta {
        key: String,
        value: Expr,
    },
    SetAccountMeta {
        account: Expr,
        key: String,
        value: Expr,
    },
    /// Withhold part or all of a balance from later sends
    Save {
        account: Expr,
        amount: Amount,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overdraft {
    Unbounded,
    UpTo(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AllotmentPortion {
    Constant(BigRational),
    Variable(Expr),
    Remaining,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllotmentPart<T> {
    pub portion: AllotmentPortion,
    pub target: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Account {
        account: Expr,
        overdraft: Option<Overdraft>,
    },
    Maxed {
        source: Box<Source>,
        max: Expr,
    },
    InOrder(Vec<Source>),
    Allotment(Vec<AllotmentPart<Source>>),
}

impl Source {
    /// Visit every account source reachable from this node
    pub fn for_each_account<'a>(&'a self, f: &mut dyn FnMut(&'a Expr, Option<&'a Overdraft>)) {
        match self {
            Source::Account { account, overdraft } => f(account, overdraft.as_ref()),
            Source::Maxed { source, .. } => source.for_each_account(f),
            Source::InOrder(sources) => {
                for source in sources {
                    source.for_each_account(f);
                }
            }
            Source::Allotment(parts) => {
                for part in parts {
                    part.target.for_each_account(f);
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeptOrDestination {
    Kept,
    Destination(Destination),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InOrderPart {
    pub max: Expr,
    pub target: KeptOrDestination,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    Account(Expr),
    InOrder {
        parts: Vec<InOrderPart>,
        remaining: Box<KeptOrDestination>,
    },
    Allotment(Vec<AllotmentPart<KeptOrDestination>>),
}

impl KeptOrDestination {
    pub fn for_each_account<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        if let KeptOrDestination::Destination(destination) = self {
            destination.for_each_account(f);
        }
    }
}

impl Destination {
    /// Visit every destination account expression
    pub fn for_each_account<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        match self {
            Destination::Account(account) => f(account),
            Destination::InOrder { parts, remaining } => {
                for part in parts {
                    part.target.for_each_account(f);
                }
                remaining.for_each_account(f);
            }
            Destination::Allotment(parts) => {
                for part in parts {
                    part.target.for_each_account(f);
                }
            }
        }
    }
}
