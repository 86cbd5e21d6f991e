//! Parse tree handed to the compiler by the external numscript parser.
//!
//! The grammar and the parser live outside of this crate; this module only
//! fixes the shape of the tree they produce. The constructors below make
//! building trees by hand (in tests, or when generating scripts such as
//! reverts) terse.

use num_bigint::BigInt;
use num_rational::BigRational;

/// Position of a node in the script text (1-based)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A whole script: variable block followed by statements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub vars: Vec<VarDecl>,
    pub statements: Vec<Statement>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var(mut self, decl: VarDecl) -> Self {
        self.vars.push(decl);
        self
    }

    pub fn statement(mut self, kind: StatementKind) -> Self {
        let line = self.vars.len() + self.statements.len() + 1;
        self.statements.push(Statement {
            kind,
            span: Span::new(line, 1),
        });
        self
    }

    pub fn send(self, amount: SendAmount, source: Source, destination: Destination) -> Self {
        self.statement(StatementKind::Send {
            amount,
            source,
            destination,
        })
    }
}

/// `vars { type $name = origin }`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    /// Type name as written in the script
    pub ty: String,
    pub name: String,
    pub origin: Option<Origin>,
    pub span: Span,
}

impl VarDecl {
    pub fn new(ty: &str, name: &str) -> Self {
        Self {
            ty: ty.to_string(),
            name: name.to_string(),
            origin: None,
            span: Span::default(),
        }
    }

    pub fn meta(mut self, account: Expr, key: &str) -> Self {
        self.origin = Some(Origin::Meta {
            account,
            key: key.to_string(),
        });
        self
    }

    pub fn balance(mut self, account: Expr, asset: Expr) -> Self {
        self.origin = Some(Origin::Balance { account, asset });
        self
    }
}

/// Where a variable's value is fetched from at run time
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    Meta { account: Expr, key: String },
    Balance { account: Expr, asset: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Print(Expr),
    Fail,
    Send {
        amount: SendAmount,
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
    Save {
        amount: SendAmount,
        account: Expr,
    },
}

/// `[COIN 100]` or `$amount` versus `[COIN *]`
#[derive(Debug, Clone, PartialEq)]
pub enum SendAmount {
    Monetary(Expr),
    /// Everything available; carries the asset expression
    All(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
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
pub enum Literal {
    Account(String),
    Asset(String),
    Number(BigInt),
    String(String),
    Bool(bool),
    Monetary { asset: String, amount: BigInt },
    Portion(BigRational),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
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
    /// `[$asset $amount]`
    MonetaryNew {
        asset: Box<Expr>,
        amount: Box<Expr>,
    },
}

impl Expr {
    pub fn account(address: &str) -> Self {
        Expr::Literal(Literal::Account(address.to_string()))
    }

    pub fn asset(asset: &str) -> Self {
        Expr::Literal(Literal::Asset(asset.to_string()))
    }

    pub fn number(n: impl Into<BigInt>) -> Self {
        Expr::Literal(Literal::Number(n.into()))
    }

    pub fn string(s: &str) -> Self {
        Expr::Literal(Literal::String(s.to_string()))
    }

    pub fn bool(b: bool) -> Self {
        Expr::Literal(Literal::Bool(b))
    }

    pub fn monetary(asset: &str, amount: impl Into<BigInt>) -> Self {
        Expr::Literal(Literal::Monetary {
            asset: asset.to_string(),
            amount: amount.into(),
        })
    }

    pub fn portion(numer: i64, denom: i64) -> Self {
        Expr::Literal(Literal::Portion(BigRational::new(
            BigInt::from(numer),
            BigInt::from(denom),
        )))
    }

    pub fn var(name: &str) -> Self {
        Expr::Variable(name.to_string())
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn ternary(condition: Expr, then: Expr, otherwise: Expr) -> Self {
        Expr::Ternary {
            condition: Box::new(condition),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn monetary_new(asset: Expr, amount: Expr) -> Self {
        Expr::MonetaryNew {
            asset: Box::new(asset),
            amount: Box::new(amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overdraft {
    Unbounded,
    UpTo(Expr),
}

/// A portion as written in an allotment
#[derive(Debug, Clone, PartialEq)]
pub enum AllotmentPortion {
    Constant(BigRational),
    Variable(String),
    Remaining,
}

impl AllotmentPortion {
    pub fn percent(n: i64) -> Self {
        AllotmentPortion::Constant(BigRational::new(BigInt::from(n), BigInt::from(100)))
    }

    pub fn ratio(numer: i64, denom: i64) -> Self {
        AllotmentPortion::Constant(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Account {
        account: Expr,
        overdraft: Option<Overdraft>,
    },
    Maxed {
        max: Expr,
        source: Box<Source>,
    },
    InOrder(Vec<Source>),
    Allotment(Vec<(AllotmentPortion, Source)>),
}

impl Source {
    pub fn account(address: &str) -> Self {
        Source::Account {
            account: Expr::account(address),
            overdraft: None,
        }
    }

    pub fn unbounded(address: &str) -> Self {
        Source::Account {
            account: Expr::account(address),
            overdraft: Some(Overdraft::Unbounded),
        }
    }

    pub fn overdraft(address: &str, up_to: Expr) -> Self {
        Source::Account {
            account: Expr::account(address),
            overdraft: Some(Overdraft::UpTo(up_to)),
        }
    }

    pub fn maxed(max: Expr, source: Source) -> Self {
        Source::Maxed {
            max,
            source: Box::new(source),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeptOrDestination {
    Kept,
    Destination(Destination),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    Account(Expr),
    InOrder {
        parts: Vec<(Expr, KeptOrDestination)>,
        remaining: Box<KeptOrDestination>,
    },
    Allotment(Vec<(AllotmentPortion, KeptOrDestination)>),
}

impl Destination {
    pub fn account(address: &str) -> Self {
        Destination::Account(Expr::account(address))
    }
}

impl From<Destination> for KeptOrDestination {
    fn from(destination: Destination) -> Self {
        KeptOrDestination::Destination(destination)
    }
}
