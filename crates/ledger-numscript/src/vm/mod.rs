//! Funding virtual machine
//!
//! A `Machine` runs one compiled program once, in three phases that must be
//! called in order, each exactly once:
//!
//! ```text
//! set_vars → resolve_resources → resolve_balances → execute
//! ```
//!
//! - `resolve_resources` fetches variables with an origin and reports the
//!   accounts the program touches, so the caller can lock them
//! - `resolve_balances` snapshots the balances the program may withdraw
//!   from; it must run after the caller holds the locks
//! - `execute` interprets the instructions against that snapshot and
//!   produces postings and metadata, all or nothing
//!
//! The machine is single-threaded and owns all of its state.

mod allotment;
mod error;
mod funding;
mod store;

pub use allotment::Allotment;
pub use error::{BoxError, MachineError, MachineErrorKind, Result};
pub use funding::{Funding, FundingPart};
pub use store::{AccountReader, MetadataProvider};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use ledger_types::{Metadata, Posting, WORLD};
use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use tracing::debug;

use crate::program::{
    Amount, AllotmentPortion, BinaryOp, Destination, Expr, Instruction, KeptOrDestination,
    Overdraft, Program, Source, VarOrigin,
};
use crate::value::{Monetary, Portion, Type, Value};

/// Execution phase of a machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Ready,
    ResourcesResolved,
    BalancesResolved,
    Executed,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Ready => "ready",
            Phase::ResourcesResolved => "resources resolved",
            Phase::BalancesResolved => "balances resolved",
            Phase::Executed => "executed",
        }
    }
}

/// Accounts a program touches, `world` excluded.
///
/// `read` holds every referenced account, `write` the subset used as
/// sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvolvedAccounts {
    pub read: BTreeSet<String>,
    pub write: BTreeSet<String>,
}

impl InvolvedAccounts {
    fn read(&mut self, address: String) {
        if address != WORLD {
            self.read.insert(address);
        }
    }

    fn write(&mut self, address: String) {
        if address != WORLD {
            self.read.insert(address.clone());
            self.write.insert(address);
        }
    }
}

#[derive(Debug)]
pub struct Machine {
    program: Arc<Program>,
    phase: Phase,
    vars: HashMap<String, Value>,
    balances: HashMap<String, HashMap<String, BigInt>>,
    postings: Vec<Posting>,
    tx_meta: BTreeMap<String, Value>,
    account_meta: BTreeMap<String, BTreeMap<String, Value>>,
    printed: Vec<Value>,
}

impl Machine {
    pub fn new(program: Arc<Program>) -> Self {
        Self {
            program,
            phase: Phase::Ready,
            vars: HashMap::new(),
            balances: HashMap::new(),
            postings: Vec::new(),
            tx_meta: BTreeMap::new(),
            account_meta: BTreeMap::new(),
            printed: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn advance(&mut self, from: Phase, to: Phase, operation: &'static str) -> Result<()> {
        if self.phase != from {
            return Err(MachineError::InvalidState {
                operation,
                phase: self.phase.name(),
            });
        }
        self.phase = to;
        Ok(())
    }

    // ========================================================================
    // Variables
    // ========================================================================

    /// Bind caller-supplied variables.
    ///
    /// Unknown names and variables that carry an origin are rejected as
    /// extraneous; values must match the declared type.
    pub fn set_vars(&mut self, vars: HashMap<String, Value>) -> Result<()> {
        if self.phase != Phase::Ready {
            return Err(MachineError::InvalidState {
                operation: "set variables",
                phase: self.phase.name(),
            });
        }

        for (name, value) in vars {
            let decl = match self.program.var(&name) {
                Some(decl) if decl.origin.is_none() => decl,
                _ => return Err(MachineError::ExtraneousVariable { name }),
            };
            if value.ty() != decl.ty {
                return Err(MachineError::TypeMismatch {
                    name,
                    expected: decl.ty,
                    found: value.ty().to_string(),
                });
            }
            if value.is_negative_monetary() {
                return Err(MachineError::NegativeAmount {
                    what: format!("${name}"),
                    amount: value.to_string(),
                });
            }
            self.vars.insert(name, value);
        }
        Ok(())
    }

    /// Decode JSON variables against their declared types, then bind them
    pub fn set_vars_from_json(&mut self, vars: &BTreeMap<String, serde_json::Value>) -> Result<()> {
        let mut decoded = HashMap::with_capacity(vars.len());
        for (name, json) in vars {
            let decl = self
                .program
                .var(name)
                .ok_or_else(|| MachineError::ExtraneousVariable { name: name.clone() })?;
            let value = Value::from_json(decl.ty, json).map_err(|source| {
                MachineError::InvalidVariable {
                    name: name.clone(),
                    source,
                }
            })?;
            decoded.insert(name.clone(), value);
        }
        self.set_vars(decoded)
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Fetch variables with an origin and collect the involved accounts
    pub async fn resolve_resources<S>(&mut self, store: &S) -> Result<InvolvedAccounts>
    where
        S: AccountReader + ?Sized,
    {
        self.advance(Phase::Ready, Phase::ResourcesResolved, "resolve resources")?;
        let program = Arc::clone(&self.program);

        if let Some(decl) = program.free_vars().find(|d| !self.vars.contains_key(&d.name)) {
            return Err(MachineError::MissingVariable {
                name: decl.name.clone(),
            });
        }

        let mut involved = InvolvedAccounts::default();
        for decl in &program.vars {
            let Some(origin) = &decl.origin else {
                continue;
            };

            let value = match origin {
                VarOrigin::Meta { account, key } => {
                    let address = self.eval_account(account)?;
                    let raw = store.get_metadata(&address, key).await?;
                    involved.read(address);
                    Value::from_metadata(decl.ty, &raw).map_err(|source| {
                        MachineError::InvalidVariable {
                            name: decl.name.clone(),
                            source,
                        }
                    })?
                }
                VarOrigin::Balance { account, asset } => {
                    let address = self.eval_account(account)?;
                    let asset = self.eval_asset(asset)?;
                    let snapshot = store
                        .get_account(&address)
                        .await
                        .map_err(MachineError::Store)?;
                    involved.read(address);
                    Value::Monetary(Monetary::new(asset.clone(), snapshot.balance(&asset)))
                }
            };

            if value.is_negative_monetary() {
                return Err(MachineError::NegativeAmount {
                    what: format!("${}", decl.name),
                    amount: value.to_string(),
                });
            }
            self.vars.insert(decl.name.clone(), value);
        }

        for instruction in &program.instructions {
            match instruction {
                Instruction::Allocate {
                    source,
                    destination,
                    ..
                } => {
                    let mut sources = Vec::new();
                    source.for_each_account(&mut |account, _| sources.push(account));
                    for account in sources {
                        involved.write(self.eval_account(account)?);
                    }

                    let mut destinations = Vec::new();
                    destination.for_each_account(&mut |account| destinations.push(account));
                    for account in destinations {
                        involved.read(self.eval_account(account)?);
                    }
                }
                Instruction::SetAccountMeta { account, .. } | Instruction::Save { account, .. } => {
                    involved.read(self.eval_account(account)?);
                }
                Instruction::Print(_) | Instruction::Fail | Instruction::SetTxMeta { .. } => {}
            }
        }

        Ok(involved)
    }

    /// Snapshot every balance the program may withdraw from
    pub async fn resolve_balances<S>(&mut self, store: &S) -> Result<()>
    where
        S: AccountReader + ?Sized,
    {
        self.advance(
            Phase::ResourcesResolved,
            Phase::BalancesResolved,
            "resolve balances",
        )?;
        let program = Arc::clone(&self.program);

        let mut needed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for instruction in &program.instructions {
            match instruction {
                Instruction::Allocate { amount, source, .. } => {
                    let asset = self.amount_asset(amount)?;
                    let mut accounts = Vec::new();
                    source.for_each_account(&mut |account, _| accounts.push(account));
                    for account in accounts {
                        let address = self.eval_account(account)?;
                        if address != WORLD {
                            needed.entry(address).or_default().insert(asset.clone());
                        }
                    }
                }
                Instruction::Save { account, amount } => {
                    let asset = self.amount_asset(amount)?;
                    let address = self.eval_account(account)?;
                    if address != WORLD {
                        needed.entry(address).or_default().insert(asset);
                    }
                }
                _ => {}
            }
        }

        for (address, assets) in needed {
            let snapshot = store
                .get_account(&address)
                .await
                .map_err(MachineError::Store)?;
            let balances = self.balances.entry(address).or_default();
            for asset in assets {
                let balance = snapshot.balance(&asset);
                balances.insert(asset, balance);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Run every instruction in order
    pub fn execute(&mut self) -> Result<()> {
        self.advance(Phase::BalancesResolved, Phase::Executed, "execute")?;
        let program = Arc::clone(&self.program);
        for instruction in &program.instructions {
            self.step(instruction)?;
        }
        Ok(())
    }

    fn step(&mut self, instruction: &Instruction) -> Result<()> {
        match instruction {
            Instruction::Print(expr) => {
                let value = self.eval(expr)?;
                debug!(value = %value, "script print");
                self.printed.push(value);
            }
            Instruction::Fail => return Err(MachineError::ScriptFailed),
            Instruction::SetTxMeta { key, value } => {
                let value = self.eval(value)?;
                self.tx_meta.insert(key.clone(), value);
            }
            Instruction::SetAccountMeta {
                account,
                key,
                value,
            } => {
                let address = self.eval_account(account)?;
                let value = self.eval(value)?;
                self.account_meta
                    .entry(address)
                    .or_default()
                    .insert(key.clone(), value);
            }
            Instruction::Save { account, amount } => {
                let address = self.eval_account(account)?;
                if address == WORLD {
                    return Ok(());
                }
                match amount {
                    Amount::Monetary(expr) => {
                        let monetary = self.eval_monetary(expr)?;
                        check_non_negative("save", &monetary)?;
                        let balance = self.balance_mut(&address, &monetary.asset)?;
                        *balance = if *balance > monetary.amount {
                            &*balance - &monetary.amount
                        } else {
                            balance.clone().min(BigInt::zero())
                        };
                    }
                    Amount::All(expr) => {
                        let asset = self.eval_asset(expr)?;
                        let balance = self.balance_mut(&address, &asset)?;
                        *balance = balance.clone().min(BigInt::zero());
                    }
                }
            }
            Instruction::Allocate {
                amount,
                source,
                destination,
            } => {
                let funding = match amount {
                    Amount::Monetary(expr) => {
                        let wanted = self.eval_monetary(expr)?;
                        check_non_negative("send", &wanted)?;
                        self.take(source, &wanted.asset, &wanted.amount)?
                    }
                    Amount::All(expr) => {
                        let asset = self.eval_asset(expr)?;
                        self.take_all(source, &asset)?
                    }
                };
                let kept = self.allocate(funding, destination)?;
                self.repay(&kept);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Funding
    // ========================================================================

    /// Withdraw exactly `wanted`, calling on the fallback for any shortfall
    fn take(&mut self, source: &Source, asset: &str, wanted: &BigInt) -> Result<Funding> {
        let (mut funding, fallback) = self.withdraw(source, asset, wanted)?;
        let total = funding.total();
        if total < *wanted {
            match fallback {
                Some(account) => {
                    let missing = wanted - &total;
                    self.withdraw_always(&account, asset, &missing);
                    funding.push(&account, missing);
                }
                None => {
                    return Err(MachineError::InsufficientFunds {
                        asset: asset.to_string(),
                        requested: wanted.to_string(),
                        available: total.to_string(),
                    })
                }
            }
        }
        Ok(funding)
    }

    /// Withdraw up to `wanted` from bounded sources.
    ///
    /// Unbounded accounts contribute nothing here; the last one reached is
    /// returned as the fallback.
    fn withdraw(
        &mut self,
        source: &Source,
        asset: &str,
        wanted: &BigInt,
    ) -> Result<(Funding, Option<String>)> {
        let mut funding = Funding::new(asset);
        match source {
            Source::Account { account, overdraft } => {
                let address = self.eval_account(account)?;
                if address == WORLD || matches!(overdraft, Some(Overdraft::Unbounded)) {
                    return Ok((funding, Some(address)));
                }
                let overdraft = self.overdraft(overdraft.as_ref(), asset)?;
                let balance = self.balance_mut(&address, asset)?;
                let available = &*balance + &overdraft;
                let taken = available.min(wanted.clone()).max(BigInt::zero());
                *balance -= &taken;
                funding.push(&address, taken);
                Ok((funding, None))
            }
            Source::Maxed { source, max } => {
                let max = self.eval_monetary(max)?;
                check_asset(asset, &max.asset)?;
                check_non_negative("max", &max)?;
                let cap = max.amount.min(wanted.clone());

                let (mut capped, fallback) = self.withdraw(source, asset, &cap)?;
                let total = capped.total();
                if let Some(account) = fallback.filter(|_| total < cap) {
                    let missing = &cap - &total;
                    self.withdraw_always(&account, asset, &missing);
                    capped.push(&account, missing);
                }
                Ok((capped, None))
            }
            Source::InOrder(sources) => {
                let mut fallback = None;
                for (i, source) in sources.iter().enumerate() {
                    let missing = wanted - funding.total();
                    if !missing.is_positive() {
                        break;
                    }
                    let (taken, sub_fallback) = self.withdraw(source, asset, &missing)?;
                    funding.concat(taken)?;
                    if let Some(account) = &sub_fallback {
                        if i + 1 != sources.len() {
                            return Err(MachineError::FallbackNotLast {
                                account: account.clone(),
                            });
                        }
                    }
                    fallback = sub_fallback;
                }
                Ok((funding, fallback))
            }
            Source::Allotment(parts) => {
                let allotment = self.allotment(parts.iter().map(|p| &p.portion))?;
                let shares = allotment.allocate(wanted);
                for (part, share) in parts.iter().zip(shares) {
                    let taken = self.take(&part.target, asset, &share)?;
                    funding.concat(taken)?;
                }
                Ok((funding, None))
            }
        }
    }

    /// Drain everything available
    fn take_all(&mut self, source: &Source, asset: &str) -> Result<Funding> {
        match source {
            Source::Account { account, overdraft } => {
                let address = self.eval_account(account)?;
                if address == WORLD || matches!(overdraft, Some(Overdraft::Unbounded)) {
                    return Err(MachineError::UnboundedTakeAll { account: address });
                }
                let overdraft = self.overdraft(overdraft.as_ref(), asset)?;
                let balance = self.balance_mut(&address, asset)?;
                let taken = (&*balance + &overdraft).max(BigInt::zero());
                *balance -= &taken;

                let mut funding = Funding::new(asset);
                funding.push(&address, taken);
                Ok(funding)
            }
            Source::Maxed { max, .. } => {
                let max = self.eval_monetary(max)?;
                Ok(self.withdraw(source, asset, &max.amount)?.0)
            }
            Source::InOrder(sources) => {
                let mut funding = Funding::new(asset);
                for source in sources {
                    let taken = self.take_all(source, asset)?;
                    funding.concat(taken)?;
                }
                Ok(funding)
            }
            Source::Allotment(_) => Err(MachineError::InvalidAllotment {
                message: "cannot send all from an allotment of sources".to_string(),
            }),
        }
    }

    fn withdraw_always(&mut self, account: &str, asset: &str, amount: &BigInt) {
        if let Some(balance) = self.balance_entry(account, asset) {
            *balance -= amount;
        }
    }

    fn credit(&mut self, account: &str, asset: &str, amount: &BigInt) {
        if let Some(balance) = self.balance_entry(account, asset) {
            *balance += amount;
        }
    }

    /// Return kept funds to the accounts they were withdrawn from
    fn repay(&mut self, funding: &Funding) {
        for part in &funding.parts {
            self.credit(&part.account, &funding.asset, &part.amount);
        }
    }

    fn overdraft(&self, overdraft: Option<&Overdraft>, asset: &str) -> Result<BigInt> {
        match overdraft {
            Some(Overdraft::UpTo(expr)) => {
                let max = self.eval_monetary(expr)?;
                check_asset(asset, &max.asset)?;
                check_non_negative("overdraft", &max)?;
                Ok(max.amount)
            }
            _ => Ok(BigInt::zero()),
        }
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Assign a funding to a destination, returning what is kept
    fn allocate(&mut self, funding: Funding, destination: &Destination) -> Result<Funding> {
        let asset = funding.asset.clone();
        match destination {
            Destination::Account(account) => {
                let address = self.eval_account(account)?;
                let total = funding.total();
                for part in funding.parts {
                    if part.amount.is_positive() {
                        self.postings
                            .push(Posting::new(part.account, address.clone(), asset.clone(), part.amount));
                    }
                }
                self.credit(&address, &asset, &total);
                Ok(Funding::new(asset))
            }
            Destination::InOrder { parts, remaining } => {
                let mut left = funding;
                let mut kept = Funding::new(asset.clone());
                for part in parts {
                    let max = self.eval_monetary(&part.max)?;
                    check_asset(&asset, &max.asset)?;
                    check_non_negative("max", &max)?;
                    let (slice, rest) = left.take_max(&max.amount);
                    kept.concat(self.allocate_kept_or(slice, &part.target)?)?;
                    left = rest;
                }
                kept.concat(self.allocate_kept_or(left, remaining)?)?;
                Ok(kept)
            }
            Destination::Allotment(parts) => {
                let allotment = self.allotment(parts.iter().map(|p| &p.portion))?;
                let shares = allotment.allocate(&funding.total());
                let mut left = funding;
                let mut kept = Funding::new(asset);
                for (part, share) in parts.iter().zip(shares) {
                    let (slice, rest) = left.take(&share)?;
                    kept.concat(self.allocate_kept_or(slice, &part.target)?)?;
                    left = rest;
                }
                Ok(kept)
            }
        }
    }

    fn allocate_kept_or(&mut self, funding: Funding, target: &KeptOrDestination) -> Result<Funding> {
        match target {
            KeptOrDestination::Kept => Ok(funding),
            KeptOrDestination::Destination(destination) => self.allocate(funding, destination),
        }
    }

    fn allotment<'a>(
        &self,
        portions: impl Iterator<Item = &'a AllotmentPortion>,
    ) -> Result<Allotment> {
        let portions = portions
            .map(|portion| match portion {
                AllotmentPortion::Constant(r) => Ok(Portion::Specific(r.clone())),
                AllotmentPortion::Variable(expr) => self.eval_portion(expr),
                AllotmentPortion::Remaining => Ok(Portion::Remaining),
            })
            .collect::<Result<Vec<_>>>()?;
        Allotment::new(&portions)
    }

    // ========================================================================
    // Balances
    // ========================================================================

    fn balance_entry(&mut self, account: &str, asset: &str) -> Option<&mut BigInt> {
        self.balances
            .get_mut(account)
            .and_then(|balances| balances.get_mut(asset))
    }

    fn balance_mut(&mut self, account: &str, asset: &str) -> Result<&mut BigInt> {
        self.balances
            .get_mut(account)
            .and_then(|balances| balances.get_mut(asset))
            .ok_or_else(|| MachineError::MissingBalance {
                account: account.to_string(),
                asset: asset.to_string(),
            })
    }

    fn amount_asset(&self, amount: &Amount) -> Result<String> {
        match amount {
            Amount::Monetary(expr) => Ok(self.eval_monetary(expr)?.asset),
            Amount::All(expr) => self.eval_asset(expr),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn eval(&self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| MachineError::MissingVariable { name: name.clone() }),
            Expr::Not(inner) => Ok(Value::Bool(!self.eval_bool(inner)?)),
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                if self.eval_bool(condition)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            Expr::MonetaryNew { asset, amount } => {
                let asset = self.eval_asset(asset)?;
                let amount = self.eval_number(amount)?;
                Ok(Value::Monetary(Monetary::new(asset, amount)))
            }
            Expr::Binary { op, lhs, rhs } => self.eval_binary(*op, lhs, rhs),
        }
    }

    fn eval_binary(&self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<Value> {
        let value = match op {
            BinaryOp::NumberAdd => Value::Number(self.eval_number(lhs)? + self.eval_number(rhs)?),
            BinaryOp::NumberSub => Value::Number(self.eval_number(lhs)? - self.eval_number(rhs)?),
            BinaryOp::MonetaryAdd | BinaryOp::MonetarySub => {
                let a = self.eval_monetary(lhs)?;
                let b = self.eval_monetary(rhs)?;
                check_asset(&a.asset, &b.asset)?;
                let amount = if op == BinaryOp::MonetaryAdd {
                    a.amount + b.amount
                } else {
                    a.amount - b.amount
                };
                Value::Monetary(Monetary::new(a.asset, amount))
            }
            BinaryOp::Eq => Value::Bool(self.eval_number(lhs)? == self.eval_number(rhs)?),
            BinaryOp::Neq => Value::Bool(self.eval_number(lhs)? != self.eval_number(rhs)?),
            BinaryOp::Lt => Value::Bool(self.eval_number(lhs)? < self.eval_number(rhs)?),
            BinaryOp::Lte => Value::Bool(self.eval_number(lhs)? <= self.eval_number(rhs)?),
            BinaryOp::Gt => Value::Bool(self.eval_number(lhs)? > self.eval_number(rhs)?),
            BinaryOp::Gte => Value::Bool(self.eval_number(lhs)? >= self.eval_number(rhs)?),
            BinaryOp::And => Value::Bool(self.eval_bool(lhs)? && self.eval_bool(rhs)?),
            BinaryOp::Or => Value::Bool(self.eval_bool(lhs)? || self.eval_bool(rhs)?),
        };
        Ok(value)
    }

    fn eval_account(&self, expr: &Expr) -> Result<String> {
        match self.eval(expr)? {
            Value::Account(address) => Ok(address),
            other => Err(unexpected(Type::Account, other)),
        }
    }

    fn eval_asset(&self, expr: &Expr) -> Result<String> {
        match self.eval(expr)? {
            Value::Asset(asset) => Ok(asset),
            other => Err(unexpected(Type::Asset, other)),
        }
    }

    fn eval_number(&self, expr: &Expr) -> Result<BigInt> {
        match self.eval(expr)? {
            Value::Number(n) => Ok(n),
            other => Err(unexpected(Type::Number, other)),
        }
    }

    fn eval_bool(&self, expr: &Expr) -> Result<bool> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(unexpected(Type::Bool, other)),
        }
    }

    fn eval_monetary(&self, expr: &Expr) -> Result<Monetary> {
        match self.eval(expr)? {
            Value::Monetary(m) => Ok(m),
            other => Err(unexpected(Type::Monetary, other)),
        }
    }

    fn eval_portion(&self, expr: &Expr) -> Result<Portion> {
        match self.eval(expr)? {
            Value::Portion(p) => Ok(p),
            other => Err(unexpected(Type::Portion, other)),
        }
    }

    // ========================================================================
    // Results
    // ========================================================================

    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    pub fn printed(&self) -> &[Value] {
        &self.printed
    }

    /// Transaction metadata set by the script, string encoded
    pub fn tx_metadata(&self) -> Metadata {
        self.tx_meta
            .iter()
            .map(|(k, v)| (k.clone(), v.to_metadata_string()))
            .collect()
    }

    /// Account metadata set by the script, string encoded
    pub fn account_metadata(&self) -> BTreeMap<String, Metadata> {
        self.account_meta
            .iter()
            .map(|(account, meta)| {
                let meta = meta
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_metadata_string()))
                    .collect();
                (account.clone(), meta)
            })
            .collect()
    }
}

fn unexpected(expected: Type, found: Value) -> MachineError {
    MachineError::TypeMismatch {
        name: "expression".to_string(),
        expected,
        found: found.ty().to_string(),
    }
}

fn check_asset(expected: &str, found: &str) -> Result<()> {
    if expected != found {
        return Err(MachineError::AssetMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    Ok(())
}

fn check_non_negative(what: &str, monetary: &Monetary) -> Result<()> {
    if monetary.amount.is_negative() {
        return Err(MachineError::NegativeAmount {
            what: what.to_string(),
            amount: monetary.to_string(),
        });
    }
    Ok(())
}
