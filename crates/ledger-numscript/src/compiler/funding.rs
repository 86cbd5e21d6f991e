//! Sources, destinations and allotments

use std::collections::HashSet;

use ledger_types::WORLD;
use num_rational::BigRational;
use num_traits::{One, Zero};

use super::{Check, CompileErrorKind, Compiler};
use crate::program::{
    AllotmentPart, AllotmentPortion, Destination, Expr, InOrderPart, KeptOrDestination,
    Overdraft, Source,
};
use crate::syntax;
use crate::value::{Type, Value};

pub(super) struct CompiledSource {
    pub source: Source,
    /// The source can always cover a shortfall
    pub unbounded: bool,
}

/// Whether a take-all over this source would need to split by portions
pub(super) fn contains_allotment(source: &Source) -> bool {
    match source {
        Source::Account { .. } => false,
        Source::Maxed { source, .. } => contains_allotment(source),
        Source::InOrder(sources) => sources.iter().any(contains_allotment),
        Source::Allotment(_) => true,
    }
}

fn literal_account(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Literal(Value::Account(address)) => Some(address),
        _ => None,
    }
}

impl Compiler {
    /// Lower a source tree.
    ///
    /// `emptied` holds literal accounts already drained earlier in the same
    /// chain; `capped` is set below a `max` clause, where an account is only
    /// partially drawn down.
    pub(super) fn source(
        &self,
        source: &syntax::Source,
        emptied: &mut HashSet<String>,
        capped: bool,
    ) -> Check<CompiledSource> {
        match source {
            syntax::Source::Account { account, overdraft } => {
                let account = self.expect(account, Type::Account)?;
                let literal = literal_account(&account).map(str::to_string);
                let is_world = literal.as_deref() == Some(WORLD);

                let overdraft = match overdraft {
                    Some(_) if is_world => return Err(CompileErrorKind::WorldOverdraft),
                    None => None,
                    Some(syntax::Overdraft::Unbounded) => Some(Overdraft::Unbounded),
                    Some(syntax::Overdraft::UpTo(max)) => {
                        Some(Overdraft::UpTo(self.expect(max, Type::Monetary)?))
                    }
                };
                let unbounded = is_world || matches!(overdraft, Some(Overdraft::Unbounded));

                if let Some(address) = literal.filter(|_| !is_world) {
                    if emptied.contains(&address) {
                        return Err(CompileErrorKind::AccountAlreadyEmptied { account: address });
                    }
                    if !capped && !unbounded {
                        emptied.insert(address);
                    }
                }

                Ok(CompiledSource {
                    source: Source::Account { account, overdraft },
                    unbounded,
                })
            }
            syntax::Source::Maxed { max, source } => {
                let max = self.expect(max, Type::Monetary)?;
                let inner = self.source(source, emptied, true)?;
                Ok(CompiledSource {
                    source: Source::Maxed {
                        source: Box::new(inner.source),
                        max,
                    },
                    unbounded: false,
                })
            }
            syntax::Source::InOrder(sources) => {
                let mut compiled = Vec::with_capacity(sources.len());
                let mut unbounded = false;
                for (i, source) in sources.iter().enumerate() {
                    let sub = self.source(source, emptied, capped)?;
                    if sub.unbounded && i + 1 != sources.len() {
                        return Err(CompileErrorKind::FallbackNotLast);
                    }
                    unbounded = sub.unbounded;
                    compiled.push(sub.source);
                }
                Ok(CompiledSource {
                    source: Source::InOrder(compiled),
                    unbounded,
                })
            }
            syntax::Source::Allotment(parts) => {
                let portions = self.allotment(parts.iter().map(|(p, _)| p))?;
                let mut compiled = Vec::with_capacity(parts.len());
                for (portion, (_, source)) in portions.into_iter().zip(parts) {
                    // each share is funded on its own
                    let sub = self.source(source, &mut emptied.clone(), capped)?;
                    compiled.push(AllotmentPart {
                        portion,
                        target: sub.source,
                    });
                }
                Ok(CompiledSource {
                    source: Source::Allotment(compiled),
                    unbounded: false,
                })
            }
        }
    }

    pub(super) fn destination(&self, destination: &syntax::Destination) -> Check<Destination> {
        match destination {
            syntax::Destination::Account(account) => {
                Ok(Destination::Account(self.expect(account, Type::Account)?))
            }
            syntax::Destination::InOrder { parts, remaining } => {
                let mut compiled = Vec::with_capacity(parts.len());
                for (max, target) in parts {
                    compiled.push(InOrderPart {
                        max: self.expect(max, Type::Monetary)?,
                        target: self.kept_or_destination(target)?,
                    });
                }
                Ok(Destination::InOrder {
                    parts: compiled,
                    remaining: Box::new(self.kept_or_destination(remaining)?),
                })
            }
            syntax::Destination::Allotment(parts) => {
                let portions = self.allotment(parts.iter().map(|(p, _)| p))?;
                let mut compiled = Vec::with_capacity(parts.len());
                for (portion, (_, target)) in portions.into_iter().zip(parts) {
                    compiled.push(AllotmentPart {
                        portion,
                        target: self.kept_or_destination(target)?,
                    });
                }
                Ok(Destination::Allotment(compiled))
            }
        }
    }

    fn kept_or_destination(&self, kod: &syntax::KeptOrDestination) -> Check<KeptOrDestination> {
        match kod {
            syntax::KeptOrDestination::Kept => Ok(KeptOrDestination::Kept),
            syntax::KeptOrDestination::Destination(d) => {
                Ok(KeptOrDestination::Destination(self.destination(d)?))
            }
        }
    }

    /// Lower and validate the portions of one allotment
    fn allotment<'a>(
        &self,
        portions: impl Iterator<Item = &'a syntax::AllotmentPortion>,
    ) -> Check<Vec<AllotmentPortion>> {
        let mut lowered = Vec::new();
        let mut total = BigRational::zero();
        let mut remaining = 0usize;
        let mut variables = 0usize;

        for portion in portions {
            lowered.push(match portion {
                syntax::AllotmentPortion::Constant(r) => {
                    if *r <= BigRational::zero() || *r > BigRational::one() {
                        return Err(CompileErrorKind::InvalidLiteral {
                            message: format!("portion {r}"),
                        });
                    }
                    total += r;
                    AllotmentPortion::Constant(r.clone())
                }
                syntax::AllotmentPortion::Variable(name) => {
                    variables += 1;
                    let expr = self.expect(&syntax::Expr::Variable(name.clone()), Type::Portion)?;
                    AllotmentPortion::Variable(expr)
                }
                syntax::AllotmentPortion::Remaining => {
                    remaining += 1;
                    AllotmentPortion::Remaining
                }
            });
        }

        if lowered.is_empty() {
            return Err(CompileErrorKind::EmptyAllotment);
        }
        if remaining > 1 {
            return Err(CompileErrorKind::DuplicateRemaining);
        }
        if total > BigRational::one() {
            return Err(CompileErrorKind::OverAllocated {
                total: total.to_string(),
            });
        }
        if total == BigRational::one() && (remaining > 0 || variables > 0) {
            return Err(CompileErrorKind::AmbiguousAllotment);
        }
        if total < BigRational::one() && remaining == 0 && variables == 0 {
            return Err(CompileErrorKind::UnderAllocated {
                total: total.to_string(),
            });
        }
        Ok(lowered)
    }
}
