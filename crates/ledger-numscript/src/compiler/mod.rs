//! Semantic compiler: parse tree to typed `Program`.
//!
//! Compilation is a pure function of the parse tree. Diagnostics are
//! collected per declaration and per statement so one pass reports as many
//! independent problems as possible; a program is only returned when there
//! are none.
//!
//! # Checks
//!
//! - Every expression is type-checked bottom-up
//! - Variables are declared once and declared before use
//! - `balance(...)` origins only on monetary variables
//! - Allotments are neither over- nor under-allocated
//! - Unbounded sources only in last position, never drained with `*`

mod error;
mod expr;
mod funding;

pub use error::{CompileError, CompileErrorKind, CompileErrors};

use std::collections::{HashMap, HashSet};

use crate::program::{Amount, Instruction, Program, VarDecl, VarOrigin};
use crate::syntax::{self, Span, StatementKind};
use crate::value::Type;

type Check<T> = std::result::Result<T, CompileErrorKind>;

/// Compile a parse tree into a program
pub fn compile(script: &syntax::Script) -> Result<Program, CompileErrors> {
    Compiler::default().run(script)
}

#[derive(Default)]
struct Compiler {
    vars: HashMap<String, Type>,
    errors: Vec<CompileError>,
    span: Span,
}

impl Compiler {
    fn run(mut self, script: &syntax::Script) -> Result<Program, CompileErrors> {
        let mut vars = Vec::with_capacity(script.vars.len());
        for decl in &script.vars {
            self.span = decl.span;
            match self.declare(decl) {
                Ok(decl) => vars.push(decl),
                Err(kind) => self.fail(kind),
            }
        }

        let mut instructions = Vec::with_capacity(script.statements.len());
        for statement in &script.statements {
            self.span = statement.span;
            match self.statement(&statement.kind) {
                Ok(instruction) => instructions.push(instruction),
                Err(kind) => self.fail(kind),
            }
        }

        if self.errors.is_empty() {
            Ok(Program { vars, instructions })
        } else {
            Err(CompileErrors(self.errors))
        }
    }

    fn fail(&mut self, kind: CompileErrorKind) {
        self.errors.push(CompileError::new(kind, self.span));
    }

    fn declare(&mut self, decl: &syntax::VarDecl) -> Check<VarDecl> {
        let ty: Type = decl
            .ty
            .parse()
            .map_err(|name| CompileErrorKind::UnknownType { name })?;

        if self.vars.contains_key(&decl.name) {
            return Err(CompileErrorKind::DuplicateVariable {
                name: decl.name.clone(),
            });
        }

        // Origins may only refer to variables declared above
        let origin = match &decl.origin {
            None => None,
            Some(syntax::Origin::Meta { account, key }) => Some(VarOrigin::Meta {
                account: self.expect(account, Type::Account)?,
                key: key.clone(),
            }),
            Some(syntax::Origin::Balance { account, asset }) => {
                if ty != Type::Monetary {
                    return Err(CompileErrorKind::InvalidOrigin {
                        name: decl.name.clone(),
                        ty: ty.to_string(),
                    });
                }
                Some(VarOrigin::Balance {
                    account: self.expect(account, Type::Account)?,
                    asset: self.expect(asset, Type::Asset)?,
                })
            }
        };

        self.vars.insert(decl.name.clone(), ty);
        Ok(VarDecl {
            ty,
            name: decl.name.clone(),
            origin,
        })
    }

    fn statement(&self, statement: &StatementKind) -> Check<Instruction> {
        match statement {
            StatementKind::Print(expr) => Ok(Instruction::Print(self.expr(expr)?.0)),
            StatementKind::Fail => Ok(Instruction::Fail),
            StatementKind::SetTxMeta { key, value } => Ok(Instruction::SetTxMeta {
                key: key.clone(),
                value: self.expr(value)?.0,
            }),
            StatementKind::SetAccountMeta {
                account,
                key,
                value,
            } => Ok(Instruction::SetAccountMeta {
                account: self.expect(account, Type::Account)?,
                key: key.clone(),
                value: self.expr(value)?.0,
            }),
            StatementKind::Save { amount, account } => Ok(Instruction::Save {
                account: self.expect(account, Type::Account)?,
                amount: self.amount(amount)?,
            }),
            StatementKind::Send {
                amount,
                source,
                destination,
            } => {
                let amount = self.amount(amount)?;
                let compiled = self.source(source, &mut HashSet::new(), false)?;
                if matches!(amount, Amount::All(_)) {
                    if compiled.unbounded {
                        return Err(CompileErrorKind::UnboundedTakeAll);
                    }
                    if funding::contains_allotment(&compiled.source) {
                        return Err(CompileErrorKind::AllotmentSendAll);
                    }
                }
                Ok(Instruction::Allocate {
                    amount,
                    source: compiled.source,
                    destination: self.destination(destination)?,
                })
            }
        }
    }

    fn amount(&self, amount: &syntax::SendAmount) -> Check<Amount> {
        match amount {
            syntax::SendAmount::Monetary(expr) => {
                Ok(Amount::Monetary(self.expect(expr, Type::Monetary)?))
            }
            syntax::SendAmount::All(asset) => Ok(Amount::All(self.expect(asset, Type::Asset)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{
        AllotmentPortion, BinaryOp, Destination, Expr, KeptOrDestination, Script, SendAmount,
        Source, VarDecl,
    };

    fn kinds(result: Result<Program, CompileErrors>) -> Vec<CompileErrorKind> {
        result.unwrap_err().kinds().cloned().collect()
    }

    #[test]
    fn test_compile_simple_send() {
        let script = Script::new().send(
            SendAmount::Monetary(Expr::monetary("COIN", 100)),
            Source::account("world"),
            Destination::account("alice"),
        );

        let program = compile(&script).unwrap();
        assert_eq!(program.instructions.len(), 1);
        assert!(matches!(program.instructions[0], Instruction::Allocate { .. }));
    }

    #[test]
    fn test_duplicate_variable() {
        let script = Script::new()
            .var(VarDecl::new("account", "a"))
            .var(VarDecl::new("monetary", "a"));

        assert_eq!(
            kinds(compile(&script)),
            vec![CompileErrorKind::DuplicateVariable {
                name: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_undeclared_variable() {
        let script = Script::new().send(
            SendAmount::Monetary(Expr::var("amount")),
            Source::account("world"),
            Destination::account("alice"),
        );

        assert_eq!(
            kinds(compile(&script)),
            vec![CompileErrorKind::UndeclaredVariable {
                name: "amount".to_string()
            }]
        );
    }

    #[test]
    fn test_unknown_type() {
        let script = Script::new().var(VarDecl::new("decimal", "x"));
        assert!(matches!(
            kinds(compile(&script))[0],
            CompileErrorKind::UnknownType { .. }
        ));
    }

    #[test]
    fn test_balance_origin_requires_monetary() {
        let script = Script::new().var(
            VarDecl::new("number", "n").balance(Expr::account("alice"), Expr::asset("COIN")),
        );
        assert!(matches!(
            kinds(compile(&script))[0],
            CompileErrorKind::InvalidOrigin { .. }
        ));

        let script = Script::new().var(
            VarDecl::new("monetary", "m").balance(Expr::account("alice"), Expr::asset("COIN")),
        );
        let program = compile(&script).unwrap();
        assert!(matches!(
            program.vars[0].origin,
            Some(VarOrigin::Balance { .. })
        ));
    }

    #[test]
    fn test_origin_cannot_reference_itself() {
        let script = Script::new().var(VarDecl::new("account", "a").meta(Expr::var("a"), "owner"));
        assert!(matches!(
            kinds(compile(&script))[0],
            CompileErrorKind::UndeclaredVariable { .. }
        ));
    }

    #[test]
    fn test_errors_are_collected_across_statements() {
        let script = Script::new()
            .send(
                SendAmount::Monetary(Expr::number(10)),
                Source::account("world"),
                Destination::account("alice"),
            )
            .send(
                SendAmount::Monetary(Expr::monetary("COIN", 1)),
                Source::account("world"),
                Destination::Account(Expr::number(3)),
            );

        let errors = compile(&script).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.0[0].span.line, 1);
        assert_eq!(errors.0[1].span.line, 2);
    }

    #[test]
    fn test_unbounded_take_all_rejected() {
        let script = Script::new().send(
            SendAmount::All(Expr::asset("COIN")),
            Source::unbounded("alice"),
            Destination::account("bob"),
        );
        assert_eq!(
            kinds(compile(&script)),
            vec![CompileErrorKind::UnboundedTakeAll]
        );

        let script = Script::new().send(
            SendAmount::All(Expr::asset("COIN")),
            Source::account("world"),
            Destination::account("bob"),
        );
        assert_eq!(
            kinds(compile(&script)),
            vec![CompileErrorKind::UnboundedTakeAll]
        );
    }

    #[test]
    fn test_capped_unbounded_take_all_accepted() {
        let script = Script::new().send(
            SendAmount::All(Expr::asset("COIN")),
            Source::maxed(Expr::monetary("COIN", 10), Source::account("world")),
            Destination::account("bob"),
        );
        assert!(compile(&script).is_ok());
    }

    #[test]
    fn test_fallback_not_last() {
        let script = Script::new().send(
            SendAmount::Monetary(Expr::monetary("COIN", 10)),
            Source::InOrder(vec![Source::unbounded("alice"), Source::account("bob")]),
            Destination::account("carol"),
        );
        assert_eq!(
            kinds(compile(&script)),
            vec![CompileErrorKind::FallbackNotLast]
        );
    }

    #[test]
    fn test_world_overdraft_rejected() {
        let script = Script::new().send(
            SendAmount::Monetary(Expr::monetary("COIN", 10)),
            Source::unbounded("world"),
            Destination::account("carol"),
        );
        assert_eq!(
            kinds(compile(&script)),
            vec![CompileErrorKind::WorldOverdraft]
        );
    }

    #[test]
    fn test_account_already_emptied() {
        let script = Script::new().send(
            SendAmount::Monetary(Expr::monetary("COIN", 10)),
            Source::InOrder(vec![Source::account("alice"), Source::account("alice")]),
            Destination::account("carol"),
        );
        assert_eq!(
            kinds(compile(&script)),
            vec![CompileErrorKind::AccountAlreadyEmptied {
                account: "alice".to_string()
            }]
        );

        let script = Script::new().send(
            SendAmount::Monetary(Expr::monetary("COIN", 10)),
            Source::InOrder(vec![
                Source::maxed(Expr::monetary("COIN", 5), Source::account("alice")),
                Source::account("alice"),
            ]),
            Destination::account("carol"),
        );
        assert!(compile(&script).is_ok());
    }

    #[test]
    fn test_allotment_validation() {
        let send = |portions: Vec<AllotmentPortion>| {
            Script::new().send(
                SendAmount::Monetary(Expr::monetary("COIN", 10)),
                Source::account("world"),
                Destination::Allotment(
                    portions
                        .into_iter()
                        .map(|p| (p, KeptOrDestination::Kept))
                        .collect(),
                ),
            )
        };

        assert!(compile(&send(vec![
            AllotmentPortion::percent(50),
            AllotmentPortion::percent(50)
        ]))
        .is_ok());
        assert!(compile(&send(vec![
            AllotmentPortion::ratio(1, 3),
            AllotmentPortion::Remaining
        ]))
        .is_ok());

        assert!(matches!(
            kinds(compile(&send(vec![
                AllotmentPortion::percent(60),
                AllotmentPortion::percent(50)
            ])))[0],
            CompileErrorKind::OverAllocated { .. }
        ));
        assert!(matches!(
            kinds(compile(&send(vec![
                AllotmentPortion::percent(60),
                AllotmentPortion::percent(30)
            ])))[0],
            CompileErrorKind::UnderAllocated { .. }
        ));
        assert_eq!(
            kinds(compile(&send(vec![
                AllotmentPortion::percent(10),
                AllotmentPortion::Remaining,
                AllotmentPortion::Remaining
            ]))),
            vec![CompileErrorKind::DuplicateRemaining]
        );
        assert_eq!(
            kinds(compile(&send(vec![
                AllotmentPortion::percent(100),
                AllotmentPortion::Remaining
            ]))),
            vec![CompileErrorKind::AmbiguousAllotment]
        );
    }

    #[test]
    fn test_variable_portions_skip_under_allocation() {
        let script = Script::new().var(VarDecl::new("portion", "p")).send(
            SendAmount::Monetary(Expr::monetary("COIN", 10)),
            Source::account("world"),
            Destination::Allotment(vec![
                (AllotmentPortion::percent(20), Destination::account("a").into()),
                (
                    AllotmentPortion::Variable("p".to_string()),
                    Destination::account("b").into(),
                ),
            ]),
        );
        assert!(compile(&script).is_ok());
    }

    #[test]
    fn test_send_all_from_allotment_rejected() {
        let script = Script::new().send(
            SendAmount::All(Expr::asset("COIN")),
            Source::Allotment(vec![
                (AllotmentPortion::percent(50), Source::account("a")),
                (AllotmentPortion::Remaining, Source::account("b")),
            ]),
            Destination::account("c"),
        );
        assert_eq!(
            kinds(compile(&script)),
            vec![CompileErrorKind::AllotmentSendAll]
        );
    }

    #[test]
    fn test_arithmetic_type_checks() {
        let script = Script::new().statement(StatementKind::Print(Expr::binary(
            BinaryOp::Add,
            Expr::number(1),
            Expr::monetary("COIN", 1),
        )));
        assert!(matches!(
            kinds(compile(&script))[0],
            CompileErrorKind::TypeMismatch { .. }
        ));

        let script = Script::new().statement(StatementKind::Print(Expr::binary(
            BinaryOp::Add,
            Expr::monetary("COIN", 1),
            Expr::monetary("GEM", 1),
        )));
        assert!(matches!(
            kinds(compile(&script))[0],
            CompileErrorKind::AssetMismatch { .. }
        ));

        let script = Script::new().statement(StatementKind::Print(Expr::binary(
            BinaryOp::Lt,
            Expr::monetary("COIN", 1),
            Expr::monetary("COIN", 2),
        )));
        assert!(matches!(
            kinds(compile(&script))[0],
            CompileErrorKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_ternary_branches_must_match() {
        let script = Script::new().statement(StatementKind::Print(Expr::ternary(
            Expr::bool(true),
            Expr::number(1),
            Expr::string("one"),
        )));
        assert!(matches!(
            kinds(compile(&script))[0],
            CompileErrorKind::TypeMismatch { .. }
        ));

        let script = Script::new().statement(StatementKind::Print(Expr::ternary(
            Expr::binary(BinaryOp::Gt, Expr::number(2), Expr::number(1)),
            Expr::number(1),
            Expr::number(2),
        )));
        assert!(compile(&script).is_ok());
    }

    #[test]
    fn test_compile_is_deterministic() {
        let script = Script::new()
            .var(VarDecl::new("account", "dest"))
            .send(
                SendAmount::Monetary(Expr::monetary("COIN", 15)),
                Source::account("world"),
                Destination::Allotment(vec![
                    (AllotmentPortion::percent(80), Destination::Account(Expr::var("dest")).into()),
                    (AllotmentPortion::Remaining, KeptOrDestination::Kept),
                ]),
            );
        assert_eq!(compile(&script).unwrap(), compile(&script).unwrap());
    }
}
