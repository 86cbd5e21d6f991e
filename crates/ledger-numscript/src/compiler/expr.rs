//! Expression type-checking

use ledger_types::{is_valid_address, is_valid_asset};
use num_traits::Signed;

use super::{Check, CompileErrorKind, Compiler};
use crate::program::{BinaryOp, Expr};
use crate::syntax::{self, Literal};
use crate::value::{Monetary, Portion, Type, Value};

fn mismatch(expected: impl ToString, found: Type) -> CompileErrorKind {
    CompileErrorKind::TypeMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

impl Compiler {
    /// Type-check an expression that must have type `ty`
    pub(super) fn expect(&self, expr: &syntax::Expr, ty: Type) -> Check<Expr> {
        let (expr, found) = self.expr(expr)?;
        if found != ty {
            return Err(mismatch(ty, found));
        }
        Ok(expr)
    }

    pub(super) fn expr(&self, expr: &syntax::Expr) -> Check<(Expr, Type)> {
        match expr {
            syntax::Expr::Literal(literal) => {
                let value = literal_value(literal)?;
                let ty = value.ty();
                Ok((Expr::Literal(value), ty))
            }
            syntax::Expr::Variable(name) => match self.vars.get(name) {
                Some(ty) => Ok((Expr::Variable(name.clone()), *ty)),
                None => Err(CompileErrorKind::UndeclaredVariable { name: name.clone() }),
            },
            syntax::Expr::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            syntax::Expr::Not(inner) => {
                let inner = self.expect(inner, Type::Bool)?;
                Ok((Expr::Not(Box::new(inner)), Type::Bool))
            }
            syntax::Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.expect(condition, Type::Bool)?;
                let (then, then_ty) = self.expr(then)?;
                let (otherwise, otherwise_ty) = self.expr(otherwise)?;
                if then_ty != otherwise_ty {
                    return Err(mismatch(then_ty, otherwise_ty));
                }
                Ok((
                    Expr::Ternary {
                        condition: Box::new(condition),
                        then: Box::new(then),
                        otherwise: Box::new(otherwise),
                    },
                    then_ty,
                ))
            }
            syntax::Expr::MonetaryNew { asset, amount } => {
                let asset = self.expect(asset, Type::Asset)?;
                let amount = self.expect(amount, Type::Number)?;
                Ok((
                    Expr::MonetaryNew {
                        asset: Box::new(asset),
                        amount: Box::new(amount),
                    },
                    Type::Monetary,
                ))
            }
        }
    }

    fn binary(
        &self,
        op: syntax::BinaryOp,
        lhs: &syntax::Expr,
        rhs: &syntax::Expr,
    ) -> Check<(Expr, Type)> {
        use syntax::BinaryOp as Op;

        let (lhs, lhs_ty) = self.expr(lhs)?;
        let (rhs, rhs_ty) = self.expr(rhs)?;
        if lhs_ty != rhs_ty {
            return Err(mismatch(lhs_ty, rhs_ty));
        }

        let (op, ty) = match op {
            Op::Add | Op::Sub => {
                let add = op == Op::Add;
                match lhs_ty {
                    Type::Number if add => (BinaryOp::NumberAdd, Type::Number),
                    Type::Number => (BinaryOp::NumberSub, Type::Number),
                    Type::Monetary => {
                        if let (Some(left), Some(right)) = (static_asset(&lhs), static_asset(&rhs)) {
                            if left != right {
                                return Err(CompileErrorKind::AssetMismatch {
                                    left: left.to_string(),
                                    right: right.to_string(),
                                });
                            }
                        }
                        if add {
                            (BinaryOp::MonetaryAdd, Type::Monetary)
                        } else {
                            (BinaryOp::MonetarySub, Type::Monetary)
                        }
                    }
                    other => return Err(mismatch("number or monetary", other)),
                }
            }
            Op::Eq | Op::Neq | Op::Lt | Op::Lte | Op::Gt | Op::Gte => {
                if lhs_ty != Type::Number {
                    return Err(mismatch(Type::Number, lhs_ty));
                }
                let op = match op {
                    Op::Eq => BinaryOp::Eq,
                    Op::Neq => BinaryOp::Neq,
                    Op::Lt => BinaryOp::Lt,
                    Op::Lte => BinaryOp::Lte,
                    Op::Gt => BinaryOp::Gt,
                    _ => BinaryOp::Gte,
                };
                (op, Type::Bool)
            }
            Op::And | Op::Or => {
                if lhs_ty != Type::Bool {
                    return Err(mismatch(Type::Bool, lhs_ty));
                }
                let op = if op == Op::And { BinaryOp::And } else { BinaryOp::Or };
                (op, Type::Bool)
            }
        };

        Ok((
            Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        ))
    }
}

fn literal_value(literal: &Literal) -> Check<Value> {
    let invalid = |message: String| CompileErrorKind::InvalidLiteral { message };

    match literal {
        Literal::Account(address) => {
            let address = address.strip_prefix('@').unwrap_or(address);
            if !is_valid_address(address) {
                return Err(invalid(format!("account @{address}")));
            }
            Ok(Value::Account(address.to_string()))
        }
        Literal::Asset(asset) => {
            if !is_valid_asset(asset) {
                return Err(invalid(format!("asset {asset}")));
            }
            Ok(Value::Asset(asset.clone()))
        }
        Literal::Number(n) => Ok(Value::Number(n.clone())),
        Literal::String(s) => Ok(Value::String(s.clone())),
        Literal::Bool(b) => Ok(Value::Bool(*b)),
        Literal::Monetary { asset, amount } => {
            if !is_valid_asset(asset) {
                return Err(invalid(format!("asset {asset}")));
            }
            if amount.is_negative() {
                return Err(invalid(format!("negative amount [{asset} {amount}]")));
            }
            Ok(Value::Monetary(Monetary::new(asset.clone(), amount.clone())))
        }
        Literal::Portion(r) => Portion::specific(r.clone())
            .map(Value::Portion)
            .map_err(|e| invalid(e.to_string())),
    }
}

/// Asset of a monetary expression when it is known without running it
pub(super) fn static_asset(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Literal(Value::Monetary(m)) => Some(&m.asset),
        Expr::MonetaryNew { asset, .. } => match asset.as_ref() {
            Expr::Literal(Value::Asset(a)) => Some(a),
            _ => None,
        },
        Expr::Binary {
            op: BinaryOp::MonetaryAdd | BinaryOp::MonetarySub,
            lhs,
            ..
        } => static_asset(lhs),
        Expr::Ternary {
            then, otherwise, ..
        } => match (static_asset(then), static_asset(otherwise)) {
            (Some(a), Some(b)) if a == b => Some(a),
            _ => None,
        },
        _ => None,
    }
}
