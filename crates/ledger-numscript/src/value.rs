//! Runtime values
//!
//! A closed tagged union over every type a numscript expression can have.
//! Values also know how to decode themselves from the two external encodings
//! the ledger uses: JSON variables supplied by callers and metadata strings
//! stored on accounts.

use std::fmt;
use std::str::FromStr;

use ledger_types::{is_valid_address, is_valid_asset};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Value decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: Type, found: String },

    #[error("Invalid {ty} value: {value}")]
    Invalid { ty: Type, value: String },
}

/// Declared type of a variable or expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    Account,
    Asset,
    Number,
    String,
    Bool,
    Monetary,
    Portion,
}

impl Type {
    pub fn name(&self) -> &'static str {
        match self {
            Type::Account => "account",
            Type::Asset => "asset",
            Type::Number => "number",
            Type::String => "string",
            Type::Bool => "bool",
            Type::Monetary => "monetary",
            Type::Portion => "portion",
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Type {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "account" => Ok(Type::Account),
            "asset" => Ok(Type::Asset),
            "number" => Ok(Type::Number),
            "string" => Ok(Type::String),
            "bool" => Ok(Type::Bool),
            "monetary" => Ok(Type::Monetary),
            "portion" => Ok(Type::Portion),
            other => Err(other.to_string()),
        }
    }
}

/// An amount of a given asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Monetary {
    pub asset: String,
    pub amount: BigInt,
}

impl Monetary {
    pub fn new(asset: impl Into<String>, amount: impl Into<BigInt>) -> Self {
        Self {
            asset: asset.into(),
            amount: amount.into(),
        }
    }
}

impl fmt::Display for Monetary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.asset, self.amount)
    }
}

/// A proportional share used by allotments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Portion {
    /// Exact fraction in `(0, 1]`
    Specific(BigRational),
    /// Whatever the other portions of the allotment leave
    Remaining,
}

impl Portion {
    /// Build a specific portion, rejecting values outside `(0, 1]`
    pub fn specific(value: BigRational) -> Result<Self, ValueError> {
        if value <= BigRational::zero() || value > BigRational::one() {
            return Err(ValueError::Invalid {
                ty: Type::Portion,
                value: value.to_string(),
            });
        }
        Ok(Portion::Specific(value))
    }

    /// `n%` where `n` may carry decimals
    pub fn percent(n: &str) -> Result<Self, ValueError> {
        let value = parse_decimal(n).ok_or_else(|| ValueError::Invalid {
            ty: Type::Portion,
            value: format!("{n}%"),
        })?;
        Self::specific(value / BigRational::from_integer(BigInt::from(100)))
    }

    pub fn is_remaining(&self) -> bool {
        matches!(self, Portion::Remaining)
    }
}

impl FromStr for Portion {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ValueError::Invalid {
            ty: Type::Portion,
            value: s.to_string(),
        };

        if let Some(percent) = s.strip_suffix('%') {
            return Self::percent(percent.trim());
        }
        let (numer, denom) = s.split_once('/').ok_or_else(invalid)?;
        let numer: BigInt = numer.trim().parse().map_err(|_| invalid())?;
        let denom: BigInt = denom.trim().parse().map_err(|_| invalid())?;
        if denom.is_zero() {
            return Err(invalid());
        }
        Self::specific(BigRational::new(numer, denom))
    }
}

impl fmt::Display for Portion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Portion::Remaining => f.write_str("remaining"),
            Portion::Specific(r) => {
                let percent = r * BigRational::from_integer(BigInt::from(100));
                if percent.is_integer() {
                    write!(f, "{}%", percent.to_integer())
                } else {
                    write!(f, "{}/{}", r.numer(), r.denom())
                }
            }
        }
    }
}

/// Parse `12`, `12.5` into an exact rational
fn parse_decimal(s: &str) -> Option<BigRational> {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, f),
        None => (s, ""),
    };
    if int_part.is_empty() || !int_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    if !frac_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits: BigInt = format!("{int_part}{frac_part}").parse().ok()?;
    let scale = num_traits::pow(BigInt::from(10), frac_part.len());
    Some(BigRational::new(digits, scale))
}

/// A numscript runtime value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Account(String),
    Asset(String),
    Number(BigInt),
    String(String),
    Bool(bool),
    Monetary(Monetary),
    Portion(Portion),
}

impl Value {
    pub fn ty(&self) -> Type {
        match self {
            Value::Account(_) => Type::Account,
            Value::Asset(_) => Type::Asset,
            Value::Number(_) => Type::Number,
            Value::String(_) => Type::String,
            Value::Bool(_) => Type::Bool,
            Value::Monetary(_) => Type::Monetary,
            Value::Portion(_) => Type::Portion,
        }
    }

    /// Decode a caller-supplied JSON variable against its declared type
    pub fn from_json(ty: Type, json: &serde_json::Value) -> Result<Self, ValueError> {
        use serde_json::Value as Json;

        let mismatch = || ValueError::TypeMismatch {
            expected: ty,
            found: json.to_string(),
        };

        match (ty, json) {
            (Type::Number, Json::Number(n)) => parse_number(&n.to_string()),
            (Type::Monetary, Json::Object(fields)) => {
                let asset = fields.get("asset").and_then(Json::as_str).ok_or_else(mismatch)?;
                let amount = match fields.get("amount") {
                    Some(Json::Number(n)) => n.to_string(),
                    Some(Json::String(s)) => s.clone(),
                    _ => return Err(mismatch()),
                };
                monetary_from_parts(asset, &amount)
            }
            (Type::Bool, Json::Bool(b)) => Ok(Value::Bool(*b)),
            (_, Json::String(s)) => Self::from_metadata(ty, s),
            _ => Err(mismatch()),
        }
    }

    /// Decode a metadata string against a declared type
    pub fn from_metadata(ty: Type, raw: &str) -> Result<Self, ValueError> {
        let invalid = || ValueError::Invalid {
            ty,
            value: raw.to_string(),
        };

        match ty {
            Type::Account => {
                let address = raw.strip_prefix('@').unwrap_or(raw);
                if !is_valid_address(address) {
                    return Err(invalid());
                }
                Ok(Value::Account(address.to_string()))
            }
            Type::Asset => {
                if !is_valid_asset(raw) {
                    return Err(invalid());
                }
                Ok(Value::Asset(raw.to_string()))
            }
            Type::Number => parse_number(raw),
            Type::String => Ok(Value::String(raw.to_string())),
            Type::Bool => match raw {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            Type::Monetary => {
                let inner = raw
                    .trim()
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                    .unwrap_or(raw)
                    .trim();
                let (asset, amount) = inner.split_once(' ').ok_or_else(invalid)?;
                monetary_from_parts(asset, amount)
            }
            Type::Portion => Ok(Value::Portion(raw.parse()?)),
        }
    }

    /// Encoding used when a value is written to metadata
    pub fn to_metadata_string(&self) -> String {
        match self {
            Value::Account(a) => a.clone(),
            Value::Asset(a) => a.clone(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Monetary(m) => format!("{} {}", m.asset, m.amount),
            Value::Portion(p) => p.to_string(),
        }
    }

    pub fn is_negative_monetary(&self) -> bool {
        matches!(self, Value::Monetary(m) if m.amount.is_negative())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Account(a) => write!(f, "@{a}"),
            Value::Monetary(m) => write!(f, "{m}"),
            Value::String(s) => write!(f, "\"{s}\""),
            other => f.write_str(&other.to_metadata_string()),
        }
    }
}

fn parse_number(raw: &str) -> Result<Value, ValueError> {
    raw.trim()
        .parse::<BigInt>()
        .map(Value::Number)
        .map_err(|_| ValueError::Invalid {
            ty: Type::Number,
            value: raw.to_string(),
        })
}

fn monetary_from_parts(asset: &str, amount: &str) -> Result<Value, ValueError> {
    let invalid = || ValueError::Invalid {
        ty: Type::Monetary,
        value: format!("{asset} {amount}"),
    };
    let asset = asset.trim();
    if !is_valid_asset(asset) {
        return Err(invalid());
    }
    let amount: BigInt = amount.trim().parse().map_err(|_| invalid())?;
    Ok(Value::Monetary(Monetary::new(asset, amount)))
}
