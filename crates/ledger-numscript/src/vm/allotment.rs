//! Proportional split of an integer amount
//!
//! Each portion gets the floor of its exact share; the units lost to
//! flooring are then handed out one at a time in declared order. The split
//! is deterministic and always conserves the total.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};

use super::error::{MachineError, Result};
use crate::value::Portion;

/// Resolved portions of one allotment, summing to exactly one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allotment(Vec<BigRational>);

impl Allotment {
    /// Resolve a `remaining` portion and check the portions sum to one
    pub fn new(portions: &[Portion]) -> Result<Self> {
        let invalid = |message: String| MachineError::InvalidAllotment { message };

        let mut total = BigRational::zero();
        let mut remaining = None;
        let mut parts = Vec::with_capacity(portions.len());

        for (i, portion) in portions.iter().enumerate() {
            match portion {
                Portion::Specific(r) => {
                    total += r;
                    parts.push(r.clone());
                }
                Portion::Remaining => {
                    if remaining.is_some() {
                        return Err(invalid("more than one remaining portion".to_string()));
                    }
                    remaining = Some(i);
                    parts.push(BigRational::zero());
                }
            }
        }

        if total > BigRational::one() {
            return Err(invalid(format!("portions sum to {total}, above 100%")));
        }
        match remaining {
            Some(i) => parts[i] = BigRational::one() - &total,
            None if total != BigRational::one() => {
                return Err(invalid(format!("portions sum to {total}, not 100%")));
            }
            None => {}
        }

        Ok(Allotment(parts))
    }

    pub fn portions(&self) -> &[BigRational] {
        &self.0
    }

    /// Split `total` by portion: floor each share, then distribute the
    /// leftover units in declared order
    pub fn allocate(&self, total: &BigInt) -> Vec<BigInt> {
        if self.0.is_empty() {
            return Vec::new();
        }

        let whole = BigRational::from_integer(total.clone());
        let mut parts: Vec<BigInt> = self
            .0
            .iter()
            .map(|portion| (&whole * portion).floor().to_integer())
            .collect();

        let allocated: BigInt = parts.iter().sum();
        let mut leftover = total - allocated;
        let mut i = 0;
        while leftover.is_positive() {
            parts[i % self.0.len()] += 1;
            leftover -= 1;
            i += 1;
        }
        parts
    }
}
