//! Money already withdrawn from sources, not yet assigned a destination

use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use super::error::{MachineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingPart {
    pub account: String,
    pub amount: BigInt,
}

/// An ordered bag of withdrawals of a single asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funding {
    pub asset: String,
    pub parts: Vec<FundingPart>,
}

impl Funding {
    pub fn new(asset: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            parts: Vec::new(),
        }
    }

    pub fn total(&self) -> BigInt {
        self.parts.iter().map(|p| &p.amount).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Append a withdrawal; zero amounts are dropped and consecutive
    /// withdrawals from the same account merged
    pub fn push(&mut self, account: &str, amount: BigInt) {
        if amount.is_zero() {
            return;
        }
        match self.parts.last_mut() {
            Some(last) if last.account == account => last.amount += amount,
            _ => self.parts.push(FundingPart {
                account: account.to_string(),
                amount,
            }),
        }
    }

    /// Append all of `other` after this funding
    pub fn concat(&mut self, other: Funding) -> Result<()> {
        if other.asset != self.asset {
            return Err(MachineError::AssetMismatch {
                expected: self.asset.clone(),
                found: other.asset,
            });
        }
        for part in other.parts {
            self.push(&part.account, part.amount);
        }
        Ok(())
    }

    /// Split off up to `amount` from the front: `(taken, rest)`
    pub fn take_max(self, amount: &BigInt) -> (Funding, Funding) {
        let mut taken = Funding::new(self.asset.clone());
        let mut rest = Funding::new(self.asset);
        let mut missing = if amount.is_negative() {
            BigInt::zero()
        } else {
            amount.clone()
        };

        for part in self.parts {
            if missing.is_zero() {
                rest.push(&part.account, part.amount);
            } else if part.amount <= missing {
                missing -= &part.amount;
                taken.push(&part.account, part.amount);
            } else {
                let left = &part.amount - &missing;
                taken.push(&part.account, std::mem::take(&mut missing));
                rest.push(&part.account, left);
            }
        }
        (taken, rest)
    }

    /// Split off exactly `amount` from the front
    pub fn take(self, amount: &BigInt) -> Result<(Funding, Funding)> {
        let total = self.total();
        if total < *amount {
            return Err(MachineError::InsufficientFunds {
                asset: self.asset,
                requested: amount.to_string(),
                available: total.to_string(),
            });
        }
        Ok(self.take_max(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funding(parts: &[(&str, i64)]) -> Funding {
        let mut f = Funding::new("COIN");
        for (account, amount) in parts {
            f.push(account, BigInt::from(*amount));
        }
        f
    }

    #[test]
    fn test_push_merges_and_drops_zero() {
        let f = funding(&[("a", 10), ("a", 5), ("b", 0), ("b", 3)]);
        assert_eq!(f, funding(&[("a", 15), ("b", 3)]));
        assert_eq!(f.total(), BigInt::from(18));
    }

    #[test]
    fn test_take_splits_parts() {
        let (taken, rest) = funding(&[("a", 10), ("b", 10)])
            .take(&BigInt::from(15))
            .unwrap();
        assert_eq!(taken, funding(&[("a", 10), ("b", 5)]));
        assert_eq!(rest, funding(&[("b", 5)]));
    }

    #[test]
    fn test_take_insufficient() {
        let err = funding(&[("a", 10)]).take(&BigInt::from(11)).unwrap_err();
        assert!(err.is_insufficient_funds());
    }

    #[test]
    fn test_take_max_caps_at_total() {
        let (taken, rest) = funding(&[("a", 4)]).take_max(&BigInt::from(10));
        assert_eq!(taken.total(), BigInt::from(4));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_concat_rejects_other_asset() {
        let mut f = funding(&[("a", 1)]);
        assert!(f.concat(Funding::new("GEM")).is_err());
    }
}
