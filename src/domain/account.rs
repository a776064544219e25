use crate::error::UpscaleError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Opaque identity of a user, as handed over by the identity collaborator.
///
/// The ledger trusts it completely and never authenticates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative credit amount.
///
/// Credits are integral by design; balances stay `>= 0` by construction
/// because every subtraction goes through [`Credits::checked_sub`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Credits(pub u64);

impl Credits {
    pub const ZERO: Self = Self(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl Add for Credits {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Credits {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user's ledger row.
///
/// Mutated only through the [`AccountStore`](crate::domain::ports::AccountStore)
/// debit/credit primitives, never settable directly.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Account {
    pub user: UserId,
    pub balance: Credits,
}

impl Account {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            balance: Credits::ZERO,
        }
    }

    /// Subtracts `amount` if covered by the current balance.
    pub fn debit(&mut self, amount: Credits) -> Result<(), UpscaleError> {
        match self.balance.checked_sub(amount) {
            Some(remaining) => {
                self.balance = remaining;
                Ok(())
            }
            None => Err(UpscaleError::InsufficientFunds {
                required: amount,
                available: self.balance,
            }),
        }
    }

    /// Adds `amount` to the balance.
    pub fn credit(&mut self, amount: Credits) {
        self.balance += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credits_arithmetic() {
        let a = Credits::new(10);
        let b = Credits::new(4);
        assert_eq!(a + b, Credits::new(14));
        assert_eq!(a.checked_sub(b), Some(Credits::new(6)));
        assert_eq!(b.checked_sub(a), None);
    }

    #[test]
    fn test_account_debit_success() {
        let mut account = Account::new(UserId(1));
        account.credit(Credits::new(10));

        assert!(account.debit(Credits::new(7)).is_ok());
        assert_eq!(account.balance, Credits::new(3));
    }

    #[test]
    fn test_account_debit_insufficient() {
        let mut account = Account::new(UserId(1));
        account.credit(Credits::new(3));

        let result = account.debit(Credits::new(5));
        assert!(matches!(
            result,
            Err(UpscaleError::InsufficientFunds {
                required: Credits(5),
                available: Credits(3),
            })
        ));
        // Rejected debit leaves the balance untouched.
        assert_eq!(account.balance, Credits::new(3));
    }
}
