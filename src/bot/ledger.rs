//! In-memory balance ledger.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Errors returned by ledger mutations.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// The user's balance does not cover the requested amount.
    InsufficientFunds { needed: f64, available: f64 },
    /// Negative, NaN or infinite amount.
    InvalidAmount(f64),
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientFunds { needed, available } => {
                write!(f, "insufficient funds: needed {needed:.2}, available {available:.2}")
            }
            Self::InvalidAmount(amount) => write!(f, "invalid amount: {amount}"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Per-user spendable balances, kept in whole cents.
///
/// Amounts cross the API as `f64` currency units and are rounded to the
/// nearest cent on the way in, so repeated small charges never drift.
/// Every operation takes the lock exactly once, so a debit's sufficiency
/// check and its subtraction can't interleave with another debit for the
/// same user.
#[derive(Debug, Default)]
pub struct Ledger {
    balances: Mutex<HashMap<i64, i64>>,
}

/// Reject negative, NaN and infinite amounts, then round to cents.
fn to_cents(amount: f64) -> Result<i64, LedgerError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(LedgerError::InvalidAmount(amount));
    }
    Ok((amount * 100.0).round() as i64)
}

fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, i64>> {
        // A panic elsewhere never leaves a half-written balance behind.
        self.balances.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current balance, 0.0 for users the ledger has never seen.
    pub fn get_balance(&self, user_id: i64) -> f64 {
        from_cents(self.lock().get(&user_id).copied().unwrap_or(0))
    }

    /// Subtract `amount` if the balance covers it. Returns the new balance.
    pub fn debit(&self, user_id: i64, amount: f64) -> Result<f64, LedgerError> {
        let needed = to_cents(amount)?;
        let mut balances = self.lock();
        let available = balances.get(&user_id).copied().unwrap_or(0);
        if needed > available {
            return Err(LedgerError::InsufficientFunds {
                needed: from_cents(needed),
                available: from_cents(available),
            });
        }
        let remaining = available - needed;
        balances.insert(user_id, remaining);
        Ok(from_cents(remaining))
    }

    /// Add `amount` to the balance. Returns the new balance.
    pub fn credit(&self, user_id: i64, amount: f64) -> Result<f64, LedgerError> {
        let cents = to_cents(amount)?;
        let mut balances = self.lock();
        let balance = balances.entry(user_id).or_insert(0);
        *balance = balance.saturating_add(cents);
        Ok(from_cents(*balance))
    }

    /// Overwrite the balance.
    pub fn set_balance(&self, user_id: i64, amount: f64) -> Result<(), LedgerError> {
        let cents = to_cents(amount)?;
        self.lock().insert(user_id, cents);
        Ok(())
    }

    /// All known balances ordered by user id.
    pub fn snapshot(&self) -> Vec<(i64, f64)> {
        let mut entries: Vec<(i64, f64)> = self.lock().iter().map(|(k, v)| (*k, from_cents(*v))).collect();
        entries.sort_by_key(|(user_id, _)| *user_id);
        entries
    }
}
