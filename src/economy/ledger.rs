//! In-process ledger used as the default economy provider.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, PoisonError,
    },
};

use crate::jobs::types::PlayerId;

use super::bridge::{EconomyError, EconomyService, Receipt};

/// Balances keyed by player and currency.
#[derive(Debug)]
pub struct LocalLedger {
    accounts: Mutex<HashMap<PlayerId, HashMap<String, f64>>>,
    next_transaction: AtomicU64,
}

impl LocalLedger {
    /// Deposits open accounts on demand.
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            next_transaction: AtomicU64::new(1),
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn balance(&self, player: &PlayerId, currency: &str) -> Option<f64> {
        let accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        accounts
            .get(player)
            .map(|balances| balances.get(currency).copied().unwrap_or(0.0))
    }
}

impl Default for LocalLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl EconomyService for LocalLedger {
    fn provider_name(&self) -> &str {
        "local-ledger"
    }

    fn get_or_create_account(&self, player: &PlayerId) -> Result<(), EconomyError> {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        accounts.entry(player.clone()).or_default();
        Ok(())
    }

    fn deposit(
        &self,
        player: &PlayerId,
        amount: f64,
        currency: &str,
        _reason: &str,
    ) -> Result<Receipt, EconomyError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(EconomyError::rejected(format!(
                "deposit amount must be non-negative (got {amount})"
            )));
        }

        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        let balance = accounts
            .entry(player.clone())
            .or_default()
            .entry(currency.to_string())
            .or_insert(0.0);
        *balance += amount;
        let balance = *balance;

        let transaction = self.next_transaction.fetch_add(1, Ordering::Relaxed);
        Ok(Receipt {
            transaction_id: format!("LEDGER-{:06}", transaction),
            player: player.clone(),
            amount,
            currency: currency.to_string(),
            balance: Some(balance),
        })
    }
}
