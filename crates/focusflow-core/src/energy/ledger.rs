use serde::{Deserialize, Serialize};

/// Spendable energy balance.
///
/// The balance is unsigned and every decrement goes through
/// [`try_spend`](Self::try_spend), so it can't go negative. `try_spend`
/// takes `&mut self`: the check and the decrement happen under one
/// exclusive borrow. Share a ledger between threads behind a `Mutex`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyLedger {
    balance: u64,
}

impl EnergyLedger {
    pub fn new(balance: u64) -> Self {
        Self { balance }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn can_afford(&self, cost: u64) -> bool {
        self.balance >= cost
    }

    /// Credit a gain. Returns the new balance.
    pub fn apply_gain(&mut self, amount: u64) -> u64 {
        self.balance = self.balance.saturating_add(amount);
        self.balance
    }

    /// Debit `cost` if the balance covers it. A zero cost is not a spend.
    pub fn try_spend(&mut self, cost: u64) -> bool {
        if cost == 0 || !self.can_afford(cost) {
            return false;
        }
        self.balance -= cost;
        true
    }

    /// Give back energy for a gated action that never started.
    pub fn refund(&mut self, amount: u64) -> u64 {
        self.apply_gain(amount)
    }
}
