use std::rc::Rc;

use tracing::{debug, info, warn};

use super::ledger::EnergyLedger;
use super::rules::{FlowEvent, RewardRules};
use crate::error::Result;

/// Durable home of the energy balance, a single integer.
pub trait BalanceStore {
    fn load_balance(&self) -> Result<Option<u64>>;
    fn save_balance(&self, balance: u64) -> Result<()>;
}

impl<T: BalanceStore + ?Sized> BalanceStore for Rc<T> {
    fn load_balance(&self) -> Result<Option<u64>> {
        (**self).load_balance()
    }

    fn save_balance(&self, balance: u64) -> Result<()> {
        (**self).save_balance(balance)
    }
}

/// Energy ledger plus the rule table that feeds it.
///
/// Every mutation is written through to the [`BalanceStore`], if one is
/// attached. A failed write is logged and otherwise ignored: the in-memory
/// balance stays authoritative.
pub struct RewardEconomy {
    ledger: EnergyLedger,
    rules: RewardRules,
    store: Option<Box<dyn BalanceStore>>,
}

impl std::fmt::Debug for RewardEconomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewardEconomy")
            .field("ledger", &self.ledger)
            .field("rules", &self.rules)
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl RewardEconomy {
    /// In-memory economy starting at `balance`.
    pub fn new(rules: RewardRules, balance: u64) -> Self {
        Self {
            ledger: EnergyLedger::new(balance),
            rules,
            store: None,
        }
    }

    /// Economy backed by `store`, starting from whatever balance it holds.
    pub fn with_store(rules: RewardRules, store: Box<dyn BalanceStore>) -> Self {
        let balance = match store.load_balance() {
            Ok(balance) => balance.unwrap_or(0),
            Err(e) => {
                warn!(error = %e, "failed to load energy balance, starting from zero");
                0
            }
        };
        Self {
            ledger: EnergyLedger::new(balance),
            rules,
            store: Some(store),
        }
    }

    pub fn balance(&self) -> u64 {
        self.ledger.balance()
    }

    pub fn rules(&self) -> RewardRules {
        self.rules
    }

    /// Apply the rule table to `event`. Returns the energy gained.
    pub fn apply_gain(&mut self, event: &FlowEvent) -> u64 {
        let gain = self.rules.energy_for(event);
        if gain > 0 {
            let balance = self.ledger.apply_gain(gain);
            info!(?event, gain, balance, "energy gained");
            self.persist();
        } else {
            debug!(?event, "event earns no energy");
        }
        gain
    }

    pub fn can_afford(&self, cost: u64) -> bool {
        self.ledger.can_afford(cost)
    }

    /// The single gate for spending energy. `false` means the balance was
    /// too low (or the cost was zero) and nothing changed.
    pub fn try_spend(&mut self, cost: u64) -> bool {
        let spent = self.ledger.try_spend(cost);
        if spent {
            debug!(cost, balance = self.ledger.balance(), "energy spent");
            self.persist();
        }
        spent
    }

    pub fn refund(&mut self, amount: u64) -> u64 {
        let balance = self.ledger.refund(amount);
        if amount > 0 {
            debug!(amount, balance, "energy refunded");
            self.persist();
        }
        balance
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save_balance(self.ledger.balance()) {
                warn!(error = %e, "failed to persist energy balance");
            }
        }
    }
}
