//! Energy economy.
//!
//! Completed activities become [`FlowEvent`]s, the [`RewardRules`] table
//! converts them into energy, and the [`EnergyLedger`] holds the balance that
//! gates the minigame.

mod economy;
mod ledger;
mod rules;

pub use economy::{BalanceStore, RewardEconomy};
pub use ledger::EnergyLedger;
pub use rules::{FlowEvent, RewardRules};
