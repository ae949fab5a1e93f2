use clap::Subcommand;
use serde_json::json;

use super::session::{print_json, Session};

#[derive(Subcommand)]
pub enum EnergyAction {
    /// Print the current energy balance
    Balance,
    /// Spend energy; refused when the balance is too low
    Spend {
        /// Amount to spend
        #[arg(value_parser = clap::value_parser!(u64).range(1..))]
        cost: u64,
    },
    /// Give energy back
    Refund {
        /// Amount to return
        amount: u64,
    },
}

pub fn run(action: EnergyAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    session.catch_up()?;
    let coordinator = session.coordinator();

    match action {
        EnergyAction::Balance => {
            let economy = coordinator.economy();
            let entry_cost = coordinator.settings().game_entry_cost;
            print_json(&json!({
                "balance": economy.balance(),
                "rules": economy.rules(),
                "game_unlocked": economy.can_afford(entry_cost),
            }))?;
        }
        EnergyAction::Spend { cost } => {
            let spent = coordinator.spend_energy(cost);
            let balance = coordinator.economy().balance();
            if !spent {
                eprintln!("not enough energy: need {cost}, have {balance}");
            }
            print_json(&json!({ "spent": spent, "cost": cost, "balance": balance }))?;
        }
        EnergyAction::Refund { amount } => {
            let balance = coordinator.refund_energy(amount);
            print_json(&json!({ "refunded": amount, "balance": balance }))?;
        }
    }

    session.save()?;
    Ok(())
}
