use clap::Subcommand;
use focusflow_core::GameEntry;
use serde_json::json;

use super::session::{print_event_or, print_events, print_json, Session};

#[derive(Subcommand)]
pub enum GameAction {
    /// Pay the entry cost and unlock the game
    Enter,
    /// Report a finished game
    Finish {
        #[arg(long)]
        score: u32,
        /// Time played, in seconds
        #[arg(long)]
        seconds: u32,
    },
    /// Give up before playing and get the entry cost back
    Abort,
}

pub fn run(action: GameAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    session.catch_up()?;
    let coordinator = session.coordinator();

    match action {
        GameAction::Enter => {
            let entry = coordinator.enter_game();
            if let GameEntry::Locked { cost, balance } = entry {
                eprintln!("game locked: need {cost} energy, have {balance}");
            }
            print_json(&entry)?;
        }
        GameAction::Finish { score, seconds } => {
            let events = coordinator.finish_game(score, seconds);
            if events.is_empty() {
                eprintln!("no game in progress");
            }
            print_events(&events)?;
        }
        GameAction::Abort => {
            let event = coordinator.abort_game();
            print_event_or(event, || json!({ "aborted": false }))?;
        }
    }

    session.save()?;
    Ok(())
}
