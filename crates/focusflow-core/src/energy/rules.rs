//! Pure mapping from completed activities to energy.

use serde::{Deserialize, Serialize};

/// A completed activity, applied to the ledger and then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowEvent {
    RunCompleted { minutes: u32 },
    FocusCompleted { focus_minutes: u32, rest_minutes: u32 },
    GameFinished { score: u32, seconds: u32 },
}

/// Rule table turning a [`FlowEvent`] into an energy gain.
///
/// `Flat` awards one point per completed run or focus phase. `Proportional`
/// awards one point per `*_minutes_per_point` minutes, at least one. Neither
/// pays out for finishing the game it gates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardRules {
    #[default]
    Flat,
    Proportional {
        run_minutes_per_point: u32,
        focus_minutes_per_point: u32,
    },
}

impl RewardRules {
    pub fn proportional() -> Self {
        RewardRules::Proportional {
            run_minutes_per_point: 10,
            focus_minutes_per_point: 25,
        }
    }

    pub fn energy_for(&self, event: &FlowEvent) -> u64 {
        match (self, event) {
            (_, FlowEvent::GameFinished { .. }) => 0,
            (RewardRules::Flat, _) => 1,
            (
                RewardRules::Proportional {
                    run_minutes_per_point,
                    ..
                },
                FlowEvent::RunCompleted { minutes },
            ) => per_point(*minutes, *run_minutes_per_point),
            (
                RewardRules::Proportional {
                    focus_minutes_per_point,
                    ..
                },
                FlowEvent::FocusCompleted { focus_minutes, .. },
            ) => per_point(*focus_minutes, *focus_minutes_per_point),
        }
    }
}

fn per_point(minutes: u32, minutes_per_point: u32) -> u64 {
    u64::from((minutes / minutes_per_point.max(1)).max(1))
}
