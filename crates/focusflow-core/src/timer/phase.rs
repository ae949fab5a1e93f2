use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        !matches!(self, Phase::Focus)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Focus => "Focus",
            Phase::ShortBreak => "Short Break",
            Phase::LongBreak => "Long Break",
        }
    }
}

/// What happens after a manual skip when auto-continue is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipBehavior {
    /// The next phase is loaded but waits for an explicit start.
    #[default]
    Pause,
    /// The next phase starts right away, like a natural completion.
    AutoContinue,
}

/// Durations and cadence for the focus cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSettings {
    pub focus: Duration,
    pub short_break: Duration,
    pub long_break: Duration,
    pub rounds_before_long_break: u32,
    pub auto_continue: bool,
    #[serde(default)]
    pub skip_behavior: SkipBehavior,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self::from_minutes(25, 5, 15, 4)
    }
}

impl PhaseSettings {
    /// Uses saturating arithmetic so absurd minute values can't overflow.
    pub fn from_minutes(focus: u32, short_break: u32, long_break: u32, rounds: u32) -> Self {
        let minutes = |m: u32| Duration::from_secs(u64::from(m).saturating_mul(60));
        Self {
            focus: minutes(focus),
            short_break: minutes(short_break),
            long_break: minutes(long_break),
            rounds_before_long_break: rounds,
            auto_continue: false,
            skip_behavior: SkipBehavior::Pause,
        }
    }

    pub fn with_auto_continue(mut self, auto_continue: bool) -> Self {
        self.auto_continue = auto_continue;
        self
    }

    pub fn with_skip_behavior(mut self, skip_behavior: SkipBehavior) -> Self {
        self.skip_behavior = skip_behavior;
        self
    }

    pub fn duration_for(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Focus => self.focus,
            Phase::ShortBreak => self.short_break,
            Phase::LongBreak => self.long_break,
        }
    }

    /// Whole minutes of a phase, as reported in completion events.
    pub fn minutes_for(&self, phase: Phase) -> u32 {
        u32::try_from(self.duration_for(phase).as_secs() / 60).unwrap_or(u32::MAX)
    }

    /// Cadence rule. `completed_focus_count` is the count *after* any credit
    /// for the phase that just ended.
    pub fn next_phase(&self, after: Phase, completed_focus_count: u32) -> Phase {
        match after {
            Phase::Focus => {
                let rounds = self.rounds_before_long_break.max(1);
                if completed_focus_count > 0 && completed_focus_count % rounds == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::ShortBreak | Phase::LongBreak => Phase::Focus,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("focus", self.focus),
            ("short_break", self.short_break),
            ("long_break", self.long_break),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "duration must be positive".into(),
                });
            }
        }
        if self.rounds_before_long_break < 2 {
            return Err(ConfigError::InvalidValue {
                key: "rounds_before_long_break".into(),
                message: format!("must be at least 2, got {}", self.rounds_before_long_break),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_for_four_rounds() {
        let settings = PhaseSettings::default();
        let next: Vec<Phase> = (1..=8).map(|n| settings.next_phase(Phase::Focus, n)).collect();
        assert_eq!(
            next,
            vec![
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::LongBreak,
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::ShortBreak,
                Phase::LongBreak,
            ]
        );
    }

    #[test]
    fn zero_count_never_earns_long_break() {
        let settings = PhaseSettings::default();
        assert_eq!(settings.next_phase(Phase::Focus, 0), Phase::ShortBreak);
    }

    #[test]
    fn breaks_always_lead_to_focus() {
        let settings = PhaseSettings::default();
        assert_eq!(settings.next_phase(Phase::ShortBreak, 3), Phase::Focus);
        assert_eq!(settings.next_phase(Phase::LongBreak, 4), Phase::Focus);
    }

    #[test]
    fn validate_rejects_zero_duration() {
        let settings = PhaseSettings::from_minutes(0, 5, 15, 4);
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "focus"
        ));
    }

    #[test]
    fn validate_rejects_single_round() {
        assert!(PhaseSettings::from_minutes(25, 5, 15, 1).validate().is_err());
        assert!(PhaseSettings::from_minutes(25, 5, 15, 2).validate().is_ok());
    }

    #[test]
    fn minutes_round_down() {
        let mut settings = PhaseSettings::default();
        settings.short_break = Duration::from_secs(90);
        assert_eq!(settings.minutes_for(Phase::ShortBreak), 1);
        assert_eq!(settings.minutes_for(Phase::Focus), 25);
    }
}
