//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Focus cycle durations and cadence
//! - Auto-continue and skip policy
//! - Run target and the minimum creditable run
//! - Game entry cost and reward rules
//!
//! Configuration is stored at `<data_dir>/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::energy::RewardRules;
use crate::error::ConfigError;
use crate::session::SessionSettings;
use crate::timer::{PhaseSettings, SkipBehavior};

/// Focus cycle configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusConfig {
    #[serde(default = "default_focus_minutes")]
    pub focus_minutes: u32,
    #[serde(default = "default_short_break")]
    pub short_break_minutes: u32,
    #[serde(default = "default_long_break")]
    pub long_break_minutes: u32,
    #[serde(default = "default_rounds")]
    pub rounds_before_long_break: u32,
    #[serde(default)]
    pub auto_continue: bool,
    #[serde(default)]
    pub skip_behavior: SkipBehavior,
}

/// Run timer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_run_target")]
    pub target_minutes: u32,
    #[serde(default = "default_min_credit")]
    pub min_credit_seconds: u32,
}

/// Gated game configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_entry_cost")]
    pub entry_cost: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    #[default]
    Flat,
    Proportional,
}

/// Reward rule selection. The per-point divisors only matter for
/// `proportional`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsConfig {
    #[serde(default)]
    pub rules: RewardKind,
    #[serde(default = "default_run_minutes_per_point")]
    pub run_minutes_per_point: u32,
    #[serde(default = "default_focus_minutes_per_point")]
    pub focus_minutes_per_point: u32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `<data_dir>/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub game: GameConfig,
    #[serde(default)]
    pub rewards: RewardsConfig,
}

// Default functions
fn default_focus_minutes() -> u32 {
    25
}
fn default_short_break() -> u32 {
    5
}
fn default_long_break() -> u32 {
    15
}
fn default_rounds() -> u32 {
    4
}
fn default_run_target() -> u32 {
    20
}
fn default_min_credit() -> u32 {
    60
}
fn default_entry_cost() -> u64 {
    1
}
fn default_run_minutes_per_point() -> u32 {
    10
}
fn default_focus_minutes_per_point() -> u32 {
    25
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            focus_minutes: default_focus_minutes(),
            short_break_minutes: default_short_break(),
            long_break_minutes: default_long_break(),
            rounds_before_long_break: default_rounds(),
            auto_continue: false,
            skip_behavior: SkipBehavior::default(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_minutes: default_run_target(),
            min_credit_seconds: default_min_credit(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            entry_cost: default_entry_cost(),
        }
    }
}

impl Default for RewardsConfig {
    fn default() -> Self {
        Self {
            rules: RewardKind::Flat,
            run_minutes_per_point: default_run_minutes_per_point(),
            focus_minutes_per_point: default_focus_minutes_per_point(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (section, leaf) = match key.rsplit_once('.') {
            Some((section, leaf)) => (Some(section), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        if let Some(section) = section {
            for part in section.split('.') {
                current = current.get_mut(part).ok_or_else(unknown)?;
            }
        }

        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as bool")))?,
            ),
            serde_json::Value::Number(_) => value
                .parse::<u64>()
                .map(|n| serde_json::Value::Number(n.into()))
                .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
            serde_json::Value::Object(_) => return Err(unknown()),
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path. A missing file yields defaults, which
    /// are written back.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. The change only sticks if
    /// the resulting config is valid; call [`save`](Self::save) to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be
    /// parsed or fails validation.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Every leaf as `(dot.key, value)`, sorted by key.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        if let Ok(serde_json::Value::Object(sections)) = serde_json::to_value(self) {
            for (section, fields) in sections {
                if let serde_json::Value::Object(fields) = fields {
                    for (field, value) in fields {
                        let value = match value {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        };
                        entries.push((format!("{section}.{field}"), value));
                    }
                }
            }
        }
        entries
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session_settings().validate().map_err(|e| match e {
            ConfigError::InvalidValue { key, message } => ConfigError::InvalidValue {
                key: qualified_key(&key),
                message,
            },
            other => other,
        })?;
        if self.rewards.rules == RewardKind::Proportional {
            for (key, value) in [
                ("rewards.run_minutes_per_point", self.rewards.run_minutes_per_point),
                ("rewards.focus_minutes_per_point", self.rewards.focus_minutes_per_point),
            ] {
                if value == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: key.into(),
                        message: "must be at least 1".into(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn phase_settings(&self) -> PhaseSettings {
        let focus = &self.focus;
        PhaseSettings::from_minutes(
            focus.focus_minutes,
            focus.short_break_minutes,
            focus.long_break_minutes,
            focus.rounds_before_long_break,
        )
        .with_auto_continue(focus.auto_continue)
        .with_skip_behavior(focus.skip_behavior)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            phases: self.phase_settings(),
            run_target: Duration::from_secs(u64::from(self.run.target_minutes) * 60),
            min_run_credit: Duration::from_secs(u64::from(self.run.min_credit_seconds)),
            game_entry_cost: self.game.entry_cost,
        }
    }

    pub fn reward_rules(&self) -> RewardRules {
        match self.rewards.rules {
            RewardKind::Flat => RewardRules::Flat,
            RewardKind::Proportional => RewardRules::Proportional {
                run_minutes_per_point: self.rewards.run_minutes_per_point,
                focus_minutes_per_point: self.rewards.focus_minutes_per_point,
            },
        }
    }
}

/// Map a settings field name to the config key a user would type.
fn qualified_key(key: &str) -> String {
    match key {
        "focus" => "focus.focus_minutes".into(),
        "short_break" => "focus.short_break_minutes".into(),
        "long_break" => "focus.long_break_minutes".into(),
        "rounds_before_long_break" => "focus.rounds_before_long_break".into(),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
        assert_eq!(parsed.focus.focus_minutes, 25);
        assert_eq!(parsed.game.entry_cost, 1);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let cfg: Config = toml::from_str("[focus]\nfocus_minutes = 50\n").unwrap();
        assert_eq!(cfg.focus.focus_minutes, 50);
        assert_eq!(cfg.focus.short_break_minutes, 5);
        assert_eq!(cfg.run.min_credit_seconds, 60);
        assert_eq!(cfg.rewards.rules, RewardKind::Flat);
    }

    #[test]
    fn get_and_set_by_dot_path() {
        let mut cfg = Config::default();
        assert_eq!(cfg.get("focus.auto_continue").as_deref(), Some("false"));

        cfg.set("focus.auto_continue", "true").unwrap();
        cfg.set("focus.focus_minutes", "50").unwrap();
        cfg.set("focus.skip_behavior", "auto_continue").unwrap();
        cfg.set("rewards.rules", "proportional").unwrap();

        assert!(cfg.focus.auto_continue);
        assert_eq!(cfg.get("focus.focus_minutes").as_deref(), Some("50"));
        assert_eq!(cfg.focus.skip_behavior, SkipBehavior::AutoContinue);
        assert_eq!(cfg.reward_rules(), RewardRules::proportional());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.set("focus.nope", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(cfg.set("focus", "1"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(cfg.set("", "1"), Err(ConfigError::UnknownKey(_))));
        assert_eq!(cfg.get("focus"), None);
        assert_eq!(cfg.get("nope.key"), None);
    }

    #[test]
    fn invalid_values_leave_config_untouched() {
        let mut cfg = Config::default();
        let err = cfg.set("focus.short_break_minutes", "0").unwrap_err();
        assert!(
            matches!(&err, ConfigError::InvalidValue { key, .. } if key == "focus.short_break_minutes"),
            "{err}"
        );
        assert!(cfg.set("focus.rounds_before_long_break", "1").is_err());
        assert!(cfg.set("focus.focus_minutes", "-5").is_err());
        assert!(cfg.set("focus.auto_continue", "maybe").is_err());
        assert!(cfg.set("rewards.rules", "generous").is_err());
        assert!(cfg.set("game.entry_cost", "0").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn entries_cover_every_key() {
        let entries = Config::default().entries();
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        for key in [
            "focus.focus_minutes",
            "focus.skip_behavior",
            "run.target_minutes",
            "run.min_credit_seconds",
            "game.entry_cost",
            "rewards.rules",
        ] {
            assert!(keys.contains(&key), "missing {key}");
        }
        let rules = entries.iter().find(|(k, _)| k == "rewards.rules").unwrap();
        assert_eq!(rules.1, "flat");
    }

    #[test]
    fn session_settings_follow_config() {
        let mut cfg = Config::default();
        cfg.run.target_minutes = 30;
        cfg.run.min_credit_seconds = 90;
        let settings = cfg.session_settings();
        assert_eq!(settings.run_target, Duration::from_secs(1800));
        assert_eq!(settings.min_run_credit, Duration::from_secs(90));
        assert_eq!(settings.phases, PhaseSettings::default());
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg;
        changed.set("run.target_minutes", "45").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().run.target_minutes, 45);
    }

    #[test]
    fn load_from_rejects_garbage_and_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        std::fs::write(&path, "focus = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseFailed(_))));

        std::fs::write(&path, "[focus]\nlong_break_minutes = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
