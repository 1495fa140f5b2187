use anyhow::Result;
use jsonschema::{validator_for, Validator};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::Difficulty;
use crate::CoreError;

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct RuntimeConfig {
    /// Directory holding the SQLite database (defaults to `./state`)
    #[serde(default)]
    pub state_dir: Option<String>,
}

/// Base score per difficulty tier, before noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct BaseScores {
    pub beginner: i32,
    pub intermediate: i32,
    pub advanced: i32,
    pub expert: i32,
}

impl Default for BaseScores {
    fn default() -> Self {
        Self {
            beginner: Difficulty::Beginner.base_score(),
            intermediate: Difficulty::Intermediate.base_score(),
            advanced: Difficulty::Advanced.base_score(),
            expert: Difficulty::Expert.base_score(),
        }
    }
}

impl BaseScores {
    pub fn for_difficulty(&self, difficulty: Difficulty) -> i32 {
        match difficulty {
            Difficulty::Beginner => self.beginner,
            Difficulty::Intermediate => self.intermediate,
            Difficulty::Advanced => self.advanced,
            Difficulty::Expert => self.expert,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Half-width of the uniform noise added to the base score.
    #[schemars(range(max = 50))]
    pub noise: u8,
    /// Upper bound of the bonus added to declared principles.
    #[schemars(range(max = 50))]
    pub bonus_max: u8,
    pub base_scores: BaseScores,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            noise: 10,
            bonus_max: 10,
            base_scores: BaseScores::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Attempts older than this many days are ignored.
    #[schemars(range(min = 1))]
    pub window_days: u32,
    /// Length of each half of the recent-improvement comparison.
    #[schemars(range(min = 1))]
    pub recent_days: u32,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            window_days: 30,
            recent_days: 7,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(default)]
pub struct CyclesConfig {
    pub start_score: f64,
    pub target: f64,
    /// Fraction of the remaining gap closed each cycle.
    pub momentum: f64,
    /// Flat bonus added per cycle on top of momentum.
    pub bonus: f64,
    #[schemars(range(min = 1, max = 1000))]
    pub attempts_per_cycle: u32,
    pub window_days: u32,
}

impl Default for CyclesConfig {
    fn default() -> Self {
        Self {
            start_score: 72.0,
            target: 95.0,
            momentum: 0.35,
            bonus: 0.5,
            attempts_per_cycle: 5,
            window_days: 7,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub cycles: CyclesConfig,
}

impl Config {
    /// Semantic checks the schema cannot express.
    pub fn validate(&self) -> Result<(), CoreError> {
        let b = &self.simulator.base_scores;
        let ordered = [b.beginner, b.intermediate, b.advanced, b.expert];
        if ordered.iter().any(|s| !(0..=100).contains(s)) {
            return Err(CoreError::InvalidConfig(
                "base scores must lie in 0..=100".into(),
            ));
        }
        if ordered.windows(2).any(|w| w[0] < w[1]) {
            return Err(CoreError::InvalidConfig(
                "base scores must not increase with difficulty".into(),
            ));
        }
        if self.aggregator.window_days == 0 || self.aggregator.recent_days == 0 {
            return Err(CoreError::InvalidConfig(
                "aggregator windows must be at least one day".into(),
            ));
        }
        let c = &self.cycles;
        if !(0.0..=1.0).contains(&c.momentum) {
            return Err(CoreError::InvalidConfig(
                "cycles.momentum must lie in 0..=1".into(),
            ));
        }
        if !(0.0..=100.0).contains(&c.target) || !(0.0..=100.0).contains(&c.start_score) {
            return Err(CoreError::InvalidConfig(
                "cycles.start_score and cycles.target must lie in 0..=100".into(),
            ));
        }
        Ok(())
    }

    /// Resolved state directory: `CADIS_STATE_DIR`, then config, then `./state`.
    pub fn state_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var("CADIS_STATE_DIR") {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }
        self.runtime
            .state_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("state"))
    }
}

static CONFIG_SCHEMA: Lazy<Validator> = Lazy::new(|| {
    let schema = schemars::schema_for!(Config);
    let schema_value = serde_json::to_value(&schema).expect("schema value");
    validator_for(&schema_value).expect("valid schema")
});

/// Returns the JSON schema describing the configuration structure.
///
/// # Panics
///
/// Panics if schema generation fails; this indicates a programming error.
pub fn config_schema_json() -> serde_json::Value {
    let schema = schemars::schema_for!(Config);
    serde_json::to_value(&schema).expect("schema json")
}

pub fn load_config(path: &str) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let raw: toml::Value = toml::from_str(&content)?;
    let json_value = serde_json::to_value(&raw)?;
    let validation_errors: Vec<_> = CONFIG_SCHEMA
        .iter_errors(&json_value)
        .map(|e| e.to_string())
        .collect();
    if !validation_errors.is_empty() {
        return Err(anyhow::anyhow!(validation_errors.join(", ")));
    }
    let cfg: Config = toml::from_str(&content)?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load from `CADIS_CONFIG` when set, otherwise fall back to defaults.
pub fn load_from_env() -> Result<Config> {
    match std::env::var("CADIS_CONFIG") {
        Ok(path) if !path.trim().is_empty() => {
            tracing::debug!(%path, "loading config");
            load_config(&path)
        }
        _ => Ok(Config::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.aggregator.window_days, 30);
        assert_eq!(cfg.simulator.noise, 10);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_config("[aggregator]\nwindow_days = 7\n");
        let cfg = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.aggregator.window_days, 7);
        assert_eq!(cfg.aggregator.recent_days, 7);
        assert_eq!(cfg.cycles.target, 95.0);
    }

    #[test]
    fn schema_rejects_wrong_types() {
        let file = write_config("[simulator]\nnoise = \"loud\"\n");
        assert!(load_config(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn inverted_base_scores_are_rejected() {
        let file = write_config("[simulator.base_scores]\nbeginner = 50\nexpert = 90\n");
        let err = load_config(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("base scores"), "{err}");
    }

    #[test]
    fn schema_json_lists_sections() {
        let schema = config_schema_json();
        let props = schema["properties"].as_object().unwrap();
        for key in ["runtime", "simulator", "aggregator", "cycles"] {
            assert!(props.contains_key(key), "missing {key}");
        }
    }
}
