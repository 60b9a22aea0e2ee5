//! YAML run configuration.

use std::path::{Path, PathBuf};

use pf_core::{Real, STEADY_RELATIVE_TOLERANCE};
use pf_melt::{MeltParams, MeltSlab, NewtonConfig, Walls};
use pf_sim::{OutputSchedule, SimOptions, StepBounds};
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

fn invalid(field: &str, value: impl ToString, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Either a constant step size or a `{min, initial, max}` range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StepBoundsDef {
    Fixed(Real),
    Range { min: Real, initial: Real, max: Real },
}

impl StepBoundsDef {
    pub fn to_bounds(self) -> StepBounds {
        match self {
            StepBoundsDef::Fixed(dt) => StepBounds::fixed(dt),
            StepBoundsDef::Range { min, initial, max } => StepBounds { min, initial, max },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProblemDef {
    #[serde(flatten)]
    pub params: MeltParams,
    pub walls: Walls,
    /// Width of the initially hot layer next to the hot wall.
    pub initial_hot_width: Real,
}

impl Default for ProblemDef {
    fn default() -> Self {
        Self {
            params: MeltParams::default(),
            walls: Walls::default(),
            initial_hot_width: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    pub time_step_bounds: StepBoundsDef,
    #[serde(default)]
    pub start_time: Real,
    pub end_time: Real,
    #[serde(default = "OutputSchedule::at_end")]
    pub output_times: OutputSchedule,
    #[serde(default)]
    pub stop_when_steady: bool,
    #[serde(default = "default_steady_tolerance")]
    pub steady_tolerance: Real,
    #[serde(default = "default_max_time_steps")]
    pub max_time_steps: usize,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Start from a checkpoint instead of the initial condition.
    #[serde(default)]
    pub restart: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_filepath: Option<PathBuf>,
    #[serde(default)]
    pub nlp: NewtonConfig,
    #[serde(default)]
    pub problem: ProblemDef,
}

fn default_steady_tolerance() -> Real {
    STEADY_RELATIVE_TOLERANCE
}

fn default_max_time_steps() -> usize {
    1_000_000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

impl RunConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn sim_options(&self) -> SimOptions {
        SimOptions {
            time_step_bounds: self.time_step_bounds.to_bounds(),
            start_time: self.start_time,
            end_time: self.end_time,
            output_times: self.output_times.clone(),
            stop_when_steady: self.stop_when_steady,
            steady_tolerance: self.steady_tolerance,
            max_steps: self.max_time_steps,
            debug: self.debug,
        }
    }

    /// Build the slab solver described by `problem` and `nlp`.
    pub fn slab(&self) -> Result<MeltSlab, ConfigError> {
        MeltSlab::new(self.problem.params.clone(), self.nlp.clone())
            .map_err(|e| invalid("problem", self.problem.params.nodes, e))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bounds = self.time_step_bounds.to_bounds();
        bounds
            .time_step_size()
            .map_err(|e| invalid("time_step_bounds", format!("{bounds:?}"), e))?;

        if !self.start_time.is_finite() {
            return Err(invalid("start_time", self.start_time, "must be finite"));
        }
        if !self.end_time.is_finite() || self.end_time < self.start_time {
            return Err(invalid(
                "end_time",
                self.end_time,
                "must be finite and not before start_time",
            ));
        }
        if self.steady_tolerance.is_nan() || self.steady_tolerance <= 0.0 {
            return Err(invalid(
                "steady_tolerance",
                self.steady_tolerance,
                "must be positive",
            ));
        }
        if self.max_time_steps == 0 {
            return Err(invalid("max_time_steps", 0, "must be positive"));
        }
        if self.restart && self.restart_filepath.is_none() {
            return Err(invalid(
                "restart_filepath",
                "<missing>",
                "required when restart is set",
            ));
        }
        self.nlp
            .validate()
            .map_err(|e| invalid("nlp", format!("{:?}", self.nlp), e))?;
        self.slab()?;

        let walls = self.problem.walls;
        if !walls.hot.is_finite() || !walls.cold.is_finite() {
            return Err(invalid(
                "problem.walls",
                format!("{walls:?}"),
                "wall temperatures must be finite",
            ));
        }
        let width = self.problem.initial_hot_width;
        if !(0.0..=1.0).contains(&width) {
            return Err(invalid(
                "problem.initial_hot_width",
                width,
                "must be in [0, 1]",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_sim::OutputRequest;

    const SAMPLE: &str = r#"
time_step_bounds: {min: 0.0001, initial: 0.001, max: 0.01}
end_time: 0.05
output_times: [0.02, end]
debug: true
output_dir: out/melt
nlp:
  relaxation: 0.45
  max_iterations: 30
problem:
  nodes: 21
  ste: 0.5
  regularization: {theta_s: 0.05, r_s: 0.02}
  walls: {hot: 1.0, cold: -0.2}
"#;

    #[test]
    fn parses_full_config() {
        let config = RunConfig::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(
            config.time_step_bounds,
            StepBoundsDef::Range {
                min: 1e-4,
                initial: 1e-3,
                max: 1e-2
            }
        );
        assert_eq!(config.start_time, 0.0);
        assert_eq!(
            config.output_times.requests(),
            &[OutputRequest::Time(0.02), OutputRequest::End]
        );
        assert!(config.debug);
        assert!(!config.restart);
        assert_eq!(config.nlp.relaxation, 0.45);
        assert_eq!(config.nlp.max_iterations, 30);
        assert_eq!(config.nlp.abs_tol, NewtonConfig::default().abs_tol);
        assert_eq!(config.problem.params.nodes, 21);
        assert_eq!(config.problem.params.regularization.r_s, 0.02);
        assert_eq!(config.problem.walls.cold, -0.2);
        config.validate().unwrap();
    }

    #[test]
    fn scalar_step_size_is_fixed() {
        let config = RunConfig::from_yaml_str("time_step_bounds: 0.002\nend_time: 1.0\n").unwrap();
        assert_eq!(config.time_step_bounds, StepBoundsDef::Fixed(0.002));
        let opts = config.sim_options();
        assert_eq!(opts.time_step_bounds, StepBounds::fixed(0.002));
        assert_eq!(opts.output_times, OutputSchedule::at_end());
        assert_eq!(opts.steady_tolerance, STEADY_RELATIVE_TOLERANCE);
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn all_token_parses() {
        let config = RunConfig::from_yaml_str(
            "time_step_bounds: 0.1\nend_time: 1.0\noutput_times: [all]\n",
        )
        .unwrap();
        assert_eq!(config.output_times, OutputSchedule::every_step());
    }

    #[test]
    fn unknown_output_token_is_rejected() {
        let err = RunConfig::from_yaml_str(
            "time_step_bounds: 0.1\nend_time: 1.0\noutput_times: [0.5, later]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn decreasing_output_times_are_rejected() {
        let err = RunConfig::from_yaml_str(
            "time_step_bounds: 0.1\nend_time: 1.0\noutput_times: [0.5, 0.2]\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn inverted_step_bounds_fail_validation() {
        let config = RunConfig::from_yaml_str(
            "time_step_bounds: {min: 0.1, initial: 0.05, max: 1.0}\nend_time: 1.0\n",
        )
        .unwrap();
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "time_step_bounds"),
            other => panic!("expected invalid bounds, got {other:?}"),
        }
    }

    #[test]
    fn restart_requires_a_checkpoint_path() {
        let config = RunConfig::from_yaml_str(
            "time_step_bounds: 0.001\nend_time: 0.05\nrestart: true\n",
        )
        .unwrap();
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "restart_filepath"),
            other => panic!("expected missing restart path, got {other:?}"),
        }
    }

    #[test]
    fn end_before_start_fails_validation() {
        let config = RunConfig::from_yaml_str(
            "time_step_bounds: 0.001\nstart_time: 1.0\nend_time: 0.5\n",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_relaxation_fails_validation() {
        let config = RunConfig::from_yaml_str(
            "time_step_bounds: 0.001\nend_time: 0.5\nnlp: {relaxation: 1.5}\n",
        )
        .unwrap();
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, "nlp"),
            other => panic!("expected invalid nlp, got {other:?}"),
        }
    }

    #[test]
    fn demo_configs_stop_on_steady_state() {
        for text in [
            include_str!("../../../demos/melt_pcm_0.yaml"),
            include_str!("../../../demos/melt_pcm_1.yaml"),
        ] {
            let config = RunConfig::from_yaml_str(text).unwrap();
            config.validate().unwrap();
            assert!(config.sim_options().stop_when_steady);
        }
    }

    #[test]
    fn yaml_roundtrip_keeps_tokens() {
        let config = RunConfig::from_yaml_str(SAMPLE).unwrap();
        let text = config.to_yaml().unwrap();
        assert!(text.contains("end"));
        let back = RunConfig::from_yaml_str(&text).unwrap();
        assert_eq!(back, config);
    }
}
