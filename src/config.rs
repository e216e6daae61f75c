use crate::app_dirs::AppDirs;
use crate::path::{PathConfig, TrialKind};
use crate::recorder::RecorderConfig;
use crate::score::DeviationReference;
use crate::trial::TrialDefinition;
use crate::{Error, Result};
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

static PROTOCOL_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/protocols");

/// Named, ordered list of trials shipped with the crate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Protocol {
    pub name: String,
    pub trials: Vec<TrialDefinition>,
}

impl Protocol {
    pub fn builtin(name: &str) -> Result<Self> {
        let file = PROTOCOL_DIR
            .get_file(format!("{name}.json"))
            .ok_or_else(|| Error::UnknownProtocol(name.to_string()))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| Error::Parse(format!("protocol '{name}' is not valid UTF-8")))?;
        Ok(serde_json::from_str(contents)?)
    }

    pub fn builtin_names() -> Vec<String> {
        let mut names: Vec<String> = PROTOCOL_DIR
            .files()
            .filter_map(|f| f.path().file_stem())
            .filter_map(|s| s.to_str())
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Guide point spacing, meters
    pub spacing: f64,
    pub max_points: usize,
    pub max_samples: usize,
    /// Dedup threshold between consecutive samples, meters; 0 disables
    pub min_sample_distance: f64,
    /// Live deviation up to which the fingertip counts as on the path
    pub on_path_tolerance: f64,
    pub deviation_reference: DeviationReference,
    /// Built-in protocol used when `trials` is not given
    pub protocol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trials: Option<Vec<TrialDefinition>>,
}

impl Default for Config {
    fn default() -> Self {
        let path = PathConfig::default();
        let recorder = RecorderConfig::default();
        Self {
            spacing: path.spacing,
            max_points: path.max_points,
            max_samples: recorder.max_samples,
            min_sample_distance: recorder.min_sample_distance,
            on_path_tolerance: 0.02,
            deviation_reference: DeviationReference::Chord,
            protocol: "standard".to_string(),
            trials: None,
        }
    }
}

impl Config {
    pub fn path_config(&self) -> PathConfig {
        PathConfig {
            spacing: self.spacing,
            max_points: self.max_points,
        }
    }

    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            min_sample_distance: self.min_sample_distance,
            max_samples: self.max_samples,
        }
    }

    /// Inline trials if present, otherwise the named built-in protocol
    pub fn trials(&self) -> Result<Vec<TrialDefinition>> {
        match &self.trials {
            Some(trials) => Ok(trials.clone()),
            None => Ok(Protocol::builtin(&self.protocol)?.trials),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.spacing > 0.0 && self.spacing.is_finite()) {
            return Err(Error::Config(format!(
                "spacing must be positive, got {}",
                self.spacing
            )));
        }
        if self.max_points < 2 {
            return Err(Error::Config("max_points must be at least 2".into()));
        }
        if self.max_samples == 0 {
            return Err(Error::Config("max_samples must be positive".into()));
        }
        if !(self.min_sample_distance >= 0.0) {
            return Err(Error::Config(
                "min_sample_distance must not be negative".into(),
            ));
        }
        if !(self.on_path_tolerance >= 0.0) {
            return Err(Error::Config("on_path_tolerance must not be negative".into()));
        }

        let trials = self.trials()?;
        if trials.is_empty() {
            return Err(Error::Config("protocol has no trials".into()));
        }
        for trial in &trials {
            if trial.required_attempts == 0 {
                return Err(Error::Config(format!(
                    "trial '{}' must require at least one attempt",
                    trial.name
                )));
            }
            if let TrialKind::ZigZag {
                amplitude,
                frequency_cycles,
            } = trial.kind
            {
                if !(amplitude > 0.0) || frequency_cycles == 0 {
                    return Err(Error::Config(format!(
                        "trial '{}' needs a positive zig-zag amplitude and frequency",
                        trial.name
                    )));
                }
            }
        }
        Ok(())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path(),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        match fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => return cfg,
                Err(e) => log::warn!(
                    "ignoring unreadable config {}: {}",
                    self.path.display(),
                    e
                ),
            },
            Err(_) => log::debug!("no config at {}, using defaults", self.path.display()),
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
