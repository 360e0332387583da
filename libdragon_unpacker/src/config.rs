use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{COINC_WINDOW_DEFAULT, MAX_MODULE_CHANNELS, QUEUE_TIMEOUT_DEFAULT, READ12};
use super::error::ConfigError;
use super::unpacker::UnpackerConfig;
use super::validity::{Sample, NONE};
use super::variables::{HeadVariables, ScalerVariables, TailVariables};

/// Structure representing the application configuration. Contains pathing, run information,
/// the unpacker settings, and the detector variables.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub midas_path: PathBuf,
    pub output_path: PathBuf,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub n_threads: i32,
    pub singles_mode: bool,
    /// Largest head/tail timestamp difference accepted as a coincidence
    pub coinc_window: u64,
    /// Timestamp ticks an event may wait for a partner before it is flushed
    pub queue_timeout: u64,
    pub no_data: Sample,
    pub module_channels: usize,
    pub head: HeadVariables,
    pub tail: TailVariables,
    pub head_scaler: ScalerVariables,
    pub tail_scaler: ScalerVariables,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            midas_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            first_run_number: 0,
            last_run_number: 0,
            n_threads: 1,
            singles_mode: false,
            coinc_window: COINC_WINDOW_DEFAULT,
            queue_timeout: QUEUE_TIMEOUT_DEFAULT,
            no_data: NONE,
            module_channels: MAX_MODULE_CHANNELS,
            head: HeadVariables::default(),
            tail: TailVariables::default(),
            head_scaler: ScalerVariables::head(),
            tail_scaler: ScalerVariables::tail(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Check the numeric settings and the detector variables for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_n_threads_valid() {
            return Err(ConfigError::BadValue(format!(
                "n_threads must be at least 1, found {}",
                self.n_threads
            )));
        }
        if self.module_channels == 0 || self.module_channels > MAX_MODULE_CHANNELS {
            return Err(ConfigError::BadValue(format!(
                "module_channels must be in 1..={MAX_MODULE_CHANNELS}, found {}",
                self.module_channels
            )));
        }
        if (0..=READ12 as Sample).contains(&self.no_data) {
            return Err(ConfigError::BadValue(format!(
                "no_data must lie outside the ADC range 0..={READ12}, found {}",
                self.no_data
            )));
        }
        if self.first_run_number > self.last_run_number {
            return Err(ConfigError::BadValue(format!(
                "first_run_number {} is after last_run_number {}",
                self.first_run_number, self.last_run_number
            )));
        }
        self.head.validate(self.module_channels)?;
        self.tail.validate(self.module_channels)?;
        Ok(())
    }

    /// Check if a specific run exists by looking for any of its .mid files
    pub fn does_run_exist(&self, run_number: i32) -> bool {
        let run_str = self.get_run_str(run_number);
        let Ok(entries) = self.midas_path.read_dir() else {
            return false;
        };
        entries.flatten().any(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(&run_str) && name.ends_with(".mid"))
        })
    }

    /// Get the path to the output summary file
    pub fn get_summary_file_name(&self, run_number: i32) -> Result<PathBuf, ConfigError> {
        if self.output_path.exists() {
            Ok(self
                .output_path
                .join(format!("run_{run_number:0>5}.yml")))
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }

    /// Construct the run string using the MIDAS file naming format
    pub fn get_run_str(&self, run_number: i32) -> String {
        format!("run{run_number:0>5}")
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    /// The settings handed to the unpacker
    pub fn to_unpacker_config(&self) -> UnpackerConfig {
        UnpackerConfig {
            singles_mode: self.singles_mode,
            coinc_window: self.coinc_window,
            queue_timeout: self.queue_timeout,
            module_channels: self.module_channels,
            no_data: self.no_data,
            head: self.head.clone(),
            tail: self.tail.clone(),
            head_scaler: self.head_scaler.clone(),
            tail_scaler: self.tail_scaler.clone(),
        }
    }
}
