use crate::error::{ErrorContext, Result, SimulatorError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Timing and bounds for the upload queue simulator.
///
/// Defaults reproduce the dashboard's original behaviour: a progress tick
/// every 200ms adding up to 20%, then 2-5s of "processing".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    #[serde(rename = "tickIntervalMs")]
    pub tick_interval_ms: u64,
    #[serde(rename = "maxProgressIncrement")]
    pub max_progress_increment: f64,
    #[serde(rename = "processingDelayMinMs")]
    pub processing_delay_min_ms: u64,
    #[serde(rename = "processingDelayMaxMs")]
    pub processing_delay_max_ms: u64,
    #[serde(rename = "confidenceMin")]
    pub confidence_min: f64,
    #[serde(rename = "confidenceMax")]
    pub confidence_max: f64,
    /// None = every accepted item starts uploading immediately
    #[serde(rename = "maxConcurrentUploads")]
    pub max_concurrent_uploads: Option<usize>,
    #[serde(rename = "maxQueueLen")]
    pub max_queue_len: Option<usize>,
    #[serde(rename = "maxFileSizeBytes")]
    pub max_file_size_bytes: Option<u64>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 200,
            max_progress_increment: 20.0,
            processing_delay_min_ms: 2_000,
            processing_delay_max_ms: 5_000,
            confidence_min: 0.7,
            confidence_max: 1.0,
            max_concurrent_uploads: None,
            max_queue_len: None,
            max_file_size_bytes: None,
        }
    }
}

impl UploadConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(SimulatorError::Config(
                "tickIntervalMs must be greater than 0".to_string(),
            ));
        }
        if !(self.max_progress_increment > 0.0 && self.max_progress_increment <= 100.0) {
            return Err(SimulatorError::Config(format!(
                "maxProgressIncrement must be in (0, 100], got {}",
                self.max_progress_increment
            )));
        }
        if self.processing_delay_min_ms >= self.processing_delay_max_ms {
            return Err(SimulatorError::Config(format!(
                "processingDelayMinMs ({}) must be less than processingDelayMaxMs ({})",
                self.processing_delay_min_ms, self.processing_delay_max_ms
            )));
        }
        if !(self.confidence_min > 0.0
            && self.confidence_min < self.confidence_max
            && self.confidence_max <= 1.0)
        {
            return Err(SimulatorError::Config(format!(
                "confidence range must satisfy 0 < min < max <= 1, got [{}, {})",
                self.confidence_min, self.confidence_max
            )));
        }
        if self.max_concurrent_uploads == Some(0) {
            return Err(SimulatorError::Config(
                "maxConcurrentUploads must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Live-monitor feed settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    #[serde(rename = "detectionIntervalMs")]
    pub detection_interval_ms: u64,
    #[serde(rename = "waveformIntervalMs")]
    pub waveform_interval_ms: u64,
    #[serde(rename = "waveformWindow")]
    pub waveform_window: usize,
    #[serde(rename = "logCapacity")]
    pub log_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            detection_interval_ms: 5_000,
            waveform_interval_ms: 100,
            waveform_window: 51,
            log_capacity: 10,
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.detection_interval_ms == 0 || self.waveform_interval_ms == 0 {
            return Err(SimulatorError::Config(
                "monitor intervals must be greater than 0".to_string(),
            ));
        }
        if self.waveform_window == 0 || self.log_capacity == 0 {
            return Err(SimulatorError::Config(
                "waveformWindow and logCapacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Fixed seed for reproducible runs; None draws from OS entropy
    pub seed: Option<u64>,
    pub upload: UploadConfig,
    pub monitor: MonitorConfig,
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<()> {
        self.upload.validate()?;
        self.monitor.validate()
    }
}

pub fn get_config_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home_dir| home_dir.join(".crimesound"))
        .ok_or_else(|| SimulatorError::Config("Could not find home directory".to_string()))
}

pub fn get_config_file_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn get_logs_dir() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("logs"))
}

/// Create a directory (and parents) readable only by the owner.
pub fn ensure_private_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;

        // Set permissions to 700 (read/write/execute for owner only) on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let metadata = fs::metadata(dir)?;
            let mut permissions = metadata.permissions();
            permissions.set_mode(0o700);
            fs::set_permissions(dir, permissions)?;
        }
    }
    Ok(())
}

pub fn load_config() -> Result<SimulatorConfig> {
    load_config_from(&get_config_file_path()?)
}

/// Missing file yields the defaults; a present file must parse and validate.
pub fn load_config_from(path: &Path) -> Result<SimulatorConfig> {
    if !path.exists() {
        return Ok(SimulatorConfig::default());
    }

    let content = fs::read_to_string(path).context("Failed to read config file")?;
    let config: SimulatorConfig = serde_json::from_str(&content)
        .map_err(|e| SimulatorError::Config(format!("{}: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

pub fn save_config(config: &SimulatorConfig) -> Result<()> {
    save_config_to(config, &get_config_file_path()?)
}

pub fn save_config_to(config: &SimulatorConfig, path: &Path) -> Result<()> {
    config.validate()?;
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).context("Failed to write config file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_match_dashboard_timings() {
        let config = SimulatorConfig::default();
        assert_eq!(config.upload.tick_interval_ms, 200);
        assert_eq!(config.upload.max_progress_increment, 20.0);
        assert_eq!(config.upload.processing_delay_min_ms, 2_000);
        assert_eq!(config.upload.processing_delay_max_ms, 5_000);
        assert_eq!(config.monitor.detection_interval_ms, 5_000);
        assert_eq!(config.monitor.log_capacity, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, SimulatorConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"seed": 7, "upload": {"maxConcurrentUploads": 2}}"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.upload.max_concurrent_uploads, Some(2));
        assert_eq!(config.upload.tick_interval_ms, 200);
        assert_eq!(config.monitor, MonitorConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = SimulatorConfig::default();
        config.upload.max_queue_len = Some(25);

        save_config_to(&config, &path).unwrap();
        let reloaded = load_config_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_invalid_delay_range_rejected() {
        let mut config = SimulatorConfig::default();
        config.upload.processing_delay_min_ms = 5_000;
        config.upload.processing_delay_max_ms = 2_000;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, SimulatorError::Config(_)));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, SimulatorError::Config(_)));
    }
}
