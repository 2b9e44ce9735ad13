use crate::constants::{
    DEFAULT_APPLICATION, DEFAULT_HOST, DEFAULT_LOG_DELAY_SECS, DEFAULT_PACKAGE_PATH,
    DEFAULT_PASSWORD, DEFAULT_START_DELAY_SECS, DEFAULT_USERNAME,
};
use crate::error::{DeployError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Deployment target and package. Fields missing from a config file keep
/// their defaults.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct DeployConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub package_path: PathBuf,
    pub application_name: String,
    pub start_delay_secs: u64,
    pub log_delay_secs: u64,
    /// Whole-request timeout; `None` waits as long as the device takes.
    pub timeout_secs: Option<u64>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            package_path: PathBuf::from(DEFAULT_PACKAGE_PATH),
            application_name: DEFAULT_APPLICATION.to_string(),
            start_delay_secs: DEFAULT_START_DELAY_SECS,
            log_delay_secs: DEFAULT_LOG_DELAY_SECS,
            timeout_secs: None,
        }
    }
}

impl DeployConfig {
    pub fn read_config<P: AsRef<Path>>(path: P) -> Result<DeployConfig> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            DeployError::ConfigError(format!("Cannot open {}: {}", path.display(), e))
        })?;
        let config: DeployConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(DeployError::ConfigError("host is empty".to_string()));
        }
        if self.application_name.trim().is_empty() {
            return Err(DeployError::ConfigError(
                "applicationName is empty".to_string(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(DeployError::ConfigError(
                "timeoutSecs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_secs(self.start_delay_secs)
    }

    pub fn log_delay(&self) -> Duration {
        Duration::from_secs(self.log_delay_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl fmt::Debug for DeployConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"***")
            .field("package_path", &self.package_path)
            .field("application_name", &self.application_name)
            .field("start_delay_secs", &self.start_delay_secs)
            .field("log_delay_secs", &self.log_delay_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
