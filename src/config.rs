use crate::error::{RegistryError, Result};
use crate::registry::{DEFAULT_RESERVED_THRESHOLD, MAX_RESERVED_THRESHOLD};
use std::{
    env::{self, VarError},
    path::PathBuf,
};

const ENV_KEY_THRESHOLD: &str = "ROW_REGISTRY_THRESHOLD";
const ENV_KEY_OUTPUT_DIR: &str = "ROW_REGISTRY_OUTPUT_DIR";

type EnvValue = std::result::Result<String, VarError>;

#[derive(Debug, Clone)]
pub struct Config {
    /// First synthetic row id. Template rows occupy every id below it.
    pub reserved_threshold: u64,
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reserved_threshold: DEFAULT_RESERVED_THRESHOLD,
            output_dir: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_values(env::var(ENV_KEY_THRESHOLD), env::var(ENV_KEY_OUTPUT_DIR))
    }

    fn from_values(threshold: EnvValue, output_dir: EnvValue) -> Result<Self> {
        let mut config = Self::default();

        if let Some(raw) = non_empty(threshold)? {
            let raw = raw.trim();
            config.reserved_threshold = match raw.parse::<u64>() {
                Ok(value) if (1..=MAX_RESERVED_THRESHOLD).contains(&value) => value,
                _ => {
                    return Err(RegistryError::InvalidConfiguration(format!(
                        "{ENV_KEY_THRESHOLD} must be an integer in 1..={MAX_RESERVED_THRESHOLD}, got {raw:?}"
                    )));
                }
            };
        }

        if let Some(dir) = non_empty(output_dir)? {
            let path = PathBuf::from(dir);

            // If the path already exists but is not a directory, reject early.
            if path.exists() && !path.is_dir() {
                return Err(RegistryError::InvalidConfiguration(format!(
                    "Output path is not a directory: {}",
                    path.display()
                )));
            }

            config.output_dir = Some(path);
        }
        Ok(config)
    }
}

/// Unset and blank values mean "use the default". Non-unicode values are errors.
fn non_empty(value: EnvValue) -> Result<Option<String>> {
    match value {
        Ok(s) if s.trim().is_empty() => Ok(None),
        Ok(s) => Ok(Some(s)),
        Err(VarError::NotPresent) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
