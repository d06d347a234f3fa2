//==================================================
// File: config.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Runtime configuration
// Objective: Load module search paths and scheduling knobs from TOML with defaults
//==================================================

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{SolvraError, SolvraResult};

/// Configuration file name inside the user's Solvra config directory.
const CONFIG_FILE: &str = "runtime.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Directories searched for `<module>.sgo` objects, in order.
    pub search_paths: Vec<PathBuf>,
    /// Module loaded as the main segment when none is given explicitly.
    pub main_module: Option<String>,
    /// Task acquisitions between event loop polls.
    pub time_slice: u32,
    /// Upper bound on non-blocking polls per time slice.
    pub fast_poll_iterations: u32,
    pub log_filter: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![PathBuf::from(".")],
            main_module: None,
            time_slice: 64,
            fast_poll_iterations: 4,
            log_filter: "info".to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(source: &str) -> SolvraResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|err| SolvraError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> SolvraResult<String> {
        toml::to_string_pretty(self).map_err(|err| SolvraError::Config(err.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> SolvraResult<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|err| {
            SolvraError::Config(format!("reading {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&data)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> SolvraResult<()> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?).map_err(|err| {
            SolvraError::Config(format!("writing {}: {err}", path.display()))
        })
    }

    /// `<config dir>/solvra/runtime.toml`, if the platform has a config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("solvra").join(CONFIG_FILE))
    }

    /// Load the default configuration file, falling back to defaults when it is absent.
    pub fn load_or_default() -> SolvraResult<Self> {
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> SolvraResult<()> {
        if self.time_slice == 0 {
            return Err(SolvraError::Config("time_slice must be at least 1".into()));
        }
        Ok(())
    }
}


//==================================================
// End of file
//==================================================
