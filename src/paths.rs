//! XDG-compliant path resolution for intel-graph.
//!
//! Supplies the default config file and layout-cache directory used by the CLI
//! when `--config` / `--data-dir` are not given.

use std::path::PathBuf;

use crate::error::ConfigError;

const APP_DIR: &str = "intel-graph";

/// Global XDG-compliant directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntelPaths {
    /// `$XDG_CONFIG_HOME/intel-graph/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/intel-graph/`
    pub data_dir: PathBuf,
}

impl IntelPaths {
    /// Resolve from the process environment.
    pub fn resolve() -> Result<Self, ConfigError> {
        Self::resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` in place of the environment.
    ///
    /// Empty values are ignored, as the XDG base directory rules require.
    pub fn resolve_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        let home = var("HOME").ok_or(ConfigError::NoHome)?;

        let config_dir = var("XDG_CONFIG_HOME")
            .unwrap_or_else(|| home.join(".config"))
            .join(APP_DIR);
        let data_dir = var("XDG_DATA_HOME")
            .unwrap_or_else(|| home.join(".local/share"))
            .join(APP_DIR);

        Ok(Self {
            config_dir,
            data_dir,
        })
    }

    /// Path to the global config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Directory holding the persisted layout cache.
    pub fn layout_dir(&self) -> PathBuf {
        self.data_dir.join("layout")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn home_fallbacks() {
        let paths = IntelPaths::resolve_with(env(&[("HOME", "/home/u")])).unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/home/u/.config/intel-graph"));
        assert_eq!(
            paths.layout_dir(),
            PathBuf::from("/home/u/.local/share/intel-graph/layout")
        );
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/home/u/.config/intel-graph/config.toml")
        );
    }

    #[test]
    fn xdg_overrides() {
        let paths = IntelPaths::resolve_with(env(&[
            ("HOME", "/home/u"),
            ("XDG_CONFIG_HOME", "/cfg"),
            ("XDG_DATA_HOME", ""),
        ]))
        .unwrap();
        assert_eq!(paths.config_dir, PathBuf::from("/cfg/intel-graph"));
        // Empty XDG_DATA_HOME falls back to the home default.
        assert_eq!(paths.data_dir, PathBuf::from("/home/u/.local/share/intel-graph"));
    }

    #[test]
    fn missing_home() {
        assert!(matches!(
            IntelPaths::resolve_with(env(&[])),
            Err(ConfigError::NoHome)
        ));
    }
}
