use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_RELATIVE_PATH: &str = "data/global-config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "RuntimeConfig::default_module_paths")]
    pub module_paths: Vec<String>,
    #[serde(default = "RuntimeConfig::default_plugin_dir")]
    pub plugin_dir: String,
    #[serde(default = "RuntimeConfig::default_script_extension")]
    pub script_extension: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfigOverrides {
    pub root: Option<PathBuf>,
    pub verbose: Option<bool>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            module_paths: Self::default_module_paths(),
            plugin_dir: Self::default_plugin_dir(),
            script_extension: Self::default_script_extension(),
        }
    }
}

impl RuntimeConfig {
    fn default_module_paths() -> Vec<String> {
        vec!["lib".to_string(), "modules".to_string()]
    }

    fn default_plugin_dir() -> String {
        "plugins".to_string()
    }

    fn default_script_extension() -> String {
        "rhai".to_string()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    /// A missing file is the normal first-run case and silently yields defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn for_root(root: impl AsRef<Path>) -> Self {
        Self::load_or_default(root.as_ref().join(CONFIG_RELATIVE_PATH))
    }

    pub fn apply_overrides(&mut self, overrides: &RuntimeConfigOverrides) {
        if let Some(verbose) = overrides.verbose {
            self.verbose = verbose;
        }
    }

    pub fn module_dirs(&self, root: &Path) -> Vec<PathBuf> {
        self.module_paths.iter().map(|dir| root.join(dir)).collect()
    }

    pub fn plugin_root(&self, root: &Path) -> PathBuf {
        root.join(&self.plugin_dir)
    }
}

impl RuntimeConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.root.is_none() && self.verbose.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.root.is_some() {
            fields.push("root");
        }
        if self.verbose.is_some() {
            fields.push("verbose");
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("global-config.json");
        fs::write(&path, r#"{ "verbose": true, "module_paths": ["shared"] }"#).expect("write config");
        let cfg = RuntimeConfig::load(&path).expect("load config");
        assert!(cfg.verbose);
        assert_eq!(cfg.module_paths, vec!["shared"]);
        assert_eq!(cfg.plugin_dir, "plugins");
        assert_eq!(cfg.script_extension, "rhai");
    }

    #[test]
    fn missing_or_broken_config_falls_back_to_defaults() {
        let dir = tempdir().expect("temp dir");
        assert_eq!(RuntimeConfig::for_root(dir.path()), RuntimeConfig::default());
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ verbose: ").expect("write config");
        assert!(RuntimeConfig::load(&path).is_err());
        assert_eq!(RuntimeConfig::load_or_default(&path), RuntimeConfig::default());
    }

    #[test]
    fn overrides_apply_verbose_only_when_set() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(&RuntimeConfigOverrides::default());
        assert!(!cfg.verbose);
        let overrides = RuntimeConfigOverrides { root: None, verbose: Some(true) };
        cfg.apply_overrides(&overrides);
        assert!(cfg.verbose);
        assert_eq!(overrides.applied_fields(), vec!["verbose"]);
    }
}
