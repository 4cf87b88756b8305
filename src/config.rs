use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};

use crate::{
    error::DocbindError,
    generator::{DEFAULT_PATH_PREFIX, DEFAULT_RUNTIME_CRATE},
    parser::ParsePolicy,
};

/// Conventional name of the configuration file at a project root.
pub const CONFIG_FILE: &str = "docbind.toml";

/// Settings of one compile-and-generate run, usually read from `docbind.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Directory holding the interface documentation corpus
    pub source_root: PathBuf,
    /// Directory generated modules are written below
    pub output_root: PathBuf,
    /// Interface-name substrings to keep; empty keeps every interface
    pub filters: Vec<String>,
    pub parse_policy: ParsePolicy,
    pub path_prefix: String,
    pub runtime_crate: String,
    pub skip_unchanged: bool,
    /// Also write the parsed `Api` as JSON to this path
    pub export_json: Option<PathBuf>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            source_root: PathBuf::from("doc"),
            output_root: PathBuf::from("src/gen"),
            filters: Vec::new(),
            parse_policy: ParsePolicy::default(),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
            skip_unchanged: true,
            export_json: None,
        }
    }
}

impl GeneratorConfig {
    pub fn from_toml_str(content: &str) -> Result<GeneratorConfig, DocbindError> {
        let config: GeneratorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file. Relative roots are resolved against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<GeneratorConfig, DocbindError> {
        let path = path.as_ref();
        tracing::debug!("[GeneratorConfig] reading {:?}", path);
        if !path.exists() {
            return Err(DocbindError::NotFound(format!(
                "configuration file {path:?} does not exist"
            )));
        }
        let mut config = GeneratorConfig::from_toml_str(&read_to_string(path)?)?;
        if let Some(base) = path.parent() {
            config.source_root = base.join(&config.source_root);
            config.output_root = base.join(&config.output_root);
            config.export_json = config.export_json.map(|p| base.join(p));
        }
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), DocbindError> {
        tracing::debug!("[GeneratorConfig] writing {:?}", path.as_ref());
        let toml_string = toml::to_string(self)?;
        write(path, toml_string)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), DocbindError> {
        if !self.path_prefix.starts_with('/') {
            return Err(DocbindError::Config(format!(
                "path_prefix must be an absolute object path, got {:?}",
                self.path_prefix
            )));
        }
        let valid_crate_path = !self.runtime_crate.is_empty()
            && self
                .runtime_crate
                .split("::")
                .all(crate::generator::naming::is_valid_ident);
        if !valid_crate_path {
            return Err(DocbindError::Config(format!(
                "runtime_crate must be a Rust path, got {:?}",
                self.runtime_crate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn defaults_fill_missing_keys() {
        let config = GeneratorConfig::from_toml_str(
            r#"
source_root = "bluez/doc"
filters = ["Media", "GattService"]
parse_policy = "abort"
"#,
        )
        .unwrap();
        assert_eq!(config.source_root, PathBuf::from("bluez/doc"));
        assert_eq!(config.parse_policy, ParsePolicy::Abort);
        assert_eq!(config.path_prefix, "/org/bluez");
        assert_eq!(config.runtime_crate, "docbind_core");
        assert!(config.skip_unchanged);
        assert_eq!(config.filters, vec!["Media", "GattService"]);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            GeneratorConfig::from_toml_str("path_prefix = \"org/bluez\""),
            Err(DocbindError::Config(_))
        ));
        assert!(matches!(
            GeneratorConfig::from_toml_str("runtime_crate = \"docbind-core\""),
            Err(DocbindError::Config(_))
        ));
        assert!(GeneratorConfig::from_toml_str("skip_unchanged = \"yes\"").is_err());
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let config = GeneratorConfig {
            runtime_crate: "crate::runtime".to_string(),
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = GeneratorConfig::from_file(&path).unwrap();
        assert_eq!(loaded.runtime_crate, "crate::runtime");
        assert_eq!(loaded.source_root, dir.path().join("doc"));
    }
}
