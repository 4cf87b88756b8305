//! Source generation from assembled interface models.
//!
//! Each [`InterfaceModel`] becomes one Rust module holding a property record (declared with
//! [`property_record!`](crate::property_record)) and a client type wrapping
//! [`Client`](crate::client::Client). Output layout follows the interface name: the leading
//! segments become directories, the last segment becomes the file, so
//! `org.bluez.MediaTransport1` lands at `org/bluez/media_transport1.rs`. Every directory gets a
//! `mod.rs` listing its children.
//!
//! Generation is idempotent: a second run over the same models rewrites nothing, and output
//! path collisions are detected before anything touches the destination.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};

use crate::{
    config::GeneratorConfig,
    error::{DocbindError, GenerateError},
    model::InterfaceModel,
};

pub mod naming;
pub mod render;

pub use render::{rust_type, HEADER};

use naming::{module_ident, to_snake_case};
use render::RenderContext;

pub const DEFAULT_RUNTIME_CRATE: &str = "docbind_core";
pub const DEFAULT_PATH_PREFIX: &str = "/org/bluez";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generator {
    /// Crate path generated code imports its runtime from
    pub runtime_crate: String,
    /// Object path prefix adapter ids are joined onto
    pub path_prefix: String,
    /// Leave files whose content would not change untouched
    pub skip_unchanged: bool,
}

impl Default for Generator {
    fn default() -> Self {
        Generator {
            runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
            path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            skip_unchanged: true,
        }
    }
}

/// Outcome of one [`Generator::generate`] run, paths relative to the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

impl GenerateReport {
    pub fn total(&self) -> usize {
        self.written.len() + self.unchanged.len()
    }
}

impl Generator {
    pub fn new() -> Self {
        Generator::default()
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Generator {
            runtime_crate: config.runtime_crate.clone(),
            path_prefix: config.path_prefix.clone(),
            skip_unchanged: config.skip_unchanged,
        }
    }

    pub fn render(&self, model: &InterfaceModel) -> Result<String, GenerateError> {
        render::render(
            model,
            &RenderContext {
                runtime_crate: &self.runtime_crate,
                path_prefix: &self.path_prefix,
            },
        )
    }

    /// Relative output file for an interface name.
    pub fn output_path(&self, interface: &str) -> Result<PathBuf, GenerateError> {
        let segments: Vec<&str> = interface.split('.').collect();
        let invalid = |reason: &str| GenerateError::Render {
            interface: interface.to_string(),
            reason: reason.to_string(),
        };
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("interface name has an empty segment"));
        }
        let Some((last, dirs)) = segments.split_last() else {
            return Err(invalid("interface name is empty"));
        };
        let mut path = PathBuf::new();
        for dir in dirs {
            path.push(module_ident(dir));
        }
        let file = to_snake_case(last);
        if file.is_empty() {
            return Err(invalid("interface name has no usable file name"));
        }
        path.push(format!("{}.rs", module_ident(&file)));
        Ok(path)
    }

    /// Map every model to its output path, failing on any two that collide.
    fn plan<'a>(
        &self,
        models: &'a [InterfaceModel],
    ) -> Result<Vec<(PathBuf, &'a InterfaceModel)>, GenerateError> {
        let mut claimed: HashMap<PathBuf, &str> = HashMap::new();
        let mut plan = Vec::with_capacity(models.len());
        for model in models {
            let path = self.output_path(&model.name)?;
            if let Some(first) = claimed.get(&path) {
                return Err(GenerateError::OutputCollision {
                    path,
                    first: first.to_string(),
                    second: model.name.clone(),
                });
            }
            claimed.insert(path.clone(), &model.name);
            plan.push((path, model));
        }

        // `org/bluez.rs` and `org/bluez/…` cannot both be a module.
        for (path, model) in plan.iter() {
            let as_dir = path.with_extension("");
            for (other, other_model) in plan.iter() {
                if other.starts_with(&as_dir) && other != path {
                    return Err(GenerateError::OutputCollision {
                        path: as_dir.clone(),
                        first: model.name.clone(),
                        second: other_model.name.clone(),
                    });
                }
            }
        }
        Ok(plan)
    }

    /// Render every model and write the results below `dest`.
    ///
    /// Collisions and render failures of any model abort before a single file is written;
    /// an I/O failure part way leaves the files written so far in place.
    pub fn generate(
        &self,
        models: &[InterfaceModel],
        dest: &Path,
    ) -> Result<GenerateReport, DocbindError> {
        let plan = self.plan(models)?;
        let mut rendered = Vec::with_capacity(plan.len());
        for (path, model) in plan {
            rendered.push((path, self.render(model)?));
        }

        let mut modules: BTreeMap<PathBuf, BTreeSet<String>> = BTreeMap::new();
        modules.entry(PathBuf::new()).or_default();
        for (path, _) in rendered.iter() {
            let mut child = path.clone();
            let mut name = child
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            while let Some(parent) = child.parent().map(Path::to_path_buf) {
                modules.entry(parent.clone()).or_default().insert(name);
                if parent.as_os_str().is_empty() {
                    break;
                }
                name = parent
                    .file_name()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                child = parent;
            }
        }

        let mut report = GenerateReport::default();
        for (path, content) in rendered {
            self.write(dest, path, &content, &mut report)?;
        }
        for (dir, children) in modules {
            let mut content = format!("{HEADER}\n\n");
            for child in children {
                content.push_str(&format!("pub mod {child};\n"));
            }
            self.write(dest, dir.join("mod.rs"), &content, &mut report)?;
        }
        tracing::info!(
            "[Generator] {} file(s) written, {} unchanged in {:?}",
            report.written.len(),
            report.unchanged.len(),
            dest
        );
        Ok(report)
    }

    fn write(
        &self,
        dest: &Path,
        rel: PathBuf,
        content: &str,
        report: &mut GenerateReport,
    ) -> Result<(), DocbindError> {
        let full = dest.join(&rel);
        if self.skip_unchanged && full.exists() {
            let current = fs::read_to_string(&full)?;
            if current == content {
                tracing::debug!("[Generator] unchanged {:?}", rel);
                report.unchanged.push(rel);
                return Ok(());
            }
        }
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, content)?;
        tracing::info!("[Generator] wrote {:?}", rel);
        report.written.push(rel);
        Ok(())
    }
}
