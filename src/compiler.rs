//! Corpus-level driver: documentation files in, [`Api`] out.
//!
//! [`ApiCompiler`] queues documentation sources (single strings or whole directory trees),
//! splits them into doc units, runs the block parsers over each unit and hands the results to
//! the [`Assembler`]. [`build`] chains compilation with code generation for a
//! [`GeneratorConfig`].

use std::{
    collections::VecDeque,
    fs::{read_to_string, write},
    path::{Path, PathBuf},
};
use walkdir::{DirEntry, WalkDir};

use crate::{
    assembler::Assembler,
    config::GeneratorConfig,
    error::{DocbindError, ParseError},
    generator::{GenerateReport, Generator},
    model::Api,
    parser::{split_units, BlockParsers, ParseDiagnostic, ParsePolicy},
};

/// File extension of interface documentation files.
pub const DOC_EXTENSION: &str = "txt";

/// The parsed corpus plus everything the parsers chose to skip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileResult {
    pub api: Api,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl CompileResult {
    pub fn skipped(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_skipped()).count()
    }
}

/// Queue counters, useful when debugging a corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompilerStats {
    pub queued_sources: usize,
    pub compiled_sources: usize,
    pub interfaces: usize,
}

pub struct ApiCompiler {
    policy: ParsePolicy,
    filters: Vec<String>,
    parsers: BlockParsers,
    assembler: Assembler,
    queue: VecDeque<(String, String)>,
    compiled: usize,
}

impl ApiCompiler {
    pub fn new(policy: ParsePolicy) -> Result<Self, DocbindError> {
        Ok(ApiCompiler {
            policy,
            filters: Vec::new(),
            parsers: BlockParsers::new()?,
            assembler: Assembler::new(),
            queue: VecDeque::new(),
            compiled: 0,
        })
    }

    /// Keep only interfaces whose name contains one of `filters`. Empty keeps everything.
    pub fn with_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_source<N: Into<String>, C: Into<String>>(&mut self, name: N, content: C) {
        self.queue.push_back((name.into(), content.into()));
    }

    /// Queue every `.txt` file below `path`, in file-name order. Hidden entries are skipped.
    pub fn add_dir<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, DocbindError> {
        fn is_hidden(entry: &DirEntry) -> bool {
            entry
                .file_name()
                .to_str()
                .map(|s| s.starts_with('.'))
                .unwrap_or(false)
        }
        let root = path.as_ref();
        if !root.is_dir() {
            return Err(DocbindError::NotFound(format!(
                "documentation root {root:?} is not a directory"
            )));
        }
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e) || e.path() == root)
        {
            let path = entry?.into_path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == DOC_EXTENSION) {
                files.push(path);
            }
        }
        for file in files.iter() {
            let name = file
                .strip_prefix(root)
                .unwrap_or(file.as_path())
                .to_string_lossy()
                .to_string();
            self.add_source(name, read_to_string(file)?);
        }
        tracing::debug!("[ApiCompiler] queued {} file(s) from {:?}", files.len(), root);
        Ok(files.len())
    }

    fn selects(&self, interface: &str) -> bool {
        self.filters.is_empty() || self.filters.iter().any(|f| interface.contains(f.as_str()))
    }

    pub fn stats(&self) -> CompilerStats {
        CompilerStats {
            queued_sources: self.queue.len(),
            compiled_sources: self.compiled,
            interfaces: self.assembler.len(),
        }
    }

    /// Compile every queued source.
    ///
    /// Malformed blocks and units are skipped or fatal per the parse policy; a conflicting
    /// interface or property is always fatal.
    pub fn finish(mut self) -> Result<CompileResult, DocbindError> {
        let mut result = CompileResult::default();
        while let Some((name, content)) = self.queue.pop_front() {
            let units = match split_units(&name, &content) {
                Ok(units) => units,
                Err(e @ ParseError::MalformedUnit { .. })
                    if self.policy == ParsePolicy::SkipMalformed =>
                {
                    tracing::warn!("[ApiCompiler] skipping {}: {}", name, e);
                    result.diagnostics.push(ParseDiagnostic::warning(e.to_string()));
                    self.compiled += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            for unit in units.iter() {
                if !self.selects(&unit.interface) {
                    tracing::debug!("[ApiCompiler] {} filtered out", unit.interface);
                    continue;
                }
                let entries = self
                    .parsers
                    .parse_unit(unit, self.policy, &mut result.diagnostics)?;
                let model = self.assembler.assemble(unit.header(), entries, &name)?;
                tracing::debug!(
                    "[ApiCompiler] assembled {} ({} properties, {} methods, {} signals)",
                    model.name,
                    model.properties.len(),
                    model.methods.len(),
                    model.signals.len()
                );
                result.api.interfaces.push(model);
            }
            self.compiled += 1;
        }
        if result.api.is_empty() {
            result
                .diagnostics
                .push(ParseDiagnostic::info("no interfaces found in corpus"));
        }
        Ok(result)
    }
}

/// Compile the configured corpus and generate its clients.
pub fn build(config: &GeneratorConfig) -> Result<(CompileResult, GenerateReport), DocbindError> {
    let mut compiler =
        ApiCompiler::new(config.parse_policy)?.with_filters(config.filters.iter().cloned());
    compiler.add_dir(&config.source_root)?;
    let compiled = compiler.finish()?;
    for diagnostic in compiled.diagnostics.iter() {
        tracing::info!("[build] {}", diagnostic);
    }
    if let Some(json_path) = config.export_json.as_ref() {
        write(json_path, compiled.api.to_json()?)?;
        tracing::info!("[build] wrote api model to {:?}", json_path);
    }
    let report = Generator::from_config(config)
        .generate(&compiled.api.interfaces, &config.output_root)?;
    Ok((compiled, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssembleError;
    use test_log::test;

    const BATTERY: &str = "\
Battery hierarchy
=================

Service\t\torg.bluez
Interface\torg.bluez.Battery1
Object path\t[variable prefix]/{hci0,hci1,...}/dev_XX_XX_XX_XX_XX_XX

Properties\tbyte Percentage [readonly]

\t\t\tThe percentage of battery left.

\t\tstring Source (optional) [readonly]

\t\t\tDescribes where the battery information comes from.
";

    #[test]
    fn compiles_and_filters() {
        let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
        compiler.add_source("battery-api.txt", BATTERY);
        assert_eq!(compiler.stats().queued_sources, 1);
        let result = compiler.finish().unwrap();
        let battery = result.api.get("org.bluez.Battery1").unwrap();
        assert_eq!(battery.properties.len(), 2);
        assert!(battery.properties["Source"].is_optional());

        let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed)
            .unwrap()
            .with_filters(["Media"]);
        compiler.add_source("battery-api.txt", BATTERY);
        let result = compiler.finish().unwrap();
        assert!(result.api.is_empty());
        assert!(matches!(result.diagnostics[0], ParseDiagnostic::Info(_)));
    }

    #[test]
    fn second_declaration_is_fatal() {
        let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed).unwrap();
        compiler.add_source("battery-api.txt", BATTERY);
        compiler.add_source("battery-copy.txt", BATTERY);
        match compiler.finish().unwrap_err() {
            DocbindError::Assemble(AssembleError::DuplicateInterface { first, second, .. }) => {
                assert_eq!(first, "battery-api.txt");
                assert_eq!(second, "battery-copy.txt");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
