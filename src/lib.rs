//! # docbind-core
//!
//! Typed client bindings from semi-structured interface documentation, and the record/property
//! map marshalling those bindings run on.
//!
//! ## Overview
//!
//! Protocol stacks such as BlueZ describe their bus API in plain-text documents: one block per
//! remote property, method or signal, grouped under `Service` / `Interface` / `Object path`
//! headers. docbind-core turns such a corpus into Rust:
//!
//! 1. **Parsing** ([`parser`]): files are split into doc units and blocks; each block is parsed
//!    by a [`BlockParser`](parser::BlockParser) into a property, method or signal model.
//! 2. **Assembly** ([`assembler`]): the entries of a unit become one
//!    [`InterfaceModel`](model::InterfaceModel); duplicate interfaces or properties are conflicts.
//! 3. **Generation** ([`generator`]): each interface becomes one module with a property record
//!    and a client type, laid out by interface name.
//!
//! At runtime generated clients use:
//!
//! - **[`marshal`]**: record ⇄ [`PropertyMap`](variant::PropertyMap) conversion driven by
//!   per-field directives (`ignore`, `ignore=<Flag>`, `omitEmpty`, `writable`)
//! - **[`client`]**: the [`Transport`](client::Transport) seam, property helpers and cancellable
//!   signal subscriptions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docbind_core::{compiler::ApiCompiler, generator::Generator, parser::ParsePolicy};
//!
//! fn main() -> Result<(), docbind_core::DocbindError> {
//!     let mut compiler = ApiCompiler::new(ParsePolicy::SkipMalformed)?;
//!     compiler.add_dir("./bluez/doc")?;
//!     let result = compiler.finish()?;
//!     for diagnostic in result.diagnostics.iter() {
//!         println!("{diagnostic}");
//!     }
//!
//!     let report = Generator::new().generate(&result.api.interfaces, "./src/gen".as_ref())?;
//!     println!("{} written, {} unchanged", report.written.len(), report.unchanged.len());
//!     Ok(())
//! }
//! ```
//!
//! Or drive the whole run from a `docbind.toml`:
//!
//! ```rust,no_run
//! # fn main() -> Result<(), docbind_core::DocbindError> {
//! let config = docbind_core::config::GeneratorConfig::from_file("docbind.toml")?;
//! let (_compiled, _report) = docbind_core::compiler::build(&config)?;
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod client;
pub mod compiler;
pub mod config;
pub mod error;
pub mod generator;
pub mod marshal;
pub mod model;
pub mod parser;
pub mod variant;

pub use error::*;
