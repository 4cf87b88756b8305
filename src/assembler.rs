//! Groups parsed block entries under their interface.
//!
//! An [`Assembler`] lives for one compilation run and remembers every interface name it has
//! produced, so a second doc unit declaring the same name is rejected instead of being merged
//! into (or overwriting) the first.

use std::collections::HashMap;

use crate::{
    error::AssembleError,
    model::{BlockEntry, InterfaceModel},
};

#[derive(Debug, Default)]
pub struct Assembler {
    /// interface name -> origin of its first declaration
    seen: HashMap<String, String>,
}

impl Assembler {
    pub fn new() -> Self {
        Assembler::default()
    }

    /// Build one interface from `header` (name and unit metadata, no members) and its parsed
    /// entries, in source order. `origin` names the declaring source for conflict reports.
    pub fn assemble(
        &mut self,
        header: InterfaceModel,
        entries: Vec<BlockEntry>,
        origin: &str,
    ) -> Result<InterfaceModel, AssembleError> {
        if let Some(first) = self.seen.get(&header.name) {
            return Err(AssembleError::DuplicateInterface {
                name: header.name.clone(),
                first: first.clone(),
                second: origin.to_string(),
            });
        }

        let mut model = header;
        for entry in entries {
            match entry {
                BlockEntry::Property(prop) => {
                    if model.properties.contains_key(&prop.name) {
                        return Err(AssembleError::DuplicateProperty {
                            interface: model.name.clone(),
                            property: prop.name,
                        });
                    }
                    model.properties.insert(prop.name.clone(), prop);
                }
                BlockEntry::Method(method) => model.methods.push(method),
                BlockEntry::Signal(signal) => model.signals.push(signal),
            }
        }

        tracing::debug!(
            "[Assembler] {}: {} properties, {} methods, {} signals",
            model.name,
            model.properties.len(),
            model.methods.len(),
            model.signals.len()
        );
        self.seen.insert(model.name.clone(), origin.to_string());
        Ok(model)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
