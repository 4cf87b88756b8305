//! Field descriptor resolution and the process-wide descriptor cache.
//!
//! A record type's field table (see [`PropertyRecord::fields`]) carries one raw directive tag per
//! field. Resolution parses every tag once per record type and checks it against the sibling
//! fields; the result is cached in [`DESCRIPTORS`] keyed by the record's `TypeId` and never
//! evicted, so the cache holds at most one table per record type compiled into the program.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::{
    any::{type_name, Any, TypeId},
    collections::{HashMap, HashSet},
    sync::Arc,
};

use super::{FieldDef, PropertyRecord};
use crate::{error::MarshalError, variant::VariantKind};

/// Global descriptor cache shared by every marshalling call site.
pub static DESCRIPTORS: Lazy<DescriptorCache> = Lazy::new(DescriptorCache::create);

/// Directives attached to one record field.
///
/// Tag grammar, comma separated: `ignore`, `ignore=<Sibling>`, `omitEmpty`, `writable`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Never emitted.
    pub skip: bool,
    /// Not emitted while the named boolean sibling is true.
    pub skip_if_flag: Option<String>,
    /// Not emitted while the value is zero/empty.
    pub omit_if_empty: bool,
    pub writable: bool,
}

impl FieldDescriptor {
    pub fn parse(field: &str, tag: &str) -> Result<FieldDescriptor, MarshalError> {
        let mut descriptor = FieldDescriptor::default();
        for directive in tag.split(',').map(str::trim).filter(|d| !d.is_empty()) {
            match directive.split_once('=') {
                Some((key, sibling)) if key.trim() == "ignore" => {
                    let sibling = sibling.trim();
                    if sibling.is_empty() {
                        return Err(directive_error(field, "'ignore=' needs a sibling field name"));
                    }
                    descriptor.skip_if_flag = Some(sibling.to_string());
                }
                Some(_) => {
                    return Err(directive_error(
                        field,
                        &format!("unknown directive '{directive}'"),
                    ))
                }
                None => match directive {
                    "ignore" => descriptor.skip = true,
                    "omitEmpty" | "omitempty" => descriptor.omit_if_empty = true,
                    "writable" => descriptor.writable = true,
                    other => {
                        return Err(directive_error(field, &format!("unknown directive '{other}'")))
                    }
                },
            }
        }
        Ok(descriptor)
    }
}

fn directive_error(field: &str, reason: &str) -> MarshalError {
    MarshalError::Directive {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// One field of a record type together with its resolved directives. A field whose tag failed
/// to resolve keeps the error instead of a descriptor.
pub struct ResolvedField<R> {
    pub def: FieldDef<R>,
    pub descriptor: Result<FieldDescriptor, MarshalError>,
    /// Index of the `ignore=<Sibling>` field in the table.
    pub(crate) sibling: Option<usize>,
}

impl<R> ResolvedField<R> {
    pub fn name(&self) -> &'static str {
        self.def.name
    }

    pub fn is_writable(&self) -> bool {
        self.descriptor.as_ref().is_ok_and(|d| d.writable)
    }
}

impl<R> std::fmt::Debug for ResolvedField<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedField")
            .field("name", &self.def.name)
            .field("tag", &self.def.tag)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// The resolved field table of one record type, in declaration order.
#[derive(Debug)]
pub struct DescriptorTable<R> {
    fields: Vec<ResolvedField<R>>,
}

impl<R: PropertyRecord> DescriptorTable<R> {
    pub fn build() -> DescriptorTable<R> {
        let defs = R::fields();
        let probe = R::default();
        let mut seen = HashSet::new();
        let fields = defs
            .iter()
            .map(|def| {
                let mut sibling = None;
                let descriptor = if !seen.insert(def.name) {
                    Err(directive_error(def.name, "duplicate field name"))
                } else {
                    FieldDescriptor::parse(def.name, def.tag).and_then(|descriptor| {
                        if let Some(flag) = descriptor.skip_if_flag.as_deref() {
                            sibling = Some(check_sibling(&defs, &probe, def.name, flag)?);
                        }
                        Ok(descriptor)
                    })
                };
                ResolvedField {
                    def: *def,
                    descriptor,
                    sibling,
                }
            })
            .collect();
        DescriptorTable { fields }
    }
}

impl<R> DescriptorTable<R> {
    pub fn fields(&self) -> &[ResolvedField<R>] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&ResolvedField<R>> {
        self.fields.iter().find(|f| f.def.name == name)
    }

    pub(crate) fn sibling(&self, field: &ResolvedField<R>) -> Option<&ResolvedField<R>> {
        field.sibling.and_then(|idx| self.fields.get(idx))
    }

    /// Fields that failed to resolve, with their errors.
    pub fn errors(&self) -> Vec<&MarshalError> {
        self.fields
            .iter()
            .filter_map(|f| f.descriptor.as_ref().err())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn check_sibling<R>(
    defs: &[FieldDef<R>],
    probe: &R,
    field: &str,
    flag: &str,
) -> Result<usize, MarshalError> {
    if flag == field {
        return Err(directive_error(field, "a field cannot be ignored on its own value"));
    }
    let idx = defs
        .iter()
        .position(|d| d.name == flag)
        .ok_or_else(|| directive_error(field, &format!("'ignore={flag}' names no field")))?;
    let kind = (defs[idx].get)(probe).kind();
    if kind != VariantKind::Bool {
        return Err(directive_error(
            field,
            &format!("'ignore={flag}' names a {kind} field, expected bool"),
        ));
    }
    Ok(idx)
}

/// Thread-safe cache of [`DescriptorTable`]s keyed by record type.
pub struct DescriptorCache(Arc<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>>);

impl Clone for DescriptorCache {
    fn clone(&self) -> Self {
        DescriptorCache(self.0.clone())
    }
}

impl DescriptorCache {
    pub fn create() -> Self {
        DescriptorCache(Arc::new(RwLock::new(HashMap::new())))
    }

    /// Return the table for `R`, computing it on first use.
    ///
    /// The table is computed outside the lock; two threads racing on the same type may both
    /// compute it, and the first insert wins.
    pub fn resolve<R: PropertyRecord>(&self) -> Arc<DescriptorTable<R>> {
        let key = TypeId::of::<R>();
        if let Some(cached) = self.lookup::<R>(&key) {
            return cached;
        }

        let table = Arc::new(DescriptorTable::<R>::build());
        for err in table.errors() {
            tracing::debug!("[DescriptorCache::resolve] {}: {}", type_name::<R>(), err);
        }
        let stored = {
            let mut writer = self.0.write();
            writer
                .entry(key)
                .or_insert_with(|| table.clone() as Arc<dyn Any + Send + Sync>)
                .clone()
        };
        stored.downcast::<DescriptorTable<R>>().unwrap_or(table)
    }

    fn lookup<R: PropertyRecord>(&self, key: &TypeId) -> Option<Arc<DescriptorTable<R>>> {
        let reader = self.0.read();
        reader
            .get(key)
            .cloned()
            .and_then(|entry| entry.downcast::<DescriptorTable<R>>().ok())
    }

    pub fn contains<R: 'static>(&self) -> bool {
        self.0.read().contains_key(&TypeId::of::<R>())
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().is_empty()
    }
}

/// Resolve `R` through the global [`DESCRIPTORS`] cache.
pub fn resolve<R: PropertyRecord>() -> Arc<DescriptorTable<R>> {
    DESCRIPTORS.resolve::<R>()
}
