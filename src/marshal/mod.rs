//! Declarative record/property-map marshalling.
//!
//! A record type declares its fields once, through [`property_record!`](crate::property_record)
//! or a hand-written [`PropertyRecord::fields`] table, each field carrying its peer-facing
//! property name, a directive tag and an accessor pair. [`to_map`] and [`from_map`] use the
//! type's resolved [`DescriptorTable`] (see [`DESCRIPTORS`]) to move values between the record
//! and a [`PropertyMap`].
//!
//! ```rust
//! use docbind_core::{marshal::{from_map, to_map}, property_record, variant::{PropertyMap, Variant}};
//!
//! property_record! {
//!     #[derive(Debug, Clone, Default, PartialEq)]
//!     pub struct Battery {
//!         #[property("Percentage")]
//!         pub percentage: u8,
//!         #[property("Source", "omitEmpty")]
//!         pub source: String,
//!     }
//! }
//!
//! let battery = Battery { percentage: 87, source: String::new() };
//! let map = to_map(&battery);
//! assert_eq!(map.len(), 1);
//! assert_eq!(map.get("Percentage"), Some(&Variant::Byte(87)));
//! assert_eq!(from_map::<Battery>(&map).unwrap(), battery);
//! ```

use crate::{error::MarshalError, variant::PropertyMap, variant::Variant};

pub mod descriptor;
mod macros;

pub use descriptor::{
    resolve, DescriptorCache, DescriptorTable, FieldDescriptor, ResolvedField, DESCRIPTORS,
};

pub type Getter<R> = fn(&R) -> Variant;
pub type Setter<R> = fn(&mut R, Variant) -> Result<(), MarshalError>;

/// Static description of one record field.
pub struct FieldDef<R> {
    /// Peer-facing property name, used as the map key.
    pub name: &'static str,
    /// Raw directive tag, see [`FieldDescriptor`].
    pub tag: &'static str,
    pub get: Getter<R>,
    pub set: Setter<R>,
}

impl<R> FieldDef<R> {
    pub fn new(
        name: &'static str,
        tag: &'static str,
        get: Getter<R>,
        set: Setter<R>,
    ) -> FieldDef<R> {
        FieldDef {
            name,
            tag,
            get,
            set,
        }
    }
}

impl<R> Clone for FieldDef<R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for FieldDef<R> {}

/// A record that can be flattened into a [`PropertyMap`] and rebuilt from one.
pub trait PropertyRecord: Default + Clone + Send + Sync + 'static {
    /// The field table, in declaration order.
    fn fields() -> Vec<FieldDef<Self>>;

    fn to_map(&self) -> PropertyMap {
        to_map(self)
    }

    fn from_map(map: &PropertyMap) -> Result<Self, MarshalError> {
        from_map(map)
    }
}

fn emit<R: PropertyRecord>(
    table: &DescriptorTable<R>,
    field: &ResolvedField<R>,
    record: &R,
) -> Result<Option<Variant>, MarshalError> {
    let descriptor = field.descriptor.as_ref().map_err(Clone::clone)?;
    if descriptor.skip {
        return Ok(None);
    }
    if let Some(flag) = table.sibling(field) {
        if (flag.def.get)(record).as_bool() == Some(true) {
            return Ok(None);
        }
    }
    let value = (field.def.get)(record);
    if descriptor.omit_if_empty && value.is_zero() {
        return Ok(None);
    }
    Ok(Some(value))
}

/// Flatten `record` into a map keyed by property name, in field declaration order.
///
/// A field is left out when tagged `ignore`, when its `ignore=<Sibling>` flag is set, or when it
/// is tagged `omitEmpty` and holds its zero value. Fields whose directives failed to resolve are
/// left out as well; use [`to_map_strict`] to surface them.
pub fn to_map<R: PropertyRecord>(record: &R) -> PropertyMap {
    let table = resolve::<R>();
    let mut map = PropertyMap::with_capacity(table.len());
    for field in table.fields() {
        match emit(&table, field, record) {
            Ok(Some(value)) => {
                map.insert(field.name().to_string(), value);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::debug!("[to_map] excluding field {}: {}", field.name(), e);
            }
        }
    }
    map
}

/// Like [`to_map`], but fails on the first field whose directives did not resolve.
pub fn to_map_strict<R: PropertyRecord>(record: &R) -> Result<PropertyMap, MarshalError> {
    let table = resolve::<R>();
    let mut map = PropertyMap::with_capacity(table.len());
    for field in table.fields() {
        if let Some(value) = emit(&table, field, record)? {
            map.insert(field.name().to_string(), value);
        }
    }
    Ok(map)
}

/// Assign every entry of `map` whose key names a field of `record`. Unknown keys are ignored and
/// so are fields tagged plain `ignore`. Stops at the first value that does not convert.
fn apply<R: PropertyRecord>(record: &mut R, map: &PropertyMap) -> Result<(), MarshalError> {
    let table = resolve::<R>();
    for (key, value) in map.iter() {
        let Some(field) = table.get(key) else {
            continue;
        };
        if field.descriptor.as_ref().is_ok_and(|d| d.skip) {
            continue;
        }
        (field.def.set)(record, value.clone()).map_err(|e| e.for_field(field.name()))?;
    }
    Ok(())
}

/// Build a fresh record from `map`; fields without an entry keep their default value.
pub fn from_map<R: PropertyRecord>(map: &PropertyMap) -> Result<R, MarshalError> {
    let mut record = R::default();
    apply(&mut record, map)?;
    Ok(record)
}

/// Apply `map` to an existing record. Either every entry is applied or, on error, `record` is
/// left untouched.
pub fn update_from_map<R: PropertyRecord>(
    record: &mut R,
    map: &PropertyMap,
) -> Result<(), MarshalError> {
    let mut staged = record.clone();
    apply(&mut staged, map)?;
    *record = staged;
    Ok(())
}

/// Names of the fields tagged `writable`.
pub fn writable_fields<R: PropertyRecord>() -> Vec<&'static str> {
    resolve::<R>()
        .fields()
        .iter()
        .filter(|f| f.is_writable())
        .map(|f| f.name())
        .collect()
}
