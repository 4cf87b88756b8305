pub use enumset::EnumSet;
/// [crate::model] holds the typed interface model produced by the block parsers and consumed by
/// the [crate::generator].
use enumset::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
};

use crate::error::DocbindError;

/// Object path placeholder marking an interface as scoped to a local adapter.
pub const ADAPTER_PLACEHOLDER: &str = "{hci0,hci1,...}";

/// Property annotations recognized inside the bracketed flag list of a property block.
#[derive(Debug, Serialize, Deserialize, PartialOrd, Ord, Hash, EnumSetType)]
#[enumset(serialize_repr = "list")]
pub enum Flag {
    ReadOnly,
    ReadWrite,
    Experimental,
}

pub type FlagSet = EnumSet<Flag>;

impl Display for Flag {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Flag::ReadOnly => write!(f, "readonly"),
            Flag::ReadWrite => write!(f, "readwrite"),
            Flag::Experimental => write!(f, "experimental"),
        }
    }
}

/// Type vocabulary of the interface documentation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Void,
    Bool,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    String,
    ObjectPath,
    FileDescriptor,
    Variant,
    Dict,
    Array(Box<DataType>),
    /// Several element types inside one `array{…}`, e.g. `array{object, dict}`.
    Struct(Vec<DataType>),
    Unknown(String),
}

impl DataType {
    pub fn parse(raw: &str) -> DataType {
        let raw = raw.trim();
        if let Some(inner) = raw
            .strip_prefix("array{")
            .and_then(|rest| rest.strip_suffix('}'))
        {
            let members = split_top_level(inner, ',');
            return match members.len() {
                0 => DataType::Array(Box::new(DataType::Variant)),
                1 => DataType::Array(Box::new(DataType::parse(&members[0]))),
                _ => DataType::Array(Box::new(DataType::Struct(
                    members.iter().map(|m| DataType::parse(m)).collect(),
                ))),
            };
        }
        if raw == "dict" || raw.starts_with("dict{") {
            return DataType::Dict;
        }
        match raw {
            "void" => DataType::Void,
            "bool" | "boolean" => DataType::Bool,
            "byte" => DataType::Byte,
            "int16" => DataType::Int16,
            "uint16" | "uint16_t" => DataType::UInt16,
            "int32" => DataType::Int32,
            "uint32" => DataType::UInt32,
            "int64" => DataType::Int64,
            "uint64" => DataType::UInt64,
            "double" => DataType::Double,
            "string" => DataType::String,
            "object" => DataType::ObjectPath,
            "fd" => DataType::FileDescriptor,
            "variant" => DataType::Variant,
            other => DataType::Unknown(other.to_string()),
        }
    }
}

/// Split `s` on `sep`, ignoring separators nested inside `{…}`. Parts are trimmed and empty
/// parts dropped.
pub fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in s.chars() {
        match ch {
            '{' => {
                depth += 1;
                current.push(ch);
            }
            '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c == sep && depth == 0 => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyModel {
    /// Raw type spelling as written in the documentation.
    pub ty: String,
    pub name: String,
    pub flags: FlagSet,
    pub docs: String,
}

impl PropertyModel {
    pub fn data_type(&self) -> DataType {
        DataType::parse(&self.ty)
    }

    pub fn is_readonly(&self) -> bool {
        self.flags.contains(Flag::ReadOnly)
    }

    pub fn is_writable(&self) -> bool {
        self.flags.contains(Flag::ReadWrite)
    }

    pub fn is_experimental(&self) -> bool {
        self.flags.contains(Flag::Experimental)
    }

    /// Properties documented as `(optional)` may be absent on the peer.
    pub fn is_optional(&self) -> bool {
        self.docs.starts_with("(optional)")
    }
}

impl Display for PropertyModel {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.ty, self.name)?;
        if !self.flags.is_empty() {
            let flags = self
                .flags
                .iter()
                .map(|flag| flag.to_string())
                .collect::<Vec<String>>()
                .join(", ");
            write!(f, " [{flags}]")?;
        }
        Ok(())
    }
}

/// A positional argument: `(type, name)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arg {
    pub ty: String,
    pub name: String,
}

impl Arg {
    pub fn new<T: Into<String>, N: Into<String>>(ty: T, name: N) -> Self {
        Arg {
            ty: ty.into(),
            name: name.into(),
        }
    }

    pub fn data_type(&self) -> DataType {
        DataType::parse(&self.ty)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodModel {
    pub name: String,
    pub args: Vec<Arg>,
    pub returns: Vec<String>,
    pub docs: String,
    /// Declared error identifiers, for documentation only.
    pub errors: BTreeSet<String>,
}

impl MethodModel {
    pub fn return_types(&self) -> Vec<DataType> {
        self.returns.iter().map(|r| DataType::parse(r)).collect()
    }
}

impl Display for MethodModel {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let args = self
            .args
            .iter()
            .map(|a| format!("{} {}", a.ty, a.name))
            .collect::<Vec<String>>()
            .join(", ");
        let returns = if self.returns.is_empty() {
            "void".to_string()
        } else {
            self.returns.join(", ")
        };
        write!(f, "{returns} {}({args})", self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalModel {
    pub name: String,
    pub args: Vec<Arg>,
    pub docs: String,
    pub errors: BTreeSet<String>,
}

impl Display for SignalModel {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let args = self
            .args
            .iter()
            .map(|a| format!("{} {}", a.ty, a.name))
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "{}({args})", self.name)
    }
}

/// One parsed block, before assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEntry {
    Property(PropertyModel),
    Method(MethodModel),
    Signal(SignalModel),
}

impl BlockEntry {
    pub fn name(&self) -> &str {
        match self {
            BlockEntry::Property(p) => &p.name,
            BlockEntry::Method(m) => &m.name,
            BlockEntry::Signal(s) => &s.name,
        }
    }
}

/// The assembled description of one protocol interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceModel {
    /// Reverse-DNS interface identifier, e.g. `org.bluez.MediaTransport1`.
    pub name: String,
    /// Hierarchy heading of the documentation unit.
    pub title: String,
    /// Bus name of the peer exposing the interface.
    pub service: String,
    /// Documented object path pattern.
    pub object_path: String,
    pub docs: String,
    pub properties: IndexMap<String, PropertyModel>,
    pub methods: Vec<MethodModel>,
    pub signals: Vec<SignalModel>,
}

impl InterfaceModel {
    /// Last segment of the interface name (`MediaTransport1`).
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// The object path is addressable from a short adapter id such as `hci0`.
    pub fn scoped_to_adapter(&self) -> bool {
        self.object_path.trim_end().ends_with(ADAPTER_PLACEHOLDER)
    }

    /// Objects of this interface sit at the top of an object hierarchy: either a fixed path, or
    /// an adapter path with nothing below the adapter placeholder.
    pub fn roots_hierarchy(&self) -> bool {
        let path = self.object_path.trim();
        if path.is_empty() {
            return false;
        }
        self.scoped_to_adapter() || (!path.contains('{') && !path.contains('['))
    }
}

/// Every interface produced by one compilation run, in corpus order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Api {
    pub interfaces: Vec<InterfaceModel>,
}

impl Api {
    pub fn get(&self, name: &str) -> Option<&InterfaceModel> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.interfaces.iter().map(|i| i.name.as_str()).collect()
    }

    pub fn to_json(&self) -> Result<String, DocbindError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(src: &str) -> Result<Api, DocbindError> {
        Ok(serde_json::from_str(src)?)
    }
}
