//! The closed value vocabulary exchanged across the property-map boundary.
//!
//! Every value a generated client reads from or writes to a peer is a [`Variant`]. Records are
//! flattened into a [`PropertyMap`] (insertion ordered, keyed by the peer-facing property
//! name) and rebuilt from one through [`FromVariant`].
//!
//! Inbound conversion is deliberately narrow: integers convert between widths when the value
//! fits, strings and object paths convert into each other, and byte sequences convert to and
//! from arrays of bytes. Everything else is a [`MarshalError::Conversion`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::error::MarshalError;

/// Ordered mapping from property name to value.
pub type PropertyMap = IndexMap<String, Variant>;

/// An opaque, path-like object identifier (`/org/bluez/hci0`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new<S: Into<String>>(path: S) -> Self {
        ObjectPath(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a child segment, e.g. `/org/bluez` + `hci0`.
    pub fn join(&self, segment: &str) -> ObjectPath {
        let segment = segment.trim_start_matches('/');
        if self.0.ends_with('/') {
            ObjectPath(format!("{}{}", self.0, segment))
        } else {
            ObjectPath(format!("{}/{}", self.0, segment))
        }
    }

    /// True when `self` is `other` or lies below it in the object hierarchy.
    pub fn starts_with(&self, other: &ObjectPath) -> bool {
        if other.0 == "/" || self.0 == other.0 {
            return true;
        }
        self.0
            .strip_prefix(other.0.as_str())
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
    }
}

impl Display for ObjectPath {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ObjectPath {
    fn from(path: &str) -> Self {
        ObjectPath(path.to_string())
    }
}

impl From<String> for ObjectPath {
    fn from(path: String) -> Self {
        ObjectPath(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Variant {
    Bool(bool),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Str(String),
    Bytes(Vec<u8>),
    Path(ObjectPath),
    Array(Vec<Variant>),
    Map(PropertyMap),
}

/// The empty array, the zero value of an untyped field.
impl Default for Variant {
    fn default() -> Self {
        Variant::Array(Vec::new())
    }
}

/// The tag of a [`Variant`], used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    Bool,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Str,
    Bytes,
    Path,
    Array,
    Map,
}

impl Display for VariantKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let name = match self {
            VariantKind::Bool => "bool",
            VariantKind::Byte => "byte",
            VariantKind::Int16 => "int16",
            VariantKind::UInt16 => "uint16",
            VariantKind::Int32 => "int32",
            VariantKind::UInt32 => "uint32",
            VariantKind::Str => "string",
            VariantKind::Bytes => "bytes",
            VariantKind::Path => "object path",
            VariantKind::Array => "array",
            VariantKind::Map => "dict",
        };
        write!(f, "{name}")
    }
}

impl Variant {
    pub fn kind(&self) -> VariantKind {
        match self {
            Variant::Bool(_) => VariantKind::Bool,
            Variant::Byte(_) => VariantKind::Byte,
            Variant::Int16(_) => VariantKind::Int16,
            Variant::UInt16(_) => VariantKind::UInt16,
            Variant::Int32(_) => VariantKind::Int32,
            Variant::UInt32(_) => VariantKind::UInt32,
            Variant::Str(_) => VariantKind::Str,
            Variant::Bytes(_) => VariantKind::Bytes,
            Variant::Path(_) => VariantKind::Path,
            Variant::Array(_) => VariantKind::Array,
            Variant::Map(_) => VariantKind::Map,
        }
    }

    /// Whether this is the zero/empty value of its kind.
    pub fn is_zero(&self) -> bool {
        match self {
            Variant::Bool(v) => !v,
            Variant::Byte(v) => *v == 0,
            Variant::Int16(v) => *v == 0,
            Variant::UInt16(v) => *v == 0,
            Variant::Int32(v) => *v == 0,
            Variant::UInt32(v) => *v == 0,
            Variant::Str(v) => v.is_empty(),
            Variant::Bytes(v) => v.is_empty(),
            Variant::Path(v) => v.is_empty(),
            Variant::Array(v) => v.is_empty(),
            Variant::Map(v) => v.is_empty(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(v) => Some(v),
            Variant::Path(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&PropertyMap> {
        match self {
            Variant::Map(v) => Some(v),
            _ => None,
        }
    }

    fn as_integer(&self) -> Option<i64> {
        match self {
            Variant::Byte(v) => Some(i64::from(*v)),
            Variant::Int16(v) => Some(i64::from(*v)),
            Variant::UInt16(v) => Some(i64::from(*v)),
            Variant::Int32(v) => Some(i64::from(*v)),
            Variant::UInt32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }
}

/// Conversion out of a [`Variant`] into a concrete field type.
pub trait FromVariant: Sized {
    /// Human readable target type, reported on mismatch.
    const EXPECTED: &'static str;

    fn from_variant(value: Variant) -> Result<Self, MarshalError>;
}

fn mismatch<T: FromVariant>(value: &Variant) -> MarshalError {
    MarshalError::Conversion {
        expected: T::EXPECTED,
        actual: value.kind(),
    }
}

impl FromVariant for Variant {
    const EXPECTED: &'static str = "variant";

    fn from_variant(value: Variant) -> Result<Self, MarshalError> {
        Ok(value)
    }
}

impl FromVariant for bool {
    const EXPECTED: &'static str = "bool";

    fn from_variant(value: Variant) -> Result<Self, MarshalError> {
        match value {
            Variant::Bool(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

macro_rules! integer_from_variant {
    ($($ty:ty => $expected:literal),* $(,)?) => {
        $(
            impl FromVariant for $ty {
                const EXPECTED: &'static str = $expected;

                fn from_variant(value: Variant) -> Result<Self, MarshalError> {
                    value
                        .as_integer()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| mismatch::<Self>(&value))
                }
            }
        )*
    };
}

integer_from_variant!(
    u8 => "byte",
    i16 => "int16",
    u16 => "uint16",
    i32 => "int32",
    u32 => "uint32",
);

impl FromVariant for String {
    const EXPECTED: &'static str = "string";

    fn from_variant(value: Variant) -> Result<Self, MarshalError> {
        match value {
            Variant::Str(v) => Ok(v),
            Variant::Path(v) => Ok(v.0),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromVariant for ObjectPath {
    const EXPECTED: &'static str = "object path";

    fn from_variant(value: Variant) -> Result<Self, MarshalError> {
        match value {
            Variant::Path(v) => Ok(v),
            Variant::Str(v) => Ok(ObjectPath(v)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromVariant for Vec<u8> {
    const EXPECTED: &'static str = "bytes";

    fn from_variant(value: Variant) -> Result<Self, MarshalError> {
        match value {
            Variant::Bytes(v) => Ok(v),
            Variant::Array(items) => items
                .into_iter()
                .map(u8::from_variant)
                .collect::<Result<Vec<u8>, _>>()
                .map_err(|_| MarshalError::Conversion {
                    expected: Self::EXPECTED,
                    actual: VariantKind::Array,
                }),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl FromVariant for Vec<Variant> {
    const EXPECTED: &'static str = "array";

    fn from_variant(value: Variant) -> Result<Self, MarshalError> {
        match value {
            Variant::Array(v) => Ok(v),
            Variant::Bytes(v) => Ok(v.into_iter().map(Variant::Byte).collect()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

macro_rules! array_from_variant {
    ($($ty:ty => $expected:literal),* $(,)?) => {
        $(
            impl FromVariant for Vec<$ty> {
                const EXPECTED: &'static str = $expected;

                fn from_variant(value: Variant) -> Result<Self, MarshalError> {
                    match value {
                        Variant::Array(items) => items
                            .into_iter()
                            .map(<$ty>::from_variant)
                            .collect::<Result<Vec<$ty>, _>>()
                            .map_err(|_| MarshalError::Conversion {
                                expected: $expected,
                                actual: VariantKind::Array,
                            }),
                        other => Err(mismatch::<Self>(&other)),
                    }
                }
            }
        )*
    };
}

array_from_variant!(
    String => "array of strings",
    ObjectPath => "array of object paths",
);

impl FromVariant for PropertyMap {
    const EXPECTED: &'static str = "dict";

    fn from_variant(value: Variant) -> Result<Self, MarshalError> {
        match value {
            Variant::Map(v) => Ok(v),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

macro_rules! variant_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Variant::$variant(value)
                }
            }
        )*
    };
}

variant_from!(
    bool => Bool,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    String => Str,
    Vec<u8> => Bytes,
    ObjectPath => Path,
    Vec<Variant> => Array,
    PropertyMap => Map,
);

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::Str(value.to_string())
    }
}

impl From<Vec<String>> for Variant {
    fn from(value: Vec<String>) -> Self {
        Variant::Array(value.into_iter().map(Variant::Str).collect())
    }
}

impl From<Vec<ObjectPath>> for Variant {
    fn from(value: Vec<ObjectPath>) -> Self {
        Variant::Array(value.into_iter().map(Variant::Path).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn integer_narrowing_within_range() {
        assert_eq!(u8::from_variant(Variant::Int32(200)), Ok(200u8));
        assert_eq!(i16::from_variant(Variant::UInt16(12)), Ok(12i16));
        assert_eq!(u32::from_variant(Variant::Byte(7)), Ok(7u32));
    }

    #[test]
    fn integer_narrowing_out_of_range() {
        let err = u8::from_variant(Variant::Int32(300)).unwrap_err();
        assert_eq!(
            err,
            MarshalError::Conversion {
                expected: "byte",
                actual: VariantKind::Int32
            }
        );
        assert!(u16::from_variant(Variant::Int16(-1)).is_err());
    }

    #[test]
    fn strings_and_paths_interconvert() {
        assert_eq!(
            ObjectPath::from_variant(Variant::Str("/org/bluez".into())),
            Ok(ObjectPath::from("/org/bluez"))
        );
        assert_eq!(
            String::from_variant(Variant::Path(ObjectPath::from("/a"))),
            Ok("/a".to_string())
        );
        assert!(String::from_variant(Variant::UInt32(1)).is_err());
    }

    #[test]
    fn bytes_accept_byte_arrays() {
        let arr = Variant::Array(vec![Variant::Byte(1), Variant::Int16(2)]);
        assert_eq!(Vec::<u8>::from_variant(arr), Ok(vec![1, 2]));
        let bad = Variant::Array(vec![Variant::Str("x".into())]);
        assert!(Vec::<u8>::from_variant(bad).is_err());
    }

    #[test]
    fn zero_values() {
        assert!(Variant::Map(PropertyMap::new()).is_zero());
        assert!(Variant::Str(String::new()).is_zero());
        assert!(!Variant::Bool(true).is_zero());
        assert!(!Variant::from(vec!["a".to_string()]).is_zero());
    }

    #[test]
    fn object_path_hierarchy() {
        let root = ObjectPath::from("/org/bluez");
        let adapter = root.join("hci0");
        assert_eq!(adapter.as_str(), "/org/bluez/hci0");
        assert!(adapter.starts_with(&root));
        assert!(!ObjectPath::from("/org/bluezz").starts_with(&root));
        assert!(adapter.starts_with(&ObjectPath::from("/")));
    }
}
