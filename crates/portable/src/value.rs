// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic values and conversions to and from Rust types.

use crate::builder::ObjectBuilder;
use crate::codec::{Decimal, WireTag};
use crate::error::{PortableError, Result};
use crate::graph::NodeId;
use crate::object::EncodedObject;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Enum constant: declaring type id plus ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub type_id: i32,
    pub ordinal: i32,
}

impl EnumValue {
    pub fn new(type_id: i32, ordinal: i32) -> Self {
        Self { type_id, ordinal }
    }
}

/// Marker selecting the raw 8-byte timestamp encoding for a date/time.
///
/// A plain `DateTime<Utc>` converts to [`Value::Date`] (the date object
/// form); wrap it in `Timestamp` to write the timestamp form instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(pub DateTime<Utc>);

/// A value that can be written to or read from the portable format.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,

    // Primitives
    Byte(u8),
    Bool(bool),
    Short(i16),
    Char(char),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),

    // Special scalars
    Decimal(Decimal),
    String(String),
    Guid(Uuid),
    Date(DateTime<Utc>),
    Timestamp(DateTime<Utc>),
    Enum(EnumValue),

    // Primitive arrays
    ByteArray(Vec<u8>),
    BoolArray(Vec<bool>),
    ShortArray(Vec<i16>),
    CharArray(Vec<char>),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),

    // Null-capable scalar arrays
    DecimalArray(Vec<Option<Decimal>>),
    StringArray(Vec<Option<String>>),
    GuidArray(Vec<Option<Uuid>>),
    DateArray(Vec<Option<DateTime<Utc>>>),
    TimestampArray(Vec<Option<DateTime<Utc>>>),
    EnumArray(Vec<Option<EnumValue>>),

    // Containers of arbitrary values
    ObjectArray(Vec<Value>),
    Collection(Vec<Value>),
    Map(Vec<(Value, Value)>),

    // Object-shaped values
    /// Record in an [`ObjectGraph`](crate::ObjectGraph).
    Node(NodeId),
    /// Already encoded object.
    Object(EncodedObject),
    /// Unfinished object, encoded when the enclosing write runs.
    Builder(ObjectBuilder),
}

impl Value {
    /// Build a collection value.
    pub fn collection(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Collection(items.into_iter().collect())
    }

    /// Build a map value.
    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Self::Map(entries.into_iter().collect())
    }

    /// Tag this value is written with.
    pub fn tag(&self) -> WireTag {
        match self {
            Self::Null => WireTag::Null,
            Self::Byte(_) => WireTag::Byte,
            Self::Bool(_) => WireTag::Bool,
            Self::Short(_) => WireTag::Short,
            Self::Char(_) => WireTag::Char,
            Self::Int(_) => WireTag::Int,
            Self::Long(_) => WireTag::Long,
            Self::Float(_) => WireTag::Float,
            Self::Double(_) => WireTag::Double,
            Self::Decimal(_) => WireTag::Decimal,
            Self::String(_) => WireTag::String,
            Self::Guid(_) => WireTag::Guid,
            Self::Date(_) => WireTag::Date,
            Self::Timestamp(_) => WireTag::Timestamp,
            Self::Enum(_) => WireTag::Enum,
            Self::ByteArray(_) => WireTag::ByteArray,
            Self::BoolArray(_) => WireTag::BoolArray,
            Self::ShortArray(_) => WireTag::ShortArray,
            Self::CharArray(_) => WireTag::CharArray,
            Self::IntArray(_) => WireTag::IntArray,
            Self::LongArray(_) => WireTag::LongArray,
            Self::FloatArray(_) => WireTag::FloatArray,
            Self::DoubleArray(_) => WireTag::DoubleArray,
            Self::DecimalArray(_) => WireTag::DecimalArray,
            Self::StringArray(_) => WireTag::StringArray,
            Self::GuidArray(_) => WireTag::GuidArray,
            Self::DateArray(_) => WireTag::DateArray,
            Self::TimestampArray(_) => WireTag::TimestampArray,
            Self::EnumArray(_) => WireTag::EnumArray,
            Self::ObjectArray(_) => WireTag::ObjectArray,
            Self::Collection(_) => WireTag::Collection,
            Self::Map(_) => WireTag::Map,
            Self::Node(_) | Self::Object(_) | Self::Builder(_) => WireTag::Object,
        }
    }

    /// Check if value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Object-shaped values are encoded with a header and tracked by identity.
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Node(_) | Self::Object(_) | Self::Builder(_))
    }

    /// Try to get as i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Try to get as graph node.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            _ => None,
        }
    }

    /// Try to get as encoded object.
    pub fn as_object(&self) -> Option<&EncodedObject> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Try to get as builder.
    pub fn as_builder(&self) -> Option<&ObjectBuilder> {
        match self {
            Self::Builder(b) => Some(b),
            _ => None,
        }
    }

    /// Elements of an object array or collection.
    pub fn as_items(&self) -> Option<&[Value]> {
        match self {
            Self::ObjectArray(v) | Self::Collection(v) => Some(v),
            _ => None,
        }
    }

    /// Entries of a map.
    pub fn as_entries(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Map lookup by key equality.
    pub fn map_get(&self, key: &Value) -> Option<&Value> {
        self.as_entries()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub(crate) fn kind_label(&self) -> String {
        self.tag().type_name().to_string()
    }
}

fn mismatch<T>(expected: &str, found: &Value) -> Result<T> {
    Err(PortableError::TypeMismatch {
        expected: expected.to_string(),
        found: found.kind_label(),
    })
}

/// Trait for converting from [`Value`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self>;
}

macro_rules! impl_from_value {
    ($ty:ty, $variant:ident, $name:expr) => {
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(v.clone()),
                    other => mismatch($name, other),
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        }
    };
}

impl_from_value!(u8, Byte, "byte");
impl_from_value!(bool, Bool, "boolean");
impl_from_value!(i16, Short, "short");
impl_from_value!(char, Char, "char");
impl_from_value!(i32, Int, "int");
impl_from_value!(i64, Long, "long");
impl_from_value!(f32, Float, "float");
impl_from_value!(f64, Double, "double");
impl_from_value!(Decimal, Decimal, "decimal");
impl_from_value!(String, String, "String");
impl_from_value!(Uuid, Guid, "UUID");
impl_from_value!(EnumValue, Enum, "Enum");
impl_from_value!(Vec<u8>, ByteArray, "byte[]");
impl_from_value!(Vec<bool>, BoolArray, "boolean[]");
impl_from_value!(Vec<i16>, ShortArray, "short[]");
impl_from_value!(Vec<char>, CharArray, "char[]");
impl_from_value!(Vec<i32>, IntArray, "int[]");
impl_from_value!(Vec<i64>, LongArray, "long[]");
impl_from_value!(Vec<f32>, FloatArray, "float[]");
impl_from_value!(Vec<f64>, DoubleArray, "double[]");
impl_from_value!(Vec<Option<Decimal>>, DecimalArray, "decimal[]");
impl_from_value!(Vec<Option<String>>, StringArray, "String[]");
impl_from_value!(Vec<Option<Uuid>>, GuidArray, "UUID[]");
impl_from_value!(Vec<Option<EnumValue>>, EnumArray, "Enum[]");
impl_from_value!(NodeId, Node, "Object");
impl_from_value!(EncodedObject, Object, "Object");
impl_from_value!(ObjectBuilder, Builder, "Object");

// Unsigned/signed counterparts share the tag of the same width.
macro_rules! impl_reinterpret {
    ($ty:ty, $wire:ty, $variant:ident, $name:expr) => {
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self> {
                match value {
                    Value::$variant(v) => Ok(*v as $ty),
                    other => mismatch($name, other),
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v as $wire)
            }
        }
    };
}

impl_reinterpret!(i8, u8, Byte, "byte");
impl_reinterpret!(u16, i16, Short, "short");
impl_reinterpret!(u32, i32, Int, "int");
impl_reinterpret!(u64, i64, Long, "long");

/// Both temporal encodings read back as the same logical instant.
impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(v) | Value::Timestamp(v) => Ok(*v),
            other => mismatch("Date", other),
        }
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl FromValue for Timestamp {
    fn from_value(value: &Value) -> Result<Self> {
        DateTime::<Utc>::from_value(value).map(Timestamp)
    }
}

impl From<Timestamp> for Value {
    fn from(v: Timestamp) -> Self {
        Value::Timestamp(v.0)
    }
}

impl FromValue for Vec<Option<DateTime<Utc>>> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::DateArray(v) | Value::TimestampArray(v) => Ok(v.clone()),
            other => mismatch("Date[]", other),
        }
    }
}

impl From<Vec<Option<DateTime<Utc>>>> for Value {
    fn from(v: Vec<Option<DateTime<Utc>>>) -> Self {
        Value::DateArray(v)
    }
}

impl From<Vec<Option<Timestamp>>> for Value {
    fn from(v: Vec<Option<Timestamp>>) -> Self {
        Value::TimestampArray(v.into_iter().map(|t| t.map(|t| t.0)).collect())
    }
}

impl FromValue for Vec<String> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::StringArray(v) => v
                .iter()
                .map(|s| {
                    s.clone().ok_or_else(|| PortableError::TypeMismatch {
                        expected: "String".into(),
                        found: "null".into(),
                    })
                })
                .collect(),
            other => mismatch("String[]", other),
        }
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::StringArray(v.into_iter().map(Some).collect())
    }
}

impl From<Vec<&str>> for Value {
    fn from(v: Vec<&str>) -> Self {
        Value::StringArray(v.into_iter().map(|s| Some(s.to_string())).collect())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::ObjectArray(v)
    }
}

impl From<&EncodedObject> for Value {
    fn from(v: &EncodedObject) -> Self {
        Value::Object(v.clone())
    }
}

impl From<&ObjectBuilder> for Value {
    fn from(v: &ObjectBuilder) -> Self {
        Value::Builder(v.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}
