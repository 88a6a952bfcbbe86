// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire type tags.

use crate::error::{PortableError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One-byte tag preceding every encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WireTag {
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    Char = 7,
    Bool = 8,
    String = 9,
    Guid = 10,
    Date = 11,
    ByteArray = 12,
    ShortArray = 13,
    IntArray = 14,
    LongArray = 15,
    FloatArray = 16,
    DoubleArray = 17,
    CharArray = 18,
    BoolArray = 19,
    StringArray = 20,
    GuidArray = 21,
    DateArray = 22,
    ObjectArray = 23,
    Collection = 24,
    Map = 25,
    Enum = 28,
    EnumArray = 29,
    Decimal = 30,
    DecimalArray = 31,
    Timestamp = 33,
    TimestampArray = 34,
    Null = 101,
    Handle = 102,
    Object = 103,
    Forward = 104,
}

impl WireTag {
    /// Decode a tag byte.
    pub fn from_u8(byte: u8) -> Option<Self> {
        let tag = match byte {
            1 => Self::Byte,
            2 => Self::Short,
            3 => Self::Int,
            4 => Self::Long,
            5 => Self::Float,
            6 => Self::Double,
            7 => Self::Char,
            8 => Self::Bool,
            9 => Self::String,
            10 => Self::Guid,
            11 => Self::Date,
            12 => Self::ByteArray,
            13 => Self::ShortArray,
            14 => Self::IntArray,
            15 => Self::LongArray,
            16 => Self::FloatArray,
            17 => Self::DoubleArray,
            18 => Self::CharArray,
            19 => Self::BoolArray,
            20 => Self::StringArray,
            21 => Self::GuidArray,
            22 => Self::DateArray,
            23 => Self::ObjectArray,
            24 => Self::Collection,
            25 => Self::Map,
            28 => Self::Enum,
            29 => Self::EnumArray,
            30 => Self::Decimal,
            31 => Self::DecimalArray,
            33 => Self::Timestamp,
            34 => Self::TimestampArray,
            101 => Self::Null,
            102 => Self::Handle,
            103 => Self::Object,
            104 => Self::Forward,
            _ => return None,
        };
        Some(tag)
    }

    /// Decode a tag byte read at `offset`, failing on unknown values.
    pub fn parse(byte: u8, offset: usize) -> Result<Self> {
        Self::from_u8(byte)
            .ok_or_else(|| PortableError::corrupt(offset, format!("unknown wire tag {}", byte)))
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The kind recorded in type metadata for a field written with this tag.
    ///
    /// Handle and forward markers stand in for objects. Null is kept as a
    /// placeholder until a field is seen with a value.
    pub fn field_kind(self) -> Self {
        match self {
            Self::Handle | Self::Forward => Self::Object,
            other => other,
        }
    }

    /// Element tag of a reference-capable array tag.
    pub fn element_tag(self) -> Option<Self> {
        match self {
            Self::StringArray => Some(Self::String),
            Self::GuidArray => Some(Self::Guid),
            Self::DateArray => Some(Self::Date),
            Self::TimestampArray => Some(Self::Timestamp),
            Self::DecimalArray => Some(Self::Decimal),
            Self::EnumArray => Some(Self::Enum),
            _ => None,
        }
    }

    /// Human readable type name used in metadata.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Char => "char",
            Self::Bool => "boolean",
            Self::String => "String",
            Self::Guid => "UUID",
            Self::Date => "Date",
            Self::ByteArray => "byte[]",
            Self::ShortArray => "short[]",
            Self::IntArray => "int[]",
            Self::LongArray => "long[]",
            Self::FloatArray => "float[]",
            Self::DoubleArray => "double[]",
            Self::CharArray => "char[]",
            Self::BoolArray => "boolean[]",
            Self::StringArray => "String[]",
            Self::GuidArray => "UUID[]",
            Self::DateArray => "Date[]",
            Self::ObjectArray => "Object[]",
            Self::Collection => "Collection",
            Self::Map => "Map",
            Self::Enum => "Enum",
            Self::EnumArray => "Enum[]",
            Self::Decimal => "decimal",
            Self::DecimalArray => "decimal[]",
            Self::Timestamp => "Timestamp",
            Self::TimestampArray => "Timestamp[]",
            Self::Null | Self::Handle | Self::Object | Self::Forward => "Object",
        }
    }
}

impl fmt::Display for WireTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}
