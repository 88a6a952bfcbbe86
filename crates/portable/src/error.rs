// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type shared by the registry, codec, serializer and builder.

use thiserror::Error;

/// Errors produced by portable encode/decode/build operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortableError {
    /// A caller-supplied argument is unusable (empty name, dangling node, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The byte stream is malformed. Aborts the whole decode.
    #[error("corrupt data at offset {offset}: {reason}")]
    CorruptData { offset: usize, reason: String },

    /// No type with this id is known to the registry.
    #[error("unknown type id {0}")]
    UnknownType(i32),

    /// A field id has no recorded name for its type.
    #[error("unknown field id {field_id} in type {type_id}")]
    UnknownField { type_id: i32, field_id: i32 },

    /// Two distinct type names resolved to the same id.
    #[error("type id {id} already assigned to '{existing}', cannot assign it to '{name}'")]
    TypeIdCollision {
        id: i32,
        existing: String,
        name: String,
    },

    /// Two distinct field names of one type resolved to the same field id.
    #[error("field id {id} of type {type_id} already assigned to '{existing}', cannot assign it to '{name}'")]
    FieldIdCollision {
        type_id: i32,
        id: i32,
        existing: String,
        name: String,
    },

    /// A field was observed with a wire kind different from the recorded one.
    #[error("field '{type_name}.{field}' recorded as {existing}, observed as {observed}")]
    MetadataConflict {
        type_name: String,
        field: String,
        existing: String,
        observed: String,
    },

    /// A value could not be converted to the requested Rust type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Typed materialization reached an object that is already being read.
    #[error("cyclic object graph cannot be materialized into plain values")]
    CyclicGraph,

    /// Object nesting exceeded the configured depth limit.
    #[error("object nesting exceeds maximum depth {0}")]
    DepthExceeded(usize),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PortableError {
    pub(crate) fn corrupt(offset: usize, reason: impl Into<String>) -> Self {
        Self::CorruptData {
            offset,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// True for errors that indicate a malformed byte stream.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptData { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PortableError>;
