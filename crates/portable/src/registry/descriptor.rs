// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type and field descriptors handed out by the registry.

use super::IdMapper;
use crate::codec::WireTag;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A field as first observed on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name as first written.
    pub name: String,
    /// Field id written in object schemas.
    pub id: i32,
    /// Tag the field's value was written with.
    pub wire_kind: WireTag,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, id: i32, wire_kind: WireTag) -> Self {
        Self {
            name: name.into(),
            id,
            wire_kind,
        }
    }

    /// Type name of the wire kind, e.g. `"int"` or `"String[]"`.
    pub fn type_name(&self) -> &'static str {
        self.wire_kind.type_name()
    }
}

/// Snapshot of a registered type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Type name.
    pub name: String,
    /// Type id.
    pub id: i32,
    /// Fields in first-observed order.
    pub fields: Vec<FieldDescriptor>,
    /// False for types configured without metadata.
    pub metadata_enabled: bool,
    /// Mapper that assigned ids for this type, if any.
    #[serde(skip)]
    pub id_mapper: Option<Arc<dyn IdMapper>>,
}

impl TypeDescriptor {
    /// Get field by name (case-insensitive, like field id resolution).
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        let name = name.to_lowercase();
        self.fields.iter().find(|f| f.name.to_lowercase() == name)
    }

    /// Get field by id.
    pub fn field_by_id(&self, id: i32) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Field names in first-observed order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Type name of a field's wire kind.
    pub fn field_type_name(&self, name: &str) -> Option<&'static str> {
        self.field(name).map(FieldDescriptor::type_name)
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.id == other.id
            && self.fields == other.fields
            && self.metadata_enabled == other.metadata_enabled
    }
}
