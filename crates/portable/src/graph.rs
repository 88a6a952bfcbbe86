// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Arena of dynamic records.
//!
//! Shared references and cycles are expressed as [`NodeId`]s pointing into
//! the arena, so a decoded graph keeps its sharing without reference-counted
//! pointers: two fields holding the same `NodeId` are the same instance.

use crate::error::{PortableError, Result};
use crate::value::Value;

/// Index of a record in an [`ObjectGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A dynamic object: type name, named fields in order, optional explicit
/// hash and raw trailing bytes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
    /// Explicit hash; `None` lets the writer compute the default one.
    pub hash: Option<i32>,
    pub raw: Vec<u8>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing an existing one in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(pos).1)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }
}

/// Arena of records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectGraph {
    nodes: Vec<Record>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record and return its id.
    pub fn add(&mut self, record: Record) -> NodeId {
        self.nodes.push(record);
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> Option<&Record> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Record> {
        self.nodes.get_mut(id.0)
    }

    /// Like [`get`](Self::get), failing on a dangling id.
    pub fn record(&self, id: NodeId) -> Result<&Record> {
        self.get(id)
            .ok_or_else(|| PortableError::invalid(format!("node {} is not in the graph", id.0)))
    }

    /// Set a field on a record.
    pub fn set_field(&mut self, id: NodeId, name: &str, value: impl Into<Value>) -> Result<()> {
        let record = self
            .get_mut(id)
            .ok_or_else(|| PortableError::invalid(format!("node {} is not in the graph", id.0)))?;
        record.set(name, value);
        Ok(())
    }

    /// Field value of a record.
    pub fn field(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.get(id)?.get(name)
    }

    /// Follow a chain of object-valued fields, e.g. `["inner", "outer"]`.
    pub fn follow(&self, from: NodeId, path: &[&str]) -> Option<NodeId> {
        path.iter()
            .try_fold(from, |node, name| self.field(node, name)?.as_node())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Record)> {
        self.nodes.iter().enumerate().map(|(i, r)| (NodeId(i), r))
    }
}
