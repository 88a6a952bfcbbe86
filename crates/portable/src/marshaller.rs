// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Entry point tying the registry, serializer and builders together.

use crate::builder::ObjectBuilder;
use crate::codec::Cursor;
use crate::config::PortableConfig;
use crate::error::{PortableError, Result};
use crate::graph::{NodeId, ObjectGraph, Record};
use crate::object::EncodedObject;
use crate::portable::Portable;
use crate::reader::{read_value, Materializer, ViewSink};
use crate::registry::{IdMapper, TypeDescriptor, TypeRegistry};
use crate::value::Value;
use crate::writer::GraphWriter;
use std::sync::Arc;

/// How [`Marshaller::decode`] returns objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodeMode {
    /// Decode every object into an [`ObjectGraph`] record.
    #[default]
    Materialize,
    /// Return objects as [`EncodedObject`] views over the input.
    ForceEncoded,
}

/// Result of [`Marshaller::decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Root value. Objects are [`Value::Node`]s into `graph` or
    /// [`Value::Object`] views, depending on the mode.
    pub value: Value,
    /// Decoded records; empty in [`DecodeMode::ForceEncoded`].
    pub graph: ObjectGraph,
}

impl Decoded {
    /// Root node, if the root value is a materialized object.
    pub fn node(&self) -> Option<NodeId> {
        self.value.as_node()
    }

    /// Root record, if the root value is a materialized object.
    pub fn record(&self) -> Option<&Record> {
        self.graph.get(self.node()?)
    }

    /// Root view, if the root value is an encoded object.
    pub fn object(&self) -> Option<&EncodedObject> {
        self.value.as_object()
    }
}

/// Encodes, decodes and builds portable objects against one shared
/// [`TypeRegistry`]. Clones share the registry.
#[derive(Debug, Clone)]
pub struct Marshaller {
    registry: Arc<TypeRegistry>,
}

impl Marshaller {
    pub fn new(config: PortableConfig) -> Self {
        Self {
            registry: Arc::new(TypeRegistry::new(config)),
        }
    }

    /// Marshaller whose type and field ids come from `mapper` where it has
    /// an opinion.
    pub fn with_id_mapper(config: PortableConfig, mapper: Arc<dyn IdMapper>) -> Self {
        Self {
            registry: Arc::new(TypeRegistry::with_id_mapper(config, mapper)),
        }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    // -- Builders --------------------------------------------------------

    /// Fresh builder for a type name.
    pub fn builder(&self, type_name: &str) -> Result<ObjectBuilder> {
        ObjectBuilder::new(Arc::clone(&self.registry), type_name)
    }

    /// Fresh builder for a typed value's type.
    pub fn builder_for<T: Portable>(&self) -> Result<ObjectBuilder> {
        self.builder(T::type_name())
    }

    /// Fresh builder for a descriptor, registering its id if needed.
    pub fn builder_for_descriptor(&self, descriptor: &TypeDescriptor) -> Result<ObjectBuilder> {
        self.registry.register_type(&descriptor.name, descriptor.id)?;
        self.builder(&descriptor.name)
    }

    /// Builder editing an existing object.
    pub fn builder_from(&self, object: &EncodedObject) -> ObjectBuilder {
        ObjectBuilder::from_object(object)
    }

    // -- Encode ----------------------------------------------------------

    /// Encode a value and everything it reaches.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        let mut writer = GraphWriter::new(&self.registry, None);
        writer.write_value(value)?;
        Ok(writer.finish())
    }

    /// Encode a value whose [`Value::Node`]s refer into `graph`.
    pub fn encode_graph(&self, graph: &ObjectGraph, value: &Value) -> Result<Vec<u8>> {
        let mut writer = GraphWriter::new(&self.registry, Some(graph));
        writer.write_value(value)?;
        Ok(writer.finish())
    }

    pub fn encode_portable<T: Portable>(&self, value: &T) -> Result<Vec<u8>> {
        let mut writer = GraphWriter::new(&self.registry, None);
        writer.write_portable(value)?;
        Ok(writer.finish())
    }

    /// Encode and hand back the encoded form: objects become
    /// [`EncodedObject`]s, other values come back as they decode.
    pub fn to_binary(&self, value: &Value) -> Result<Value> {
        let bytes = self.encode(value)?;
        self.decode(bytes, DecodeMode::ForceEncoded)
            .map(|decoded| decoded.value)
    }

    pub fn to_binary_portable<T: Portable>(&self, value: &T) -> Result<EncodedObject> {
        self.wrap(self.encode_portable(value)?)
    }

    // -- Decode ----------------------------------------------------------

    /// Decode a buffer holding exactly one tagged value.
    pub fn decode(&self, bytes: impl Into<Arc<[u8]>>, mode: DecodeMode) -> Result<Decoded> {
        let buf: Arc<[u8]> = bytes.into();
        log::trace!("[portable] decoding {} bytes ({:?})", buf.len(), mode);
        match mode {
            DecodeMode::Materialize => {
                let (value, graph) = Materializer::new(&self.registry, &buf).read_root()?;
                Ok(Decoded { value, graph })
            }
            DecodeMode::ForceEncoded => {
                let mut cur = Cursor::new(&buf);
                let mut sink = ViewSink::new(&self.registry, &buf);
                let value = read_value(&mut cur, &mut sink, 0)?;
                if !cur.is_eof() {
                    return Err(PortableError::corrupt(
                        cur.offset(),
                        format!("{} trailing bytes after value", cur.remaining()),
                    ));
                }
                Ok(Decoded {
                    value,
                    graph: ObjectGraph::new(),
                })
            }
        }
    }

    /// View over a buffer holding exactly one object.
    pub fn wrap(&self, bytes: impl Into<Arc<[u8]>>) -> Result<EncodedObject> {
        EncodedObject::from_bytes(Arc::clone(&self.registry), bytes)
    }

    // -- Registry queries ------------------------------------------------

    pub fn type_descriptor(&self, type_name: &str) -> Option<TypeDescriptor> {
        self.registry.descriptor_by_name(type_name)
    }

    pub fn type_descriptor_by_id(&self, type_id: i32) -> Option<TypeDescriptor> {
        self.registry.descriptor(type_id)
    }

    pub fn type_descriptor_of<T: Portable>(&self) -> Option<TypeDescriptor> {
        self.type_descriptor(T::type_name())
    }

    /// Every known type, sorted by name.
    pub fn list_types(&self) -> Vec<TypeDescriptor> {
        self.registry.list_types()
    }

    pub fn resolve_id(&self, type_name: &str) -> Result<i32> {
        self.registry.resolve_id(type_name)
    }
}

impl Default for Marshaller {
    fn default() -> Self {
        Self::new(PortableConfig::default())
    }
}
