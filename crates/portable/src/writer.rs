// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Encoding side of the graph serializer.
//!
//! A [`GraphWriter`] lives for one top-level write. It remembers where every
//! object-shaped value was written, keyed by identity:
//!
//! - graph records by [`NodeId`],
//! - encoded views by (buffer address, offset),
//! - builders by the address of their shared state.
//!
//! A value seen again after it was finished becomes a handle; a value seen
//! again while it is still being written (an ancestor) becomes a forward
//! marker. Encoded views are re-encoded field by field, so sharing inside
//! them is rediscovered from identity rather than copied positionally.
//! Fields that cannot hold objects are copied as bytes.
//!
//! Encoded objects reached through a builder's base bytes are redirected to
//! the builder the family spawned for them, if any. Values the caller set
//! on a builder are written as they are.

use crate::builder::{BuilderContext, ObjectBuilder, Override};
use crate::codec::{self, fnv1a_32, WireTag, WriteBuffer};
use crate::error::{PortableError, Result};
use crate::graph::{NodeId, ObjectGraph};
use crate::object::{flags, EncodedObject, FLAGS_POS, HASH_POS, HEADER_LEN, LEN_POS, SCHEMA_POS};
use crate::portable::Portable;
use crate::registry::TypeRegistry;
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    Node(usize),
    Encoded(usize, usize),
    Builder(usize),
}

fn relative(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| PortableError::invalid(format!("object size {} exceeds i32", len)))
}

/// Writer for one root value and everything it reaches.
pub(crate) struct GraphWriter<'g> {
    registry: &'g TypeRegistry,
    graph: Option<&'g ObjectGraph>,
    out: WriteBuffer,
    /// Identity -> offset of the object tag.
    handles: HashMap<Identity, usize>,
    in_progress: HashSet<Identity>,
    /// Keeps identity addresses alive (and unique) until the write ends.
    retained_buffers: Vec<Arc<[u8]>>,
    retained_builders: Vec<ObjectBuilder>,
    /// Contexts of the builders currently being written, innermost last.
    contexts: Vec<Arc<BuilderContext>>,
    /// Set while writing values that come from a builder's base bytes.
    through_base: bool,
    depth: usize,
    max_depth: usize,
}

impl<'g> GraphWriter<'g> {
    pub fn new(registry: &'g TypeRegistry, graph: Option<&'g ObjectGraph>) -> Self {
        Self {
            registry,
            graph,
            out: WriteBuffer::with_capacity(256),
            handles: HashMap::new(),
            in_progress: HashSet::new(),
            retained_buffers: Vec::new(),
            retained_builders: Vec::new(),
            contexts: Vec::new(),
            through_base: false,
            depth: 0,
            max_depth: registry.config().max_depth,
        }
    }

    pub fn finish(self) -> Vec<u8> {
        self.out.into_inner()
    }

    /// Write one tagged value.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::ObjectArray(items) | Value::Collection(items) => {
                self.enter()?;
                self.out.write_u8(value.tag().as_u8());
                self.out.write_len(items.len())?;
                for item in items {
                    self.write_value(item)?;
                }
                self.leave();
                Ok(())
            }
            Value::Map(entries) => {
                self.enter()?;
                self.out.write_u8(WireTag::Map.as_u8());
                self.out.write_len(entries.len())?;
                for (key, val) in entries {
                    self.write_value(key)?;
                    self.write_value(val)?;
                }
                self.leave();
                Ok(())
            }
            Value::Node(id) => self.write_node(*id),
            Value::Object(obj) => self.write_encoded(obj),
            Value::Builder(builder) => self.write_builder(builder),
            plain => codec::write_plain(&mut self.out, plain),
        }
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(PortableError::DepthExceeded(self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Emit a handle or forward marker if `identity` was already written or
    /// is being written.
    fn write_reference(&mut self, identity: Identity) -> Result<bool> {
        let Some(target) = self.handles.get(&identity).copied() else {
            return Ok(false);
        };
        let pos = self.out.position();
        let tag = if self.in_progress.contains(&identity) {
            WireTag::Forward
        } else {
            WireTag::Handle
        };
        self.out.write_u8(tag.as_u8());
        self.out.write_i32(relative(pos - target)?);
        Ok(true)
    }

    fn write_node(&mut self, id: NodeId) -> Result<()> {
        let graph = self
            .graph
            .ok_or_else(|| PortableError::invalid("node reference written without an object graph"))?;
        let record = graph.record(id)?;
        let identity = Identity::Node(id.index());
        if self.write_reference(identity)? {
            return Ok(());
        }
        let type_id = self.registry.resolve_id(&record.type_name)?;
        self.write_object(Some(identity), type_id, record.hash, |w| {
            for (name, value) in &record.fields {
                w.write_value(name, value)?;
            }
            w.raw().write_bytes(&record.raw);
            Ok(())
        })
    }

    fn write_encoded(&mut self, obj: &EncodedObject) -> Result<()> {
        if self.through_base {
            if let Some(builder) = self.redirect(obj.key()) {
                return self.write_builder(&builder);
            }
        }
        let (addr, start) = obj.key();
        let identity = Identity::Encoded(addr, start);
        if self.write_reference(identity)? {
            return Ok(());
        }
        self.retained_buffers.push(Arc::clone(obj.buffer()));
        let type_id = obj.type_id();
        self.write_object(Some(identity), type_id, obj.explicit_hash(), |w| {
            for (field_id, offset) in obj.slots() {
                w.copy_slot(obj, *field_id, *offset)?;
            }
            w.raw().write_bytes(obj.raw_data());
            Ok(())
        })
    }

    /// Builder spawned for an encoded instance by one of the builders being
    /// written.
    fn redirect(&self, key: (usize, usize)) -> Option<ObjectBuilder> {
        self.contexts.iter().rev().find_map(|ctx| ctx.lookup(key))
    }

    pub fn write_builder(&mut self, builder: &ObjectBuilder) -> Result<()> {
        let identity = Identity::Builder(builder.addr());
        if self.write_reference(identity)? {
            return Ok(());
        }
        self.retained_builders.push(builder.clone());
        let snap = builder.snapshot();
        self.contexts.push(Arc::clone(builder.context()));
        let through_base = self.through_base;

        let result = self.write_object(Some(identity), snap.type_id, snap.hash, |w| {
            if let Some(base) = &snap.base {
                for (field_id, offset) in base.slots() {
                    if snap.overrides.iter().any(|(id, _, _)| id == field_id) {
                        continue;
                    }
                    match snap.cache.get(field_id) {
                        Some(cached) => {
                            w.writer.through_base = false;
                            let name = w.writer.registry.field_name(snap.type_id, *field_id);
                            w.write_slot(*field_id, name.as_deref(), cached)?;
                        }
                        None => {
                            w.writer.through_base = true;
                            w.copy_slot(base, *field_id, *offset)?;
                        }
                    }
                }
            }
            w.writer.through_base = false;
            for (field_id, name, entry) in &snap.overrides {
                if let Override::Set(value) = entry {
                    w.write_slot(*field_id, Some(name), value)?;
                }
            }
            if let Some(base) = &snap.base {
                w.raw().write_bytes(base.raw_data());
            }
            Ok(())
        });

        self.contexts.pop();
        self.through_base = through_base;
        result
    }

    /// Write a typed value as an object. Typed values carry no identity.
    pub fn write_portable<T: Portable>(&mut self, value: &T) -> Result<()> {
        let type_id = self.registry.resolve_id(T::type_name())?;
        self.write_object(None, type_id, value.portable_hash(), |w| value.write_portable(w))
    }

    fn write_object(
        &mut self,
        identity: Option<Identity>,
        type_id: i32,
        hash: Option<i32>,
        body: impl FnOnce(&mut ObjectWriter<'_, 'g>) -> Result<()>,
    ) -> Result<()> {
        self.enter()?;
        let start = self.out.position();
        if let Some(id) = identity {
            self.handles.insert(id, start);
            self.in_progress.insert(id);
        }

        self.out.write_u8(WireTag::Object.as_u8());
        self.out.write_i32(type_id);
        self.out.write_i32(0); // hash
        self.out.write_i32(0); // total length
        self.out.write_u8(0); // flags
        self.out.write_i32(0); // schema offset

        let mut writer = ObjectWriter {
            writer: self,
            type_id,
            start,
            fields: Vec::new(),
            raw: WriteBuffer::new(),
        };
        body(&mut writer)?;
        let ObjectWriter { fields, raw, .. } = writer;
        self.finish_object(start, type_id, hash, &fields, raw)?;

        if let Some(id) = identity {
            self.in_progress.remove(&id);
        }
        self.leave();
        Ok(())
    }

    fn finish_object(
        &mut self,
        start: usize,
        type_id: i32,
        hash: Option<i32>,
        fields: &[(i32, i32)],
        raw: WriteBuffer,
    ) -> Result<()> {
        let body_end = self.out.position();
        let mut flag_bits = 0u8;
        let mut schema_offset = 0;
        if !fields.is_empty() {
            flag_bits |= flags::HAS_SCHEMA;
            schema_offset = relative(body_end - start)?;
            self.out.write_len(fields.len())?;
            for (field_id, offset) in fields {
                self.out.write_i32(*field_id);
                self.out.write_i32(*offset);
            }
        }
        if !self.registry.metadata_enabled(type_id) {
            flag_bits |= flags::NO_METADATA;
        }
        self.out.write_bytes(&raw.into_inner());
        let total = relative(self.out.position() - start)?;

        let hash = match hash {
            Some(h) => {
                flag_bits |= flags::HASH_SET;
                h
            }
            None if fields.is_empty() => 0,
            None => fnv1a_32(self.out.slice(start + HEADER_LEN, body_end)) as i32,
        };

        self.out.patch_i32(start + HASH_POS, hash);
        self.out.patch_i32(start + LEN_POS, total);
        self.out.patch_u8(start + FLAGS_POS, flag_bits);
        self.out.patch_i32(start + SCHEMA_POS, schema_offset);
        Ok(())
    }
}

/// Field sink handed to [`Portable::write_portable`].
pub struct ObjectWriter<'w, 'g> {
    writer: &'w mut GraphWriter<'g>,
    type_id: i32,
    start: usize,
    fields: Vec<(i32, i32)>,
    raw: WriteBuffer,
}

impl ObjectWriter<'_, '_> {
    pub fn type_id(&self) -> i32 {
        self.type_id
    }

    /// Write a named field.
    pub fn write<V: Into<Value>>(&mut self, name: &str, value: V) -> Result<()> {
        self.write_value(name, &value.into())
    }

    /// Write a named field from a borrowed value.
    pub fn write_value(&mut self, name: &str, value: &Value) -> Result<()> {
        let field_id = self.writer.registry.resolve_field_id(self.type_id, name)?;
        self.write_slot(field_id, Some(name), value)
    }

    /// Write a nested typed object.
    pub fn write_object<T: Portable>(&mut self, name: &str, value: &T) -> Result<()> {
        let field_id = self.writer.registry.resolve_field_id(self.type_id, name)?;
        self.claim(field_id, name)?;
        self.writer.write_portable(value)?;
        self.writer
            .registry
            .merge_field(self.type_id, name, field_id, WireTag::Object)
    }

    /// Positional writer for the raw segment.
    pub fn raw(&mut self) -> RawWriter<'_> {
        RawWriter { out: &mut self.raw }
    }

    fn write_slot(&mut self, field_id: i32, name: Option<&str>, value: &Value) -> Result<()> {
        self.claim(field_id, name.unwrap_or("?"))?;
        self.writer.write_value(value)?;
        self.merge(field_id, name, value.tag())
    }

    /// Carry over one field of an encoded object. Plain values are copied
    /// byte for byte; anything that can hold an object is re-encoded so its
    /// references point into the new buffer.
    fn copy_slot(&mut self, obj: &EncodedObject, field_id: i32, offset: usize) -> Result<()> {
        let name = self.writer.registry.field_name(self.type_id, field_id);
        let body = obj.body();
        match codec::plain_span(body, offset)? {
            Some((tag, end)) => {
                self.claim(field_id, name.as_deref().unwrap_or("?"))?;
                self.writer.out.write_bytes(&body[offset..end]);
                self.merge(field_id, name.as_deref(), tag)
            }
            None => {
                let value = obj.read_at(offset)?;
                self.write_slot(field_id, name.as_deref(), &value)
            }
        }
    }

    fn merge(&self, field_id: i32, name: Option<&str>, tag: WireTag) -> Result<()> {
        match name {
            Some(name) => self
                .writer
                .registry
                .merge_field(self.type_id, name, field_id, tag),
            None => Ok(()),
        }
    }

    /// Record the field's offset, refusing a second write of the same id.
    fn claim(&mut self, field_id: i32, name: &str) -> Result<()> {
        if self.fields.iter().any(|(id, _)| *id == field_id) {
            return Err(PortableError::invalid(format!(
                "field '{}' written twice",
                name
            )));
        }
        let offset = relative(self.writer.out.position() - self.start)?;
        self.fields.push((field_id, offset));
        Ok(())
    }
}

macro_rules! impl_raw_write {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) {
            self.out.$name(value);
        }
    };
}

/// Positional writer for an object's raw segment. Objects cannot be
/// written here.
pub struct RawWriter<'a> {
    out: &'a mut WriteBuffer,
}

impl RawWriter<'_> {
    impl_raw_write!(write_u8, u8);
    impl_raw_write!(write_bool, bool);
    impl_raw_write!(write_i16, i16);
    impl_raw_write!(write_i32, i32);
    impl_raw_write!(write_i64, i64);
    impl_raw_write!(write_f32, f32);
    impl_raw_write!(write_f64, f64);

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.out.write_bytes(data);
    }

    pub fn write_string(&mut self, s: &str) -> Result<()> {
        codec::write_string(self.out, s)
    }

    /// Tagged value without objects.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        codec::write_plain(self.out, value)
    }
}
