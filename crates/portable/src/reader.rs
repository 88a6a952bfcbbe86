// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoding side of the graph serializer.
//!
//! [`read_value`] walks tagged values and hands every object, handle and
//! forward marker to an [`ObjectSink`]. Two sinks exist: [`ViewSink`] turns
//! objects into [`EncodedObject`] views (random access, nothing decoded
//! eagerly) and [`Materializer`] decodes into an [`ObjectGraph`] arena.

use crate::codec::{self, Cursor, WireTag};
use crate::error::{PortableError, Result};
use crate::graph::{NodeId, ObjectGraph, Record};
use crate::object::{EncodedObject, Layout};
use crate::portable::Portable;
use crate::registry::TypeRegistry;
use crate::value::{FromValue, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Position of a value inside a container, relative to its field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathStep {
    Item(usize),
    Key(usize),
    Entry(usize),
}

/// Receives the object-shaped parts of a value stream.
pub(crate) trait ObjectSink {
    fn max_depth(&self) -> usize;

    /// An inline object whose tag sits at `tag_offset`. Must leave `cur`
    /// past the object.
    fn object(&mut self, cur: &mut Cursor<'_>, tag_offset: usize, depth: usize) -> Result<Value>;

    /// A handle (`WireTag::Handle`) or forward marker (`WireTag::Forward`)
    /// to the object at `target`.
    fn reference(&mut self, kind: WireTag, target: usize, tag_offset: usize, depth: usize) -> Result<Value>;

    fn enter(&mut self, _step: PathStep) {}

    fn leave(&mut self) {}
}

/// Decode one tagged value.
pub(crate) fn read_value<S: ObjectSink>(cur: &mut Cursor<'_>, sink: &mut S, depth: usize) -> Result<Value> {
    let tag_offset = cur.offset();
    let tag = WireTag::parse(cur.read_u8()?, tag_offset)?;
    match tag {
        WireTag::Object => {
            check_depth(sink, depth)?;
            sink.object(cur, tag_offset, depth + 1)
        }
        WireTag::Handle | WireTag::Forward => {
            let target = read_reference(cur, tag_offset)?;
            sink.reference(tag, target, tag_offset, depth)
        }
        WireTag::ObjectArray | WireTag::Collection => {
            check_depth(sink, depth)?;
            let len = cur.read_len(1)?;
            let mut items = Vec::with_capacity(len);
            for i in 0..len {
                sink.enter(PathStep::Item(i));
                items.push(read_value(cur, sink, depth + 1)?);
                sink.leave();
            }
            Ok(if tag == WireTag::ObjectArray {
                Value::ObjectArray(items)
            } else {
                Value::Collection(items)
            })
        }
        WireTag::Map => {
            check_depth(sink, depth)?;
            let len = cur.read_len(2)?;
            let mut entries = Vec::with_capacity(len);
            for i in 0..len {
                sink.enter(PathStep::Key(i));
                let key = read_value(cur, sink, depth + 1)?;
                sink.leave();
                sink.enter(PathStep::Entry(i));
                let value = read_value(cur, sink, depth + 1)?;
                sink.leave();
                entries.push((key, value));
            }
            Ok(Value::Map(entries))
        }
        plain => codec::read_plain(cur, plain, tag_offset),
    }
}

fn check_depth<S: ObjectSink>(sink: &S, depth: usize) -> Result<()> {
    if depth >= sink.max_depth() {
        return Err(PortableError::DepthExceeded(sink.max_depth()));
    }
    Ok(())
}

/// Read a handle/forward delta and validate its target.
fn read_reference(cur: &mut Cursor<'_>, tag_offset: usize) -> Result<usize> {
    let delta = cur.read_i32()?;
    let target = usize::try_from(delta)
        .ok()
        .filter(|d| *d > 0)
        .and_then(|d| tag_offset.checked_sub(d))
        .ok_or_else(|| {
            PortableError::corrupt(tag_offset, format!("reference delta {} out of range", delta))
        })?;
    if cur.buffer().get(target) != Some(&WireTag::Object.as_u8()) {
        return Err(PortableError::corrupt(
            tag_offset,
            format!("reference target {} is not an object", target),
        ));
    }
    Ok(target)
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Sink producing [`EncodedObject`] views over the shared buffer.
pub(crate) struct ViewSink<'a> {
    registry: &'a Arc<TypeRegistry>,
    buf: &'a Arc<[u8]>,
}

impl<'a> ViewSink<'a> {
    pub fn new(registry: &'a Arc<TypeRegistry>, buf: &'a Arc<[u8]>) -> Self {
        Self { registry, buf }
    }

    fn view(&self, start: usize) -> Result<EncodedObject> {
        EncodedObject::parse(Arc::clone(self.registry), Arc::clone(self.buf), start)
    }
}

impl ObjectSink for ViewSink<'_> {
    fn max_depth(&self) -> usize {
        self.registry.config().max_depth
    }

    fn object(&mut self, cur: &mut Cursor<'_>, tag_offset: usize, _depth: usize) -> Result<Value> {
        let end = Layout::object_end(cur.buffer(), tag_offset)?;
        let view = self.view(tag_offset)?;
        cur.seek(end);
        Ok(Value::Object(view))
    }

    fn reference(&mut self, _kind: WireTag, target: usize, _tag_offset: usize, _depth: usize) -> Result<Value> {
        self.view(target).map(Value::Object)
    }
}

// ---------------------------------------------------------------------------
// Materialization into an arena
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Pending {
    node: NodeId,
    field: usize,
    path: Vec<PathStep>,
    target: usize,
    tag_offset: usize,
}

/// Sink decoding every object into an [`ObjectGraph`] record.
///
/// Each object offset maps to one node, so handles share nodes. Forward
/// markers are left as null placeholders and rewired once every body is
/// decoded.
pub(crate) struct Materializer<'a> {
    registry: &'a TypeRegistry,
    buf: &'a [u8],
    graph: ObjectGraph,
    nodes: HashMap<usize, NodeId>,
    pending: Vec<Pending>,
    current: Option<(NodeId, usize)>,
    path: Vec<PathStep>,
}

impl<'a> Materializer<'a> {
    pub fn new(registry: &'a TypeRegistry, buf: &'a [u8]) -> Self {
        Self {
            registry,
            buf,
            graph: ObjectGraph::new(),
            nodes: HashMap::new(),
            pending: Vec::new(),
            current: None,
            path: Vec::new(),
        }
    }

    /// Decode the tagged value filling the whole buffer.
    pub fn read_root(mut self) -> Result<(Value, ObjectGraph)> {
        let buf = self.buf;
        let mut cur = Cursor::new(buf);
        let value = read_value(&mut cur, &mut self, 0)?;
        if !cur.is_eof() {
            return Err(PortableError::corrupt(
                cur.offset(),
                format!("{} trailing bytes after value", cur.remaining()),
            ));
        }
        self.resolve_pending()?;
        Ok((value, self.graph))
    }

    /// Decode the object at `start` and everything it reaches.
    pub fn object_root(mut self, start: usize) -> Result<(ObjectGraph, NodeId)> {
        let node = self.materialize_at(start, 0)?;
        self.resolve_pending()?;
        Ok((self.graph, node))
    }

    fn materialize_at(&mut self, start: usize, depth: usize) -> Result<NodeId> {
        if let Some(node) = self.nodes.get(&start) {
            return Ok(*node);
        }
        let max = self.registry.config().max_depth;
        if depth > max {
            return Err(PortableError::DepthExceeded(max));
        }

        let buf = self.buf;
        let layout = Layout::parse(buf, start)?;
        let type_name = self
            .registry
            .type_name(layout.type_id)
            .ok_or(PortableError::UnknownType(layout.type_id))?;
        let node = self.graph.add(Record {
            type_name,
            fields: Vec::with_capacity(layout.slots.len()),
            hash: layout.explicit_hash(),
            raw: buf[layout.raw_start..layout.end].to_vec(),
        });
        self.nodes.insert(start, node);

        let body = &buf[..layout.body_end];
        for (idx, (field_id, offset)) in layout.slots.iter().enumerate() {
            let name = self
                .registry
                .field_name(layout.type_id, *field_id)
                .ok_or(PortableError::UnknownField {
                    type_id: layout.type_id,
                    field_id: *field_id,
                })?;
            self.record_mut(node)?.fields.push((name, Value::Null));

            let saved_current = self.current.replace((node, idx));
            let saved_path = std::mem::take(&mut self.path);
            let mut cur = Cursor::at(body, *offset);
            let value = read_value(&mut cur, self, depth);
            self.current = saved_current;
            self.path = saved_path;

            self.record_mut(node)?.fields[idx].1 = value?;
        }
        Ok(node)
    }

    fn record_mut(&mut self, node: NodeId) -> Result<&mut Record> {
        self.graph
            .get_mut(node)
            .ok_or_else(|| PortableError::invalid(format!("node {} missing", node.index())))
    }

    /// Rewire forward-marker placeholders to their targets' nodes.
    fn resolve_pending(&mut self) -> Result<()> {
        let mut i = 0;
        while i < self.pending.len() {
            let pending = self.pending[i].clone();
            i += 1;
            let target = self.materialize_at(pending.target, 0)?;
            let slot = self
                .graph
                .get_mut(pending.node)
                .and_then(|r| r.fields.get_mut(pending.field))
                .and_then(|(_, v)| navigate(v, &pending.path))
                .ok_or_else(|| {
                    PortableError::corrupt(pending.tag_offset, "forward marker has no slot to resolve")
                })?;
            *slot = Value::Node(target);
        }
        self.pending.clear();
        Ok(())
    }
}

fn navigate<'v>(value: &'v mut Value, path: &[PathStep]) -> Option<&'v mut Value> {
    path.iter().try_fold(value, |v, step| match (v, step) {
        (Value::ObjectArray(items) | Value::Collection(items), PathStep::Item(i)) => items.get_mut(*i),
        (Value::Map(entries), PathStep::Key(i)) => entries.get_mut(*i).map(|e| &mut e.0),
        (Value::Map(entries), PathStep::Entry(i)) => entries.get_mut(*i).map(|e| &mut e.1),
        _ => None,
    })
}

impl ObjectSink for Materializer<'_> {
    fn max_depth(&self) -> usize {
        self.registry.config().max_depth
    }

    fn object(&mut self, cur: &mut Cursor<'_>, tag_offset: usize, depth: usize) -> Result<Value> {
        let end = Layout::object_end(cur.buffer(), tag_offset)?;
        let node = self.materialize_at(tag_offset, depth)?;
        cur.seek(end);
        Ok(Value::Node(node))
    }

    fn reference(&mut self, kind: WireTag, target: usize, tag_offset: usize, depth: usize) -> Result<Value> {
        match (kind, self.current) {
            (WireTag::Forward, Some((node, field))) => {
                self.pending.push(Pending {
                    node,
                    field,
                    path: self.path.clone(),
                    target,
                    tag_offset,
                });
                Ok(Value::Null)
            }
            _ => self.materialize_at(target, depth).map(Value::Node),
        }
    }

    fn enter(&mut self, step: PathStep) {
        self.path.push(step);
    }

    fn leave(&mut self) {
        self.path.pop();
    }
}

// ---------------------------------------------------------------------------
// Typed reading
// ---------------------------------------------------------------------------

/// Field access handed to [`Portable::read_portable`].
pub struct ObjectReader<'a> {
    object: &'a EncodedObject,
    visiting: &'a mut Vec<(usize, usize)>,
    raw: RawReader<'a>,
}

impl<'a> ObjectReader<'a> {
    pub(crate) fn new(object: &'a EncodedObject, visiting: &'a mut Vec<(usize, usize)>) -> Self {
        Self {
            object,
            visiting,
            raw: RawReader::new(object.raw_data()),
        }
    }

    /// The object being read.
    pub fn object(&self) -> &EncodedObject {
        self.object
    }

    /// Untyped field value.
    pub fn value(&self, name: &str) -> Result<Option<Value>> {
        self.object.get_field(name)
    }

    /// Typed field value; `Ok(None)` when the field is absent.
    pub fn read<T: FromValue>(&self, name: &str) -> Result<Option<T>> {
        self.object.field(name)
    }

    /// Nested typed object. Null and absent both read as `None`.
    pub fn read_object<T: Portable>(&mut self, name: &str) -> Result<Option<T>> {
        match self.object.get_field(name)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(view)) => view.materialize_with(self.visiting).map(Some),
            Some(other) => Err(PortableError::TypeMismatch {
                expected: T::type_name().to_string(),
                found: other.kind_label(),
            }),
        }
    }

    /// Raw segment, read positionally.
    pub fn raw(&mut self) -> &mut RawReader<'a> {
        &mut self.raw
    }
}

macro_rules! impl_raw_read {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self) -> Result<$type> {
            self.cur.$name()
        }
    };
}

/// Positional reader over an object's raw segment.
#[derive(Debug, Clone)]
pub struct RawReader<'a> {
    cur: Cursor<'a>,
}

impl<'a> RawReader<'a> {
    pub(crate) fn new(raw: &'a [u8]) -> Self {
        Self {
            cur: Cursor::new(raw),
        }
    }

    impl_raw_read!(read_u8, u8);
    impl_raw_read!(read_bool, bool);
    impl_raw_read!(read_i16, i16);
    impl_raw_read!(read_i32, i32);
    impl_raw_read!(read_i64, i64);
    impl_raw_read!(read_f32, f32);
    impl_raw_read!(read_f64, f64);

    pub fn read_string(&mut self) -> Result<String> {
        codec::read_string(&mut self.cur)
    }

    /// Tagged value without objects.
    pub fn read_value(&mut self) -> Result<Value> {
        let at = self.cur.offset();
        let tag = WireTag::parse(self.cur.read_u8()?, at)?;
        codec::read_plain(&mut self.cur, tag, at)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.cur.read_bytes(len)
    }

    pub fn remaining(&self) -> usize {
        self.cur.remaining()
    }
}
