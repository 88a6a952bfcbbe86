// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Immutable view over an encoded object.
//!
//! # Layout
//!
//! ```text
//! tag:u8(=103) type_id:i32 hash:i32 total_len:i32 flags:u8 schema_offset:i32
//! body:   tagged field values in write order
//! schema: count:i32 [field_id:i32 field_offset:i32]*   (HAS_SCHEMA only)
//! raw:    opaque bytes up to total_len
//! ```
//!
//! Offsets are relative to the object tag. Nested objects live inline in
//! the body, so a view over a nested object shares its parent's buffer.

use crate::codec::{Cursor, WireTag};
use crate::error::{PortableError, Result};
use crate::graph::{NodeId, ObjectGraph};
use crate::portable::Portable;
use crate::reader::{read_value, Materializer, ObjectReader, ViewSink};
use crate::registry::{TypeDescriptor, TypeRegistry};
use crate::value::{FromValue, Value};
use crate::writer::GraphWriter;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) const HEADER_LEN: usize = 18;
pub(crate) const HASH_POS: usize = 5;
pub(crate) const LEN_POS: usize = 9;
pub(crate) const FLAGS_POS: usize = 13;
pub(crate) const SCHEMA_POS: usize = 14;

/// Object header flags.
pub(crate) mod flags {
    pub const HAS_SCHEMA: u8 = 0x01;
    pub const NO_METADATA: u8 = 0x02;
    pub const HASH_SET: u8 = 0x04;
    pub const ALL: u8 = HAS_SCHEMA | NO_METADATA | HASH_SET;
}

/// Parsed and validated header plus schema of one object.
#[derive(Debug)]
pub(crate) struct Layout {
    pub start: usize,
    pub end: usize,
    pub type_id: i32,
    pub hash: i32,
    pub flags: u8,
    pub body_end: usize,
    pub raw_start: usize,
    /// (field id, absolute offset) in write order.
    pub slots: Vec<(i32, usize)>,
    index: HashMap<i32, usize>,
}

impl Layout {
    /// Parse the object whose tag sits at `start`.
    pub fn parse(buf: &[u8], start: usize) -> Result<Self> {
        let (type_id, hash, flags, schema_offset, end) = Self::header(buf, start)?;
        let total = end - start;

        let mut slots = Vec::new();
        let mut index = HashMap::new();
        let (body_end, raw_start) = if flags & flags::HAS_SCHEMA != 0 {
            let schema = usize::try_from(schema_offset)
                .ok()
                .filter(|o| *o >= HEADER_LEN && o.saturating_add(4) <= total)
                .ok_or_else(|| {
                    PortableError::corrupt(
                        start + SCHEMA_POS,
                        format!("schema offset {} out of range", schema_offset),
                    )
                })?;
            let mut cur = Cursor::at(&buf[..end], start + schema);
            let count = cur.read_len(8)?;
            for _ in 0..count {
                let at = cur.offset();
                let field_id = cur.read_i32()?;
                let offset = cur.read_i32()?;
                let offset = usize::try_from(offset)
                    .ok()
                    .filter(|o| *o >= HEADER_LEN && *o < schema)
                    .ok_or_else(|| {
                        PortableError::corrupt(at + 4, format!("field offset {} out of range", offset))
                    })?;
                if index.insert(field_id, slots.len()).is_some() {
                    return Err(PortableError::corrupt(
                        at,
                        format!("duplicate field id {}", field_id),
                    ));
                }
                slots.push((field_id, start + offset));
            }
            (start + schema, cur.offset())
        } else {
            (start + HEADER_LEN, start + HEADER_LEN)
        };

        Ok(Self {
            start,
            end,
            type_id,
            hash,
            flags,
            body_end,
            raw_start,
            slots,
            index,
        })
    }

    /// End offset of the object at `start`, checking only the header.
    pub fn object_end(buf: &[u8], start: usize) -> Result<usize> {
        Self::header(buf, start).map(|h| h.4)
    }

    fn header(buf: &[u8], start: usize) -> Result<(i32, i32, u8, i32, usize)> {
        let mut cur = Cursor::at(buf, start);
        let tag = cur.read_u8()?;
        if tag != WireTag::Object.as_u8() {
            return Err(PortableError::corrupt(
                start,
                format!("expected object header, found tag {}", tag),
            ));
        }
        let type_id = cur.read_i32()?;
        let hash = cur.read_i32()?;
        let total = cur.read_i32()?;
        let flag_bits = cur.read_u8()?;
        let schema_offset = cur.read_i32()?;

        if flag_bits & !flags::ALL != 0 {
            return Err(PortableError::corrupt(
                start + FLAGS_POS,
                format!("unknown object flags {:#04x}", flag_bits),
            ));
        }
        let end = usize::try_from(total)
            .ok()
            .filter(|t| *t >= HEADER_LEN)
            .and_then(|t| start.checked_add(t))
            .filter(|e| *e <= buf.len())
            .ok_or_else(|| {
                PortableError::corrupt(
                    start + LEN_POS,
                    format!("object length {} exceeds buffer", total),
                )
            })?;
        Ok((type_id, hash, flag_bits, schema_offset, end))
    }

    pub fn slot(&self, field_id: i32) -> Option<usize> {
        self.index.get(&field_id).map(|i| self.slots[*i].1)
    }

    pub fn explicit_hash(&self) -> Option<i32> {
        (self.flags & flags::HASH_SET != 0).then_some(self.hash)
    }
}

/// Immutable, cheaply clonable view of one encoded object.
///
/// Field reads decode only the requested field. Nested objects come back as
/// further views over the same buffer.
#[derive(Clone)]
pub struct EncodedObject {
    registry: Arc<TypeRegistry>,
    buf: Arc<[u8]>,
    layout: Arc<Layout>,
}

impl EncodedObject {
    pub(crate) fn parse(registry: Arc<TypeRegistry>, buf: Arc<[u8]>, start: usize) -> Result<Self> {
        let layout = Layout::parse(&buf, start)?;
        Ok(Self {
            registry,
            buf,
            layout: Arc::new(layout),
        })
    }

    /// Wrap a buffer holding exactly one object.
    pub fn from_bytes(registry: Arc<TypeRegistry>, bytes: impl Into<Arc<[u8]>>) -> Result<Self> {
        let buf = bytes.into();
        let obj = Self::parse(registry, buf, 0)?;
        if obj.layout.end != obj.buf.len() {
            return Err(PortableError::corrupt(
                obj.layout.end,
                format!("{} trailing bytes after object", obj.buf.len() - obj.layout.end),
            ));
        }
        Ok(obj)
    }

    pub fn type_id(&self) -> i32 {
        self.layout.type_id
    }

    /// Registered name of this object's type.
    pub fn type_name(&self) -> Option<String> {
        self.registry.type_name(self.layout.type_id)
    }

    /// Descriptor from the registry; lists every field ever seen for the
    /// type, not just the ones present here.
    pub fn type_descriptor(&self) -> Result<TypeDescriptor> {
        self.registry
            .descriptor(self.layout.type_id)
            .ok_or(PortableError::UnknownType(self.layout.type_id))
    }

    /// Names of the fields present in this instance, in write order.
    pub fn field_names(&self) -> Result<Vec<String>> {
        self.layout
            .slots
            .iter()
            .map(|(field_id, _)| {
                self.registry
                    .field_name(self.layout.type_id, *field_id)
                    .ok_or(PortableError::UnknownField {
                        type_id: self.layout.type_id,
                        field_id: *field_id,
                    })
            })
            .collect()
    }

    pub fn field_count(&self) -> usize {
        self.layout.slots.len()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.registry
            .field_id(self.layout.type_id, name)
            .is_some_and(|id| self.layout.slot(id).is_some())
    }

    /// Decode a single field. Absent fields are `Ok(None)`.
    pub fn get_field(&self, name: &str) -> Result<Option<Value>> {
        match self.registry.field_id(self.layout.type_id, name) {
            Some(id) => self.get_field_by_id(id),
            None => Ok(None),
        }
    }

    /// Decode a single field into a Rust type.
    pub fn field<T: FromValue>(&self, name: &str) -> Result<Option<T>> {
        self.get_field(name)?.map(|v| T::from_value(&v)).transpose()
    }

    pub(crate) fn get_field_by_id(&self, field_id: i32) -> Result<Option<Value>> {
        self.layout
            .slot(field_id)
            .map(|offset| self.read_at(offset))
            .transpose()
    }

    pub(crate) fn read_at(&self, offset: usize) -> Result<Value> {
        let mut cur = Cursor::at(&self.buf[..self.layout.body_end], offset);
        let mut sink = ViewSink::new(&self.registry, &self.buf);
        read_value(&mut cur, &mut sink, 0)
    }

    /// Stored hash: explicit if one was set, computed otherwise.
    pub fn identity_hash(&self) -> i32 {
        self.layout.hash
    }

    /// The hash, if it was set explicitly rather than computed.
    pub fn explicit_hash(&self) -> Option<i32> {
        self.layout.explicit_hash()
    }

    /// Whether field metadata is recorded for this object's type.
    pub fn has_metadata(&self) -> bool {
        self.layout.flags & flags::NO_METADATA == 0
    }

    /// Bytes of this object.
    ///
    /// For a nested view the slice can contain handles pointing before it;
    /// use [`detach`](Self::detach) for a self-contained copy.
    pub fn data(&self) -> &[u8] {
        &self.buf[self.layout.start..self.layout.end]
    }

    /// Raw trailing segment.
    pub fn raw_data(&self) -> &[u8] {
        &self.buf[self.layout.raw_start..self.layout.end]
    }

    /// Construct a typed value.
    pub fn materialize<T: Portable>(&self) -> Result<T> {
        let mut visiting = Vec::new();
        self.materialize_with(&mut visiting)
    }

    pub(crate) fn materialize_with<T: Portable>(&self, visiting: &mut Vec<(usize, usize)>) -> Result<T> {
        let expected = self.registry.resolve_id(T::type_name())?;
        if expected != self.layout.type_id {
            return Err(PortableError::TypeMismatch {
                expected: T::type_name().to_string(),
                found: self
                    .type_name()
                    .unwrap_or_else(|| self.layout.type_id.to_string()),
            });
        }
        let key = self.key();
        if visiting.contains(&key) {
            return Err(PortableError::CyclicGraph);
        }
        visiting.push(key);
        let result = T::read_portable(&mut ObjectReader::new(self, visiting));
        visiting.pop();
        result
    }

    /// Decode into an arena, keeping shared references and cycles.
    pub fn materialize_graph(&self) -> Result<(ObjectGraph, NodeId)> {
        Materializer::new(&self.registry, &self.buf).object_root(self.layout.start)
    }

    /// Self-contained copy: a view covering its whole buffer is returned as
    /// is, a nested one is re-encoded together with everything it reaches.
    pub fn detach(&self) -> Result<EncodedObject> {
        if self.layout.start == 0 && self.layout.end == self.buf.len() {
            return Ok(self.clone());
        }
        let mut writer = GraphWriter::new(&self.registry, None);
        writer.write_value(&Value::Object(self.clone()))?;
        Self::from_bytes(Arc::clone(&self.registry), writer.finish())
    }

    /// (buffer address, start): identity of the encoded instance.
    pub(crate) fn key(&self) -> (usize, usize) {
        (Arc::as_ptr(&self.buf) as *const u8 as usize, self.layout.start)
    }

    /// Buffer up to the end of this object's body.
    pub(crate) fn body(&self) -> &[u8] {
        &self.buf[..self.layout.body_end]
    }

    pub(crate) fn buffer(&self) -> &Arc<[u8]> {
        &self.buf
    }

    pub(crate) fn slots(&self) -> &[(i32, usize)] {
        &self.layout.slots
    }

    pub(crate) fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }
}

impl PartialEq for EncodedObject {
    fn eq(&self, other: &Self) -> bool {
        self.data() == other.data()
    }
}

impl fmt::Debug for EncodedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedObject")
            .field("type_id", &self.layout.type_id)
            .field("hash", &self.layout.hash)
            .field("start", &self.layout.start)
            .field("len", &(self.layout.end - self.layout.start))
            .field("fields", &self.layout.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WriteBuffer;

    fn header(out: &mut WriteBuffer, total: i32, flag_bits: u8, schema: i32) {
        out.write_u8(WireTag::Object.as_u8());
        out.write_i32(1);
        out.write_i32(0);
        out.write_i32(total);
        out.write_u8(flag_bits);
        out.write_i32(schema);
    }

    #[test]
    fn test_parse_empty_object() {
        let mut out = WriteBuffer::new();
        header(&mut out, HEADER_LEN as i32, 0, 0);
        let bytes = out.into_inner();
        let layout = Layout::parse(&bytes, 0).expect("parse");
        assert!(layout.slots.is_empty());
        assert_eq!(layout.raw_start, HEADER_LEN);
        assert_eq!(layout.end, HEADER_LEN);
        assert_eq!(layout.explicit_hash(), None);
    }

    #[test]
    fn test_parse_rejects_bad_headers() {
        let mut out = WriteBuffer::new();
        header(&mut out, 100, 0, 0);
        let bytes = out.into_inner();
        let err = Layout::parse(&bytes, 0).expect_err("length");
        assert_eq!(err, PortableError::corrupt(LEN_POS, "object length 100 exceeds buffer"));

        let mut out = WriteBuffer::new();
        header(&mut out, HEADER_LEN as i32, 0x80, 0);
        assert!(Layout::parse(&out.into_inner(), 0).expect_err("flags").is_corrupt());

        assert!(Layout::parse(&[WireTag::Int.as_u8(), 0, 0, 0, 0], 0)
            .expect_err("tag")
            .is_corrupt());
        assert!(Layout::parse(&[WireTag::Object.as_u8(), 1], 0)
            .expect_err("truncated")
            .is_corrupt());
    }

    #[test]
    fn test_parse_rejects_bad_schema() {
        // Field offset pointing into the header.
        let mut out = WriteBuffer::new();
        header(&mut out, (HEADER_LEN + 4 + 8) as i32, flags::HAS_SCHEMA, HEADER_LEN as i32);
        out.write_i32(1);
        out.write_i32(7);
        out.write_i32(3);
        assert!(Layout::parse(&out.into_inner(), 0).expect_err("offset").is_corrupt());

        // Schema offset beyond the object.
        let mut out = WriteBuffer::new();
        header(&mut out, HEADER_LEN as i32, flags::HAS_SCHEMA, 500);
        assert!(Layout::parse(&out.into_inner(), 0).expect_err("schema").is_corrupt());
    }

    #[test]
    fn test_parse_rejects_duplicate_field_ids() {
        let mut out = WriteBuffer::new();
        let body = 2 * 5;
        let schema = HEADER_LEN + body;
        header(&mut out, (schema + 4 + 16) as i32, flags::HAS_SCHEMA, schema as i32);
        for _ in 0..2 {
            out.write_u8(WireTag::Int.as_u8());
            out.write_i32(0);
        }
        out.write_i32(2);
        out.write_i32(9);
        out.write_i32(HEADER_LEN as i32);
        out.write_i32(9);
        out.write_i32((HEADER_LEN + 5) as i32);
        let err = Layout::parse(&out.into_inner(), 0).expect_err("duplicate");
        assert_eq!(err, PortableError::corrupt(schema + 12, "duplicate field id 9"));
    }
}
