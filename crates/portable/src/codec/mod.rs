// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Value codec: tagged encoding of scalars and scalar arrays.
//!
//! Containers and objects recurse into the graph serializer
//! ([`crate::writer`], [`crate::reader`]); everything else is handled here.

pub mod cursor;
mod decimal;
pub mod tag;

pub use cursor::{Cursor, WriteBuffer};
pub use decimal::Decimal;
pub use tag::WireTag;

use crate::error::{PortableError, Result};
use crate::value::{EnumValue, Value};
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a.
pub(crate) fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

// ---------------------------------------------------------------------------
// Write
// ---------------------------------------------------------------------------

/// Write a value that cannot contain objects: tag then payload.
///
/// Object-shaped values and containers are rejected; the graph writer owns
/// those.
pub(crate) fn write_plain(out: &mut WriteBuffer, value: &Value) -> Result<()> {
    out.write_u8(value.tag().as_u8());
    match value {
        Value::Null => {}
        Value::Byte(v) => out.write_u8(*v),
        Value::Bool(v) => out.write_bool(*v),
        Value::Short(v) => out.write_i16(*v),
        Value::Char(v) => out.write_u32(u32::from(*v)),
        Value::Int(v) => out.write_i32(*v),
        Value::Long(v) => out.write_i64(*v),
        Value::Float(v) => out.write_f32(*v),
        Value::Double(v) => out.write_f64(*v),
        Value::Decimal(v) => write_decimal(out, v)?,
        Value::String(v) => write_string(out, v)?,
        Value::Guid(v) => out.write_bytes(v.as_bytes()),
        Value::Date(v) => write_date(out, v),
        Value::Timestamp(v) => write_timestamp(out, v)?,
        Value::Enum(v) => write_enum(out, v),

        Value::ByteArray(v) => {
            out.write_len(v.len())?;
            out.write_bytes(v);
        }
        Value::BoolArray(v) => {
            out.write_len(v.len())?;
            v.iter().for_each(|b| out.write_bool(*b));
        }
        Value::ShortArray(v) => {
            out.write_len(v.len())?;
            v.iter().for_each(|x| out.write_i16(*x));
        }
        Value::CharArray(v) => {
            out.write_len(v.len())?;
            v.iter().for_each(|c| out.write_u32(u32::from(*c)));
        }
        Value::IntArray(v) => {
            out.write_len(v.len())?;
            v.iter().for_each(|x| out.write_i32(*x));
        }
        Value::LongArray(v) => {
            out.write_len(v.len())?;
            v.iter().for_each(|x| out.write_i64(*x));
        }
        Value::FloatArray(v) => {
            out.write_len(v.len())?;
            v.iter().for_each(|x| out.write_f32(*x));
        }
        Value::DoubleArray(v) => {
            out.write_len(v.len())?;
            v.iter().for_each(|x| out.write_f64(*x));
        }

        Value::DecimalArray(v) => {
            write_nullable(out, v, WireTag::Decimal, |out, d| write_decimal(out, d))?
        }
        Value::StringArray(v) => {
            write_nullable(out, v, WireTag::String, |out, s| write_string(out, s))?
        }
        Value::GuidArray(v) => write_nullable(out, v, WireTag::Guid, |out, g| {
            out.write_bytes(g.as_bytes());
            Ok(())
        })?,
        Value::DateArray(v) => write_nullable(out, v, WireTag::Date, |out, d| {
            write_date(out, d);
            Ok(())
        })?,
        Value::TimestampArray(v) => {
            write_nullable(out, v, WireTag::Timestamp, |out, t| write_timestamp(out, t))?
        }
        Value::EnumArray(v) => write_nullable(out, v, WireTag::Enum, |out, e| {
            write_enum(out, e);
            Ok(())
        })?,

        Value::ObjectArray(_)
        | Value::Collection(_)
        | Value::Map(_)
        | Value::Node(_)
        | Value::Object(_)
        | Value::Builder(_) => {
            return Err(PortableError::invalid(format!(
                "{} is not a plain value",
                value.tag()
            )))
        }
    }
    Ok(())
}

fn write_nullable<T>(
    out: &mut WriteBuffer,
    items: &[Option<T>],
    elem: WireTag,
    mut write: impl FnMut(&mut WriteBuffer, &T) -> Result<()>,
) -> Result<()> {
    out.write_len(items.len())?;
    for item in items {
        match item {
            Some(v) => {
                out.write_u8(elem.as_u8());
                write(out, v)?;
            }
            None => out.write_u8(WireTag::Null.as_u8()),
        }
    }
    Ok(())
}

pub(crate) fn write_string(out: &mut WriteBuffer, s: &str) -> Result<()> {
    out.write_len(s.len())?;
    out.write_bytes(s.as_bytes());
    Ok(())
}

fn write_decimal(out: &mut WriteBuffer, d: &Decimal) -> Result<()> {
    out.write_bool(d.is_negative());
    out.write_i32(d.scale());
    out.write_len(d.magnitude().len())?;
    out.write_bytes(d.magnitude());
    Ok(())
}

fn write_date(out: &mut WriteBuffer, d: &DateTime<Utc>) {
    out.write_i64(d.timestamp());
    out.write_u32(d.timestamp_subsec_nanos());
}

fn write_timestamp(out: &mut WriteBuffer, d: &DateTime<Utc>) -> Result<()> {
    let nanos = d.timestamp_nanos_opt().ok_or_else(|| {
        PortableError::invalid(format!("{} does not fit the 8-byte timestamp form", d))
    })?;
    out.write_i64(nanos);
    Ok(())
}

fn write_enum(out: &mut WriteBuffer, e: &EnumValue) {
    out.write_i32(e.type_id);
    out.write_i32(e.ordinal);
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// Read the payload of a plain value whose tag was already consumed.
///
/// `tag_offset` is where the tag byte sits, for error reporting.
pub(crate) fn read_plain(cur: &mut Cursor<'_>, tag: WireTag, tag_offset: usize) -> Result<Value> {
    let value = match tag {
        WireTag::Null => Value::Null,
        WireTag::Byte => Value::Byte(cur.read_u8()?),
        WireTag::Bool => Value::Bool(cur.read_bool()?),
        WireTag::Short => Value::Short(cur.read_i16()?),
        WireTag::Char => Value::Char(read_char(cur)?),
        WireTag::Int => Value::Int(cur.read_i32()?),
        WireTag::Long => Value::Long(cur.read_i64()?),
        WireTag::Float => Value::Float(cur.read_f32()?),
        WireTag::Double => Value::Double(cur.read_f64()?),
        WireTag::Decimal => Value::Decimal(read_decimal(cur)?),
        WireTag::String => Value::String(read_string(cur)?),
        WireTag::Guid => Value::Guid(read_guid(cur)?),
        WireTag::Date => Value::Date(read_date(cur)?),
        WireTag::Timestamp => Value::Timestamp(read_timestamp(cur)?),
        WireTag::Enum => Value::Enum(read_enum(cur)?),

        WireTag::ByteArray => {
            let len = cur.read_len(1)?;
            Value::ByteArray(cur.read_bytes(len)?.to_vec())
        }
        WireTag::BoolArray => Value::BoolArray(read_packed(cur, 1, Cursor::read_bool)?),
        WireTag::ShortArray => Value::ShortArray(read_packed(cur, 2, Cursor::read_i16)?),
        WireTag::CharArray => Value::CharArray(read_packed(cur, 4, read_char)?),
        WireTag::IntArray => Value::IntArray(read_packed(cur, 4, Cursor::read_i32)?),
        WireTag::LongArray => Value::LongArray(read_packed(cur, 8, Cursor::read_i64)?),
        WireTag::FloatArray => Value::FloatArray(read_packed(cur, 4, Cursor::read_f32)?),
        WireTag::DoubleArray => Value::DoubleArray(read_packed(cur, 8, Cursor::read_f64)?),

        WireTag::DecimalArray => Value::DecimalArray(read_nullable(cur, WireTag::Decimal, read_decimal)?),
        WireTag::StringArray => Value::StringArray(read_nullable(cur, WireTag::String, read_string)?),
        WireTag::GuidArray => Value::GuidArray(read_nullable(cur, WireTag::Guid, read_guid)?),
        WireTag::DateArray => Value::DateArray(read_nullable(cur, WireTag::Date, read_date)?),
        WireTag::TimestampArray => {
            Value::TimestampArray(read_nullable(cur, WireTag::Timestamp, read_timestamp)?)
        }
        WireTag::EnumArray => Value::EnumArray(read_nullable(cur, WireTag::Enum, read_enum)?),

        WireTag::ObjectArray
        | WireTag::Collection
        | WireTag::Map
        | WireTag::Object
        | WireTag::Handle
        | WireTag::Forward => {
            return Err(PortableError::corrupt(
                tag_offset,
                format!("{:?} is not a plain value tag", tag),
            ))
        }
    };
    Ok(value)
}

/// Tag and end offset of the plain value whose tag sits at `offset`, or
/// `None` for values that can hold objects. Lengths are checked; payloads
/// are not decoded.
pub(crate) fn plain_span(buf: &[u8], offset: usize) -> Result<Option<(WireTag, usize)>> {
    let mut cur = Cursor::at(buf, offset);
    let tag = WireTag::parse(cur.read_u8()?, offset)?;
    match tag {
        WireTag::ObjectArray
        | WireTag::Collection
        | WireTag::Map
        | WireTag::Object
        | WireTag::Handle
        | WireTag::Forward => Ok(None),
        plain => {
            skip_plain(&mut cur, plain, offset)?;
            Ok(Some((plain, cur.offset())))
        }
    }
}

fn skip(cur: &mut Cursor<'_>, len: usize) -> Result<()> {
    cur.read_bytes(len).map(drop)
}

fn skip_array(cur: &mut Cursor<'_>, elem_size: usize) -> Result<()> {
    let len = cur.read_len(elem_size)?;
    skip(cur, len * elem_size)
}

fn skip_plain(cur: &mut Cursor<'_>, tag: WireTag, tag_offset: usize) -> Result<()> {
    match tag {
        WireTag::Null => Ok(()),
        WireTag::Byte | WireTag::Bool => skip(cur, 1),
        WireTag::Short => skip(cur, 2),
        WireTag::Char | WireTag::Int | WireTag::Float => skip(cur, 4),
        WireTag::Long | WireTag::Double | WireTag::Timestamp | WireTag::Enum => skip(cur, 8),
        WireTag::Date => skip(cur, 12),
        WireTag::Guid => skip(cur, 16),
        WireTag::Decimal => {
            skip(cur, 5)?;
            skip_array(cur, 1)
        }
        WireTag::String | WireTag::ByteArray | WireTag::BoolArray => skip_array(cur, 1),
        WireTag::ShortArray => skip_array(cur, 2),
        WireTag::CharArray | WireTag::IntArray | WireTag::FloatArray => skip_array(cur, 4),
        WireTag::LongArray | WireTag::DoubleArray => skip_array(cur, 8),
        WireTag::DecimalArray
        | WireTag::StringArray
        | WireTag::GuidArray
        | WireTag::DateArray
        | WireTag::TimestampArray
        | WireTag::EnumArray => {
            let elem = tag.element_tag().ok_or_else(|| {
                PortableError::corrupt(tag_offset, format!("{:?} has no element tag", tag))
            })?;
            let len = cur.read_len(1)?;
            for _ in 0..len {
                let at = cur.offset();
                let item = WireTag::parse(cur.read_u8()?, at)?;
                if item == elem {
                    skip_plain(cur, elem, at)?;
                } else if item != WireTag::Null {
                    return Err(PortableError::corrupt(
                        at,
                        format!("expected {} element, found {:?}", elem, item),
                    ));
                }
            }
            Ok(())
        }
        other => Err(PortableError::corrupt(
            tag_offset,
            format!("{:?} is not a plain value tag", other),
        )),
    }
}

fn read_packed<'a, T>(
    cur: &mut Cursor<'a>,
    elem_size: usize,
    read: impl Fn(&mut Cursor<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let len = cur.read_len(elem_size)?;
    (0..len).map(|_| read(cur)).collect()
}

fn read_nullable<'a, T>(
    cur: &mut Cursor<'a>,
    elem: WireTag,
    read: impl Fn(&mut Cursor<'a>) -> Result<T>,
) -> Result<Vec<Option<T>>> {
    let len = cur.read_len(1)?;
    let mut items = Vec::with_capacity(len);
    for _ in 0..len {
        let at = cur.offset();
        let tag = WireTag::parse(cur.read_u8()?, at)?;
        if tag == WireTag::Null {
            items.push(None);
        } else if tag == elem {
            items.push(Some(read(cur)?));
        } else {
            return Err(PortableError::corrupt(
                at,
                format!("expected {} element, found {:?}", elem, tag),
            ));
        }
    }
    Ok(items)
}

fn read_char(cur: &mut Cursor<'_>) -> Result<char> {
    let at = cur.offset();
    let scalar = cur.read_u32()?;
    char::from_u32(scalar)
        .ok_or_else(|| PortableError::corrupt(at, format!("invalid char scalar {:#x}", scalar)))
}

pub(crate) fn read_string(cur: &mut Cursor<'_>) -> Result<String> {
    let at = cur.offset();
    let len = cur.read_len(1)?;
    let bytes = cur.read_bytes(len)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| PortableError::corrupt(at, format!("invalid UTF-8 string: {}", e)))
}

fn read_decimal(cur: &mut Cursor<'_>) -> Result<Decimal> {
    let negative = cur.read_bool()?;
    let scale = cur.read_i32()?;
    let len = cur.read_len(1)?;
    let magnitude = cur.read_bytes(len)?.to_vec();
    Ok(Decimal::new(negative, scale, magnitude))
}

fn read_guid(cur: &mut Cursor<'_>) -> Result<Uuid> {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(cur.read_bytes(16)?);
    Ok(Uuid::from_bytes(bytes))
}

fn read_date(cur: &mut Cursor<'_>) -> Result<DateTime<Utc>> {
    let at = cur.offset();
    let secs = cur.read_i64()?;
    let nanos = cur.read_u32()?;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .ok_or_else(|| PortableError::corrupt(at, format!("date {}s+{}ns out of range", secs, nanos)))
}

fn read_timestamp(cur: &mut Cursor<'_>) -> Result<DateTime<Utc>> {
    Ok(Utc.timestamp_nanos(cur.read_i64()?))
}

fn read_enum(cur: &mut Cursor<'_>) -> Result<EnumValue> {
    let type_id = cur.read_i32()?;
    let ordinal = cur.read_i32()?;
    Ok(EnumValue { type_id, ordinal })
}
