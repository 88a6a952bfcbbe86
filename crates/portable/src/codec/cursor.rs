// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Growable write buffer and bounds-checked read cursor.
//!
//! Both work in absolute offsets: a [`Cursor`] can be positioned anywhere in
//! the buffer it borrows, which is how handles are followed.

use crate::error::{PortableError, Result};

/// Generate little-endian write methods for primitive types.
macro_rules! impl_write_le {
    ($name:ident, $type:ty) => {
        pub fn $name(&mut self, value: $type) {
            self.buffer.extend_from_slice(&value.to_le_bytes());
        }
    };
}

/// Generate little-endian read methods for primitive types.
///
/// Each generated method checks bounds (`CorruptData` at the current offset
/// on overflow), reads the bytes and advances the offset.
macro_rules! impl_read_le {
    ($name:ident, $type:ty, $size:expr) => {
        pub fn $name(&mut self) -> Result<$type> {
            let mut bytes = [0u8; $size];
            bytes.copy_from_slice(self.read_bytes($size)?);
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Append-only output buffer with in-place patching.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    buffer: Vec<u8>,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn position(&self) -> usize {
        self.buffer.len()
    }

    impl_write_le!(write_i16, i16);
    impl_write_le!(write_i32, i32);
    impl_write_le!(write_u32, u32);
    impl_write_le!(write_i64, i64);
    impl_write_le!(write_f32, f32);
    impl_write_le!(write_f64, f64);

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(u8::from(value));
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Write a collection length as i32.
    pub fn write_len(&mut self, len: usize) -> Result<()> {
        let len = i32::try_from(len)
            .map_err(|_| PortableError::invalid(format!("length {} exceeds i32", len)))?;
        self.write_i32(len);
        Ok(())
    }

    /// Overwrite four bytes at `offset` (used for back-patching headers).
    pub fn patch_i32(&mut self, offset: usize, value: i32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn patch_u8(&mut self, offset: usize, value: u8) {
        self.buffer[offset] = value;
    }

    pub fn slice(&self, start: usize, end: usize) -> &[u8] {
        &self.buffer[start..end]
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

/// Immutable cursor for reading (bounds-checked, zero-copy)
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    /// Cursor positioned at an absolute offset.
    pub fn at(buffer: &'a [u8], offset: usize) -> Self {
        Self { buffer, offset }
    }

    impl_read_le!(read_i16, i16, 2);
    impl_read_le!(read_i32, i32, 4);
    impl_read_le!(read_u32, u32, 4);
    impl_read_le!(read_i64, i64, 8);
    impl_read_le!(read_f32, f32, 4);
    impl_read_le!(read_f64, f64, 8);

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        let at = self.offset;
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(PortableError::corrupt(
                at,
                format!("invalid bool byte {:#04x}", other),
            )),
        }
    }

    /// Read an i32 length and check it is non-negative and plausible for
    /// elements of `min_elem_size` bytes each.
    pub fn read_len(&mut self, min_elem_size: usize) -> Result<usize> {
        let at = self.offset;
        let len = self.read_i32()?;
        let len = usize::try_from(len)
            .map_err(|_| PortableError::corrupt(at, format!("negative length {}", len)))?;
        if len.saturating_mul(min_elem_size) > self.remaining() {
            return Err(PortableError::corrupt(
                at,
                format!("length {} exceeds remaining {} bytes", len, self.remaining()),
            ));
        }
        Ok(len)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(PortableError::corrupt(
                self.offset,
                "unexpected end of buffer",
            ));
        }
        let slice = &self.buffer[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn is_eof(&self) -> bool {
        self.offset >= self.buffer.len()
    }
}
