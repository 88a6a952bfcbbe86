// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed read/write contract.

use crate::error::Result;
use crate::reader::ObjectReader;
use crate::writer::ObjectWriter;

/// A Rust type with its own portable layout.
///
/// `write_portable` writes named fields (and optionally a raw segment);
/// `read_portable` reads them back. Plain structs usually get both from
/// [`portable_fields!`](crate::portable_fields).
///
/// Typed values are written by value: two fields holding equal values are
/// encoded twice, and cyclic data cannot be expressed.
pub trait Portable: Sized {
    /// Name the type is registered under.
    fn type_name() -> &'static str;

    fn write_portable(&self, writer: &mut ObjectWriter<'_, '_>) -> Result<()>;

    fn read_portable(reader: &mut ObjectReader<'_>) -> Result<Self>;

    /// Explicit hash; `None` uses the computed one.
    fn portable_hash(&self) -> Option<i32> {
        None
    }
}

/// Implement [`Portable`] for a `Default` struct whose fields convert to and
/// from [`Value`](crate::Value).
///
/// Reading starts from `Default::default()` and assigns each field present
/// in the object, matched by name.
///
/// ```
/// use portable::{portable_fields, Marshaller, PortableConfig};
///
/// #[derive(Debug, Default, Clone, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
///     label: Option<String>,
/// }
///
/// portable_fields!(Point, "Point", { x, y, label });
///
/// let marshaller = Marshaller::new(PortableConfig::default());
/// let p = Point { x: 1, y: 2, label: None };
/// let obj = marshaller.to_binary_portable(&p).unwrap();
/// assert_eq!(obj.field::<i32>("y").unwrap(), Some(2));
/// assert_eq!(obj.materialize::<Point>().unwrap(), p);
/// ```
#[macro_export]
macro_rules! portable_fields {
    ($ty:ty, $name:expr, { $($field:ident),* $(,)? }) => {
        impl $crate::Portable for $ty {
            fn type_name() -> &'static str {
                $name
            }

            fn write_portable(&self, writer: &mut $crate::ObjectWriter<'_, '_>) -> $crate::Result<()> {
                $( writer.write(stringify!($field), ::core::clone::Clone::clone(&self.$field))?; )*
                Ok(())
            }

            fn read_portable(reader: &mut $crate::ObjectReader<'_>) -> $crate::Result<Self> {
                #[allow(unused_mut)]
                let mut value = <$ty as ::core::default::Default>::default();
                $(
                    if let Some(v) = reader.read(stringify!($field))? {
                        value.$field = v;
                    }
                )*
                Ok(value)
            }
        }
    };
}
