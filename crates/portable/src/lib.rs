// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Portable objects
//!
//! A self-describing binary object format with:
//! - Random field access on encoded bytes, without decoding the rest
//! - Builders that edit an encoded object and produce a new one
//! - Shared references and cycles kept through handles and forward markers
//! - A process-wide type registry that accretes field metadata
//!
//! # Quick Start
//!
//! ```
//! use portable::{Marshaller, PortableConfig};
//!
//! let marshaller = Marshaller::new(PortableConfig::default());
//!
//! let address = marshaller.builder("Address").unwrap();
//! address.set_field("city", "Lyon").unwrap();
//!
//! let person = marshaller.builder("Person").unwrap();
//! person.set_field("name", "Ada").unwrap();
//! person.set_field("home", &address).unwrap();
//! person.set_field("work", &address).unwrap();
//! let obj = person.build().unwrap();
//!
//! // Both fields decode to the same shared instance.
//! let (graph, root) = obj.materialize_graph().unwrap();
//! assert_eq!(graph.follow(root, &["home"]), graph.follow(root, &["work"]));
//!
//! // Edit without touching unrelated fields.
//! let edit = marshaller.builder_from(&obj);
//! edit.set_field("name", "Grace").unwrap();
//! let obj = edit.build().unwrap();
//! assert_eq!(obj.field::<String>("name").unwrap().as_deref(), Some("Grace"));
//! ```

pub mod builder;
pub mod codec;
pub mod config;
pub mod error;
pub mod graph;
pub mod marshaller;
pub mod object;
pub mod portable;
pub mod reader;
pub mod registry;
pub mod value;
pub mod writer;

pub use builder::ObjectBuilder;
pub use codec::{Decimal, WireTag};
pub use config::{ConflictPolicy, PortableConfig, PortableConfigBuilder, TypeConfig};
pub use error::{PortableError, Result};
pub use graph::{NodeId, ObjectGraph, Record};
pub use marshaller::{DecodeMode, Decoded, Marshaller};
pub use object::EncodedObject;
pub use portable::Portable;
pub use reader::{ObjectReader, RawReader};
pub use registry::{FieldDescriptor, IdMapper, TypeDescriptor, TypeRegistry};
pub use value::{EnumValue, FromValue, Timestamp, Value};
pub use writer::{ObjectWriter, RawWriter};
