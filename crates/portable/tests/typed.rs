// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Typed layer: Portable implementations, nested typed objects and raw
// segments.

use portable::{
    portable_fields, Marshaller, ObjectReader, ObjectWriter, Portable, PortableError, Result, Value,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct Address {
    street: String,
    zip: i32,
}

portable_fields!(Address, "Address", { street, zip });

#[derive(Debug, Default, Clone, PartialEq)]
struct Person {
    name: String,
    age: u16,
    tags: Vec<String>,
    home: Option<Address>,
    work: Option<Address>,
}

impl Portable for Person {
    fn type_name() -> &'static str {
        "Person"
    }

    fn write_portable(&self, writer: &mut ObjectWriter<'_, '_>) -> Result<()> {
        writer.write("name", self.name.as_str())?;
        writer.write("age", self.age)?;
        writer.write("tags", self.tags.clone())?;
        if let Some(home) = &self.home {
            writer.write_object("home", home)?;
        }
        match &self.work {
            Some(work) => writer.write_object("work", work),
            None => writer.write("work", Value::Null),
        }
    }

    fn read_portable(reader: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self {
            name: reader.read("name")?.unwrap_or_default(),
            age: reader.read("age")?.unwrap_or_default(),
            tags: reader.read("tags")?.unwrap_or_default(),
            home: reader.read_object("home")?,
            work: reader.read_object("work")?,
        })
    }
}

/// One named field plus a raw trailer.
#[derive(Debug, Default, Clone, PartialEq)]
struct WithRaw {
    a: i32,
    b: i32,
    label: String,
}

impl Portable for WithRaw {
    fn type_name() -> &'static str {
        "WithRaw"
    }

    fn write_portable(&self, writer: &mut ObjectWriter<'_, '_>) -> Result<()> {
        writer.write("a", self.a)?;
        let mut raw = writer.raw();
        raw.write_i32(self.b);
        raw.write_string(&self.label)
    }

    fn read_portable(reader: &mut ObjectReader<'_>) -> Result<Self> {
        let a = reader.read("a")?.unwrap_or_default();
        let raw = reader.raw();
        Ok(Self {
            a,
            b: raw.read_i32()?,
            label: raw.read_string()?,
        })
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Pinned {
    id: i64,
}

impl Portable for Pinned {
    fn type_name() -> &'static str {
        "Pinned"
    }

    fn write_portable(&self, writer: &mut ObjectWriter<'_, '_>) -> Result<()> {
        writer.write("id", self.id)
    }

    fn read_portable(reader: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self {
            id: reader.read("id")?.unwrap_or_default(),
        })
    }

    fn portable_hash(&self) -> Option<i32> {
        Some(self.id as i32)
    }
}

/// Singly linked node; cyclic data cannot be read into it.
#[derive(Debug, Default, Clone, PartialEq)]
struct Link {
    value: i32,
    next: Option<Box<Link>>,
}

impl Portable for Link {
    fn type_name() -> &'static str {
        "Link"
    }

    fn write_portable(&self, writer: &mut ObjectWriter<'_, '_>) -> Result<()> {
        writer.write("value", self.value)?;
        if let Some(next) = &self.next {
            writer.write_object("next", next.as_ref())?;
        }
        Ok(())
    }

    fn read_portable(reader: &mut ObjectReader<'_>) -> Result<Self> {
        Ok(Self {
            value: reader.read("value")?.unwrap_or_default(),
            next: reader.read_object::<Link>("next")?.map(Box::new),
        })
    }
}

fn ada() -> Person {
    let addr = Address {
        street: "Main".into(),
        zip: 69001,
    };
    Person {
        name: "Ada".into(),
        age: 36,
        tags: vec!["math".into(), "engines".into()],
        home: Some(addr.clone()),
        work: Some(addr),
    }
}

#[test]
fn nested_typed_roundtrip() {
    let m = Marshaller::default();
    let person = ada();
    let obj = m.to_binary_portable(&person).unwrap();

    assert_eq!(obj.type_name().as_deref(), Some("Person"));
    assert_eq!(obj.field::<String>("name").unwrap().as_deref(), Some("Ada"));
    let home = obj.field::<portable::EncodedObject>("home").unwrap().unwrap();
    assert_eq!(home.field::<i32>("zip").unwrap(), Some(69001));
    assert_eq!(obj.materialize::<Person>().unwrap(), person);

    // Typed values carry no identity: equal nested values are two objects.
    let (graph, root) = obj.materialize_graph().unwrap();
    assert_ne!(graph.follow(root, &["home"]), graph.follow(root, &["work"]));

    let desc = m.type_descriptor_of::<Person>().unwrap();
    assert_eq!(desc.field_type_name("home"), Some("Object"));
    assert_eq!(desc.field_type_name("tags"), Some("String[]"));
    assert_eq!(desc.field_type_name("age"), Some("short"));
}

#[test]
fn absent_and_null_nested_objects() {
    let m = Marshaller::default();
    let person = Person {
        name: "Solo".into(),
        ..Person::default()
    };
    let obj = m.to_binary_portable(&person).unwrap();
    assert!(!obj.has_field("home"));
    assert_eq!(obj.get_field("work").unwrap(), Some(Value::Null));
    assert_eq!(obj.materialize::<Person>().unwrap(), person);
}

#[test]
fn raw_segment_survives_rebuild() {
    let m = Marshaller::default();
    let original = WithRaw {
        a: 1,
        b: 0x0102_0304,
        label: "tail".into(),
    };
    let obj = m.to_binary_portable(&original).unwrap();
    assert!(!obj.raw_data().is_empty());
    assert_eq!(obj.field_names().unwrap(), vec!["a"]);

    let edit = m.builder_from(&obj);
    edit.set_field("a", 2i32).unwrap();
    let rebuilt = edit.build().unwrap();
    assert_eq!(rebuilt.raw_data(), obj.raw_data());
    assert_eq!(
        rebuilt.materialize::<WithRaw>().unwrap(),
        WithRaw {
            a: 2,
            ..original.clone()
        }
    );

    // Raw bytes also survive a detour through a materialized graph.
    let (graph, root) = rebuilt.materialize_graph().unwrap();
    let bytes = m.encode_graph(&graph, &Value::Node(root)).unwrap();
    assert_eq!(bytes, rebuilt.data());
}

#[test]
fn raw_reads_past_the_end_fail() {
    let m = Marshaller::default();
    let b = m.builder_for::<WithRaw>().unwrap();
    b.set_field("a", 1i32).unwrap();
    let obj = b.build().unwrap();
    assert!(obj.raw_data().is_empty());
    assert!(obj.materialize::<WithRaw>().unwrap_err().is_corrupt());
}

#[test]
fn explicit_portable_hash() {
    let m = Marshaller::default();
    let obj = m.to_binary_portable(&Pinned { id: 77 }).unwrap();
    assert_eq!(obj.identity_hash(), 77);
    assert_eq!(obj.explicit_hash(), Some(77));
    assert_eq!(m.builder_from(&obj).hash(), Some(77));
}

#[test]
fn typed_reading_detects_cycles() {
    let m = Marshaller::default();
    let chain = Link {
        value: 1,
        next: Some(Box::new(Link {
            value: 2,
            next: None,
        })),
    };
    let obj = m.to_binary_portable(&chain).unwrap();
    assert_eq!(obj.materialize::<Link>().unwrap(), chain);

    let a = m.builder_for::<Link>().unwrap();
    let b = m.builder_for::<Link>().unwrap();
    a.set_field("value", 1i32).unwrap();
    a.set_field("next", &b).unwrap();
    b.set_field("value", 2i32).unwrap();
    b.set_field("next", &a).unwrap();
    let cyclic = a.build().unwrap();
    assert!(matches!(
        cyclic.materialize::<Link>(),
        Err(PortableError::CyclicGraph)
    ));
}

#[test]
fn materializing_the_wrong_type_fails() {
    let m = Marshaller::default();
    let obj = m.to_binary_portable(&Pinned { id: 1 }).unwrap();
    assert!(matches!(
        obj.materialize::<Link>(),
        Err(PortableError::TypeMismatch { .. })
    ));
}

#[test]
fn typed_and_builder_objects_mix() {
    let m = Marshaller::default();
    let person = m.to_binary_portable(&ada()).unwrap();

    let edit = m.builder_from(&person);
    let home = edit.get_field("home").unwrap().unwrap();
    home.as_builder().unwrap().set_field("zip", 75001i32).unwrap();
    edit.set_field("age", 37u16).unwrap();
    let updated = edit.build().unwrap().materialize::<Person>().unwrap();

    assert_eq!(updated.age, 37);
    assert_eq!(updated.home.as_ref().map(|a| a.zip), Some(75001));
    assert_eq!(updated.work.as_ref().map(|a| a.zip), Some(69001));
}
